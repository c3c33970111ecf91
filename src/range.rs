// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 字节范围（Range）处理模块
//!
//! 处理分为两个阶段：
//! 1. **解析**（[`parse_range`]）：此时还不知道资源大小，只把 `Range` 头部转换为原始范围列表，
//!    `-N` 与 `N-` 中省略的一端以 `None` 保存；
//! 2. **修正**（[`resolve_ranges`]）：资源大小确定后，把省略的端点具体化，丢弃不可能的范围，
//!    并判断整个请求是否可满足。
//!
//! 范围节点来自 [`RangePool`]：一个基于下标的空闲链表，节点只会被回收复用而不会被单独释放，
//! 避免了每个请求都分配内存。任何时刻一个节点要么恰好在某一个 [`RangeList`] 中，要么恰好在池中。
//!
//! 列表顺序即客户端给出的顺序，它决定了 multipart 响应中各分段的先后。

use log::{debug, warn};

use crate::exception::Exception;

/// 池中节点的下标。只能由 [`RangePool::pop`] 产生。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

/// 一个半开放的字节范围。`None` 表示客户端省略了该端点。
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeNode {
    start: Option<u64>,
    stop: Option<u64>,
    next: Option<NodeId>,
    pooled: bool,
}

impl RangeNode {
    pub fn start(&self) -> Option<u64> {
        self.start
    }

    pub fn stop(&self) -> Option<u64> {
        self.stop
    }
}

/// 范围节点的空闲链表。
///
/// 池只会在未命中时增长，只有在停机时通过 [`RangePool::drain`] 才会收缩。
/// 池本身不是线程安全的：多线程共享时需要包在 `Mutex` 中，或者每个工作线程各持一个。
#[derive(Debug, Default)]
pub struct RangePool {
    nodes: Vec<RangeNode>,
    free: Option<NodeId>,
    available: usize,
}

impl RangePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出一个已清零的节点；池为空时分配新节点。
    pub fn pop(&mut self) -> NodeId {
        match self.free {
            Some(id) => {
                self.free = self.nodes[id.0].next;
                self.available -= 1;
                self.nodes[id.0] = RangeNode::default();
                id
            }
            None => {
                self.nodes.push(RangeNode::default());
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// 将节点归还到池中。重复归还同一个节点会被忽略。
    pub fn push(&mut self, id: NodeId) {
        let free = self.free;
        let node = &mut self.nodes[id.0];
        if node.pooled {
            warn!("范围节点{}被重复归还，忽略", id.0);
            return;
        }
        node.next = free;
        node.pooled = true;
        self.free = Some(id);
        self.available += 1;
    }

    pub fn node(&self, id: NodeId) -> &RangeNode {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut RangeNode {
        &mut self.nodes[id.0]
    }

    /// 曾经分配过的节点总数。
    pub fn allocated(&self) -> usize {
        self.nodes.len()
    }

    /// 当前在池中等待复用的节点数。
    pub fn available(&self) -> usize {
        self.available
    }

    /// 当前挂在各个列表上的节点数。
    pub fn in_use(&self) -> usize {
        self.nodes.len() - self.available
    }

    /// 停机时释放所有节点，返回释放的数量。
    ///
    /// 仍有节点挂在列表上时拒绝释放：下标会失效。
    pub fn drain(&mut self) -> usize {
        if self.in_use() > 0 {
            warn!(
                "仍有{}个范围节点未归还，放弃清空范围节点池",
                self.in_use()
            );
            return 0;
        }
        let released = self.nodes.len();
        self.nodes = Vec::new();
        self.free = None;
        self.available = 0;
        debug!("范围节点池已清空，释放{}个节点", released);
        released
    }
}

/// 按客户端给出的顺序排列的范围列表，节点归列表所有。
#[derive(Debug, Default)]
pub struct RangeList {
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
    rejected: bool,
}

impl RangeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 本列表的某次解析是否已经中止。中止后再解析新的 `Range` 头部会直接失败，直到 [`reset`](Self::reset)。
    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    pub fn push_back(&mut self, pool: &mut RangePool, start: Option<u64>, stop: Option<u64>) {
        let id = pool.pop();
        let node = pool.node_mut(id);
        node.start = start;
        node.stop = stop;
        self.link(pool, id);
    }

    fn link(&mut self, pool: &mut RangePool, id: NodeId) {
        pool.node_mut(id).next = None;
        match self.tail {
            Some(tail) => pool.node_mut(tail).next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
    }

    /// 把所有节点归还到池中，并清除中止标记。
    pub fn reset(&mut self, pool: &mut RangePool) {
        self.release(pool);
        self.rejected = false;
    }

    fn release(&mut self, pool: &mut RangePool) {
        let mut cursor = self.head.take();
        while let Some(id) = cursor {
            cursor = pool.node(id).next;
            pool.push(id);
        }
        self.tail = None;
        self.len = 0;
    }

    fn abort(&mut self, pool: &mut RangePool) {
        self.release(pool);
        self.rejected = true;
    }

    pub fn iter<'a>(&self, pool: &'a RangePool) -> Iter<'a> {
        Iter {
            pool,
            cursor: self.head,
        }
    }

    /// 修正后的具体范围。仍含有省略端点或起点大于终点的节点会被跳过，
    /// 因此只有在 [`resolve_ranges`] 之后调用才能得到完整结果。
    pub fn byte_ranges(&self, pool: &RangePool) -> Vec<ByteRange> {
        self.iter(pool)
            .filter_map(|node| match (node.start, node.stop) {
                (Some(start), Some(stop)) if start <= stop => Some(ByteRange { start, stop }),
                _ => None,
            })
            .collect()
    }
}

pub struct Iter<'a> {
    pool: &'a RangePool,
    cursor: Option<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a RangeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.pool.node(id);
        self.cursor = node.next;
        Some(node)
    }
}

/// 具体的闭区间字节范围 `[start, stop]`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub stop: u64,
}

impl ByteRange {
    /// 区间包含的字节数，起点大于终点时为 0。
    pub fn len(&self) -> u64 {
        self.stop
            .checked_sub(self.start)
            .map_or(0, |span| span.saturating_add(1))
    }

    /// `Content-Range` 头部的值，如 `bytes 0-10/10000`。
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.stop, size)
    }
}

/// 416 响应中 `Content-Range` 头部的值。
pub fn content_range_unsatisfiable(size: u64) -> String {
    format!("bytes */{}", size)
}

// --- 解析阶段 ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    StartNum,
    Gap1,
    Gap2,
    StopNum,
}

/// 输入字符的分类。空白字符虽然不符合 `Range` 的语法，但仍被单独分类并在某些位置被容忍。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    Digit,
    White,
    Comma,
    Hyphen,
    End,
    Other,
}

impl Symbol {
    fn classify(c: Option<u8>) -> Self {
        match c {
            Some(b'0'..=b'9') => Symbol::Digit,
            Some(b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c') => Symbol::White,
            Some(b',') => Symbol::Comma,
            Some(b'-') => Symbol::Hyphen,
            None => Symbol::End,
            Some(_) => Symbol::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    None,
    PushStart,
    PushStop,
    MarkUnspecifiedStart,
    MarkUnspecifiedStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Abort,
    Submit,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    action: Action,
    flow: Flow,
    next: State,
}

const fn go(action: Action, next: State) -> Transition {
    Transition {
        action,
        flow: Flow::Continue,
        next,
    }
}

const fn submit(action: Action, next: State) -> Transition {
    Transition {
        action,
        flow: Flow::Submit,
        next,
    }
}

const ABORT: Transition = Transition {
    action: Action::None,
    flow: Flow::Abort,
    next: State::Initial,
};

use Action::{MarkUnspecifiedStart, MarkUnspecifiedStop, PushStart, PushStop};
use State::{Gap1, Gap2, Initial, StartNum, StopNum};

/// 以 `(状态, 字符分类)` 为键的转移表，列顺序与 [`Symbol`] 一致。
const TRANSITIONS: [[Transition; 6]; 5] = [
    // Initial
    [
        go(PushStart, StartNum),
        go(Action::None, Initial),
        go(Action::None, Initial),
        go(MarkUnspecifiedStart, Gap2),
        go(Action::None, Initial),
        ABORT,
    ],
    // StartNum
    [
        go(PushStart, StartNum),
        go(Action::None, Gap1),
        ABORT,
        go(Action::None, Gap2),
        ABORT,
        ABORT,
    ],
    // Gap1
    [
        ABORT,
        go(Action::None, Gap1),
        ABORT,
        go(Action::None, Gap2),
        ABORT,
        ABORT,
    ],
    // Gap2
    [
        go(PushStop, StopNum),
        go(Action::None, Gap2),
        submit(MarkUnspecifiedStop, Initial),
        ABORT,
        submit(MarkUnspecifiedStop, Initial),
        ABORT,
    ],
    // StopNum
    [
        go(PushStop, StopNum),
        submit(Action::None, Initial),
        submit(Action::None, Initial),
        ABORT,
        submit(Action::None, Initial),
        ABORT,
    ],
];

fn transition(state: State, symbol: Symbol) -> Transition {
    TRANSITIONS[state as usize][symbol as usize]
}

fn push_digit(acc: Option<u64>, c: u8) -> Option<u64> {
    acc.unwrap_or(0)
        .checked_mul(10)?
        .checked_add(u64::from(c - b'0'))
}

/// 解析 `Range` 头部的值（如 `bytes=0-10,15-9000,33-,-44`），把原始范围追加到 `list`。
///
/// 值必须以大小写不敏感的 `bytes=` 开头，否则直接失败且不产生任何节点。
/// 任何格式错误都会中止整个解析：列表中的全部节点归还到池中，列表被标记为已中止，
/// 服务器绝不会处理一半被解析的范围集合。成功时返回列表中的范围数量。
pub fn parse_range(
    list: &mut RangeList,
    pool: &mut RangePool,
    header: &str,
) -> Result<usize, Exception> {
    if list.is_rejected() {
        warn!("此前的Range头部已被拒绝，忽略后续Range头部：{:?}", header);
        return Err(Exception::RangeSyntaxError);
    }

    let spec = match header.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bytes=") => &header[6..],
        _ => {
            warn!("Range头部没有以\"bytes=\"开头：{:?}", header);
            return Err(Exception::RangeSyntaxError);
        }
    };

    let mut state = State::Initial;
    let mut start = Some(0u64);
    let mut stop = Some(0u64);

    let input = spec.bytes().map(Some).chain(std::iter::once(None));
    for c in input {
        let symbol = Symbol::classify(c);
        let step = transition(state, symbol);

        let accumulated = match (step.action, c) {
            (PushStart, Some(d)) => push_digit(start, d).map(|v| start = Some(v)),
            (PushStop, Some(d)) => push_digit(stop, d).map(|v| stop = Some(v)),
            (MarkUnspecifiedStart, _) => {
                start = None;
                Some(())
            }
            (MarkUnspecifiedStop, _) => {
                stop = None;
                Some(())
            }
            _ => Some(()),
        };

        if accumulated.is_none() {
            warn!("Range头部中的数值溢出：{:?}", header);
            list.abort(pool);
            return Err(Exception::RangeSyntaxError);
        }

        match step.flow {
            Flow::Abort => {
                warn!("Range头部格式错误，丢弃全部范围：{:?}", header);
                list.abort(pool);
                return Err(Exception::RangeSyntaxError);
            }
            Flow::Submit => {
                debug!("解析得到范围：{:?}-{:?}", start, stop);
                list.push_back(pool, start, stop);
                start = Some(0);
                stop = Some(0);
            }
            Flow::Continue => {}
        }

        state = step.next;
    }

    Ok(list.len())
}

// --- 修正阶段 ---

/// 在资源大小 `size` 已知后修正一个原始范围；返回 `None` 表示该范围应被丢弃。
///
/// 后缀范围 `-N` 超过资源大小时起点截断为 0（返回整个资源）；`-0` 会被丢弃。
fn fixup(start: Option<u64>, stop: Option<u64>, size: u64) -> Option<(u64, u64)> {
    let last = size.checked_sub(1)?;
    let (start, stop) = match (start, stop) {
        (None, None) => return None,
        (None, Some(suffix)) => (size.saturating_sub(suffix), last),
        (Some(start), None) => (start, last),
        (Some(start), Some(stop)) if start > stop => return None,
        (Some(start), Some(stop)) => (start, stop),
    };
    if start > last {
        return None;
    }
    Some((start, stop.min(last)))
}

/// 按原有顺序修正列表中的每个范围，丢弃不可满足的范围。
///
/// 返回剩余范围的数量；一个都不剩时返回 `RangeUnsatisfiable`，调用方应响应 416。
pub fn resolve_ranges(
    list: &mut RangeList,
    pool: &mut RangePool,
    size: u64,
) -> Result<usize, Exception> {
    let mut cursor = list.head.take();
    list.tail = None;
    list.len = 0;

    while let Some(id) = cursor {
        let node = pool.node_mut(id);
        cursor = node.next;
        match fixup(node.start, node.stop, size) {
            Some((start, stop)) => {
                node.start = Some(start);
                node.stop = Some(stop);
                list.link(pool, id);
            }
            None => {
                debug!(
                    "丢弃不可满足的范围：{:?}-{:?}（资源大小{}）",
                    node.start, node.stop, size
                );
                pool.push(id);
            }
        }
    }

    if list.is_empty() {
        return Err(Exception::RangeUnsatisfiable);
    }
    Ok(list.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn raw(list: &RangeList, pool: &RangePool) -> Vec<(Option<u64>, Option<u64>)> {
        list.iter(pool).map(|n| (n.start(), n.stop())).collect()
    }

    fn resolved(header: &str, size: u64) -> Result<Vec<(u64, u64)>, Exception> {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        parse_range(&mut list, &mut pool, header)?;
        resolve_ranges(&mut list, &mut pool, size)?;
        Ok(list
            .byte_ranges(&pool)
            .iter()
            .map(|r| (r.start, r.stop))
            .collect())
    }

    /// 空闲链表上实际可达的节点数
    fn free_list_len(pool: &RangePool) -> usize {
        let mut count = 0;
        let mut cursor = pool.free;
        while let Some(id) = cursor {
            count += 1;
            cursor = pool.node(id).next;
        }
        count
    }

    #[test]
    fn test_byte_ranges_skips_inverted_before_resolve() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        parse_range(&mut list, &mut pool, "bytes=50-30,0-4").unwrap();
        let ranges = list.byte_ranges(&pool);
        assert_eq!(ranges, vec![ByteRange { start: 0, stop: 4 }]);
        assert_eq!(ranges[0].len(), 5);
        assert_eq!(ByteRange { start: 50, stop: 30 }.len(), 0);
        list.reset(&mut pool);
    }

    #[test]
    fn test_pool_reuses_nodes() {
        let mut pool = RangePool::new();
        let a = pool.pop();
        let b = pool.pop();
        assert_eq!(pool.allocated(), 2);
        pool.push(a);
        assert_eq!(pool.available(), 1);
        let c = pool.pop();
        assert_eq!(c, a);
        assert_eq!(pool.allocated(), 2);
        pool.push(b);
        pool.push(c);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_pool_ignores_double_push() {
        let mut pool = RangePool::new();
        let a = pool.pop();
        pool.push(a);
        pool.push(a);
        assert_eq!(pool.available(), 1);
        assert_eq!(free_list_len(&pool), 1);
    }

    #[test]
    fn test_pool_popped_node_is_cleared() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        list.push_back(&mut pool, Some(3), Some(7));
        list.reset(&mut pool);
        let id = pool.pop();
        assert_eq!(pool.node(id).start(), None);
        assert_eq!(pool.node(id).stop(), None);
    }

    #[test]
    fn test_pool_drain() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        list.push_back(&mut pool, Some(0), Some(1));
        list.push_back(&mut pool, Some(2), Some(3));
        assert_eq!(pool.drain(), 0);
        list.reset(&mut pool);
        assert_eq!(pool.drain(), 2);
        assert_eq!(pool.allocated(), 0);
    }

    #[test]
    fn test_parse_preserves_client_order() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        let count =
            parse_range(&mut list, &mut pool, "bytes=0-10,15-9000,33-,-44,50-,30-50").unwrap();
        assert_eq!(count, 6);
        assert_eq!(
            raw(&list, &pool),
            vec![
                (Some(0), Some(10)),
                (Some(15), Some(9000)),
                (Some(33), None),
                (None, Some(44)),
                (Some(50), None),
                (Some(30), Some(50)),
            ]
        );
    }

    #[test]
    fn test_parse_prefix_case_insensitive() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        assert_eq!(parse_range(&mut list, &mut pool, "BYTES=1-2").unwrap(), 1);
    }

    #[test]
    fn test_parse_missing_prefix() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        assert_eq!(
            parse_range(&mut list, &mut pool, "foo=1-2"),
            Err(Exception::RangeSyntaxError)
        );
        assert!(list.is_empty());
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.allocated(), 0);
    }

    #[test]
    fn test_parse_short_or_multibyte_prefix() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        assert!(parse_range(&mut list, &mut pool, "byte").is_err());
        assert!(parse_range(&mut list, &mut pool, "bytés=1-2").is_err());
    }

    #[test]
    fn test_parse_empty_spec_yields_nothing() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        assert_eq!(parse_range(&mut list, &mut pool, "bytes=").unwrap(), 0);
    }

    #[test]
    fn test_parse_tolerated_whitespace() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        parse_range(&mut list, &mut pool, "bytes= 1 - 2 , 5-").unwrap();
        assert_eq!(raw(&list, &pool), vec![(Some(1), Some(2)), (Some(5), None)]);
    }

    #[test]
    fn test_parse_malformed_aborts_everything() {
        for header in [
            "bytes=5",
            "bytes=1-2,5",
            "bytes=1-2-3",
            "bytes=1-2,x",
            "bytes=--5",
            "bytes=1 2-3",
            "bytes=1-2,3,4-5",
            "bytes=99999999999999999999-",
        ] {
            let mut pool = RangePool::new();
            let mut list = RangeList::new();
            assert_eq!(
                parse_range(&mut list, &mut pool, header),
                Err(Exception::RangeSyntaxError),
                "{}",
                header
            );
            assert!(list.is_empty(), "{}", header);
            assert!(list.is_rejected(), "{}", header);
            assert_eq!(pool.in_use(), 0, "{}", header);
        }
    }

    #[test]
    fn test_rejected_list_refuses_second_header() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        assert!(parse_range(&mut list, &mut pool, "bytes=1-x").is_err());
        assert!(parse_range(&mut list, &mut pool, "bytes=1-2").is_err());
        list.reset(&mut pool);
        assert!(!list.is_rejected());
        assert_eq!(parse_range(&mut list, &mut pool, "bytes=1-2").unwrap(), 1);
    }

    #[test]
    fn test_second_header_appends() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        parse_range(&mut list, &mut pool, "bytes=0-1").unwrap();
        assert_eq!(parse_range(&mut list, &mut pool, "bytes=4-5").unwrap(), 2);
    }

    #[test]
    fn test_resolve_basic() {
        assert_eq!(
            resolved("bytes=0-10,15-9000", 10000).unwrap(),
            vec![(0, 10), (15, 9000)]
        );
    }

    #[test]
    fn test_resolve_suffix() {
        assert_eq!(resolved("bytes=-44", 100).unwrap(), vec![(56, 99)]);
    }

    #[test]
    fn test_resolve_oversized_suffix_clamps_to_zero() {
        // 33- 超出资源末尾被丢弃，-44 比资源还长，起点截断为 0
        assert_eq!(resolved("bytes=33-,-44", 10).unwrap(), vec![(0, 9)]);
    }

    #[test]
    fn test_resolve_zero_suffix_is_dropped() {
        assert_eq!(
            resolved("bytes=-0", 10),
            Err(Exception::RangeUnsatisfiable)
        );
    }

    #[test]
    fn test_resolve_open_end_and_clamp() {
        assert_eq!(
            resolved("bytes=5-,8-100", 10).unwrap(),
            vec![(5, 9), (8, 9)]
        );
    }

    #[test]
    fn test_resolve_drops_reversed_and_keeps_order() {
        assert_eq!(
            resolved("bytes=50-30,7-8,0-0", 10).unwrap(),
            vec![(7, 8), (0, 0)]
        );
    }

    #[test]
    fn test_resolve_start_at_last_byte() {
        assert_eq!(resolved("bytes=9-", 10).unwrap(), vec![(9, 9)]);
        assert_eq!(resolved("bytes=10-", 10), Err(Exception::RangeUnsatisfiable));
    }

    #[test]
    fn test_resolve_both_unspecified_dropped() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        parse_range(&mut list, &mut pool, "bytes=-,").unwrap();
        assert_eq!(raw(&list, &pool), vec![(None, None)]);
        assert_eq!(
            resolve_ranges(&mut list, &mut pool, 10),
            Err(Exception::RangeUnsatisfiable)
        );
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_resolve_empty_resource() {
        assert_eq!(resolved("bytes=0-", 0), Err(Exception::RangeUnsatisfiable));
    }

    #[test]
    fn test_resolve_returns_dropped_nodes_to_pool() {
        let mut pool = RangePool::new();
        let mut list = RangeList::new();
        parse_range(&mut list, &mut pool, "bytes=0-1,20-30,2-3,40-").unwrap();
        assert_eq!(resolve_ranges(&mut list, &mut pool, 10).unwrap(), 2);
        assert_eq!(pool.in_use(), 2);
        assert_eq!(pool.available(), 2);
        list.push_back(&mut pool, Some(4), Some(5));
        assert_eq!(
            list.byte_ranges(&pool),
            vec![
                ByteRange { start: 0, stop: 1 },
                ByteRange { start: 2, stop: 3 },
                ByteRange { start: 4, stop: 5 },
            ]
        );
    }

    #[test]
    fn test_byte_range_helpers() {
        let range = ByteRange { start: 15, stop: 9000 };
        assert_eq!(range.len(), 8986);
        assert_eq!(range.content_range(10000), "bytes 15-9000/10000");
        assert_eq!(content_range_unsatisfiable(10), "bytes */10");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Pop,
        PushLast,
        Append(usize),
        Reset(usize),
        Parse(usize, String),
        Resolve(usize, u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Pop),
            Just(Op::PushLast),
            (0..3usize).prop_map(Op::Append),
            (0..3usize).prop_map(Op::Reset),
            (0..3usize, "bytes=[0-9,\\- x]{0,12}").prop_map(|(i, s)| Op::Parse(i, s)),
            (0..3usize, 0..50u64).prop_map(|(i, s)| Op::Resolve(i, s)),
        ]
    }

    proptest! {
        #[test]
        fn prop_pool_accounting(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let mut pool = RangePool::new();
            let mut lists = [RangeList::new(), RangeList::new(), RangeList::new()];
            let mut loose = Vec::new();

            for op in ops {
                match op {
                    Op::Pop => loose.push(pool.pop()),
                    Op::PushLast => {
                        if let Some(id) = loose.pop() {
                            pool.push(id);
                        }
                    }
                    Op::Append(i) => lists[i].push_back(&mut pool, Some(1), Some(2)),
                    Op::Reset(i) => lists[i].reset(&mut pool),
                    Op::Parse(i, header) => {
                        let _ = parse_range(&mut lists[i], &mut pool, &header);
                    }
                    Op::Resolve(i, size) => {
                        let _ = resolve_ranges(&mut lists[i], &mut pool, size);
                    }
                }

                let in_lists: usize = lists.iter().map(|l| l.iter(&pool).count()).sum();
                prop_assert_eq!(free_list_len(&pool), pool.available());
                prop_assert_eq!(pool.available() + in_lists + loose.len(), pool.allocated());
            }
        }
    }
}
