// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接上下文
//!
//! 一个连接恰好持有一个输出缓冲区、一个生命周期状态、一个（可能为空的）范围列表，
//! 以及在路由完成后才得知的资源大小。连接在 accept 时创建，在关闭或 keep-alive 复用时重置。

use log::{debug, error, warn};

use crate::{
    buffer::{OutputBuffer, Transport},
    exception::Exception,
    range::{parse_range, resolve_ranges, ByteRange, RangeList, RangePool},
    status::ConnectionStatus,
};

pub struct Connection {
    id: u128,
    status: ConnectionStatus,
    buffer: OutputBuffer,
    ranges: RangeList,
    filesize: Option<u64>,
    max_ranges: usize,
}

impl Connection {
    pub fn new(id: u128, buffer_size: usize, max_ranges: usize) -> Self {
        Self {
            id,
            status: ConnectionStatus::Active,
            buffer: OutputBuffer::with_capacity(buffer_size),
            ranges: RangeList::new(),
            filesize: None,
            max_ranges,
        }
    }

    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn buffer(&self) -> &OutputBuffer {
        &self.buffer
    }

    pub fn ranges(&self) -> &RangeList {
        &self.ranges
    }

    pub fn filesize(&self) -> Option<u64> {
        self.filesize
    }

    pub fn set_filesize(&mut self, size: u64) {
        self.filesize = Some(size);
    }

    /// 解析 `Range` 头部。范围数量超过上限时同样视为语法错误，整个列表被丢弃。
    pub fn parse_range(&mut self, pool: &mut RangePool, header: &str) -> Result<usize, Exception> {
        let count = parse_range(&mut self.ranges, pool, header).map_err(|e| {
            warn!("[ID{}]Range头部解析失败，按无Range处理", self.id);
            e
        })?;
        if count > self.max_ranges {
            warn!(
                "[ID{}]Range数量{}超过上限{}，按无Range处理",
                self.id, count, self.max_ranges
            );
            self.ranges.reset(pool);
            return Err(Exception::RangeSyntaxError);
        }
        debug!("[ID{}]解析得到{}个原始范围", self.id, count);
        Ok(count)
    }

    /// 丢弃已解析的范围（例如后续的 `Range` 头部解析失败时）。
    pub fn reset_ranges(&mut self, pool: &mut RangePool) {
        self.ranges.reset(pool);
    }

    /// 资源大小确定后修正范围。必须先调用 [`set_filesize`](Self::set_filesize)。
    pub fn resolve_ranges(&mut self, pool: &mut RangePool) -> Result<Vec<ByteRange>, Exception> {
        let size = match self.filesize {
            Some(size) => size,
            None => {
                error!("[ID{}]资源大小未知，无法修正Range", self.id);
                self.ranges.reset(pool);
                return Err(Exception::RangeUnsatisfiable);
            }
        };
        match resolve_ranges(&mut self.ranges, pool, size) {
            Ok(count) => {
                debug!("[ID{}]修正后剩余{}个范围", self.id, count);
                Ok(self.ranges.byte_ranges(pool))
            }
            Err(e) => {
                warn!("[ID{}]所有范围都不可满足（资源大小{}）", self.id, size);
                Err(e)
            }
        }
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, Exception> {
        self.buffer.write(&mut self.status, bytes).map_err(|e| self.log_write_error(e))
    }

    pub fn write_str(&mut self, s: &str) -> Result<usize, Exception> {
        self.write(s.as_bytes())
    }

    pub fn write_percent_escaped(&mut self, s: &str) -> Result<usize, Exception> {
        self.buffer
            .write_percent_escaped(&mut self.status, s.as_bytes())
            .map_err(|e| self.log_write_error(e))
    }

    pub fn write_html_escaped(&mut self, s: &str) -> Result<usize, Exception> {
        self.buffer
            .write_html_escaped(&mut self.status, s.as_bytes())
            .map_err(|e| self.log_write_error(e))
    }

    fn log_write_error(&self, e: Exception) -> Exception {
        if e == Exception::BufferOverflow {
            error!("[ID{}]输出缓冲区溢出，连接已被标记为终止", self.id);
        }
        e
    }

    /// 尾部还能追加的字节数。
    pub fn buffer_remaining(&self) -> usize {
        self.buffer.remaining()
    }

    pub fn flush<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<usize, Exception> {
        let result = self.buffer.flush(&mut self.status, transport);
        if let Err(Exception::TransportFailure) = result {
            error!("[ID{}]发送失败，连接已被标记为终止", self.id);
        }
        result
    }

    /// 响应已完整写入缓冲区。
    pub fn finish(&mut self) {
        self.status.finish();
    }

    /// 响应已完成且缓冲区已排空。
    pub fn is_drained(&self) -> bool {
        self.status == ConnectionStatus::Finishing && self.buffer.is_empty()
    }

    /// keep-alive 复用：范围归还到池中，缓冲区与状态恢复初始值。
    pub fn reset(&mut self, pool: &mut RangePool) {
        self.ranges.reset(pool);
        self.buffer.reset();
        self.filesize = None;
        self.status = ConnectionStatus::Active;
    }

    pub fn close(&mut self, pool: &mut RangePool) {
        self.ranges.reset(pool);
        self.buffer.reset();
        self.status.kill();
        debug!("[ID{}]连接已关闭", self.id);
    }
}
