// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接输出缓冲区
//!
//! 每个连接持有一块固定容量的输出缓冲区，`[start, end)` 区间是尚未发送的数据。
//! 容量在创建时确定，之后绝不扩容：写入超出剩余容量属于该连接的致命错误，
//! 连接被标记为 `Dead`，已缓冲的内容不会被部分覆盖。
//!
//! 两种转义写入使用保护带（guard band）技巧：剩余空间低于单个字节最长展开长度时
//! 立即停止消费输入，因此循环内部每个输入单元只检查一次剩余空间，
//! 也保证了一个转义序列不会被拆成两半。
//!
//! `flush` 每次调用最多发起一次非阻塞写，不会在内部重试；
//! 传输层重新可写时由事件循环再次调用。

use std::io;

use log::{debug, error};

use crate::{
    escape::{html_entity, needs_escape, percent_encode_byte},
    exception::Exception,
    param::{BUFFER_SIZE, HTML_GUARD_BAND, PERCENT_GUARD_BAND},
    status::ConnectionStatus,
};

/// 单次非阻塞写入的传输层抽象。
///
/// 实现者必须只尝试一次写入：暂时不可写时返回 `io::ErrorKind::WouldBlock`，
/// 而不是等待。
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl Transport for tokio::net::TcpStream {
    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        tokio::net::TcpStream::try_write(self, buf)
    }
}

/// 调用方需要事先通过 `set_nonblocking(true)` 将套接字设为非阻塞模式。
impl Transport for std::net::TcpStream {
    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(self, buf)
    }
}

impl Transport for Vec<u8> {
    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }
}

pub struct OutputBuffer {
    data: Box<[u8]>,
    start: usize,
    end: usize,
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::with_capacity(BUFFER_SIZE)
    }
}

impl OutputBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// 尾部还能追加的字节数（`C - end`）。
    pub fn remaining(&self) -> usize {
        self.data.len() - self.end
    }

    /// 等待发送的数据。
    pub fn pending(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn reset(&mut self) {
        self.start = 0;
        self.end = 0;
    }

    /// 原样追加字节。剩余容量不足时不做任何部分写入，连接被标记为 `Dead`。
    ///
    /// 成功时返回新的 `end`。
    pub fn write(
        &mut self,
        status: &mut ConnectionStatus,
        bytes: &[u8],
    ) -> Result<usize, Exception> {
        if self.is_closed(status) {
            return Err(Exception::ConnectionDead);
        }
        if bytes.is_empty() {
            return Ok(self.end);
        }
        if bytes.len() > self.remaining() {
            error!(
                "输出缓冲区空间不足：需要写入{}字节，仅剩{}字节，连接将被关闭",
                bytes.len(),
                self.remaining()
            );
            status.kill();
            return Err(Exception::BufferOverflow);
        }
        let end = self.end + bytes.len();
        self.data[self.end..end].copy_from_slice(bytes);
        self.end = end;
        Ok(self.end)
    }

    /// 追加百分号转义后的字节（`%XX`，大写十六进制），保护带为 3 字节。
    pub fn write_percent_escaped(
        &mut self,
        status: &mut ConnectionStatus,
        bytes: &[u8],
    ) -> Result<usize, Exception> {
        self.write_translated(status, bytes, PERCENT_GUARD_BAND, |c, dest| {
            if needs_escape(c) {
                dest[..3].copy_from_slice(&percent_encode_byte(c));
                3
            } else {
                dest[0] = c;
                1
            }
        })
    }

    /// 追加 HTML 转义后的字节，只展开 `> < & "`，保护带为 6 字节。
    pub fn write_html_escaped(
        &mut self,
        status: &mut ConnectionStatus,
        bytes: &[u8],
    ) -> Result<usize, Exception> {
        self.write_translated(status, bytes, HTML_GUARD_BAND, |c, dest| match html_entity(c) {
            Some(entity) => {
                dest[..entity.len()].copy_from_slice(entity);
                entity.len()
            }
            None => {
                dest[0] = c;
                1
            }
        })
    }

    /// `translate` 向 `dest`（长度恰好为 `guard_band`）写入一个输入字节的展开结果并返回其长度。
    /// 只有全部输入都被消费后才推进 `end`。
    fn write_translated<F>(
        &mut self,
        status: &mut ConnectionStatus,
        input: &[u8],
        guard_band: usize,
        translate: F,
    ) -> Result<usize, Exception>
    where
        F: Fn(u8, &mut [u8]) -> usize,
    {
        if self.is_closed(status) {
            return Err(Exception::ConnectionDead);
        }

        let mut dest = self.end;
        let mut left = self.remaining();
        let mut consumed = 0;
        for &c in input {
            if left < guard_band {
                break;
            }
            let written = translate(c, &mut self.data[dest..dest + guard_band]);
            dest += written;
            left -= written;
            consumed += 1;
        }

        if consumed < input.len() {
            error!(
                "输出缓冲区空间不足：转义写入在第{}/{}个字节处耗尽空间（剩余{}字节），连接将被关闭",
                consumed,
                input.len(),
                left
            );
            status.kill();
            return Err(Exception::BufferOverflow);
        }

        self.end = dest;
        Ok(self.end)
    }

    /// 尝试一次非阻塞发送 `[start, end)`。
    ///
    /// - `Ok(n)`：发送取得进展（或无数据可发），`n` 为仍待发送的字节数；
    /// - `Err(WouldBlock)`：传输层暂不可写，缓冲区保持不变；
    /// - `Err(TransportFailure)`：其他传输错误，缓冲内容被丢弃，连接被标记为 `Dead`；
    /// - `Err(ConnectionDead)`：连接已终止，或响应已完成且已排空，本次调用什么也不做。
    pub fn flush<T: Transport + ?Sized>(
        &mut self,
        status: &mut ConnectionStatus,
        transport: &mut T,
    ) -> Result<usize, Exception> {
        if self.is_closed(status) {
            return Err(Exception::ConnectionDead);
        }

        if self.end > self.start {
            match transport.try_write(&self.data[self.start..self.end]) {
                Ok(0) => {
                    debug!("对端已不再接收数据，丢弃{}字节待发送数据", self.len());
                    self.discard(status);
                    return Err(Exception::TransportFailure);
                }
                Ok(n) => {
                    self.start += n.min(self.end - self.start);
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    debug!("发送被阻塞，{}字节等待下一次可写事件", self.len());
                    return Err(Exception::WouldBlock);
                }
                Err(e) => {
                    match e.kind() {
                        io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe => {
                            debug!("客户端断开连接：{}", e)
                        }
                        _ => error!("发送缓冲区数据失败：{}", e),
                    }
                    self.discard(status);
                    return Err(Exception::TransportFailure);
                }
            }
        }

        if self.start == self.end {
            self.reset();
        }
        Ok(self.end - self.start)
    }

    /// `Dead`，或者 `Finishing` 且缓冲区已经排空：不再接受任何写入与发送。
    fn is_closed(&self, status: &ConnectionStatus) -> bool {
        status.is_dead() || (*status == ConnectionStatus::Finishing && self.is_empty())
    }

    fn discard(&mut self, status: &mut ConnectionStatus) {
        self.reset();
        status.kill();
    }
}
