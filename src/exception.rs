// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了服务器在输出缓冲、Range 解析以及请求处理过程中可能出现的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：区分致命错误（连接必须关闭）与暂时性错误（等待下一次可写事件重试）。
//! - **连接隔离**：所有错误都只影响单个连接，绝不会导致整个进程退出。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地记录到日志中。

use std::fmt;

/// 服务器处理连接过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示处理失败的具体原因。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 输出缓冲区剩余容量不足以容纳本次写入。连接被标记为 `Dead`，且没有任何部分数据被提交。
    BufferOverflow,
    /// 底层传输暂时不可写（非阻塞写返回 would-block）。缓冲区状态保持不变，等待下一次可写事件。
    WouldBlock,
    /// 底层传输发生了 would-block 以外的错误。缓冲内容被丢弃，连接被标记为 `Dead`。
    TransportFailure,
    /// 连接已经处于终止状态，不再接受任何写入或发送。
    ConnectionDead,
    /// `Range` 头部的语法错误。整个范围列表被丢弃，如何响应由调用方决定。
    RangeSyntaxError,
    /// 所有请求的范围在资源大小确定后都不可满足。对应 `416 Range Not Satisfiable`。
    RangeUnsatisfiable,
    /// URI 中存在截断的 `%` 转义、非法十六进制数字，或解码后出现控制字符。
    InvalidUri,
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行不符合 `方法 目标 版本` 的格式。对应 `400 Bad Request`。
    MalformedRequestLine,
    /// 客户端使用了服务器暂不支持的 HTTP 方法。
    UnsupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 在指定的资源根目录下未找到所请求的文件。在 Web 语义中对应 `404 Not Found`。
    FileNotFound,
    /// 请求的路径格式非法或包含越权尝试（如目录遍历攻击）。对应 `400 Bad Request`。
    InvalidPath,
}

use Exception::*;

impl Exception {
    /// 该错误是否意味着连接已经无法继续使用。
    pub fn is_fatal(&self) -> bool {
        matches!(self, BufferOverflow | TransportFailure | ConnectionDead)
    }
}

/// 为 `Exception` 实现 `Display` 特性，使其支持字符串格式化输出。
impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferOverflow => write!(f, "Output buffer overflow"),
            WouldBlock => write!(f, "Transport would block"),
            TransportFailure => write!(f, "Transport failure"),
            ConnectionDead => write!(f, "Connection is dead"),
            RangeSyntaxError => write!(f, "Malformed Range header"),
            RangeUnsatisfiable => write!(f, "Range not satisfiable (416)"),
            InvalidUri => write!(f, "Invalid URI escape sequence"),
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequestLine => write!(f, "Malformed request line (400)"),
            UnsupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            FileNotFound => write!(f, "File not found (404)"),
            InvalidPath => write!(f, "Invalid path (400)"),
        }
    }
}

impl std::error::Error for Exception {}
