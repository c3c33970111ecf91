// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求头解析模块
//!
//! 只解析服务器真正需要的部分，并不是完整的 HTTP 报文解析器：
//! 1. 请求行（Request-Line）的方法、目标路径与版本。
//! 2. `User-Agent`、`Connection` 以及原样保留的 `Range` 头部值。

use lazy_static::lazy_static;
use log::error;
use regex::Regex;

use crate::{exception::Exception, param::*};

lazy_static! {
    static ref REQUEST_LINE: Regex = Regex::new(r"^(\S+) (\S+) (\S+)$").unwrap();
}

/// 表示一个 HTTP 请求头的元数据。
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 原始请求目标（尚未反转义，可能含查询字符串）
    path: String,
    version: HttpVersion,
    user_agent: String,
    /// 所有 `Range` 头部的原始值，按出现顺序排列
    ranges: Vec<String>,
    keep_alive: bool,
}

impl Request {
    /// 从原始字节尝试构建 `Request` 实例。
    ///
    /// # 参数
    /// * `buffer` - 从 Socket 读取的请求头字节。
    /// * `id` - 连接 ID，用于日志追踪。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut lines = request_string.split(CRLF);
        let first_line = lines.next().unwrap_or_default();
        let captures = match REQUEST_LINE.captures(first_line) {
            Some(c) => c,
            None => {
                error!("[ID{}]HTTP请求行格式不正确：{:?}", id, first_line);
                return Err(Exception::MalformedRequestLine);
            }
        };

        let method = match captures[1].to_uppercase().as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            other => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, other);
                return Err(Exception::UnsupportedRequestMethod);
            }
        };

        let version = match captures[3].to_uppercase().as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            other => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, other);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        let path = captures[2].to_string();

        let mut user_agent = String::new();
        let mut ranges = vec![];
        let mut connection = None;
        for line in lines.take_while(|l| !l.is_empty()) {
            let (name, value) = match line.split_once(':') {
                Some((n, v)) => (n.trim(), v.trim()),
                None => continue,
            };
            if name.eq_ignore_ascii_case("user-agent") {
                user_agent = value.to_string();
            } else if name.eq_ignore_ascii_case("range") {
                ranges.push(value.to_string());
            } else if name.eq_ignore_ascii_case("connection") {
                connection = Some(value.to_ascii_lowercase());
            }
        }

        let keep_alive = match (version, connection.as_deref()) {
            (_, Some("close")) => false,
            (_, Some("keep-alive")) => true,
            (HttpVersion::V1_1, _) => true,
            (HttpVersion::V1_0, _) => false,
        };

        Ok(Self {
            method,
            path,
            version,
            user_agent,
            ranges,
            keep_alive,
        })
    }
}

impl Request {
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn ranges(&self) -> &[String] {
        &self.ranges
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_request() {
        let request_str =
            "GET /video.mp4 HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test-Browser\r\nRange: bytes=0-99\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/video.mp4");
        assert_eq!(request.version(), HttpVersion::V1_1);
        assert_eq!(request.user_agent(), "Test-Browser");
        assert_eq!(request.ranges(), ["bytes=0-99".to_string()]);
        assert!(request.keep_alive());
    }

    #[test]
    fn test_parse_head_request() {
        let request_str = "HEAD /index.html HTTP/1.0\r\nHost: localhost\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Head);
        assert_eq!(request.version(), HttpVersion::V1_0);
        assert!(!request.keep_alive());
        assert!(request.ranges().is_empty());
    }

    #[test]
    fn test_multiple_range_headers_kept_in_order() {
        let request_str =
            "GET / HTTP/1.1\r\nrange: bytes=0-1\r\nRANGE: bytes=5-\r\nConnection: close\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.ranges(), ["bytes=0-1".to_string(), "bytes=5-".to_string()]);
        assert!(!request.keep_alive());
    }

    #[test]
    fn test_headers_after_blank_line_ignored() {
        let request_str = "GET / HTTP/1.1\r\n\r\nRange: bytes=0-1\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert!(request.ranges().is_empty());
    }

    #[test]
    fn test_unsupported_method() {
        let request_str = "DELETE /resource HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);
        assert_eq!(result.unwrap_err(), Exception::UnsupportedRequestMethod);
    }

    #[test]
    fn test_unsupported_http_version() {
        let request_str = "GET / HTTP/2.0\r\nHost: localhost:7878\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);
        assert_eq!(result.unwrap_err(), Exception::UnsupportedHttpVersion);
    }

    #[test]
    fn test_malformed_request_line() {
        let result = Request::try_from(b"GET\r\n\r\n", 0);
        assert_eq!(result.unwrap_err(), Exception::MalformedRequestLine);
        let result = Request::try_from(b"GET  / HTTP/1.1\r\n\r\n", 0);
        assert_eq!(result.unwrap_err(), Exception::MalformedRequestLine);
    }

    #[test]
    fn test_invalid_utf8() {
        let result = Request::try_from(&[0xFF, 0xFE, 0xFD], 0);
        assert_eq!(result.unwrap_err(), Exception::RequestIsNotUtf8);
    }

    #[test]
    fn test_lowercase_method() {
        let request = Request::try_from(b"get /a%20b?x=1 HTTP/1.1\r\n\r\n", 0).unwrap();
        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/a%20b?x=1");
    }
}
