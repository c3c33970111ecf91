// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应头生成模块
//!
//! 所有响应头与错误页面都直接写入连接的输出缓冲区，不再单独构造 `Response` 对象。
//! 响应体（文件内容）由调用方按缓冲区剩余容量分块写入。
//!
//! 错误页面与重定向页面不带 `Content-Length`，发送完毕后关闭连接。

use chrono::prelude::*;
use log::debug;

use std::{ffi::OsStr, path::Path};

use crate::{
    connection::Connection,
    exception::Exception,
    param::*,
    range::{content_range_unsatisfiable, ByteRange},
};

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// 根据文件后缀名推断 MIME 类型，无法识别时返回 `application/octet-stream`。
pub fn get_mime(path: &Path) -> &'static str {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|e| e.to_ascii_lowercase())
        .and_then(|e| MIME_TYPES.get(e.as_str()).copied())
        .unwrap_or("application/octet-stream")
}

fn reason_phrase(code: u16) -> &'static str {
    STATUS_CODES.get(&code).copied().unwrap_or("Unknown")
}

fn write_header(conn: &mut Connection, name: &str, value: &str) -> Result<usize, Exception> {
    conn.write_str(&[name, ": ", value, CRLF].concat())
}

/// 写入状态行以及每个响应都带有的 `Date`、`Server` 头部。
pub fn write_status_line(
    conn: &mut Connection,
    version: HttpVersion,
    code: u16,
) -> Result<usize, Exception> {
    debug!("[ID{}]响应状态：{}", conn.id(), code);
    conn.write_str(&format!("{} {} {}{}", version, code, reason_phrase(code), CRLF))?;
    write_header(conn, "Date", &format_date(&Utc::now()))?;
    write_header(conn, "Server", SERVER_NAME)
}

fn write_connection_header(conn: &mut Connection, keep_alive: bool) -> Result<usize, Exception> {
    write_header(
        conn,
        "Connection",
        if keep_alive { "keep-alive" } else { "close" },
    )
}

/// `200 OK`，完整资源。
pub fn send_full_headers(
    conn: &mut Connection,
    version: HttpVersion,
    mime: &str,
    size: u64,
    accept_ranges: bool,
    keep_alive: bool,
) -> Result<usize, Exception> {
    write_status_line(conn, version, 200)?;
    write_header(conn, "Content-Type", mime)?;
    write_header(conn, "Content-Length", &size.to_string())?;
    if accept_ranges {
        write_header(conn, "Accept-Ranges", "bytes")?;
    }
    write_connection_header(conn, keep_alive)?;
    conn.write_str(CRLF)
}

/// `206 Partial Content`，单个范围。
pub fn send_single_range_headers(
    conn: &mut Connection,
    version: HttpVersion,
    mime: &str,
    range: &ByteRange,
    size: u64,
    keep_alive: bool,
) -> Result<usize, Exception> {
    write_status_line(conn, version, 206)?;
    write_header(conn, "Content-Type", mime)?;
    write_header(conn, "Content-Length", &range.len().to_string())?;
    write_header(conn, "Content-Range", &range.content_range(size))?;
    write_header(conn, "Accept-Ranges", "bytes")?;
    write_connection_header(conn, keep_alive)?;
    conn.write_str(CRLF)
}

/// multipart 响应中每个分段之前的分隔符与分段头部。
pub fn part_header(range: &ByteRange, mime: &str, size: u64) -> String {
    format!(
        "{crlf}--{boundary}{crlf}Content-Type: {mime}{crlf}Content-Range: {range}{crlf}{crlf}",
        crlf = CRLF,
        boundary = MULTIPART_BOUNDARY,
        mime = mime,
        range = range.content_range(size),
    )
}

/// multipart 响应的结束分隔符。
pub fn multipart_trailer() -> String {
    format!("{crlf}--{boundary}--{crlf}", crlf = CRLF, boundary = MULTIPART_BOUNDARY)
}

/// 精确计算 multipart/byteranges 响应体的长度。
pub fn multipart_content_length(ranges: &[ByteRange], mime: &str, size: u64) -> u64 {
    let parts: u64 = ranges
        .iter()
        .map(|r| part_header(r, mime, size).len() as u64 + r.len())
        .sum();
    parts + multipart_trailer().len() as u64
}

/// `206 Partial Content`，多个范围，响应体为 `multipart/byteranges`。
pub fn send_multipart_headers(
    conn: &mut Connection,
    version: HttpVersion,
    ranges: &[ByteRange],
    mime: &str,
    size: u64,
    keep_alive: bool,
) -> Result<usize, Exception> {
    write_status_line(conn, version, 206)?;
    write_header(
        conn,
        "Content-Type",
        &format!("multipart/byteranges; boundary={}", MULTIPART_BOUNDARY),
    )?;
    write_header(
        conn,
        "Content-Length",
        &multipart_content_length(ranges, mime, size).to_string(),
    )?;
    write_header(conn, "Accept-Ranges", "bytes")?;
    write_connection_header(conn, keep_alive)?;
    conn.write_str(CRLF)
}

/// `OPTIONS` 请求的响应，没有响应体。
pub fn send_options(
    conn: &mut Connection,
    version: HttpVersion,
    keep_alive: bool,
) -> Result<usize, Exception> {
    write_status_line(conn, version, 200)?;
    let allow: Vec<String> = ALLOWED_METHODS.iter().map(|m| m.to_string()).collect();
    write_header(conn, "Allow", &allow.join(", "))?;
    write_header(conn, "Content-Length", "0")?;
    write_connection_header(conn, keep_alive)?;
    conn.write_str(CRLF)
}

/// 输出一个简单的 HTML 页面，`message` 经过 HTML 转义后写入。
fn write_html_page(conn: &mut Connection, code: u16, message: &str) -> Result<usize, Exception> {
    let title = format!("{} {}", code, reason_phrase(code));
    conn.write_str(&format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n<p>",
        title = title
    ))?;
    conn.write_html_escaped(message)?;
    conn.write_str("</p>\n</body>\n</html>\n")
}

fn write_page_headers(
    conn: &mut Connection,
    version: HttpVersion,
    code: u16,
) -> Result<usize, Exception> {
    write_status_line(conn, version, code)?;
    write_header(conn, "Content-Type", "text/html;charset=utf-8")?;
    write_connection_header(conn, false)
}

/// `416 Range Not Satisfiable`，带上资源的总大小。
pub fn send_invalid_range(
    conn: &mut Connection,
    version: HttpVersion,
    size: u64,
) -> Result<usize, Exception> {
    write_page_headers(conn, version, 416)?;
    write_header(conn, "Content-Range", &content_range_unsatisfiable(size))?;
    conn.write_str(CRLF)?;
    write_html_page(conn, 416, "The requested range cannot be satisfied.")
}

/// `301 Moved Permanently`。`Location` 头部经过百分号转义，页面中的链接经过 HTML 转义。
pub fn send_redirect(
    conn: &mut Connection,
    version: HttpVersion,
    location: &str,
) -> Result<usize, Exception> {
    write_page_headers(conn, version, 301)?;
    conn.write_str("Location: ")?;
    conn.write_percent_escaped(location)?;
    conn.write_str(CRLF)?;
    conn.write_str(CRLF)?;
    write_html_page(conn, 301, location)
}

/// 400、403、404 等错误页面。
pub fn send_error(
    conn: &mut Connection,
    version: HttpVersion,
    code: u16,
    detail: &str,
) -> Result<usize, Exception> {
    write_page_headers(conn, version, code)?;
    conn.write_str(CRLF)?;
    write_html_page(conn, code, detail)
}
