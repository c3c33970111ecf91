// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 转义模块
//!
//! 提供 URL 百分号转义所需的逐字节分类表，以及几种常用的转义/反转义辅助函数。
//!
//! 不需要转义的字符集合：
//! - 字母与数字 `A-Z a-z 0-9`
//! - 标记字符 `- _ . ! ~ * ' ( )`
//! - 以及 `: @ & = + $ , / ?`
//!
//! 其余所有字节（包括全部 `>= 128` 的字节）都需要被编码为 `%XX`。

use lazy_static::lazy_static;

use crate::exception::Exception;

const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
abcdefghijklmnopqrstuvwxyz\
0123456789\
-_.!~*'():@&=+$,/?";

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

lazy_static! {
    /// 进程级共享的转义分类表，在第一次使用时构建一次。
    pub static ref ESCAPE_TABLE: EscapeTable = EscapeTable::build();
}

/// 逐字节的“是否需要百分号转义”分类表，查询为 O(1)。
pub struct EscapeTable {
    needs_escape: [bool; 256],
}

impl EscapeTable {
    pub fn build() -> Self {
        let mut needs_escape = [true; 256];
        for &c in UNRESERVED {
            needs_escape[c as usize] = false;
        }
        Self { needs_escape }
    }

    #[inline]
    pub fn needs_escape(&self, c: u8) -> bool {
        self.needs_escape[c as usize]
    }
}

#[inline]
pub fn needs_escape(c: u8) -> bool {
    ESCAPE_TABLE.needs_escape(c)
}

/// 将一个字节编码为 `%XX` 形式（大写十六进制）。
#[inline]
pub fn percent_encode_byte(c: u8) -> [u8; 3] {
    [
        b'%',
        HEX_DIGITS[(c >> 4) as usize],
        HEX_DIGITS[(c & 0x0f) as usize],
    ]
}

/// 若字节需要 HTML 转义，返回对应的实体。只处理 `> < & "` 四个字符。
#[inline]
pub fn html_entity(c: u8) -> Option<&'static [u8]> {
    match c {
        b'>' => Some(b"&gt;"),
        b'<' => Some(b"&lt;"),
        b'&' => Some(b"&amp;"),
        b'"' => Some(b"&quot;"),
        _ => None,
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// 按分类表进行百分号转义，输出长度不受限制。
pub fn percent_escape(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for &c in input {
        if needs_escape(c) {
            for b in percent_encode_byte(c) {
                out.push(b as char);
            }
        } else {
            out.push(c as char);
        }
    }
    out
}

/// 生成可以直接放入 `href` 的相对链接。
///
/// 与 [`percent_escape`] 不同，这里 `?` 也会被转义；若字符串中在首字节之后出现 `:`，
/// 会在开头补上 `./`，避免浏览器将冒号之前的部分当作 URL scheme。
pub fn http_escape_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3 + 2);
    let mut found_colon = false;
    for &c in input.as_bytes() {
        if c == b':' && !found_colon && !out.is_empty() {
            found_colon = true;
            out.insert_str(0, "./");
            out.push(':');
        } else if needs_escape(c) || c == b'?' {
            for b in percent_encode_byte(c) {
                out.push(b as char);
            }
        } else {
            out.push(c as char);
        }
    }
    out
}

pub fn html_escape_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '>' => out.push_str("&gt;"),
            '<' => out.push_str("&lt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// 解码请求路径中的 `%XX` 转义序列。
///
/// 返回 `(路径, 查询字符串)`：
/// - 第一个 `?` 结束路径，其后的内容原样作为查询字符串；
/// - `#` 片段会被忽略，但片段之后若仍有 `?`，其后内容依然作为查询字符串；
/// - 截断的转义、非法十六进制数字或解码得到 32..=126 以外的字节，都返回 `InvalidUri`。
pub fn unescape_uri(uri: &str) -> Result<(String, Option<String>), Exception> {
    let bytes = uri.as_bytes();
    let mut path = Vec::with_capacity(bytes.len());
    let mut query = None;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                if i + 2 >= bytes.len() {
                    return Err(Exception::InvalidUri);
                }
                let hi = hex_value(bytes[i + 1]).ok_or(Exception::InvalidUri)?;
                let lo = hex_value(bytes[i + 2]).ok_or(Exception::InvalidUri)?;
                let decoded = (hi << 4) | lo;
                if !(32..=126).contains(&decoded) {
                    return Err(Exception::InvalidUri);
                }
                path.push(decoded);
                i += 3;
            }
            b'?' => {
                query = Some(uri[i + 1..].to_string());
                break;
            }
            b'#' => {
                if let Some(pos) = uri[i + 1..].find('?') {
                    query = Some(uri[i + 1 + pos + 1..].to_string());
                }
                break;
            }
            c => {
                path.push(c);
                i += 1;
            }
        }
    }

    let path = String::from_utf8(path).map_err(|_| Exception::InvalidUri)?;
    Ok((path, query))
}
