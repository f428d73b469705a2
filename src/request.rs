//! HTTP request reader
//!
//! Reads at most [`MAX_REQUEST_SIZE`] bytes from a connection and extracts the
//! method and target from the first line. Everything after the request line
//! is kept as an opaque header block; headers are never interpreted.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use embedded_io_async::Read;
use log::*;

use crate::query::{QueryParams, split_path_query};

/// Upper bound on the bytes read for one request (line plus headers)
pub const MAX_REQUEST_SIZE: usize = 1024;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";
/// Blank line from clients that end lines with a bare `\n`
const BARE_HEAD_TERMINATOR: &[u8] = b"\n\n";

const DEFAULT_METHOD: &str = "GET";
const DEFAULT_TARGET: &str = "/";

/// A request as far as the router cares about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    pub path: String,
    pub query: QueryParams,
    /// Request line and headers, without the blank line and any body
    pub raw_head: Vec<u8>,
}

impl ParsedRequest {
    pub fn is_post(&self) -> bool {
        self.method == "POST"
    }
}

/// Read and parse one request from `conn`
///
/// Returns `None` when nothing usable arrived: the peer closed without
/// sending, the first read failed, or the request line is not UTF-8.
/// The caller answers those with 400.
pub async fn read_request<C: Read>(conn: &mut C) -> Option<ParsedRequest> {
    let mut buf = [0u8; MAX_REQUEST_SIZE];
    let len = read_head(conn, &mut buf).await;
    parse_request(&buf[..len])
}

/// Fill `buf` until the head is complete, the peer stops sending or the
/// buffer is full. A read error keeps whatever arrived before it.
async fn read_head<C: Read>(conn: &mut C, buf: &mut [u8]) -> usize {
    let mut total = 0;

    while total < buf.len() {
        match conn.read(&mut buf[total..]).await {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                if head_end(&buf[..total]).is_some() {
                    break;
                }
            }
            Err(e) => {
                warn!("HTTP read error after {} bytes: {:?}", total, e);
                break;
            }
        }
    }

    if total == buf.len() {
        debug!("HTTP request truncated at {} bytes", total);
    }
    total
}

/// Parse a (possibly truncated) request head
///
/// A first line with fewer than two tokens becomes `GET /`.
pub fn parse_request(data: &[u8]) -> Option<ParsedRequest> {
    if data.is_empty() {
        return None;
    }

    let head = match head_end(data) {
        Some(end) => &data[..end],
        None => data,
    };
    let first_line = match head.iter().position(|&b| b == b'\n') {
        Some(end) => &head[..end],
        None => head,
    };
    let first_line = first_line.strip_suffix(&b"\r"[..]).unwrap_or(first_line);
    let first_line = core::str::from_utf8(first_line).ok()?;

    let mut tokens = first_line.split_ascii_whitespace();
    let (method, target) = match (tokens.next(), tokens.next()) {
        (Some(method), Some(target)) => (method, target),
        _ => (DEFAULT_METHOD, DEFAULT_TARGET),
    };

    let (path, query) = split_path_query(target);

    Some(ParsedRequest {
        method: method.to_string(),
        path,
        query,
        raw_head: head.to_vec(),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Offset of the blank line that ends the head, CRLF or bare LF
fn head_end(data: &[u8]) -> Option<usize> {
    match (find(data, HEAD_TERMINATOR), find(data, BARE_HEAD_TERMINATOR)) {
        (Some(crlf), Some(lf)) => Some(crlf.min(lf)),
        (crlf, lf) => crlf.or(lf),
    }
}
