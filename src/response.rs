//! HTTP response writer
//!
//! Every response is fully built as a [`ResponseSpec`] before the first byte
//! goes out, then written as one status line, `Content-Type`,
//! `Connection: close`, the extra headers in order, a blank line and the
//! body. There is no `Content-Length`; the body ends when the connection
//! closes.

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{self, Write as _};

use embedded_io::{Error as _, ErrorKind};
use embedded_io_async::Write;

/// Capacity of the serialized status line and headers
const HEAD_CAPACITY: usize = 256;
/// Capacity of the JSON bodies; the longest is `{"ok":true,"on":false}`
const JSON_CAPACITY: usize = 32;

pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Status codes this server ever sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NoContent,
    Found,
    BadRequest,
    InternalServerError,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NoContent => 204,
            Status::Found => 302,
            Status::BadRequest => 400,
            Status::InternalServerError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NoContent => "No Content",
            Status::Found => "Found",
            Status::BadRequest => "Bad Request",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: &'static str,
    pub value: String,
}

impl Header {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }

    pub fn no_cache() -> Self {
        Self::new("Cache-Control", "no-cache")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Static(&'static [u8]),
    Json(heapless::String<JSON_CAPACITY>),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Static(bytes) => bytes,
            Body::Json(json) => json.as_bytes(),
        }
    }
}

/// JSON payloads with a fixed field order
pub trait JsonReply {
    fn write_json(&self, out: &mut dyn fmt::Write) -> fmt::Result;
}

/// `{"ok":true,"on":<bool>}`, the answer to a POST on `/on` or `/off`
#[derive(Debug, Clone, Copy)]
pub struct ToggleReply {
    pub on: bool,
}

impl JsonReply for ToggleReply {
    fn write_json(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(out, "{{\"ok\":true,\"on\":{}}}", self.on)
    }
}

/// `{"on":<bool>}`, the answer to `/state`
#[derive(Debug, Clone, Copy)]
pub struct StateReply {
    pub on: bool,
}

impl JsonReply for StateReply {
    fn write_json(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(out, "{{\"on\":{}}}", self.on)
    }
}

/// A response ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSpec {
    pub status: Status,
    pub content_type: &'static str,
    pub headers: Vec<Header>,
    pub body: Body,
}

impl ResponseSpec {
    pub fn new(status: Status, content_type: &'static str, body: Body) -> Self {
        Self {
            status,
            content_type,
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.headers.push(header);
        self
    }

    /// Plain-text response with a fixed body
    pub fn text(status: Status, body: &'static str) -> Self {
        Self::new(status, CONTENT_TYPE_TEXT, Body::Static(body.as_bytes()))
    }

    /// `200` with a serialized JSON reply
    pub fn json(reply: &impl JsonReply) -> Result<Self, fmt::Error> {
        let mut json = heapless::String::new();
        reply.write_json(&mut json)?;
        Ok(Self::new(Status::Ok, CONTENT_TYPE_JSON, Body::Json(json)))
    }

    /// `302 Found` pointing at `location`
    pub fn redirect(location: &str) -> Self {
        Self {
            status: Status::Found,
            content_type: CONTENT_TYPE_TEXT,
            headers: vec![Header::new("Location", location.to_string())],
            body: Body::Static(b"Redirecting..."),
        }
    }

    pub fn no_content() -> Self {
        Self::new(Status::NoContent, CONTENT_TYPE_TEXT, Body::Empty)
    }

    pub fn bad_request() -> Self {
        Self::text(Status::BadRequest, "Bad Request")
    }

    pub fn internal_error() -> Self {
        Self::text(Status::InternalServerError, "Internal Error")
    }
}

/// Failure while sending a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// Status line and headers do not fit the head buffer
    HeadTooLarge,
    /// The connection rejected the bytes
    Transport(ErrorKind),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::HeadTooLarge => write!(f, "response head exceeds {} bytes", HEAD_CAPACITY),
            WriteError::Transport(kind) => write!(f, "transport error: {:?}", kind),
        }
    }
}

/// Write a response built from its parts
pub async fn send<C: Write>(
    conn: &mut C,
    status: Status,
    content_type: &str,
    body: &[u8],
    extra_headers: &[Header],
) -> Result<(), WriteError> {
    let head = format_head(status, content_type, extra_headers)?;

    conn.write_all(head.as_bytes())
        .await
        .map_err(|e| WriteError::Transport(e.kind()))?;
    if !body.is_empty() {
        conn.write_all(body)
            .await
            .map_err(|e| WriteError::Transport(e.kind()))?;
    }
    conn.flush()
        .await
        .map_err(|e| WriteError::Transport(e.kind()))
}

/// Write a prepared [`ResponseSpec`]
pub async fn write_response<C: Write>(conn: &mut C, resp: &ResponseSpec) -> Result<(), WriteError> {
    send(
        conn,
        resp.status,
        resp.content_type,
        resp.body.as_bytes(),
        &resp.headers,
    )
    .await
}

/// Send a `302 Found` to `location`
pub async fn redirect<C: Write>(conn: &mut C, location: &str) -> Result<(), WriteError> {
    write_response(conn, &ResponseSpec::redirect(location)).await
}

fn format_head(
    status: Status,
    content_type: &str,
    extra_headers: &[Header],
) -> Result<heapless::String<HEAD_CAPACITY>, WriteError> {
    let mut head = heapless::String::new();
    write_head(&mut head, status, content_type, extra_headers)
        .map_err(|_| WriteError::HeadTooLarge)?;
    Ok(head)
}

fn write_head(
    out: &mut impl fmt::Write,
    status: Status,
    content_type: &str,
    extra_headers: &[Header],
) -> fmt::Result {
    write!(out, "HTTP/1.1 {}\r\n", status)?;
    write!(out, "Content-Type: {}\r\n", content_type)?;
    out.write_str("Connection: close\r\n")?;
    for header in extra_headers {
        write!(out, "{}: {}\r\n", header.name, header.value)?;
    }
    out.write_str("\r\n")
}
