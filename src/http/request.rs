//! Request side: incremental head reading and parsing
//!
//! Just enough HTTP/1.1 to route streaming requests: the request line and
//! headers, read with a size cap. Bodies are never consumed; the requests
//! this crate serves do not carry one.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{HttpError, Result};

/// Head terminator, blank line included.
const HEAD_END: &[u8] = b"\r\n\r\n";

/// Bytes reserved ahead of each read.
const READ_CHUNK: usize = 512;

/// A parsed request head.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method, verbatim (e.g. `GET`).
    pub method: String,

    /// Request target, verbatim (path plus optional query).
    pub target: String,

    /// Protocol version (e.g. `HTTP/1.1`).
    pub version: String,

    /// Header name/value pairs in arrival order, values trimmed.
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// Path component of the target, query stripped.
    pub fn path(&self) -> &str {
        match self.target.find('?') {
            Some(idx) => &self.target[..idx],
            None => &self.target,
        }
    }

    /// First value of the named header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse a complete head, trailing blank line included.
    pub fn parse(head: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(head)
            .map_err(|_| HttpError::Malformed("head is not valid utf-8"))?;

        let mut lines = text.split("\r\n");
        let request_line = lines.next().unwrap_or("");

        let mut parts = request_line.split_whitespace();
        let method = parts
            .next()
            .ok_or(HttpError::Malformed("empty request line"))?;
        let target = parts
            .next()
            .ok_or(HttpError::Malformed("request line missing target"))?;
        let version = parts
            .next()
            .ok_or(HttpError::Malformed("request line missing version"))?;
        if parts.next().is_some() {
            return Err(HttpError::Malformed("request line has trailing fields").into());
        }
        if !version.starts_with("HTTP/1.") {
            return Err(HttpError::Malformed("unsupported protocol version").into());
        }

        let mut headers = Vec::new();
        for line in lines {
            // The head ends with an empty split before the terminator.
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or(HttpError::Malformed("header line missing colon"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(HttpError::Malformed("empty header name").into());
            }
            headers.push((name.to_string(), value.trim().to_string()));
        }

        Ok(Request {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
            headers,
        })
    }
}

/// Read a request head from the stream, up to `max_bytes`.
///
/// Resolves once the blank-line terminator arrives. The cap bounds how much
/// a peer can make the server buffer before being cut off; crossing it
/// yields [`HttpError::TooLarge`], and a connection that closes mid-head
/// yields [`HttpError::UnexpectedEof`].
pub async fn read_request_head<R>(reader: &mut R, max_bytes: usize) -> Result<Request>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    loop {
        if let Some(end) = find_head_end(&buf) {
            return Request::parse(&buf[..end]);
        }
        if buf.len() >= max_bytes {
            return Err(HttpError::TooLarge(max_bytes).into());
        }

        // Reserve ahead of the read so a zero return always means EOF.
        buf.reserve(READ_CHUNK);
        let n = reader.read_buf(&mut buf).await?;
        if n == 0 {
            return Err(HttpError::UnexpectedEof.into());
        }
    }
}

/// Index one past the head terminator, if present.
fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_END.len())
        .position(|window| window == HEAD_END)
        .map(|idx| idx + HEAD_END.len())
}
