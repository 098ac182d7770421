//! Response side: minimal error responses and the transport hand-over seam

use std::future::Future;
use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{AdmissionError, Result};

/// Response head that switches an exchange into an open event stream.
///
/// Sent verbatim ahead of any broadcast payloads: status 200 with the
/// `text/event-stream` content type, caching disabled, the connection held
/// open, and no `Content-Length` since the body never ends.
pub const EVENT_STREAM_PREAMBLE: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: text/event-stream\r\n\
Cache-Control: no-cache\r\n\
Connection: keep-alive\r\n\
\r\n";

/// Capability interface between a response surface and the broadcaster.
///
/// Serving a stream needs the raw connection, not a buffered response body.
/// A sink either relinquishes its transport through [`hijack`] or it cannot
/// host a stream at all, and then [`send_error`] is the only thing left to
/// do with it. The split keeps the broadcaster independent of any one HTTP
/// layer: anything that can hand over an [`AsyncWrite`] can host streams.
///
/// [`hijack`]: ResponseSink::hijack
/// [`send_error`]: ResponseSink::send_error
pub trait ResponseSink: Send {
    /// Transport handed over by a successful [`hijack`](ResponseSink::hijack).
    type Transport: AsyncWrite + Send + Unpin + 'static;

    /// Take exclusive ownership of the underlying transport.
    ///
    /// After this succeeds the sink no longer speaks for the connection,
    /// and further response writes through it must fail. Fails fast when
    /// the surface cannot hand over a raw connection or when the transport
    /// is already gone.
    fn hijack(&mut self) -> Result<Self::Transport>;

    /// Write a complete, minimal error response.
    ///
    /// Only usable before a successful hijack.
    fn send_error(
        &mut self,
        status: u16,
        message: &str,
    ) -> impl Future<Output = io::Result<()>> + Send;
}

/// [`ResponseSink`] over a raw TCP connection, handed to the serving path
/// by the listener.
pub struct ResponseWriter {
    stream: Option<TcpStream>,
}

impl ResponseWriter {
    /// Wrap a connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }
}

impl ResponseSink for ResponseWriter {
    type Transport = TcpStream;

    fn hijack(&mut self) -> Result<TcpStream> {
        self.stream
            .take()
            .ok_or_else(|| AdmissionError::AlreadyHijacked.into())
    }

    async fn send_error(&mut self, status: u16, message: &str) -> io::Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport was hijacked"))?;
        stream.write_all(&error_response(status, message)).await
    }
}

/// Build a complete `text/plain` response with a one-line body.
fn error_response(status: u16, message: &str) -> Vec<u8> {
    let body = format!("{}\n", message);
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason_phrase(status),
        body.len(),
        body
    )
    .into_bytes()
}

/// Reason phrase for the statuses this crate emits.
fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        _ => "Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use crate::error::Error;

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let accept = async { listener.accept().await.unwrap().0 };
        let (client, server) = tokio::join!(connect, accept);
        (client.unwrap(), server)
    }

    #[test]
    fn test_preamble_is_exact_wire_bytes() {
        let expected = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: keep-alive\r\n\r\n";
        assert_eq!(EVENT_STREAM_PREAMBLE, expected.as_bytes());
    }

    #[test]
    fn test_preamble_leaves_body_open() {
        let text = std::str::from_utf8(EVENT_STREAM_PREAMBLE).unwrap();
        assert!(text.ends_with("\r\n\r\n"));
        assert!(!text.to_ascii_lowercase().contains("content-length"));
    }

    #[test]
    fn test_error_response_is_complete() {
        let response = error_response(404, "not found");
        let text = String::from_utf8(response).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Length: 10\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\nnot found\n"));
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(reason_phrase(405), "Method Not Allowed");
        assert_eq!(reason_phrase(431), "Request Header Fields Too Large");
        assert_eq!(reason_phrase(599), "Error");
    }

    #[tokio::test]
    async fn test_hijack_hands_over_the_transport_once() {
        let (_client, server) = socket_pair().await;
        let mut writer = ResponseWriter::new(server);

        assert!(writer.hijack().is_ok());

        let second = writer.hijack();
        assert!(matches!(
            second,
            Err(Error::Admission(AdmissionError::AlreadyHijacked))
        ));

        let err = writer.send_error(500, "too late").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_send_error_reaches_the_peer() {
        let (mut client, server) = socket_pair().await;
        let mut writer = ResponseWriter::new(server);

        writer.send_error(405, "method not allowed").await.unwrap();
        drop(writer);

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(text.ends_with("method not allowed\n"));
    }
}
