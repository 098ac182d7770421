//! Event stream server listener
//!
//! Handles the TCP accept loop and the short HTTP exchange in front of the
//! broadcaster: read a request head, route it, and hand matching requests
//! over to the broadcaster's admission path.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::broadcast::Broadcaster;
use crate::error::{Error, HttpError, Result};
use crate::http::{read_request_head, ResponseSink, ResponseWriter};
use crate::server::config::ServerConfig;

/// Event stream server
///
/// A thin front for a [`Broadcaster`]: accepts connections, parses request
/// heads, and routes `GET` requests for the configured stream path into the
/// admission path. Anything else gets a small error response. The caller
/// keeps its own handle to the broadcaster for producing payloads.
pub struct EventServer {
    config: ServerConfig,
    broadcaster: Arc<Broadcaster>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl EventServer {
    /// Create a new server for the given broadcaster
    pub fn new(config: ServerConfig, broadcaster: Arc<Broadcaster>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            broadcaster,
            connection_semaphore,
        }
    }

    /// Get a reference to the broadcaster
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            path = %self.config.stream_path,
            "Event stream server listening"
        );

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            path = %self.config.stream_path,
            "Event stream server listening"
        );

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    /// Run the accept loop on a listener the caller already bound
    ///
    /// Useful when the real local address matters, e.g. after binding to
    /// port 0.
    pub async fn run_on(&self, listener: TcpListener) -> Result<()> {
        self.accept_loop(&listener).await
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        tracing::debug!(peer = %peer_addr, "New connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let config = self.config.clone();
        let broadcaster = Arc::clone(&self.broadcaster);

        tokio::spawn(async move {
            // The permit must ride along with the task: an admitted stream
            // occupies its slot until the connection ends.
            let _permit = permit;

            if let Err(e) = serve_exchange(&config, &broadcaster, socket, peer_addr).await {
                tracing::debug!(peer = %peer_addr, error = %e, "Connection error");
            }

            tracing::debug!(peer = %peer_addr, "Connection closed");
        });
    }
}

/// Drive one exchange: read the head, route it, answer it.
///
/// For admitted streams this future lives as long as the connection does.
async fn serve_exchange(
    config: &ServerConfig,
    broadcaster: &Broadcaster,
    mut socket: TcpStream,
    peer_addr: SocketAddr,
) -> Result<()> {
    let head = timeout(
        config.head_read_timeout,
        read_request_head(&mut socket, config.max_head_bytes),
    )
    .await;

    let request = match head {
        Ok(Ok(request)) => request,
        Ok(Err(e)) => {
            let mut writer = ResponseWriter::new(socket);
            match &e {
                Error::Http(HttpError::TooLarge(_)) => {
                    writer.send_error(431, "request head too large").await?;
                }
                Error::Http(HttpError::Malformed(_)) => {
                    writer.send_error(400, "malformed request").await?;
                }
                // The peer is gone; there is nobody to answer.
                _ => {}
            }
            return Err(e);
        }
        Err(_) => {
            let mut writer = ResponseWriter::new(socket);
            writer.send_error(408, "timed out reading request").await?;
            return Err(HttpError::Timeout.into());
        }
    };

    tracing::debug!(
        peer = %peer_addr,
        method = %request.method,
        target = %request.target,
        "Request received"
    );

    let mut writer = ResponseWriter::new(socket);

    if request.path() != config.stream_path {
        writer.send_error(404, "not found").await?;
        return Ok(());
    }
    if request.method != "GET" {
        writer.send_error(405, "method not allowed").await?;
        return Ok(());
    }

    broadcaster.serve(&request, writer).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::http::EVENT_STREAM_PREAMBLE;

    async fn start_server(config: ServerConfig) -> (SocketAddr, Arc<Broadcaster>) {
        let broadcaster = Arc::new(Broadcaster::new());
        let server = EventServer::new(config, Arc::clone(&broadcaster));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run_on(listener).await;
        });
        (addr, broadcaster)
    }

    /// Connect, request the stream, and consume the preamble.
    async fn connect_stream(addr: SocketAddr) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /events HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
            .await
            .unwrap();

        let mut preamble = vec![0u8; EVENT_STREAM_PREAMBLE.len()];
        stream.read_exact(&mut preamble).await.unwrap();
        assert_eq!(preamble, EVENT_STREAM_PREAMBLE);
        stream
    }

    async fn wait_for_count(broadcaster: &Broadcaster, expected: usize) {
        for _ in 0..200 {
            if broadcaster.connection_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("registry never reached {} connections", expected);
    }

    /// One exchange that expects a single error response and then EOF.
    async fn exchange(addr: SocketAddr, request: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    #[tokio::test]
    async fn test_streaming_end_to_end() {
        let (addr, broadcaster) = start_server(ServerConfig::default()).await;

        let mut a = connect_stream(addr).await;
        let mut b = connect_stream(addr).await;
        wait_for_count(&broadcaster, 2).await;

        broadcaster.write(b"data: one\n\n").await.unwrap();

        let mut buf = [0u8; 11];
        a.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"data: one\n\n");
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"data: one\n\n");
    }

    #[tokio::test]
    async fn test_disconnected_client_is_evicted() {
        let (addr, broadcaster) = start_server(ServerConfig::default()).await;

        let a = connect_stream(addr).await;
        let mut b = connect_stream(addr).await;
        wait_for_count(&broadcaster, 2).await;

        drop(a);

        // The dead socket can absorb a write into kernel buffers before the
        // failure surfaces, so keep broadcasting until eviction happens.
        let mut evicted = false;
        for _ in 0..100 {
            broadcaster.write(b"data: ping\n\n").await.unwrap();
            if broadcaster.connection_count().await == 1 {
                evicted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(evicted, "dead connection was never evicted");

        let mut buf = [0u8; 12];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"data: ping\n\n");
    }

    #[tokio::test]
    async fn test_request_for_other_path_gets_404() {
        let (addr, _broadcaster) = start_server(ServerConfig::default()).await;

        let response = exchange(addr, b"GET /other HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 "), "got: {}", response);
    }

    #[tokio::test]
    async fn test_non_get_method_gets_405() {
        let (addr, broadcaster) = start_server(ServerConfig::default()).await;

        let response = exchange(addr, b"POST /events HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 405 "), "got: {}", response);
        assert_eq!(broadcaster.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_head_gets_400() {
        let (addr, _broadcaster) = start_server(ServerConfig::default()).await;

        let response = exchange(addr, b"NOT-HTTP\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 400 "), "got: {}", response);
    }

    #[tokio::test]
    async fn test_oversize_head_gets_431() {
        let config = ServerConfig::default().max_head_bytes(128);
        let (addr, _broadcaster) = start_server(config).await;

        let response = exchange(addr, &[b'A'; 256]).await;
        assert!(response.starts_with("HTTP/1.1 431 "), "got: {}", response);
    }

    #[tokio::test]
    async fn test_head_read_timeout_gets_408() {
        let config = ServerConfig::default().head_read_timeout(Duration::from_millis(100));
        let (addr, _broadcaster) = start_server(config).await;

        // Send nothing and wait for the deadline to fire.
        let response = exchange(addr, b"").await;
        assert!(response.starts_with("HTTP/1.1 408 "), "got: {}", response);
    }

    #[tokio::test]
    async fn test_connection_limit_rejects_extra_clients() {
        let config = ServerConfig::default().max_connections(1);
        let (addr, broadcaster) = start_server(config).await;

        let _a = connect_stream(addr).await;
        wait_for_count(&broadcaster, 1).await;

        // The listener drops rejected sockets without a response.
        let mut b = TcpStream::connect(addr).await.unwrap();
        match b.read(&mut [0u8; 1]).await {
            Ok(0) => {}
            Ok(n) => panic!("unexpected {} bytes from rejected connection", n),
            Err(_) => {}
        }
    }

    #[tokio::test]
    async fn test_run_until_returns_on_shutdown() {
        let broadcaster = Arc::new(Broadcaster::new());
        let config = ServerConfig::with_addr("127.0.0.1:0".parse().unwrap());
        let server = EventServer::new(config, broadcaster);

        let result = tokio::time::timeout(Duration::from_secs(1), server.run_until(async {}))
            .await
            .expect("run_until should return once shutdown resolves");
        assert!(result.is_ok());
    }
}
