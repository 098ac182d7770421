//! Long-lived HTTP broadcast streaming
//!
//! `longpoll_rs` holds HTTP connections open and fans every payload written
//! to a shared [`Broadcaster`] out to all of them, verbatim. A client
//! issues a streaming `GET`; the server takes over the raw connection,
//! sends an event stream preamble, and keeps the socket until it dies.
//! There is no replay and no buffering: a connection only sees payloads
//! broadcast while it is registered.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use longpoll_rs::{Broadcaster, EventServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> longpoll_rs::Result<()> {
//!     let broadcaster = Arc::new(Broadcaster::new());
//!
//!     // Producers write from any task; every connected client gets the bytes.
//!     let producer = Arc::clone(&broadcaster);
//!     tokio::spawn(async move {
//!         let mut ticker = tokio::time::interval(Duration::from_secs(1));
//!         loop {
//!             ticker.tick().await;
//!             let _ = producer.write(b"data: tick\n\n").await;
//!         }
//!     });
//!
//!     EventServer::new(ServerConfig::default(), broadcaster).run().await
//! }
//! ```
//!
//! # Delivery model
//!
//! Best effort. A broadcast is one write attempt per connection under a
//! single lock; a connection whose write fails is evicted and closed, and
//! [`Broadcaster::write`] reports the full payload length no matter how
//! many connections actually received it. Framing is the producer's job,
//! so payloads are typically complete server-sent-event frames.
//!
//! The bundled [`EventServer`] is optional. Embedders with their own HTTP
//! layer implement [`ResponseSink`] over their response surface and call
//! [`Broadcaster::serve`] directly.

pub mod broadcast;
pub mod error;
pub mod http;
pub mod server;

pub use broadcast::{Admission, Broadcaster};
pub use error::{Error, Result};
pub use http::ResponseSink;
pub use server::{EventServer, ServerConfig};
