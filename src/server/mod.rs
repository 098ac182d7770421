//! TCP server front for the broadcaster
//!
//! Accepts connections and speaks just enough HTTP/1.1 to route streaming
//! requests into admission. Embedders with their own HTTP stack can skip
//! this module entirely and drive [`Broadcaster::serve`] through a
//! [`ResponseSink`](crate::http::ResponseSink) of their own.
//!
//! [`Broadcaster::serve`]: crate::broadcast::Broadcaster::serve

pub mod config;
pub mod listener;

pub use config::ServerConfig;
pub use listener::EventServer;
