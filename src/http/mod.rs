//! Thin HTTP/1.1 glue
//!
//! Just enough of the protocol to put a broadcaster behind a socket:
//! request-head parsing on the way in, minimal responses and the transport
//! hand-over seam on the way out. Deliberately not a general HTTP stack;
//! anything beyond routing a streaming GET is out of scope.

pub mod request;
pub mod response;

pub use request::{read_request_head, Request};
pub use response::{ResponseSink, ResponseWriter, EVENT_STREAM_PREAMBLE};
