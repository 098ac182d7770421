//! Crate error types
//!
//! Steady-state delivery failures are not represented here: a broken
//! connection discovered during a broadcast pass is handled internally by
//! eviction and never surfaces to callers. The variants below cover the
//! admission handshake and the HTTP glue, the only phases whose errors are
//! observable.

use std::fmt;
use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// Socket-level I/O failure (bind, accept, error-response writes).
    Io(io::Error),
    /// Failure converting an HTTP exchange into a streaming connection.
    Admission(AdmissionError),
    /// Malformed, oversized, or unreadable request head.
    Http(HttpError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "i/o error: {}", e),
            Error::Admission(e) => write!(f, "admission failed: {}", e),
            Error::Http(e) => write!(f, "bad request: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<AdmissionError> for Error {
    fn from(e: AdmissionError) -> Self {
        Error::Admission(e)
    }
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self {
        Error::Http(e)
    }
}

/// Errors raised while admitting a streaming connection.
#[derive(Debug)]
pub enum AdmissionError {
    /// The response sink cannot relinquish its raw transport.
    HijackUnsupported,
    /// The sink's transport was already taken by an earlier hijack.
    AlreadyHijacked,
    /// Writing the stream preamble to the hijacked transport failed.
    Preamble(io::Error),
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::HijackUnsupported => {
                write!(f, "response sink does not support hijacking")
            }
            AdmissionError::AlreadyHijacked => {
                write!(f, "transport was already hijacked")
            }
            AdmissionError::Preamble(e) => {
                write!(f, "could not write stream preamble: {}", e)
            }
        }
    }
}

impl std::error::Error for AdmissionError {}

/// Errors raised while reading or parsing a request head.
#[derive(Debug)]
pub enum HttpError {
    /// Request head exceeded the configured size cap (cap in bytes).
    TooLarge(usize),
    /// Request line or header syntax error.
    Malformed(&'static str),
    /// Peer closed the connection before the head terminator arrived.
    UnexpectedEof,
    /// Reading the request head did not finish within the deadline.
    Timeout,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::TooLarge(cap) => {
                write!(f, "request head larger than {} bytes", cap)
            }
            HttpError::Malformed(what) => write!(f, "malformed request: {}", what),
            HttpError::UnexpectedEof => {
                write!(f, "connection closed before request head completed")
            }
            HttpError::Timeout => write!(f, "timed out reading request head"),
        }
    }
}

impl std::error::Error for HttpError {}
