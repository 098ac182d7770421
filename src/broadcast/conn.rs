//! Per-connection registry entry
//!
//! A connection passes through three phases: admitted (present in the
//! registry map, eligible for broadcasts), evicted (removed after a failed
//! write, completion signal fired), and closed (transport dropped). The
//! phases are carried by ownership rather than a state field: an entry in
//! the map is admitted, an entry that has been removed and signaled is
//! evicted, and dropping the entry closes the transport.

use tokio::io::AsyncWrite;
use tokio::sync::oneshot;

/// Owned write half of an admitted connection.
///
/// Boxed so the registry can hold hijacked TCP streams, in-memory pipes in
/// tests, or any other raw handle a hosting HTTP layer relinquishes. The
/// registry never reads from a connection; the write half is all it needs.
pub type Transport = Box<dyn AsyncWrite + Send + Unpin>;

/// A single admitted connection.
///
/// The registry is the sole owner of the transport for as long as the entry
/// is in the map. The `done` sender releases the admission task parked on
/// the connection; sending consumes it, so the signal fires at most once.
pub(super) struct Conn {
    /// Raw write handle taken over from the HTTP layer.
    pub(super) transport: Transport,

    /// Fired on eviction to release the parked admission task.
    pub(super) done: oneshot::Sender<()>,
}
