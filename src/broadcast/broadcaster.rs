//! Broadcaster implementation
//!
//! The broadcaster owns the connection registry and the fan-out write path.
//! Producers call [`Broadcaster::write`] from any task; the HTTP layer hands
//! over hijacked transports through [`Broadcaster::serve`] or directly via
//! [`Broadcaster::admit`].

use std::collections::HashMap;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, Mutex};

use crate::error::{AdmissionError, Result};
use crate::http::{Request, ResponseSink, EVENT_STREAM_PREAMBLE};

use super::conn::Conn;

/// Handle returned by [`Broadcaster::admit`], tied to one registered
/// connection.
///
/// Holding the handle does not keep the connection alive; the registry owns
/// the transport. The handle exists to let the admitting task observe the
/// end of the connection's registration.
pub struct Admission {
    /// Identifier assigned to the connection. Identifiers are unique for
    /// the lifetime of the broadcaster and are never reused, even after
    /// eviction.
    pub id: u64,

    done: oneshot::Receiver<()>,
}

impl Admission {
    /// Wait until the connection leaves the registry.
    ///
    /// Resolves when the connection is evicted after a failed broadcast
    /// write, or when the broadcaster itself is dropped with the connection
    /// still registered. It never resolves while the connection is live.
    pub async fn closed(self) {
        // An error means the sender was dropped without firing, which only
        // happens when the whole registry is torn down. Either way the
        // connection is gone.
        let _ = self.done.await;
    }
}

/// Registry state guarded by the broadcaster's mutex.
///
/// The identifier counter lives under the same lock as the map so that
/// allocating an identifier and inserting the entry is one atomic step.
struct Registry {
    /// Next identifier to assign; never decremented, never reused.
    next_id: u64,

    /// Live connections by identifier.
    conns: HashMap<u64, Conn>,
}

impl Registry {
    /// Remove a connection, releasing its parked admission task and closing
    /// its transport (dropped along with the entry). Absent identifiers are
    /// ignored, so a second eviction of the same connection is a no-op.
    fn evict(&mut self, id: u64) {
        if let Some(conn) = self.conns.remove(&id) {
            // The receiver may already be gone if the admitting task was
            // cancelled; there is nobody left to notify then.
            let _ = conn.done.send(());
        }
    }
}

/// Fan-out broadcaster over long-lived streaming connections.
///
/// All state sits behind one async mutex, and the lock is held across the
/// transport writes of an entire broadcast pass. Admissions, evictions, and
/// broadcasts therefore serialize against each other, and two broadcast
/// passes never interleave their writes. The cost is that one slow
/// connection write delays every other producer for the duration of the
/// pass.
///
/// Cheap to share: wrap it in an [`Arc`](std::sync::Arc) and clone the
/// handle into producer tasks and the serving layer.
pub struct Broadcaster {
    registry: Mutex<Registry>,
}

impl Broadcaster {
    /// Create a broadcaster with an empty registry.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                next_id: 0,
                conns: HashMap::new(),
            }),
        }
    }

    /// Number of currently registered connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.lock().await.conns.len()
    }

    /// Register a transport for broadcasts.
    ///
    /// The broadcaster takes ownership of the transport and keeps it until
    /// eviction. The returned [`Admission`] carries the assigned identifier
    /// and lets the caller wait for the connection to end.
    ///
    /// The transport must already be past any protocol preamble; from this
    /// point on it receives exactly the broadcast payloads.
    pub async fn admit(&self, transport: impl AsyncWrite + Send + Unpin + 'static) -> Admission {
        let (done_tx, done_rx) = oneshot::channel();

        let mut registry = self.registry.lock().await;
        let id = registry.next_id;
        registry.next_id += 1;
        registry.conns.insert(
            id,
            Conn {
                transport: Box::new(transport),
                done: done_tx,
            },
        );

        Admission { id, done: done_rx }
    }

    /// Broadcast a payload to every registered connection.
    ///
    /// Performs one write attempt per connection. A connection whose write
    /// fails is evicted before the call returns; the others are unaffected
    /// and the pass continues. Delivery is best effort with no
    /// acknowledgement, so the call reports the full payload length
    /// regardless of how many connections received it, zero included.
    ///
    /// An empty payload is a no-op that touches no connection.
    pub async fn write(&self, payload: &[u8]) -> std::io::Result<usize> {
        let mut registry = self.registry.lock().await;

        let mut failed = Vec::new();
        for (&id, conn) in registry.conns.iter_mut() {
            if let Err(e) = conn.transport.write_all(payload).await {
                tracing::debug!(id, error = %e, "broadcast write failed, evicting connection");
                failed.push(id);
            }
        }

        // Evict under the same lock acquisition that discovered the
        // failures, before any other pass can run.
        for id in failed {
            registry.evict(id);
        }

        Ok(payload.len())
    }

    /// Serve a streaming request: hijack the transport, send the event
    /// stream preamble, and register the connection.
    ///
    /// Blocks until the connection is evicted, so the caller's task tracks
    /// the connection's lifetime. If the sink cannot relinquish its
    /// transport, a 500 is attempted on the normal response path and the
    /// error is returned. If the preamble write fails the transport is
    /// closed and never registered.
    pub async fn serve<S: ResponseSink>(&self, request: &Request, mut sink: S) -> Result<()> {
        let mut transport = match sink.hijack() {
            Ok(transport) => transport,
            Err(e) => {
                tracing::warn!(error = %e, "response sink cannot relinquish its transport");
                if let Err(send_err) = sink.send_error(500, "could not take over connection").await
                {
                    tracing::debug!(error = %send_err, "failed to send error response");
                }
                return Err(e);
            }
        };

        if let Err(e) = transport.write_all(EVENT_STREAM_PREAMBLE).await {
            tracing::warn!(error = %e, "failed to write event stream preamble");
            return Err(AdmissionError::Preamble(e).into());
        }

        let admission = self.admit(transport).await;
        tracing::debug!(
            id = admission.id,
            method = %request.method,
            target = %request.target,
            "connection admitted to event stream"
        );

        admission.closed().await;
        Ok(())
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
