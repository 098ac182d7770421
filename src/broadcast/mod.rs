//! Connection registry and fan-out broadcaster
//!
//! Every admitted streaming connection lives in a single locked registry,
//! and each payload written to the broadcaster is pushed to all of them in
//! one pass. There is no replay and no buffering: a connection only sees
//! payloads broadcast while it is registered.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<Broadcaster>
//!               ┌───────────────────────────┐
//!               │ Mutex<Registry>           │
//!               │   next_id: u64            │
//!               │   conns: id -> Conn       │
//!               │           { transport,    │
//!               │             done }        │
//!               └─────────────┬─────────────┘
//!        admit / serve        │            write
//!      ┌──────────────────────┼──────────────────────┐
//!      ▼                      ▼                      ▼
//! [admission task]      [admission task]        [producer task]
//!  parked on done        parked on done          write_all to every
//!                                                conn, evict failures
//! ```
//!
//! # Locking
//!
//! One mutex guards the identifier counter and the connection map, and it
//! stays held across the transport writes of a whole broadcast pass. Two
//! passes never interleave their writes, and eviction happens under the
//! same acquisition that discovered the failure. The flip side is
//! head-of-line blocking: a single stalled connection write delays every
//! producer until it resolves.

pub mod broadcaster;
pub mod conn;

pub use broadcaster::{Admission, Broadcaster};
pub use conn::Transport;
