//! Broadcast log for single-producer, many-consumer fan-out
//!
//! The producer appends a header and then one compressed block per media
//! packet. Consumers each hold a [`Cursor`] that replays the header once and
//! then every unit from its join point on, parking at the live edge until the
//! next append.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<Shared>
//!                     ┌─────────────────────────┐
//!                     │ state: RwLock<{         │
//!                     │   header: Bytes,        │
//!                     │   units: Vec<Bytes>,    │
//!                     │ }>                      │
//!                     │ appended: Notify        │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Producer]               [Cursor]                [Cursor]
//!    write_unit()             poll_read()             poll_read()
//!         │                       │                       │
//!         └──► frame + push ──► notify_waiters() ──► wake, re-check
//! ```
//!
//! # Zero-Copy Design
//!
//! Blocks are stored as `bytes::Bytes`. A cursor takes a reference-counted
//! handle to the block it is delivering under the read lock and copies out of
//! it without holding the lock. Appended blocks are never mutated, so this
//! is always consistent.
//!
//! # Framing
//!
//! Every block is an independent gzip member (see [`framer`]). A consumer
//! joining at any point can decode its whole byte stream with one
//! multi-member gzip decoder.

pub mod config;
pub mod cursor;
pub mod framer;
pub mod log;

pub use config::LogConfig;
pub use cursor::{Cursor, CursorState, JoinMode};
pub use framer::CompressionFramer;
pub use log::{BroadcastLog, LogStats};
