//! Live FLV broadcast log
//!
//! One producer appends a stream header and compressed media units to an
//! append-only [`BroadcastLog`]; any number of consumers read it through
//! their own [`Cursor`], each starting from the oldest or the newest unit and
//! parking at the live edge until more data arrives.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use flv_broadcast::{BroadcastLog, CodecDescriptor, MediaPacket};
//! use tokio::io::AsyncReadExt;
//!
//! # async fn run(avc_record: Vec<u8>, nalus: Vec<u8>) -> flv_broadcast::Result<()> {
//! let log = BroadcastLog::new();
//! log.write_header(&[CodecDescriptor::avc(avc_record)]).await?;
//!
//! let mut cursor = log.cursor_from_newest().await;
//! log.write_unit(&MediaPacket::new(0, Duration::ZERO, nalus).keyframe()).await?;
//!
//! // gzip-framed FLV: header block, then one block per unit
//! let mut buf = vec![0u8; 4096];
//! let n = cursor.read(&mut buf).await?;
//! # let _ = n;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod error;
pub mod media;

pub use broadcast::{BroadcastLog, Cursor, CursorState, JoinMode, LogConfig, LogStats};
pub use error::{Error, LogError, MediaError, Result};
pub use media::{CodecDescriptor, FlvEncoder, FlvTag, MediaPacket, MediaType, TagEncoder};
