//! Per-consumer read cursor
//!
//! A cursor delivers the header block once, then unit blocks in index order.
//! Each read copies from a single block only, so a read that finishes a block
//! may return fewer bytes than the buffer holds; the next read starts the
//! next block.
//!
//! ```text
//!  HeaderPending ──► HeaderDelivering ──► UnitDelivering ◄──┐
//!                                              │             │
//!                                              ▼             │
//!                                        WaitingForUnit ─────┘
//! ```

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, ReadBuf};

use super::log::{BlockRef, Shared};

/// Where a new cursor starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// First unit ever appended
    Oldest,
    /// Most recent unit at creation time
    Newest,
}

/// Observable read state of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Header not started
    HeaderPending,
    /// Header partially delivered
    HeaderDelivering,
    /// Delivering, or about to deliver, the unit at the current position
    UnitDelivering,
    /// Parked until the unit at the current position is appended
    WaitingForUnit,
}

type PendingBlock = Pin<Box<dyn Future<Output = Option<Bytes>> + Send>>;

/// Read cursor over a [`BroadcastLog`](super::BroadcastLog)
///
/// Implements [`AsyncRead`]. Reads park while the next unit has not been
/// appended yet and never report end of stream unless the log is closed.
/// Dropping a read future mid-wait is safe; the next read resumes the wait.
pub struct Cursor {
    shared: Arc<Shared>,
    position: usize,
    offset: usize,
    header_delivered: bool,
    /// Block being copied out, pinned until fully delivered
    block: Option<Bytes>,
    pending: Option<PendingBlock>,
}

impl Cursor {
    pub(super) fn new(shared: Arc<Shared>, position: usize) -> Self {
        Self {
            shared,
            position,
            offset: 0,
            header_delivered: false,
            block: None,
            pending: None,
        }
    }

    /// Index of the unit to be delivered next (or currently being delivered)
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes of the current block already delivered
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether the header has been fully delivered
    pub fn header_delivered(&self) -> bool {
        self.header_delivered
    }

    /// Current read state
    pub fn state(&self) -> CursorState {
        match (self.header_delivered, &self.block, &self.pending) {
            (false, Some(_), _) => CursorState::HeaderDelivering,
            (false, None, _) => CursorState::HeaderPending,
            (true, None, Some(_)) => CursorState::WaitingForUnit,
            (true, _, _) => CursorState::UnitDelivering,
        }
    }

    fn next_block(&self) -> BlockRef {
        if self.header_delivered {
            BlockRef::Unit(self.position)
        } else {
            BlockRef::Header
        }
    }

    /// Copy from the current block into `buf`, advancing past it when done
    fn deliver(&mut self, buf: &mut ReadBuf<'_>) {
        let Some(block) = self.block.as_ref() else {
            return;
        };

        let remaining = &block[self.offset..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);

        if n < remaining.len() {
            self.offset += n;
            return;
        }

        self.block = None;
        self.offset = 0;
        if self.header_delivered {
            self.position += 1;
        } else {
            // The unit at `position` comes next, not the one after it
            self.header_delivered = true;
        }
    }
}

impl AsyncRead for Cursor {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        if this.block.is_none() {
            let next = this.next_block();
            let shared = &this.shared;
            let pending = this.pending.get_or_insert_with(|| -> PendingBlock {
                Box::pin(Arc::clone(shared).wait_for_block(next))
            });

            match pending.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(found) => {
                    this.pending = None;
                    match found {
                        Some(block) => this.block = Some(block),
                        // Closed log, nothing left at this position
                        None => return Poll::Ready(Ok(())),
                    }
                }
            }
        }

        this.deliver(buf);
        Poll::Ready(Ok(()))
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("position", &self.position)
            .field("offset", &self.offset)
            .field("header_delivered", &self.header_delivered)
            .field("state", &self.state())
            .finish()
    }
}
