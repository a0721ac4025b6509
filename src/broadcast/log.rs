//! Broadcast log implementation
//!
//! The producer side of the log: header and unit writes, cursor creation,
//! shutdown, and statistics.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Notify, RwLock};

use super::config::LogConfig;
use super::cursor::{Cursor, JoinMode};
use super::framer::CompressionFramer;
use crate::error::{LogError, Result};
use crate::media::mux::{header_flags, FlvEncoder, TagEncoder};
use crate::media::{CodecDescriptor, MediaPacket};

/// Block a cursor is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BlockRef {
    Header,
    Unit(usize),
}

/// Log contents guarded by the access lock
struct LogState {
    header: Option<Bytes>,
    streams: Vec<CodecDescriptor>,
    units: Vec<Bytes>,
    unit_bytes: u64,
    raw_unit_bytes: u64,
}

/// State shared between the log and its cursors
pub(super) struct Shared {
    state: RwLock<LogState>,
    /// Broadcast to every parked cursor on each header or unit write
    appended: Notify,
    closed: AtomicBool,
}

impl Shared {
    /// Wait until `block` exists and return it
    ///
    /// Returns `None` once the log is closed and the block is still missing.
    pub(super) async fn wait_for_block(self: Arc<Self>, block: BlockRef) -> Option<Bytes> {
        loop {
            // A Notified receives notify_waiters() from the moment it is created,
            // so registering before the check cannot miss an append.
            let notified = self.appended.notified();

            {
                let state = self.state.read().await;
                let found = match block {
                    BlockRef::Header => state.header.clone(),
                    BlockRef::Unit(index) => state.units.get(index).cloned(),
                };
                if found.is_some() {
                    return found;
                }
                // Checked under the same guard: writes test the flag under the
                // write lock, so nothing can be appended after this snapshot.
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }

            notified.await;
        }
    }
}

/// Append-only log of compressed FLV blocks with any number of readers
///
/// One producer writes a header and then units; every [`Cursor`] replays the
/// header once followed by a gapless run of units. Appended units are never
/// mutated or evicted, so the log grows for as long as the session lives.
pub struct BroadcastLog<E: TagEncoder = FlvEncoder> {
    shared: Arc<Shared>,
    framer: CompressionFramer,
    encoder: E,
    config: LogConfig,
}

impl BroadcastLog<FlvEncoder> {
    /// Create a new log with default configuration
    pub fn new() -> Self {
        Self::with_config(LogConfig::default())
    }

    /// Create a new log with custom configuration
    pub fn with_config(config: LogConfig) -> Self {
        Self::with_encoder(config, FlvEncoder)
    }
}

impl Default for BroadcastLog<FlvEncoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TagEncoder> BroadcastLog<E> {
    /// Create a new log with a custom tag encoder
    pub fn with_encoder(config: LogConfig, encoder: E) -> Self {
        let state = LogState {
            header: None,
            streams: Vec::new(),
            units: Vec::with_capacity(config.initial_capacity),
            unit_bytes: 0,
            raw_unit_bytes: 0,
        };

        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                appended: Notify::new(),
                closed: AtomicBool::new(false),
            }),
            framer: CompressionFramer::new(config.compression_level),
            encoder,
            config,
        }
    }

    /// Get the log configuration
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Write the stream header
    ///
    /// Builds one block holding the FLV file header and a sequence-header tag
    /// for every stream that has one. Replaces any previous header and
    /// descriptor list; on error neither is touched.
    pub async fn write_header(&self, streams: &[CodecDescriptor]) -> Result<()> {
        if streams.is_empty() {
            return Err(LogError::NoStreams.into());
        }

        let mut state = self.shared.state.write().await;
        self.ensure_open()?;

        let flags = header_flags(streams);
        let mut writer = self.framer.begin();
        writer.write_all(&self.encoder.file_header(flags))?;
        for stream in streams {
            if let Some(tag) = self.encoder.descriptor_to_tag(stream)? {
                self.encoder.write_tag(&mut writer, &tag)?;
            }
        }
        let (header, _) = writer.finish()?;

        if !state.units.is_empty() {
            tracing::warn!(
                units = state.units.len(),
                "Header replaced after units were appended"
            );
        }

        tracing::info!(
            streams = streams.len(),
            flags = flags,
            bytes = header.len(),
            "Header written"
        );

        state.header = Some(header);
        state.streams = streams.to_vec();
        self.shared.appended.notify_waiters();

        Ok(())
    }

    /// Append one media packet as a new unit
    ///
    /// The unit becomes visible to readers only once fully framed; a failed
    /// call leaves the log unchanged and may be retried.
    pub async fn write_unit(&self, packet: &MediaPacket) -> Result<()> {
        let mut state = self.shared.state.write().await;
        self.ensure_open()?;

        if state.header.is_none() {
            tracing::error!(
                stream_index = packet.stream_index,
                "Unit written before header"
            );
            return Err(LogError::HeaderNotWritten.into());
        }

        let Some(stream) = state.streams.get(packet.stream_index) else {
            tracing::error!(
                stream_index = packet.stream_index,
                streams = state.streams.len(),
                "Unit references unknown stream"
            );
            return Err(LogError::UnknownStream(packet.stream_index).into());
        };

        let tag = self.encoder.packet_to_tag(packet, stream);
        let mut writer = self.framer.begin();
        self.encoder.write_tag(&mut writer, &tag)?;
        let (unit, raw_len) = writer.finish()?;

        tracing::trace!(
            index = state.units.len(),
            stream_index = packet.stream_index,
            timestamp = tag.timestamp,
            raw = raw_len,
            bytes = unit.len(),
            "Unit appended"
        );

        state.unit_bytes += unit.len() as u64;
        state.raw_unit_bytes += raw_len as u64;
        state.units.push(unit);
        self.shared.appended.notify_waiters();

        Ok(())
    }

    /// Finish the stream
    ///
    /// FLV has no trailer; this always succeeds and leaves the log open.
    pub async fn write_trailer(&self) -> Result<()> {
        tracing::debug!("Trailer written");
        Ok(())
    }

    /// Create a cursor
    pub async fn cursor(&self, mode: JoinMode) -> Cursor {
        let len = self.shared.state.read().await.units.len();
        let position = match mode {
            JoinMode::Oldest => 0,
            // With no units yet, 0 is the first unit still to come
            JoinMode::Newest => len.saturating_sub(1),
        };

        tracing::debug!(mode = ?mode, position = position, units = len, "Cursor created");

        Cursor::new(Arc::clone(&self.shared), position)
    }

    /// Create a cursor starting at the oldest unit
    pub async fn cursor_from_oldest(&self) -> Cursor {
        self.cursor(JoinMode::Oldest).await
    }

    /// Create a cursor starting at the most recent unit
    pub async fn cursor_from_newest(&self) -> Cursor {
        self.cursor(JoinMode::Newest).await
    }

    /// Number of appended units
    pub async fn len(&self) -> usize {
        self.shared.state.read().await.units.len()
    }

    /// Check if no unit has been appended
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close the log
    ///
    /// Further writes fail with [`LogError::Closed`]. Cursors still deliver
    /// everything already appended, then read as end of stream instead of
    /// waiting.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Broadcast log closed");
            self.shared.appended.notify_waiters();
        }
    }

    /// Check if the log was closed
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Get log statistics
    pub async fn stats(&self) -> LogStats {
        let state = self.shared.state.read().await;
        LogStats {
            unit_count: state.units.len(),
            stream_count: state.streams.len(),
            header_bytes: state.header.as_ref().map_or(0, Bytes::len),
            unit_bytes: state.unit_bytes,
            raw_unit_bytes: state.raw_unit_bytes,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(LogError::Closed.into());
        }
        Ok(())
    }
}

impl<E: TagEncoder> Drop for BroadcastLog<E> {
    fn drop(&mut self) {
        // Release parked cursors; they hold the shared state, not the log
        self.close();
    }
}

/// Statistics for a broadcast log
#[derive(Debug, Clone, PartialEq)]
pub struct LogStats {
    /// Number of appended units
    pub unit_count: usize,
    /// Number of stream descriptors in the current header
    pub stream_count: usize,
    /// Size of the compressed header block
    pub header_bytes: usize,
    /// Total size of compressed unit blocks
    pub unit_bytes: u64,
    /// Total size of unit tags before compression
    pub raw_unit_bytes: u64,
}

impl LogStats {
    /// Uncompressed to compressed size ratio of the units
    pub fn compression_ratio(&self) -> f64 {
        if self.unit_bytes > 0 {
            self.raw_unit_bytes as f64 / self.unit_bytes as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use super::*;
    use crate::broadcast::fixtures::{audio, gunzip, init_tracing, packet, video};
    use crate::error::{Error, MediaError};
    use crate::media::flv::{self, FILE_HAS_AUDIO, FILE_HAS_VIDEO};
    use crate::media::FlvTag;

    /// Fails to write any tag whose payload ends with `b"poison"`
    struct PoisonEncoder;

    impl TagEncoder for PoisonEncoder {
        fn descriptor_to_tag(&self, descriptor: &CodecDescriptor) -> Result<Option<FlvTag>> {
            FlvEncoder.descriptor_to_tag(descriptor)
        }

        fn packet_to_tag(&self, packet: &MediaPacket, descriptor: &CodecDescriptor) -> FlvTag {
            FlvEncoder.packet_to_tag(packet, descriptor)
        }

        fn write_tag(&self, sink: &mut dyn Write, tag: &FlvTag) -> Result<()> {
            if tag.data.ends_with(b"poison") {
                return Err(io::Error::new(io::ErrorKind::Other, "poisoned tag").into());
            }
            FlvEncoder.write_tag(sink, tag)
        }
    }

    #[tokio::test]
    async fn test_unit_before_header() {
        init_tracing();
        let log = BroadcastLog::new();

        let result = log.write_unit(&packet(0, 0)).await;
        assert!(matches!(
            result,
            Err(Error::Log(LogError::HeaderNotWritten))
        ));
        assert!(log.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_stream_index() {
        let log = BroadcastLog::new();
        log.write_header(&[video()]).await.unwrap();

        let result = log.write_unit(&packet(1, 0)).await;
        assert!(matches!(
            result,
            Err(Error::Log(LogError::UnknownStream(1)))
        ));
        assert!(log.is_empty().await);

        // Log is still usable
        log.write_unit(&packet(0, 0)).await.unwrap();
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn test_empty_header_rejected() {
        let log = BroadcastLog::new();
        let result = log.write_header(&[]).await;
        assert!(matches!(result, Err(Error::Log(LogError::NoStreams))));
        assert_eq!(log.stats().await.header_bytes, 0);
    }

    #[tokio::test]
    async fn test_header_skips_streams_without_tag() {
        let log = BroadcastLog::new();
        log.write_header(&[CodecDescriptor::Speex { channels: 1 }, video()])
            .await
            .unwrap();

        let header = log.shared.state.read().await.header.clone().unwrap();
        let mut flv_bytes = Bytes::from(gunzip(&header));
        let file_header = flv_bytes.split_to(flv::FILE_HEADER_LEN);
        assert_eq!(
            &file_header[..],
            &flv::fill_file_header(FILE_HAS_VIDEO | FILE_HAS_AUDIO)[..]
        );

        let tag = flv::read_tag(&mut flv_bytes).unwrap();
        assert!(tag.is_avc_sequence_header());
        assert!(flv_bytes.is_empty());

        // The tagless stream still counts and accepts units
        assert_eq!(log.stats().await.stream_count, 2);
        log.write_unit(&packet(0, 0)).await.unwrap();
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn test_len_grows_by_one_per_unit() {
        let log = BroadcastLog::new();
        log.write_header(&[video(), audio()]).await.unwrap();

        for i in 0..10u32 {
            assert_eq!(log.len().await, i as usize);
            log.write_unit(&packet((i % 2) as usize, i)).await.unwrap();
        }
        assert_eq!(log.len().await, 10);
    }

    #[tokio::test]
    async fn test_appended_units_never_change() {
        let log = BroadcastLog::new();
        log.write_header(&[video()]).await.unwrap();
        log.write_unit(&packet(0, 0)).await.unwrap();

        let before = log.shared.state.read().await.units[0].clone();
        for i in 1..5 {
            log.write_unit(&packet(0, i)).await.unwrap();
        }
        log.write_header(&[audio()]).await.unwrap();

        let state = log.shared.state.read().await;
        assert_eq!(state.units[0], before);
        assert_eq!(state.units.len(), 5);
    }

    #[tokio::test]
    async fn test_malformed_descriptor_keeps_header() {
        let log = BroadcastLog::new();
        log.write_header(&[video()]).await.unwrap();
        let before = log.stats().await;

        let result = log
            .write_header(&[audio(), CodecDescriptor::avc(vec![0x01u8])])
            .await;
        assert!(matches!(
            result,
            Err(Error::Media(MediaError::InvalidAvcConfig))
        ));

        let after = log.stats().await;
        assert_eq!(before, after);
        assert_eq!(after.stream_count, 1);
    }

    #[tokio::test]
    async fn test_failed_unit_not_committed() {
        let log = BroadcastLog::with_encoder(LogConfig::default(), PoisonEncoder);
        log.write_header(&[video()]).await.unwrap();
        log.write_unit(&packet(0, 0)).await.unwrap();

        let poisoned = MediaPacket::new(0, Duration::from_millis(40), &b"poison"[..]);
        let result = log.write_unit(&poisoned).await;
        assert!(matches!(
            result,
            Err(Error::Media(MediaError::Encoding(_)))
        ));
        assert_eq!(log.len().await, 1);

        // Retrying with a good packet succeeds
        log.write_unit(&packet(0, 1)).await.unwrap();
        assert_eq!(log.len().await, 2);
    }

    #[tokio::test]
    async fn test_closed_log_rejects_writes() {
        let log = BroadcastLog::new();
        log.write_header(&[video()]).await.unwrap();
        log.close();

        assert!(log.is_closed());
        assert!(matches!(
            log.write_unit(&packet(0, 0)).await,
            Err(Error::Log(LogError::Closed))
        ));
        assert!(matches!(
            log.write_header(&[video()]).await,
            Err(Error::Log(LogError::Closed))
        ));
    }

    #[tokio::test]
    async fn test_write_trailer_is_noop() {
        let log = BroadcastLog::new();
        log.write_header(&[video()]).await.unwrap();
        log.write_trailer().await.unwrap();

        assert!(!log.is_closed());
        log.write_unit(&packet(0, 0)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stats() {
        let log = BroadcastLog::new();
        let empty = log.stats().await;
        assert_eq!(empty.unit_count, 0);
        assert_eq!(empty.compression_ratio(), 0.0);

        log.write_header(&[video(), audio()]).await.unwrap();
        for i in 0..4 {
            log.write_unit(&packet(0, i)).await.unwrap();
        }

        let stats = log.stats().await;
        assert_eq!(stats.unit_count, 4);
        assert_eq!(stats.stream_count, 2);
        assert!(stats.header_bytes > 0);

        let state = log.shared.state.read().await;
        let total: u64 = state.units.iter().map(|u| u.len() as u64).sum();
        assert_eq!(stats.unit_bytes, total);
        assert!(stats.raw_unit_bytes > 0);
        assert!(stats.compression_ratio() > 0.0);
    }

    #[tokio::test]
    async fn test_newest_cursor_position() {
        let log = BroadcastLog::new();
        assert_eq!(log.cursor_from_newest().await.position(), 0);

        log.write_header(&[video()]).await.unwrap();
        for i in 0..3 {
            log.write_unit(&packet(0, i)).await.unwrap();
        }

        assert_eq!(log.cursor_from_newest().await.position(), 2);
        assert_eq!(log.cursor_from_oldest().await.position(), 0);
    }
}
