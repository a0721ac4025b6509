//! Per-block gzip framing
//!
//! Every block handed to the log is a complete gzip member produced by a fresh
//! encoder, so no compressor state crosses block boundaries. A consumer that
//! joins at any block boundary can feed everything it receives into a single
//! `flate2::read::MultiGzDecoder`, which steps from member to member.

use std::io::{self, Write};

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{MediaError, Result};

/// Produces independently decodable compressed blocks
#[derive(Debug, Clone, Copy)]
pub struct CompressionFramer {
    level: Compression,
}

impl CompressionFramer {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    /// Start a new block
    pub fn begin(&self) -> FrameWriter {
        FrameWriter {
            encoder: GzEncoder::new(Vec::new(), self.level),
            raw_len: 0,
        }
    }

    /// Compress `raw` into a single block
    pub fn frame(&self, raw: &[u8]) -> Result<Bytes> {
        let mut writer = self.begin();
        writer.write_all(raw).map_err(MediaError::Encoding)?;
        Ok(writer.finish()?.0)
    }
}

impl Default for CompressionFramer {
    fn default() -> Self {
        Self::new(6)
    }
}

/// Writer for one block in progress
///
/// Dropping it without calling [`finish`](FrameWriter::finish) discards the block.
pub struct FrameWriter {
    encoder: GzEncoder<Vec<u8>>,
    raw_len: usize,
}

impl FrameWriter {
    /// Close the gzip member and return it along with the uncompressed length
    pub fn finish(self) -> Result<(Bytes, usize)> {
        let block = self.encoder.finish().map_err(MediaError::Encoding)?;
        Ok((Bytes::from(block), self.raw_len))
    }
}

impl Write for FrameWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.encoder.write(buf)?;
        self.raw_len += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}
