//! FLV tag model and serialization
//!
//! FLV file layout as delivered to consumers:
//! ```text
//! +============+==================+==============+==================+
//! | FLV Header | PrevTagSize0 (0) | Tag 1        | PrevTagSize1 ... |
//! | (9 bytes)  | (4 bytes)        | (11+N bytes) | (4 bytes)        |
//! +============+==================+==============+==================+
//! ```
//!
//! Tag header:
//! ```text
//! +--------+-------------+-----------+-------------+---------+
//! | Type(1)| DataSize(3) | TS(3+1)   | StreamID(3) | Data(N) |
//! +--------+-------------+-----------+-------------+---------+
//! ```
//!
//! Video data starts with `FrameType(4 bits) | CodecID(4 bits)`, audio data
//! with `SoundFormat(4) | SoundRate(2) | SoundSize(1) | SoundType(1)`.

use std::io::Write;

use bytes::{Buf, Bytes};

use crate::error::{MediaError, Result};

/// File header flag: stream contains video
pub const FILE_HAS_VIDEO: u8 = 0x01;
/// File header flag: stream contains audio
pub const FILE_HAS_AUDIO: u8 = 0x04;

/// FLV file header plus PreviousTagSize0
pub const FILE_HEADER_LEN: usize = 13;
/// Tag header length (type, size, timestamp, stream id)
pub const TAG_HEADER_LEN: usize = 11;

const FLV_SIGNATURE: [u8; 3] = *b"FLV";
const FLV_VERSION: u8 = 0x01;
const FLV_DATA_OFFSET: u32 = 9;
const MAX_DATA_SIZE: usize = 0x00FF_FFFF;

/// FLV tag type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvTagType {
    Audio,
    Video,
    Script,
}

impl FlvTagType {
    /// Tag type byte in the tag header
    pub fn to_byte(self) -> u8 {
        match self {
            FlvTagType::Audio => 8,
            FlvTagType::Video => 9,
            FlvTagType::Script => 18,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x1F {
            8 => Some(FlvTagType::Audio),
            9 => Some(FlvTagType::Video),
            18 => Some(FlvTagType::Script),
            _ => None,
        }
    }
}

/// An FLV tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlvTag {
    /// Tag type
    pub tag_type: FlvTagType,
    /// Timestamp in milliseconds
    pub timestamp: u32,
    /// Tag data (including codec headers)
    pub data: Bytes,
}

/// Video frame type (upper 4 bits of first byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFrameType {
    Keyframe = 1,
    InterFrame = 2,
}

/// Video codec ID (lower 4 bits of first byte)
pub const VIDEO_CODEC_AVC: u8 = 7;

/// AVC packet types
pub const AVC_SEQUENCE_HEADER: u8 = 0;
pub const AVC_NALU: u8 = 1;

/// Audio formats (upper 4 bits of first byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Nellymoser = 6,
    Aac = 10,
    Speex = 11,
}

impl AudioFormat {
    pub fn from_byte(b: u8) -> Option<Self> {
        match (b >> 4) & 0x0F {
            6 => Some(AudioFormat::Nellymoser),
            10 => Some(AudioFormat::Aac),
            11 => Some(AudioFormat::Speex),
            _ => None,
        }
    }
}

/// Audio sample rate field (2 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSampleRate {
    Rate5512 = 0,
    Rate11025 = 1,
    Rate22050 = 2,
    Rate44100 = 3,
}

/// AAC packet types
pub const AAC_SEQUENCE_HEADER: u8 = 0;
pub const AAC_RAW: u8 = 1;

/// Build the first byte of an audio tag
///
/// Sample size is always 16-bit; sound type is stereo for more than one channel.
pub fn audio_tag_byte(format: AudioFormat, rate: AudioSampleRate, channels: u8) -> u8 {
    let stereo = if channels > 1 { 1 } else { 0 };
    ((format as u8) << 4) | ((rate as u8) << 2) | (1 << 1) | stereo
}

impl FlvTag {
    /// Create a new video tag
    pub fn video(timestamp: u32, data: Bytes) -> Self {
        Self {
            tag_type: FlvTagType::Video,
            timestamp,
            data,
        }
    }

    /// Create a new audio tag
    pub fn audio(timestamp: u32, data: Bytes) -> Self {
        Self {
            tag_type: FlvTagType::Audio,
            timestamp,
            data,
        }
    }

    pub fn is_video(&self) -> bool {
        self.tag_type == FlvTagType::Video
    }

    pub fn is_audio(&self) -> bool {
        self.tag_type == FlvTagType::Audio
    }

    /// Check if this is a video keyframe
    pub fn is_keyframe(&self) -> bool {
        self.is_video()
            && !self.data.is_empty()
            && (self.data[0] >> 4) == VideoFrameType::Keyframe as u8
    }

    /// Check if this is an AVC sequence header
    pub fn is_avc_sequence_header(&self) -> bool {
        self.is_video()
            && self.data.len() >= 2
            && (self.data[0] & 0x0F) == VIDEO_CODEC_AVC
            && self.data[1] == AVC_SEQUENCE_HEADER
    }

    /// Check if this is an AAC sequence header
    pub fn is_aac_sequence_header(&self) -> bool {
        self.is_audio()
            && self.data.len() >= 2
            && AudioFormat::from_byte(self.data[0]) == Some(AudioFormat::Aac)
            && self.data[1] == AAC_SEQUENCE_HEADER
    }

    /// For audio tags, get the format
    pub fn audio_format(&self) -> Option<AudioFormat> {
        if self.is_audio() && !self.data.is_empty() {
            AudioFormat::from_byte(self.data[0])
        } else {
            None
        }
    }

    /// Serialized size including tag header and trailing PreviousTagSize
    pub fn encoded_len(&self) -> usize {
        TAG_HEADER_LEN + self.data.len() + 4
    }
}

/// Fill the 9-byte FLV file header followed by PreviousTagSize0
pub fn fill_file_header(flags: u8) -> [u8; FILE_HEADER_LEN] {
    let mut b = [0u8; FILE_HEADER_LEN];
    b[..3].copy_from_slice(&FLV_SIGNATURE);
    b[3] = FLV_VERSION;
    b[4] = flags;
    b[5..9].copy_from_slice(&FLV_DATA_OFFSET.to_be_bytes());
    // b[9..13] PreviousTagSize0 = 0
    b
}

/// Write a tag with header, data, and trailing PreviousTagSize
pub fn write_tag<W: Write + ?Sized>(sink: &mut W, tag: &FlvTag) -> Result<()> {
    let size = tag.data.len();
    if size > MAX_DATA_SIZE {
        return Err(MediaError::TagTooLarge(size).into());
    }
    let size = size as u32;
    let ts = tag.timestamp;

    let header = [
        tag.tag_type.to_byte(),
        (size >> 16) as u8,
        (size >> 8) as u8,
        size as u8,
        // Lower 24 bits, then the extension byte
        (ts >> 16) as u8,
        (ts >> 8) as u8,
        ts as u8,
        (ts >> 24) as u8,
        0,
        0,
        0,
    ];

    sink.write_all(&header)?;
    sink.write_all(&tag.data)?;
    sink.write_all(&(TAG_HEADER_LEN as u32 + size).to_be_bytes())?;
    Ok(())
}

/// Parse one serialized tag from the front of `buf`
///
/// Returns `None` if `buf` does not hold a complete tag.
pub fn read_tag(buf: &mut Bytes) -> Option<FlvTag> {
    if buf.len() < TAG_HEADER_LEN {
        return None;
    }
    let tag_type = FlvTagType::from_byte(buf[0])?;
    let size = ((buf[1] as usize) << 16) | ((buf[2] as usize) << 8) | buf[3] as usize;
    if buf.len() < TAG_HEADER_LEN + size + 4 {
        return None;
    }
    let timestamp = ((buf[7] as u32) << 24)
        | ((buf[4] as u32) << 16)
        | ((buf[5] as u32) << 8)
        | buf[6] as u32;

    buf.advance(TAG_HEADER_LEN);
    let data = buf.split_to(size);
    buf.advance(4);

    Some(FlvTag {
        tag_type,
        timestamp,
        data,
    })
}
