//! Codec descriptors and media packets
//!
//! A [`CodecDescriptor`] describes one logical stream of the session (its codec
//! and decoder configuration). A [`MediaPacket`] is one encoded access unit that
//! refers back to its stream by index into the descriptor list given to
//! [`BroadcastLog::write_header`](crate::broadcast::BroadcastLog::write_header).

use std::time::Duration;

use bytes::{Buf, Bytes};

use crate::error::{MediaError, Result};

/// Kind of media carried by a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Video,
    Audio,
}

impl MediaType {
    pub fn is_video(&self) -> bool {
        *self == MediaType::Video
    }

    pub fn is_audio(&self) -> bool {
        *self == MediaType::Audio
    }
}

/// Stream-level codec description
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecDescriptor {
    /// H.264 with its AVCDecoderConfigurationRecord
    Avc { record: Bytes },
    /// AAC with its AudioSpecificConfig and the channel count parsed from it
    Aac { config: Bytes, channels: u8 },
    /// Speex (no sequence header in FLV)
    Speex { channels: u8 },
    /// Nellymoser (no sequence header in FLV)
    Nellymoser { channels: u8 },
}

impl CodecDescriptor {
    /// Create an H.264 descriptor
    pub fn avc(record: impl Into<Bytes>) -> Self {
        CodecDescriptor::Avc {
            record: record.into(),
        }
    }

    /// Create an AAC descriptor
    ///
    /// The channel count is read from the config once, here; an unparseable
    /// config yields 0 and is rejected when the header is written.
    pub fn aac(config: impl Into<Bytes>) -> Self {
        let config = config.into();
        let channels = AudioSpecificConfig::parse(config.clone())
            .map(|c| c.channels())
            .unwrap_or(0);
        CodecDescriptor::Aac { config, channels }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            CodecDescriptor::Avc { .. } => MediaType::Video,
            CodecDescriptor::Aac { .. }
            | CodecDescriptor::Speex { .. }
            | CodecDescriptor::Nellymoser { .. } => MediaType::Audio,
        }
    }

    /// Audio channel count (0 for video or an unparseable AAC config)
    pub fn channels(&self) -> u8 {
        match self {
            CodecDescriptor::Avc { .. } => 0,
            CodecDescriptor::Aac { channels, .. }
            | CodecDescriptor::Speex { channels }
            | CodecDescriptor::Nellymoser { channels } => *channels,
        }
    }
}

/// One encoded access unit
#[derive(Debug, Clone)]
pub struct MediaPacket {
    /// Index into the session's descriptor list
    pub stream_index: usize,
    /// Whether this is a video keyframe
    pub is_keyframe: bool,
    /// Decode time since the start of the session
    pub time: Duration,
    /// Presentation offset from `time` (video only)
    pub composition_time: Duration,
    /// Codec payload (AVCC NAL units for H.264, raw frames for audio)
    pub data: Bytes,
}

impl MediaPacket {
    pub fn new(stream_index: usize, time: Duration, data: impl Into<Bytes>) -> Self {
        Self {
            stream_index,
            is_keyframe: false,
            time,
            composition_time: Duration::ZERO,
            data: data.into(),
        }
    }

    /// Mark as keyframe
    pub fn keyframe(mut self) -> Self {
        self.is_keyframe = true;
        self
    }

    /// Set composition time offset
    pub fn composition_time(mut self, cts: Duration) -> Self {
        self.composition_time = cts;
        self
    }
}

/// AVC decoder configuration record, validated before it goes into a header
#[derive(Debug, Clone)]
pub struct AvcConfig {
    /// AVC profile (66=Baseline, 77=Main, 100=High, etc.)
    pub profile: u8,
    /// AVC level (e.g., 31 = 3.1)
    pub level: u8,
    /// NALU length prefix size in bytes
    pub nalu_length_size: u8,
    pub sps_count: usize,
    pub pps_count: usize,
}

impl AvcConfig {
    pub fn parse(mut data: Bytes) -> Result<Self> {
        if data.len() < 7 || data.get_u8() != 1 {
            return Err(MediaError::InvalidAvcConfig.into());
        }

        let profile = data.get_u8();
        let _compatibility = data.get_u8();
        let level = data.get_u8();
        let nalu_length_size = (data.get_u8() & 0x03) + 1;

        let sps_count = (data.get_u8() & 0x1F) as usize;
        skip_parameter_sets(&mut data, sps_count)?;

        if data.is_empty() {
            return Err(MediaError::InvalidAvcConfig.into());
        }
        let pps_count = data.get_u8() as usize;
        skip_parameter_sets(&mut data, pps_count)?;

        Ok(AvcConfig {
            profile,
            level,
            nalu_length_size,
            sps_count,
            pps_count,
        })
    }
}

fn skip_parameter_sets(data: &mut Bytes, count: usize) -> Result<()> {
    for _ in 0..count {
        if data.len() < 2 {
            return Err(MediaError::InvalidAvcConfig.into());
        }
        let len = data.get_u16() as usize;
        if data.len() < len {
            return Err(MediaError::InvalidAvcConfig.into());
        }
        data.advance(len);
    }
    Ok(())
}

/// AAC AudioSpecificConfig (leading fields only)
#[derive(Debug, Clone)]
pub struct AudioSpecificConfig {
    pub audio_object_type: u8,
    pub sampling_frequency: u32,
    pub channel_configuration: u8,
}

impl AudioSpecificConfig {
    const SAMPLING_FREQUENCIES: [u32; 13] = [
        96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
    ];

    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() < 2 {
            return Err(MediaError::InvalidAacConfig.into());
        }

        // audioObjectType: 5 bits, samplingFrequencyIndex: 4 bits,
        // [explicit frequency: 24 bits], channelConfiguration: 4 bits
        let audio_object_type = (data[0] >> 3) & 0x1F;
        let index = ((data[0] & 0x07) << 1) | (data[1] >> 7);

        let (sampling_frequency, channel_configuration) = if index == 0x0F {
            if data.len() < 5 {
                return Err(MediaError::InvalidAacConfig.into());
            }
            let freq = ((data[1] as u32 & 0x7F) << 17)
                | ((data[2] as u32) << 9)
                | ((data[3] as u32) << 1)
                | (data[4] as u32 >> 7);
            (freq, (data[4] >> 3) & 0x0F)
        } else {
            match Self::SAMPLING_FREQUENCIES.get(index as usize) {
                Some(&freq) => (freq, (data[1] >> 3) & 0x0F),
                None => return Err(MediaError::InvalidAacConfig.into()),
            }
        };

        if audio_object_type == 0 {
            return Err(MediaError::InvalidAacConfig.into());
        }

        Ok(AudioSpecificConfig {
            audio_object_type,
            sampling_frequency,
            channel_configuration,
        })
    }

    pub fn channels(&self) -> u8 {
        match self.channel_configuration {
            1..=6 => self.channel_configuration,
            7 => 8,
            _ => 0,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal baseline-profile record with one SPS and one PPS
    pub(crate) const AVC_RECORD: &[u8] = &[
        0x01, 0x42, 0xC0, 0x1E, 0xFF, 0xE1, 0x00, 0x04, 0x67, 0x42, 0xC0, 0x1E, 0x01, 0x00, 0x02,
        0x68, 0xCE,
    ];

    /// AAC LC, 44.1kHz, stereo
    pub(crate) const AAC_CONFIG: &[u8] = &[0x12, 0x10];

    #[test]
    fn test_parse_avc_config() {
        let config = AvcConfig::parse(Bytes::from_static(AVC_RECORD)).unwrap();
        assert_eq!(config.profile, 66);
        assert_eq!(config.level, 30);
        assert_eq!(config.nalu_length_size, 4);
        assert_eq!(config.sps_count, 1);
        assert_eq!(config.pps_count, 1);
    }

    #[test]
    fn test_parse_avc_config_truncated() {
        let truncated = Bytes::copy_from_slice(&AVC_RECORD[..10]);
        assert!(AvcConfig::parse(truncated).is_err());

        let bad_version = Bytes::from_static(&[0x02, 0x42, 0xC0, 0x1E, 0xFF, 0xE0, 0x00]);
        assert!(AvcConfig::parse(bad_version).is_err());
    }

    #[test]
    fn test_parse_aac_config() {
        let config = AudioSpecificConfig::parse(Bytes::from_static(AAC_CONFIG)).unwrap();
        assert_eq!(config.audio_object_type, 2);
        assert_eq!(config.sampling_frequency, 44100);
        assert_eq!(config.channels(), 2);
    }

    #[test]
    fn test_parse_aac_config_invalid() {
        assert!(AudioSpecificConfig::parse(Bytes::from_static(&[0x12])).is_err());
        // Sampling frequency index 13 is reserved
        assert!(AudioSpecificConfig::parse(Bytes::from_static(&[0x16, 0x90])).is_err());
    }

    #[test]
    fn test_descriptor_media_type() {
        assert!(CodecDescriptor::avc(AVC_RECORD).media_type().is_video());
        assert!(CodecDescriptor::aac(AAC_CONFIG).media_type().is_audio());
        assert!(CodecDescriptor::Speex { channels: 1 }
            .media_type()
            .is_audio());
    }

    #[test]
    fn test_descriptor_channels() {
        assert_eq!(CodecDescriptor::aac(AAC_CONFIG).channels(), 2);
        assert_eq!(CodecDescriptor::Nellymoser { channels: 1 }.channels(), 1);
        assert_eq!(CodecDescriptor::avc(AVC_RECORD).channels(), 0);
    }

    #[test]
    fn test_aac_descriptor_caches_channels() {
        let mono = CodecDescriptor::aac(vec![0x12u8, 0x08]);
        assert!(matches!(mono, CodecDescriptor::Aac { channels: 1, .. }));

        let broken = CodecDescriptor::aac(vec![0x12u8]);
        assert!(matches!(broken, CodecDescriptor::Aac { channels: 0, .. }));
    }

    #[test]
    fn test_packet_builder() {
        let pkt = MediaPacket::new(1, Duration::from_millis(40), vec![1u8, 2, 3])
            .keyframe()
            .composition_time(Duration::from_millis(80));
        assert_eq!(pkt.stream_index, 1);
        assert!(pkt.is_keyframe);
        assert_eq!(pkt.composition_time, Duration::from_millis(80));
        assert_eq!(pkt.data.len(), 3);
    }
}
