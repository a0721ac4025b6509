//! Translation of descriptors and packets into FLV tags
//!
//! The broadcast log never builds tag bytes itself; it goes through a
//! [`TagEncoder`], with [`FlvEncoder`] as the standard implementation.

use std::io::Write;

use bytes::{BufMut, Bytes, BytesMut};

use super::codec::{AudioSpecificConfig, AvcConfig, CodecDescriptor, MediaPacket};
use super::flv::{
    self, audio_tag_byte, AudioFormat, AudioSampleRate, FlvTag, VideoFrameType, AAC_RAW,
    AAC_SEQUENCE_HEADER, AVC_NALU, AVC_SEQUENCE_HEADER, FILE_HAS_AUDIO, FILE_HAS_VIDEO,
    VIDEO_CODEC_AVC,
};
use crate::error::Result;

/// Format encoder used by the broadcast log
///
/// Implementations must be free of side effects beyond writing to the sink
/// they are handed.
pub trait TagEncoder: Send + Sync + 'static {
    /// Sequence-header tag for a stream, or `None` if the codec has none
    fn descriptor_to_tag(&self, descriptor: &CodecDescriptor) -> Result<Option<FlvTag>>;

    /// Timestamped tag for one packet of the given stream
    fn packet_to_tag(&self, packet: &MediaPacket, descriptor: &CodecDescriptor) -> FlvTag;

    /// File header for the given capability flags
    fn file_header(&self, flags: u8) -> Vec<u8> {
        flv::fill_file_header(flags).to_vec()
    }

    /// Serialize a tag onto the sink
    fn write_tag(&self, sink: &mut dyn Write, tag: &FlvTag) -> Result<()> {
        flv::write_tag(sink, tag)
    }
}

/// Capability flags (has-video / has-audio) for a set of streams
pub fn header_flags(streams: &[CodecDescriptor]) -> u8 {
    streams.iter().fold(0, |flags, stream| {
        let media = stream.media_type();
        if media.is_video() {
            flags | FILE_HAS_VIDEO
        } else if media.is_audio() {
            flags | FILE_HAS_AUDIO
        } else {
            flags
        }
    })
}

/// Standard FLV tag encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct FlvEncoder;

impl TagEncoder for FlvEncoder {
    fn descriptor_to_tag(&self, descriptor: &CodecDescriptor) -> Result<Option<FlvTag>> {
        match descriptor {
            CodecDescriptor::Avc { record } => {
                AvcConfig::parse(record.clone())?;

                let mut data = BytesMut::with_capacity(5 + record.len());
                data.put_u8(((VideoFrameType::Keyframe as u8) << 4) | VIDEO_CODEC_AVC);
                data.put_u8(AVC_SEQUENCE_HEADER);
                data.put_slice(&[0, 0, 0]);
                data.put_slice(record);
                Ok(Some(FlvTag::video(0, data.freeze())))
            }
            CodecDescriptor::Aac { config, .. } => {
                let asc = AudioSpecificConfig::parse(config.clone())?;

                let mut data = BytesMut::with_capacity(2 + config.len());
                data.put_u8(audio_tag_byte(
                    AudioFormat::Aac,
                    AudioSampleRate::Rate44100,
                    asc.channels(),
                ));
                data.put_u8(AAC_SEQUENCE_HEADER);
                data.put_slice(config);
                Ok(Some(FlvTag::audio(0, data.freeze())))
            }
            CodecDescriptor::Speex { .. } | CodecDescriptor::Nellymoser { .. } => Ok(None),
        }
    }

    fn packet_to_tag(&self, packet: &MediaPacket, descriptor: &CodecDescriptor) -> FlvTag {
        // FLV timestamps are 32-bit milliseconds and wrap after ~49.7 days
        let timestamp = packet.time.as_millis() as u32;

        match descriptor {
            CodecDescriptor::Avc { .. } => {
                let frame_type = if packet.is_keyframe {
                    VideoFrameType::Keyframe
                } else {
                    VideoFrameType::InterFrame
                };
                // Composition time is a signed 24-bit value; offsets are never negative here
                let cts = packet.composition_time.as_millis().min(0x7F_FFFF) as u32;

                let mut data = BytesMut::with_capacity(5 + packet.data.len());
                data.put_u8(((frame_type as u8) << 4) | VIDEO_CODEC_AVC);
                data.put_u8(AVC_NALU);
                data.put_slice(&cts.to_be_bytes()[1..]);
                data.put_slice(&packet.data);
                FlvTag::video(timestamp, data.freeze())
            }
            CodecDescriptor::Aac { channels, .. } => {
                let mut data = BytesMut::with_capacity(2 + packet.data.len());
                data.put_u8(audio_tag_byte(
                    AudioFormat::Aac,
                    AudioSampleRate::Rate44100,
                    *channels,
                ));
                data.put_u8(AAC_RAW);
                data.put_slice(&packet.data);
                FlvTag::audio(timestamp, data.freeze())
            }
            CodecDescriptor::Speex { channels } => FlvTag::audio(
                timestamp,
                prefixed(
                    audio_tag_byte(AudioFormat::Speex, AudioSampleRate::Rate5512, *channels),
                    &packet.data,
                ),
            ),
            CodecDescriptor::Nellymoser { channels } => FlvTag::audio(
                timestamp,
                prefixed(
                    audio_tag_byte(AudioFormat::Nellymoser, AudioSampleRate::Rate44100, *channels),
                    &packet.data,
                ),
            ),
        }
    }
}

fn prefixed(first: u8, payload: &[u8]) -> Bytes {
    let mut data = BytesMut::with_capacity(1 + payload.len());
    data.put_u8(first);
    data.put_slice(payload);
    data.freeze()
}
