//! Media handling for the broadcast log
//!
//! This module provides:
//! - Codec descriptors and media packets
//! - FLV tag model, file header and tag serialization
//! - Translation of descriptors and packets into FLV tags

pub mod codec;
pub mod flv;
pub mod mux;

pub use codec::{CodecDescriptor, MediaPacket, MediaType};
pub use flv::{FlvTag, FlvTagType};
pub use mux::{FlvEncoder, TagEncoder};
