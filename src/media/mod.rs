//! Media demultiplexing for RTMP playback
//!
//! This module provides:
//! - Tag payload classification and header peeks
//! - H.264/AVC sequence-header and NALU parsing
//! - AAC AudioSpecificConfig and access-unit parsing
//! - Per-session timestamp rebasing (DTS/PTS reconstruction)

pub mod aac;
pub mod flv;
pub mod h264;
pub mod timing;

pub use aac::{AacPacketType, AacPayload, AudioConfig, AudioUnit};
pub use flv::{SoundFormat, TagKind, TagPayload, VideoCodecId, VideoFrameType};
pub use h264::{AvcPacketType, AvcPayload, NaluIter, NaluType, VideoConfig, VideoUnit};
pub use timing::Timeline;
