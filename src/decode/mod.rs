//! Decode pipeline
//!
//! This module provides:
//! - The [`DecodedSample`] envelope and format descriptors
//! - Capability traits the platform decoders sit behind
//! - Wrappers enforcing timing preservation and error classification
//! - An FFmpeg-backed default backend (feature `ffmpeg`)

pub mod audio;
pub mod backend;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod sample;
pub mod video;

pub use audio::AudioDecoder;
pub use backend::{AudioDecode, DecoderBackend, RawVideoFrame, VideoDecode};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegBackend;
pub use sample::{AudioFormat, DecodedSample, MediaData, PixelFormat, VideoFormat};
pub use video::VideoDecoder;
