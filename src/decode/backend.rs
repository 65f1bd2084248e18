//! Decode capability traits
//!
//! The platform decoder (VideoToolbox, MediaCodec, FFmpeg, ...) sits behind
//! two small object-safe traits plus a factory. The session never talks to a
//! backend directly; the wrappers in [`crate::decode::video`] and
//! [`crate::decode::audio`] enforce the timing and error contracts.

use bytes::Bytes;

use crate::error::Result;
use crate::media::{AudioConfig, AudioUnit, VideoConfig, VideoUnit};

use super::sample::PixelFormat;

/// A raw frame as produced by a video decode backend.
///
/// `backend_pts_ms` is whatever timestamp the platform decoder reported.
/// Hardware decoders are known to return zero or wall-clock values here, so
/// callers must NOT use it for presentation; the pipeline threads the
/// original tag timing through instead.
#[derive(Debug, Clone)]
pub struct RawVideoFrame {
    /// Tightly packed pixel data
    pub pixels: Bytes,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// Timestamp claimed by the backend; unreliable, never presented
    pub backend_pts_ms: Option<i64>,
}

/// One H.264 decode session.
///
/// Submissions are serialized by the caller: each unit's output (zero or one
/// frame) is observed before the next unit is submitted, so output ordering
/// equals input ordering.
pub trait VideoDecode: Send + Sync {
    /// Decode one coded frame. `Ok(None)` means the backend is still
    /// buffering (e.g. frame reordering) and no frame is ready yet.
    fn decode(&mut self, unit: &VideoUnit) -> Result<Option<RawVideoFrame>>;
}

/// One AAC-LC to PCM conversion session.
pub trait AudioDecode: Send + Sync {
    /// Decode one access unit into `out` as interleaved signed 16-bit PCM,
    /// returning the number of bytes written. `out` is sized for a full
    /// 1024-sample unit; a short write is reported, not padded.
    fn decode_into(&mut self, unit: &AudioUnit, out: &mut [u8]) -> Result<usize>;
}

/// Factory for decode sessions, injected into the playback session.
///
/// Construction failures are fatal for the current play attempt
/// ([`crate::error::DecoderError::InitFailed`] /
/// [`crate::error::DecoderError::FormatDescriptionInvalid`]).
pub trait DecoderBackend: Send + Sync + 'static {
    /// Build an H.264 decode session from a parsed sequence header
    fn open_video(&self, config: &VideoConfig) -> Result<Box<dyn VideoDecode>>;

    /// Build an AAC-to-PCM conversion session from a parsed AudioSpecificConfig
    fn open_audio(&self, config: &AudioConfig) -> Result<Box<dyn AudioDecode>>;
}
