//! H.264 video decoder wrapper
//!
//! Wraps a [`VideoDecode`] backend and enforces the pipeline contracts the
//! backends cannot be trusted with:
//!
//! - **Timing preservation.** The output sample carries the PTS/DTS of the
//!   submitted unit, never the backend-reported timestamp. Hardware decoders
//!   return zero-valued or wall-clock PTS on several platforms; presenting
//!   those breaks A/V sync.
//! - **Error classification.** Construction failures are fatal for the play
//!   attempt; per-unit failures surface as droppable `DecodeFailed` errors.

use crate::error::{DecoderError, Error, MediaKind, Result};
use crate::media::{VideoConfig, VideoUnit};

use super::backend::{DecoderBackend, VideoDecode};
use super::sample::{DecodedSample, MediaData, VideoFormat};

/// An open H.264 decode session bound to one `VideoConfig`
pub struct VideoDecoder {
    config: VideoConfig,
    backend: Box<dyn VideoDecode>,
}

impl std::fmt::Debug for VideoDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoDecoder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VideoDecoder {
    /// Build a decode session for the given sequence-header config.
    ///
    /// Fails with `DecoderInitFailed` / `FormatDescriptionInvalid` when the
    /// platform rejects the SPS/PPS pair.
    pub fn open(config: VideoConfig, backend: &dyn DecoderBackend) -> Result<Self> {
        let session = backend.open_video(&config)?;
        tracing::debug!(
            sps_len = config.sps.len(),
            pps_len = config.pps.len(),
            nalu_length_size = config.nalu_length_size,
            "Video decoder opened"
        );
        Ok(Self {
            config,
            backend: session,
        })
    }

    /// The config this session was built from
    pub fn config(&self) -> &VideoConfig {
        &self.config
    }

    /// Decode one unit. Yields zero or one sample whose timing is copied
    /// from the unit.
    pub fn decode(&mut self, unit: &VideoUnit) -> Result<Option<DecodedSample>> {
        let frame = self.backend.decode(unit).map_err(|e| {
            tracing::warn!(dts = unit.dts_ms, error = %e, "Video unit failed to decode");
            Error::Decoder(DecoderError::DecodeFailed {
                kind: MediaKind::Video,
            })
        })?;

        Ok(frame.map(|f| DecodedSample {
            media: MediaData::VideoFrame {
                pixels: f.pixels,
                format: VideoFormat {
                    width: f.width,
                    height: f.height,
                    pixel_format: f.pixel_format,
                },
            },
            // Input timing, by contract; f.backend_pts_ms is unreliable.
            pts_ms: unit.pts_ms,
            dts_ms: Some(unit.dts_ms),
            duration_ms: None,
        }))
    }
}
