//! AAC audio decoder wrapper
//!
//! Wraps an [`AudioDecode`] backend converting AAC-LC access units to
//! interleaved signed 16-bit PCM. The input format is fully described by the
//! `AudioConfig` fields, so no decoder-specific magic cookie is involved.

use bytes::Bytes;

use crate::error::{DecoderError, Error, MediaKind, Result};
use crate::media::aac::SAMPLES_PER_UNIT;
use crate::media::{AudioConfig, AudioUnit};

use super::backend::{AudioDecode, DecoderBackend};
use super::sample::{AudioFormat, DecodedSample, MediaData};

/// An open AAC-to-PCM conversion session bound to one `AudioConfig`
pub struct AudioDecoder {
    config: AudioConfig,
    format: AudioFormat,
    backend: Box<dyn AudioDecode>,
    /// Reused output buffer, one full access unit: 1024 * channels * 2 bytes
    out: Vec<u8>,
}

impl AudioDecoder {
    /// Build a conversion session: input AAC-LC at the config's rate and
    /// channel count, output interleaved S16 PCM at the same rate/channels.
    pub fn open(config: AudioConfig, backend: &dyn DecoderBackend) -> Result<Self> {
        let session = backend.open_audio(&config)?;
        let format = AudioFormat {
            sample_rate_hz: config.sample_rate_hz,
            channels: config.channels,
        };
        tracing::debug!(
            sample_rate = config.sample_rate_hz,
            channels = config.channels,
            "Audio decoder opened"
        );
        let out = vec![0u8; SAMPLES_PER_UNIT as usize * config.channels as usize * 2];
        Ok(Self {
            config,
            format,
            backend: session,
            out,
        })
    }

    /// The config this session was built from
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// The output PCM format
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Playout duration of one full access unit
    pub fn unit_duration_ms(&self) -> i64 {
        (SAMPLES_PER_UNIT as i64 * 1000) / self.config.sample_rate_hz as i64
    }

    /// Decode one access unit. The sample reports exactly the bytes the
    /// converter produced, which may be fewer than a full unit.
    pub fn decode(&mut self, unit: &AudioUnit) -> Result<Option<DecodedSample>> {
        let written = self.backend.decode_into(unit, &mut self.out).map_err(|e| {
            tracing::warn!(pts = unit.pts_ms, error = %e, "Audio unit failed to decode");
            Error::Decoder(DecoderError::DecodeFailed {
                kind: MediaKind::Audio,
            })
        })?;

        if written == 0 {
            return Ok(None);
        }
        let written = written.min(self.out.len());

        Ok(Some(DecodedSample {
            media: MediaData::AudioPcm {
                data: Bytes::copy_from_slice(&self.out[..written]),
                format: self.format,
            },
            pts_ms: unit.pts_ms,
            dts_ms: None,
            duration_ms: Some(self.unit_duration_ms()),
        }))
    }
}
