//! FFmpeg-backed decode sessions (feature `ffmpeg`)
//!
//! Default [`DecoderBackend`] built on `ac-ffmpeg`. FFmpeg picks up hardware
//! acceleration where the platform provides it (VideoToolbox on macOS,
//! DXVA2/D3D11VA on Windows, VAAPI on Linux).
//!
//! The H.264 session is fed Annex B data converted from the tag's AVCC
//! payload, with SPS/PPS injected ahead of keyframes; the AAC session is fed
//! ADTS-framed units so no out-of-band extradata is needed.

use bytes::{Bytes, BytesMut};

use ac_ffmpeg::codec::audio::AudioDecoder as FfAudioDecoder;
use ac_ffmpeg::codec::video::VideoDecoder as FfVideoDecoder;
use ac_ffmpeg::codec::Decoder;
use ac_ffmpeg::packet::PacketMut;
use ac_ffmpeg::time::{TimeBase, Timestamp};

use crate::error::{DecoderError, Error, MediaKind, Result};
use crate::media::aac::adts_header;
use crate::media::{AudioConfig, AudioUnit, NaluIter, VideoConfig, VideoUnit};

use super::backend::{AudioDecode, DecoderBackend, RawVideoFrame, VideoDecode};
use super::sample::PixelFormat;

const ANNEX_B_START: &[u8] = &[0x00, 0x00, 0x00, 0x01];

/// Decode sessions backed by FFmpeg
pub struct FfmpegBackend;

impl DecoderBackend for FfmpegBackend {
    fn open_video(&self, config: &VideoConfig) -> Result<Box<dyn VideoDecode>> {
        let decoder = FfVideoDecoder::builder("h264")
            .and_then(|b| b.time_base(TimeBase::new(1, 1000)).build())
            .map_err(|e| Error::Decoder(DecoderError::InitFailed(e.to_string())))?;

        Ok(Box::new(FfmpegVideo {
            decoder,
            config: config.clone(),
        }))
    }

    fn open_audio(&self, config: &AudioConfig) -> Result<Box<dyn AudioDecode>> {
        let decoder = FfAudioDecoder::new("aac")
            .map_err(|e| Error::Decoder(DecoderError::InitFailed(e.to_string())))?;

        Ok(Box::new(FfmpegAudio {
            decoder,
            config: config.clone(),
        }))
    }
}

struct FfmpegVideo {
    decoder: FfVideoDecoder,
    config: VideoConfig,
}

// The decoder handle is only ever driven from one task at a time.
unsafe impl Send for FfmpegVideo {}

impl FfmpegVideo {
    /// Convert the AVCC payload to Annex B, injecting parameter sets ahead
    /// of keyframes so the stream is self-contained.
    fn to_annex_b(&self, unit: &VideoUnit) -> Bytes {
        let mut out = BytesMut::with_capacity(unit.avcc.len() + 64);
        if unit.key_frame {
            out.extend_from_slice(ANNEX_B_START);
            out.extend_from_slice(&self.config.sps);
            out.extend_from_slice(ANNEX_B_START);
            out.extend_from_slice(&self.config.pps);
        }
        for nalu in NaluIter::new(&unit.avcc, self.config.nalu_length_size) {
            out.extend_from_slice(ANNEX_B_START);
            out.extend_from_slice(nalu);
        }
        out.freeze()
    }
}

impl VideoDecode for FfmpegVideo {
    fn decode(&mut self, unit: &VideoUnit) -> Result<Option<RawVideoFrame>> {
        let annex_b = self.to_annex_b(unit);
        let packet = PacketMut::from(annex_b.as_ref())
            .with_pts(Timestamp::new(unit.pts_ms, TimeBase::new(1, 1000)))
            .freeze();

        self.decoder.try_push(packet).map_err(|e| {
            tracing::warn!(error = %e, "FFmpeg rejected video packet");
            Error::Decoder(DecoderError::DecodeFailed {
                kind: MediaKind::Video,
            })
        })?;

        match self.decoder.take() {
            Ok(Some(frame)) => {
                let width = frame.width();
                let height = frame.height();
                let planes = frame.planes();
                if planes.len() < 3 {
                    return Err(Error::Decoder(DecoderError::DecodeFailed {
                        kind: MediaKind::Video,
                    }));
                }

                let pixels = pack_nv12(
                    width,
                    height,
                    planes[0].data(),
                    planes[0].line_size(),
                    planes[1].data(),
                    planes[1].line_size(),
                    planes[2].data(),
                    planes[2].line_size(),
                );

                Ok(Some(RawVideoFrame {
                    pixels,
                    width: width as u32,
                    height: height as u32,
                    pixel_format: PixelFormat::Nv12,
                    backend_pts_ms: frame.pts().as_millis(),
                }))
            }
            // Decoder is still buffering (reordering delay)
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "FFmpeg video take() failed");
                Err(Error::Decoder(DecoderError::DecodeFailed {
                    kind: MediaKind::Video,
                }))
            }
        }
    }
}

/// Pack planar YUV420 into bi-planar NV12 (full Y plane, interleaved UV),
/// stripping stride padding.
#[allow(clippy::too_many_arguments)]
fn pack_nv12(
    width: usize,
    height: usize,
    y: &[u8],
    y_stride: usize,
    u: &[u8],
    u_stride: usize,
    v: &[u8],
    v_stride: usize,
) -> Bytes {
    let cw = width / 2;
    let ch = height / 2;
    let mut out = BytesMut::with_capacity(width * height + cw * ch * 2);

    for row in 0..height {
        let start = row * y_stride;
        if start + width > y.len() {
            break;
        }
        out.extend_from_slice(&y[start..start + width]);
    }

    for row in 0..ch {
        let us = row * u_stride;
        let vs = row * v_stride;
        if us + cw > u.len() || vs + cw > v.len() {
            break;
        }
        for col in 0..cw {
            out.extend_from_slice(&[u[us + col], v[vs + col]]);
        }
    }

    out.freeze()
}

struct FfmpegAudio {
    decoder: FfAudioDecoder,
    config: AudioConfig,
}

unsafe impl Send for FfmpegAudio {}

impl AudioDecode for FfmpegAudio {
    fn decode_into(&mut self, unit: &AudioUnit, out: &mut [u8]) -> Result<usize> {
        // ADTS-frame the raw unit so the decoder is self-configuring
        let mut adts = BytesMut::with_capacity(unit.aac_raw.len() + 7);
        adts.extend_from_slice(&adts_header(&self.config, unit.aac_raw.len()));
        adts.extend_from_slice(&unit.aac_raw);

        let packet = PacketMut::from(adts.as_ref()).freeze();
        self.decoder.try_push(packet).map_err(|e| {
            tracing::warn!(error = %e, "FFmpeg rejected audio packet");
            Error::Decoder(DecoderError::DecodeFailed {
                kind: MediaKind::Audio,
            })
        })?;

        let mut written = 0usize;
        while let Ok(Some(frame)) = self.decoder.take() {
            written += write_s16_interleaved(
                &frame,
                self.config.channels as usize,
                &mut out[written..],
            )?;
            if written >= out.len() {
                break;
            }
        }

        Ok(written)
    }
}

/// Convert one decoded audio frame to interleaved S16LE, writing into `out`
/// and returning bytes written. Handles planar f32 (FFmpeg's default for
/// AAC) and interleaved/planar s16 layouts.
fn write_s16_interleaved(
    frame: &ac_ffmpeg::codec::audio::AudioFrame,
    channels: usize,
    out: &mut [u8],
) -> Result<usize> {
    let samples = frame.samples();
    if samples == 0 || channels == 0 {
        return Ok(0);
    }
    let planes = frame.planes();

    let want = samples * channels * 2;
    let limit = want.min(out.len());
    let frames_fit = limit / (channels * 2);

    if planes.len() >= channels {
        // Planar: one plane per channel
        if planes[0].data().len() >= samples * 4 {
            // f32 planes
            for i in 0..frames_fit {
                for (c, plane) in planes.iter().take(channels).enumerate() {
                    let raw = &plane.data()[i * 4..i * 4 + 4];
                    let v = f32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]);
                    let s = (v.clamp(-1.0, 1.0) * 32767.0) as i16;
                    let off = (i * channels + c) * 2;
                    out[off..off + 2].copy_from_slice(&s.to_le_bytes());
                }
            }
            return Ok(frames_fit * channels * 2);
        }
        if planes[0].data().len() >= samples * 2 {
            // s16 planes
            for i in 0..frames_fit {
                for (c, plane) in planes.iter().take(channels).enumerate() {
                    let raw = &plane.data()[i * 2..i * 2 + 2];
                    let off = (i * channels + c) * 2;
                    out[off..off + 2].copy_from_slice(raw);
                }
            }
            return Ok(frames_fit * channels * 2);
        }
    }

    if let Some(plane) = planes.first() {
        let data = plane.data();
        if data.len() >= samples * channels * 2 {
            // Already interleaved s16
            out[..limit].copy_from_slice(&data[..limit]);
            return Ok(limit);
        }
    }

    Err(Error::Decoder(DecoderError::DecodeFailed {
        kind: MediaKind::Audio,
    }))
}
