//! Decoded sample envelopes handed to the renderer

use bytes::Bytes;

/// Pixel layout of decoded video frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 4:2:0 8-bit bi-planar (full Y plane, interleaved UV plane)
    Nv12,
    /// 4:2:0 8-bit planar (separate Y, U, V planes)
    Yuv420p,
}

/// Format descriptor for decoded video frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

/// Format descriptor for decoded audio.
///
/// Samples are interleaved signed 16-bit PCM at the given rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate_hz: u32,
    pub channels: u8,
}

impl AudioFormat {
    /// Bytes per PCM frame (one sample for every channel)
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * 2
    }
}

/// Decoded media payload
#[derive(Debug, Clone)]
pub enum MediaData {
    /// One decoded video frame
    VideoFrame {
        /// Tightly packed pixel data in `format.pixel_format` layout
        pixels: Bytes,
        format: VideoFormat,
    },
    /// One access unit's worth of PCM
    AudioPcm {
        /// Interleaved signed 16-bit little-endian samples
        data: Bytes,
        format: AudioFormat,
    },
}

/// Output envelope: one decoded unit with its presentation timing
#[derive(Debug, Clone)]
pub struct DecodedSample {
    pub media: MediaData,
    /// Presentation timestamp, milliseconds from session start
    pub pts_ms: i64,
    /// Decode timestamp; video only
    pub dts_ms: Option<i64>,
    /// Playout duration; audio only
    pub duration_ms: Option<i64>,
}

impl DecodedSample {
    /// Whether this sample carries video
    pub fn is_video(&self) -> bool {
        matches!(self.media, MediaData::VideoFrame { .. })
    }

    /// Whether this sample carries audio
    pub fn is_audio(&self) -> bool {
        matches!(self.media, MediaData::AudioPcm { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_frame_size() {
        let stereo = AudioFormat {
            sample_rate_hz: 44100,
            channels: 2,
        };
        assert_eq!(stereo.bytes_per_frame(), 4);

        let mono = AudioFormat {
            sample_rate_hz: 8000,
            channels: 1,
        };
        assert_eq!(mono.bytes_per_frame(), 2);
    }

    #[test]
    fn test_sample_kind() {
        let sample = DecodedSample {
            media: MediaData::AudioPcm {
                data: Bytes::new(),
                format: AudioFormat {
                    sample_rate_hz: 48000,
                    channels: 2,
                },
            },
            pts_ms: 0,
            dts_ms: None,
            duration_ms: Some(21),
        };
        assert!(sample.is_audio());
        assert!(!sample.is_video());
    }
}
