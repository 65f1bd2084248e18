//! AAC audio tag parsing
//!
//! RTMP transports AAC in raw form (no ADTS headers).
//!
//! AAC audio tag payload:
//! ```text
//! +-----------+---------+----------+----------+---------+---------
//! |SoundFormat|SoundRate|SoundSize |SoundType | AACType | AACData
//! | (4 bits)  | (2 bits)| (1 bit)  | (1 bit)  | (1 byte)|
//! +-----------+---------+----------+----------+---------+---------
//! ```
//!
//! AACPacketType:
//! - 0: AAC sequence header (AudioSpecificConfig)
//! - 1: raw AAC access unit
//!
//! The rate/size/type bits of byte 0 are ignored for AAC; the
//! `AudioSpecificConfig` carried by the sequence header is authoritative.

use bytes::{Buf, Bytes};

use crate::error::{MediaError, Result};

/// AAC sound format id in the audio tag's high nibble
pub const SOUND_FORMAT_AAC: u8 = 10;

/// Samples per AAC-LC access unit
pub const SAMPLES_PER_UNIT: u32 = 1024;

/// AAC packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacPacketType {
    /// Sequence header (AudioSpecificConfig)
    SequenceHeader = 0,
    /// Raw AAC access unit
    Raw = 1,
}

impl AacPacketType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(AacPacketType::SequenceHeader),
            1 => Some(AacPacketType::Raw),
            _ => None,
        }
    }
}

/// Standard sampling frequencies by AudioSpecificConfig index.
/// Indices 13-15 are reserved.
const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Decoder bootstrap parsed from the AAC sequence header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConfig {
    /// Audio object type (2 = AAC-LC)
    pub audio_object_type: u8,
    /// Sampling frequency index into the standard table
    pub sample_rate_index: u8,
    /// Sampling frequency in Hz
    pub sample_rate_hz: u32,
    /// Channel count (1..=8)
    pub channels: u8,
}

impl AudioConfig {
    /// Parse the first two bytes of an AudioSpecificConfig:
    /// 5 bits object type, 4 bits sample-rate index, 4 bits channel config.
    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() < 2 {
            return Err(MediaError::InvalidAudioConfig.into());
        }

        let b0 = data[0];
        let b1 = data[1];

        let audio_object_type = (b0 >> 3) & 0x1F;
        let sample_rate_index = ((b0 & 0x07) << 1) | ((b1 >> 7) & 0x01);
        let channel_config = (b1 >> 3) & 0x0F;

        if sample_rate_index as usize >= SAMPLE_RATES.len() {
            return Err(MediaError::UnsupportedSampleRateIndex(sample_rate_index).into());
        }
        let sample_rate_hz = SAMPLE_RATES[sample_rate_index as usize];

        let channels = match channel_config {
            1..=6 => channel_config,
            7 => 8,
            _ => return Err(MediaError::InvalidAudioConfig.into()),
        };

        Ok(AudioConfig {
            audio_object_type,
            sample_rate_index,
            sample_rate_hz,
            channels,
        })
    }
}

/// Parsed AAC tag payload
#[derive(Debug, Clone)]
pub enum AacPayload {
    /// Sequence header (AudioSpecificConfig)
    Config(AudioConfig),

    /// Raw AAC access unit (no ADTS header)
    Raw(Bytes),
}

impl AacPayload {
    /// Parse a full audio tag payload, starting at the SoundFormat byte
    pub fn parse(mut data: Bytes) -> Result<Self> {
        if data.len() < 2 {
            return Err(MediaError::TruncatedPayload.into());
        }

        let b0 = data.get_u8();
        let sound_format = (b0 >> 4) & 0x0F;
        if sound_format != SOUND_FORMAT_AAC {
            return Err(MediaError::UnsupportedSoundFormat(sound_format).into());
        }

        let packet_type = data.get_u8();
        match AacPacketType::from_byte(packet_type) {
            Some(AacPacketType::SequenceHeader) => {
                let config = AudioConfig::parse(data)?;
                Ok(AacPayload::Config(config))
            }
            Some(AacPacketType::Raw) => Ok(AacPayload::Raw(data)),
            None => Err(MediaError::InvalidAacPacket.into()),
        }
    }
}

/// A coded AAC access unit with rebased timing
#[derive(Debug, Clone)]
pub struct AudioUnit {
    /// Raw AAC data, no ADTS header
    pub aac_raw: Bytes,
    /// Presentation timestamp, milliseconds from session start
    pub pts_ms: i64,
}

/// Generate a 7-byte ADTS header for a raw AAC access unit.
///
/// Decoders that expect self-describing packets (e.g. FFmpeg's `aac` decoder
/// without extradata) need each unit wrapped in ADTS framing.
pub fn adts_header(config: &AudioConfig, frame_length: usize) -> [u8; 7] {
    let profile = config.audio_object_type.saturating_sub(1); // ADTS uses profile - 1
    let freq_idx = config.sample_rate_index;
    let channels = config.channels & 0x07;

    // Frame length includes the 7-byte header itself
    let frame_len = frame_length + 7;

    let mut header = [0u8; 7];

    // Syncword (12 bits) + ID (1 bit) + Layer (2 bits) + Protection absent (1 bit)
    header[0] = 0xFF;
    header[1] = 0xF1; // MPEG-4, Layer 0, no CRC

    // Profile (2 bits) + Freq (4 bits) + Private (1 bit) + Channels high bit
    header[2] = ((profile & 0x03) << 6) | ((freq_idx & 0x0F) << 2) | ((channels >> 2) & 0x01);

    // Channels (2 bits) + Original + Home + Copyright bits + Length (2 bits)
    header[3] = ((channels & 0x03) << 6) | ((frame_len >> 11) & 0x03) as u8;

    // Length (8 bits)
    header[4] = ((frame_len >> 3) & 0xFF) as u8;

    // Length (3 bits) + Buffer fullness (5 bits)
    header[5] = (((frame_len & 0x07) << 5) | 0x1F) as u8;

    // Buffer fullness (6 bits) + Number of frames (2 bits)
    header[6] = 0xFC;

    header
}
