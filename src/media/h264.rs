//! H.264/AVC tag parsing
//!
//! RTMP transports H.264 in AVCC format (length-prefixed NAL units).
//!
//! AVC video tag payload:
//! ```text
//! +----------+----------+---------------+-----------------+------
//! |FrameType | CodecID  | AVCPacketType | CompositionTime | Data
//! | (4 bits) | (4 bits) | (1 byte)      | (3 bytes, SI24) |
//! +----------+----------+---------------+-----------------+------
//! ```
//!
//! AVCPacketType:
//! - 0: AVC sequence header (AVCDecoderConfigurationRecord)
//! - 1: AVC NALU (one or more NALUs)
//! - 2: AVC end of sequence
//!
//! AVCDecoderConfigurationRecord (sequence header):
//! ```text
//! configurationVersion (1) | AVCProfileIndication (1) | profile_compatibility (1)
//! | AVCLevelIndication (1) | lengthSizeMinusOne (1, lower 2 bits)
//! | numOfSPS (1, lower 5 bits) | { spsLength (2) | spsNALUnit }*
//! | numOfPPS (1) | { ppsLength (2) | ppsNALUnit }*
//! ```

use bytes::{Buf, Bytes};

use crate::error::{MediaError, Result};

/// AVC codec id in the video tag's low nibble
pub const CODEC_ID_AVC: u8 = 7;

/// AVC packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvcPacketType {
    /// Sequence header (AVCDecoderConfigurationRecord)
    SequenceHeader = 0,
    /// NAL units
    Nalu = 1,
    /// End of sequence
    EndOfSequence = 2,
}

impl AvcPacketType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(AvcPacketType::SequenceHeader),
            1 => Some(AvcPacketType::Nalu),
            2 => Some(AvcPacketType::EndOfSequence),
            _ => None,
        }
    }
}

/// NAL unit type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaluType {
    /// Non-IDR slice
    Slice = 1,
    /// IDR slice (keyframe)
    Idr = 5,
    /// Supplemental enhancement information
    Sei = 6,
    /// Sequence parameter set
    Sps = 7,
    /// Picture parameter set
    Pps = 8,
    /// Access unit delimiter
    Aud = 9,
    /// Filler data
    Filler = 12,
}

impl NaluType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x1F {
            1 => Some(NaluType::Slice),
            5 => Some(NaluType::Idr),
            6 => Some(NaluType::Sei),
            7 => Some(NaluType::Sps),
            8 => Some(NaluType::Pps),
            9 => Some(NaluType::Aud),
            12 => Some(NaluType::Filler),
            _ => None,
        }
    }

    pub fn is_parameter_set(&self) -> bool {
        matches!(self, NaluType::Sps | NaluType::Pps)
    }
}

/// Decoder bootstrap parsed from the AVC sequence header.
///
/// Only the first SPS and first PPS are retained; encoders that announce
/// more than one are tolerated but the extras are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConfig {
    /// First sequence parameter set
    pub sps: Bytes,
    /// First picture parameter set
    pub pps: Bytes,
    /// NALU length prefix width in bytes (1, 2 or 4)
    pub nalu_length_size: u8,
}

impl VideoConfig {
    /// Parse an AVCDecoderConfigurationRecord
    pub fn parse(mut data: Bytes) -> Result<Self> {
        if data.len() < 7 {
            return Err(MediaError::InvalidAvcConfig.into());
        }

        let version = data.get_u8();
        if version != 1 {
            return Err(MediaError::InvalidAvcConfig.into());
        }

        // profile, compatibility, level are carried inside the SPS as well
        data.advance(3);
        let nalu_length_size = (data.get_u8() & 0x03) + 1;
        if nalu_length_size == 3 {
            return Err(MediaError::InvalidAvcConfig.into());
        }

        let num_sps = (data.get_u8() & 0x1F) as usize;
        let mut sps: Option<Bytes> = None;
        for _ in 0..num_sps {
            if data.len() < 2 {
                return Err(MediaError::InvalidAvcConfig.into());
            }
            let len = data.get_u16() as usize;
            if data.len() < len {
                return Err(MediaError::InvalidAvcConfig.into());
            }
            let nalu = data.copy_to_bytes(len);
            if sps.is_none() {
                sps = Some(nalu);
            }
        }

        if data.is_empty() {
            return Err(MediaError::InvalidAvcConfig.into());
        }
        let num_pps = data.get_u8() as usize;
        let mut pps: Option<Bytes> = None;
        for _ in 0..num_pps {
            if data.len() < 2 {
                return Err(MediaError::InvalidAvcConfig.into());
            }
            let len = data.get_u16() as usize;
            if data.len() < len {
                return Err(MediaError::InvalidAvcConfig.into());
            }
            let nalu = data.copy_to_bytes(len);
            if pps.is_none() {
                pps = Some(nalu);
            }
        }

        let sps = sps.ok_or(MediaError::InvalidAvcConfig)?;
        let pps = pps.ok_or(MediaError::InvalidAvcConfig)?;
        if sps.len() < 4 || pps.is_empty() {
            return Err(MediaError::InvalidAvcConfig.into());
        }

        Ok(VideoConfig {
            sps,
            pps,
            nalu_length_size,
        })
    }

    /// Best-effort recovery when a keyframe arrives before any sequence
    /// header: scan the AVCC payload for inline SPS/PPS NAL units.
    ///
    /// Encoders that repeat parameter sets in-band ahead of each IDR make
    /// this work; returns `None` when the keyframe carries no parameter sets.
    pub fn probe_key_frame(avcc: &[u8]) -> Option<Self> {
        let mut sps: Option<Bytes> = None;
        let mut pps: Option<Bytes> = None;

        for nalu in NaluIter::new(avcc, 4) {
            match nalu.first().and_then(|b| NaluType::from_byte(*b)) {
                Some(NaluType::Sps) if sps.is_none() => {
                    sps = Some(Bytes::copy_from_slice(nalu));
                }
                Some(NaluType::Pps) if pps.is_none() => {
                    pps = Some(Bytes::copy_from_slice(nalu));
                }
                _ => {}
            }
        }

        match (sps, pps) {
            (Some(sps), Some(pps)) if sps.len() >= 4 => Some(VideoConfig {
                sps,
                pps,
                nalu_length_size: 4,
            }),
            _ => None,
        }
    }

    /// AVC profile indication (byte 1 of the SPS)
    pub fn profile(&self) -> u8 {
        self.sps[1]
    }

    /// AVC level indication (byte 3 of the SPS)
    pub fn level(&self) -> u8 {
        self.sps[3]
    }
}

/// Parsed AVC tag payload
#[derive(Debug, Clone)]
pub enum AvcPayload {
    /// Sequence header with SPS/PPS
    Config(VideoConfig),

    /// Coded frame data
    Nalu {
        /// Keyframe per the tag's frame-type nibble
        key_frame: bool,
        /// Signed composition time offset in milliseconds
        composition_time_ms: i32,
        /// NAL units in AVCC format (length-prefixed)
        data: Bytes,
    },

    /// End of sequence marker
    EndOfSequence,
}

impl AvcPayload {
    /// Parse a full video tag payload, starting at the FrameType/CodecID byte
    pub fn parse(mut data: Bytes) -> Result<Self> {
        if data.len() < 5 {
            return Err(MediaError::TruncatedPayload.into());
        }

        let b0 = data.get_u8();
        let codec_id = b0 & 0x0F;
        if codec_id != CODEC_ID_AVC {
            return Err(MediaError::UnsupportedVideoCodec(codec_id).into());
        }
        let frame_type = (b0 >> 4) & 0x0F;

        let packet_type = data.get_u8();
        let composition_time_ms = read_si24(&mut data);

        match AvcPacketType::from_byte(packet_type) {
            Some(AvcPacketType::SequenceHeader) => {
                let config = VideoConfig::parse(data)?;
                Ok(AvcPayload::Config(config))
            }
            Some(AvcPacketType::Nalu) => Ok(AvcPayload::Nalu {
                key_frame: frame_type == 1,
                composition_time_ms,
                data,
            }),
            Some(AvcPacketType::EndOfSequence) => Ok(AvcPayload::EndOfSequence),
            None => Err(MediaError::InvalidAvcPacket.into()),
        }
    }
}

/// Read a 24-bit big-endian signed value, sign-extending from bit 23
fn read_si24(data: &mut Bytes) -> i32 {
    let b0 = data.get_u8() as i32;
    let b1 = data.get_u8() as i32;
    let b2 = data.get_u8() as i32;
    let value = (b0 << 16) | (b1 << 8) | b2;
    if value & 0x80_0000 != 0 {
        value | !0xFF_FFFF
    } else {
        value
    }
}

/// A coded frame ready for decode, with rebased timing
#[derive(Debug, Clone)]
pub struct VideoUnit {
    /// Length-prefixed NAL units
    pub avcc: Bytes,
    /// Keyframe flag from the tag header
    pub key_frame: bool,
    /// Decode timestamp, milliseconds from session start
    pub dts_ms: i64,
    /// Presentation timestamp, milliseconds from session start
    pub pts_ms: i64,
}

/// Iterator over NAL units in an AVCC (length-prefixed) payload
pub struct NaluIter<'a> {
    data: &'a [u8],
    offset: usize,
    length_size: usize,
}

impl<'a> NaluIter<'a> {
    pub fn new(data: &'a [u8], nalu_length_size: u8) -> Self {
        Self {
            data,
            offset: 0,
            length_size: nalu_length_size as usize,
        }
    }
}

impl<'a> Iterator for NaluIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + self.length_size > self.data.len() {
            return None;
        }

        let mut len: usize = 0;
        for i in 0..self.length_size {
            len = (len << 8) | (self.data[self.offset + i] as usize);
        }
        self.offset += self.length_size;

        if self.offset + len > self.data.len() {
            return None;
        }

        let nalu = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Some(nalu)
    }
}
