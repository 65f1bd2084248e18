//! RTMP tag payload classification
//!
//! Each RTMP audio/video message is an FLV tag body without the tag header.
//! The first byte of the payload identifies codec and framing:
//!
//! Video:
//! ```text
//! +----------+----------+
//! | FrameType| CodecID  | CodecData...
//! | (4 bits) | (4 bits) |
//! +----------+----------+
//! ```
//!
//! Audio:
//! ```text
//! +-----------+---------+----------+----------+
//! |SoundFormat|SoundRate|SoundSize |SoundType | AudioData...
//! | (4 bits)  | (2 bits)| (1 bit)  | (1 bit)  |
//! +-----------+---------+----------+----------+
//! ```
//!
//! For AAC the rate/size/type bits are not authoritative; the
//! `AudioSpecificConfig` in the sequence header is.

use bytes::Bytes;

/// Tag kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Video,
    Audio,
}

/// One RTMP audio or video message, immutable once received
#[derive(Debug, Clone)]
pub struct TagPayload {
    /// Tag kind
    pub kind: TagKind,
    /// Raw tag payload (including codec header bytes)
    pub data: Bytes,
    /// RTMP timestamp in milliseconds
    pub timestamp_ms: i64,
}

/// Video frame type (upper 4 bits of byte 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFrameType {
    /// Keyframe (for AVC, a seekable frame)
    Keyframe = 1,
    /// Inter frame
    InterFrame = 2,
    /// Disposable inter frame (H.263 only)
    DisposableInterFrame = 3,
    /// Generated keyframe (reserved for server use)
    GeneratedKeyframe = 4,
    /// Video info/command frame
    VideoInfoFrame = 5,
}

impl VideoFrameType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match (b >> 4) & 0x0F {
            1 => Some(VideoFrameType::Keyframe),
            2 => Some(VideoFrameType::InterFrame),
            3 => Some(VideoFrameType::DisposableInterFrame),
            4 => Some(VideoFrameType::GeneratedKeyframe),
            5 => Some(VideoFrameType::VideoInfoFrame),
            _ => None,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(self, VideoFrameType::Keyframe | VideoFrameType::GeneratedKeyframe)
    }
}

/// Video codec ID (lower 4 bits of byte 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodecId {
    /// Sorenson H.263
    SorensonH263 = 2,
    /// Screen video
    ScreenVideo = 3,
    /// VP6
    Vp6 = 4,
    /// VP6 with alpha
    Vp6Alpha = 5,
    /// Screen video v2
    ScreenVideoV2 = 6,
    /// AVC (H.264)
    Avc = 7,
}

impl VideoCodecId {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x0F {
            2 => Some(VideoCodecId::SorensonH263),
            3 => Some(VideoCodecId::ScreenVideo),
            4 => Some(VideoCodecId::Vp6),
            5 => Some(VideoCodecId::Vp6Alpha),
            6 => Some(VideoCodecId::ScreenVideoV2),
            7 => Some(VideoCodecId::Avc),
            _ => None,
        }
    }
}

/// Audio sound format (upper 4 bits of byte 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundFormat {
    /// Linear PCM, platform endian
    LinearPcmPlatform = 0,
    /// ADPCM
    Adpcm = 1,
    /// MP3
    Mp3 = 2,
    /// Linear PCM, little endian
    LinearPcmLe = 3,
    /// Nellymoser 16kHz mono
    Nellymoser16kMono = 4,
    /// Nellymoser 8kHz mono
    Nellymoser8kMono = 5,
    /// Nellymoser
    Nellymoser = 6,
    /// G.711 A-law
    G711ALaw = 7,
    /// G.711 mu-law
    G711MuLaw = 8,
    /// AAC
    Aac = 10,
    /// Speex
    Speex = 11,
}

impl SoundFormat {
    pub fn from_byte(b: u8) -> Option<Self> {
        match (b >> 4) & 0x0F {
            0 => Some(SoundFormat::LinearPcmPlatform),
            1 => Some(SoundFormat::Adpcm),
            2 => Some(SoundFormat::Mp3),
            3 => Some(SoundFormat::LinearPcmLe),
            4 => Some(SoundFormat::Nellymoser16kMono),
            5 => Some(SoundFormat::Nellymoser8kMono),
            6 => Some(SoundFormat::Nellymoser),
            7 => Some(SoundFormat::G711ALaw),
            8 => Some(SoundFormat::G711MuLaw),
            10 => Some(SoundFormat::Aac),
            11 => Some(SoundFormat::Speex),
            _ => None,
        }
    }
}

impl TagPayload {
    /// Create a new video tag
    pub fn video(timestamp_ms: i64, data: Bytes) -> Self {
        Self {
            kind: TagKind::Video,
            data,
            timestamp_ms,
        }
    }

    /// Create a new audio tag
    pub fn audio(timestamp_ms: i64, data: Bytes) -> Self {
        Self {
            kind: TagKind::Audio,
            data,
            timestamp_ms,
        }
    }

    /// For video tags, get the frame type
    pub fn video_frame_type(&self) -> Option<VideoFrameType> {
        if self.kind == TagKind::Video && !self.data.is_empty() {
            VideoFrameType::from_byte(self.data[0])
        } else {
            None
        }
    }

    /// For video tags, get the codec ID
    pub fn video_codec(&self) -> Option<VideoCodecId> {
        if self.kind == TagKind::Video && !self.data.is_empty() {
            VideoCodecId::from_byte(self.data[0])
        } else {
            None
        }
    }

    /// For audio tags, get the sound format
    pub fn sound_format(&self) -> Option<SoundFormat> {
        if self.kind == TagKind::Audio && !self.data.is_empty() {
            SoundFormat::from_byte(self.data[0])
        } else {
            None
        }
    }

    /// Check if this is a keyframe tag
    pub fn is_keyframe(&self) -> bool {
        self.video_frame_type()
            .map(|ft| ft.is_keyframe())
            .unwrap_or(false)
    }

    /// Cheap peek: AVC sequence header tag (`0x17 0x00 ...`)
    ///
    /// Used by the session to decide whether to initialize a video decoder
    /// before running the full parser.
    pub fn is_avc_sequence_header(&self) -> bool {
        self.kind == TagKind::Video
            && self.data.len() >= 2
            && self.video_codec() == Some(VideoCodecId::Avc)
            && self.data[1] == 0
    }

    /// Cheap peek: AAC sequence header tag (`(b0 & 0xF0) == 0xA0, b1 == 0x00`)
    pub fn is_aac_sequence_header(&self) -> bool {
        self.kind == TagKind::Audio
            && self.data.len() >= 2
            && self.sound_format() == Some(SoundFormat::Aac)
            && self.data[1] == 0
    }

    /// Size of the tag payload in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
