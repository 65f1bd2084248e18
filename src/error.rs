//! Unified error types for rtmp-player

use std::fmt;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Media kind, used to attribute per-unit decode failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Unified error type for all playback operations
#[derive(Debug)]
pub enum Error {
    /// Transport stream failure (connection lost, handshake failed, ...)
    Transport(String),
    /// Media bitstream parsing error
    Media(MediaError),
    /// Decoder construction or per-unit decode error
    Decoder(DecoderError),
    /// Operation not valid in the current session state
    InvalidState {
        /// Operation that was attempted
        op: &'static str,
        /// State the session was in
        state: String,
    },
    /// Restart requested but no URL was ever played
    NoUrl,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(msg) => write!(f, "Transport failed: {}", msg),
            Error::Media(e) => write!(f, "Media error: {}", e),
            Error::Decoder(e) => write!(f, "Decoder error: {}", e),
            Error::InvalidState { op, state } => {
                write!(f, "Invalid state for {}: {}", op, state)
            }
            Error::NoUrl => write!(f, "No URL to restart"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Media(e) => Some(e),
            Error::Decoder(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MediaError> for Error {
    fn from(err: MediaError) -> Self {
        Error::Media(err)
    }
}

impl From<DecoderError> for Error {
    fn from(err: DecoderError) -> Self {
        Error::Decoder(err)
    }
}

/// Media bitstream parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Video tag carries a codec other than AVC
    UnsupportedVideoCodec(u8),
    /// Audio tag carries a sound format other than AAC
    UnsupportedSoundFormat(u8),
    /// AudioSpecificConfig uses a reserved sample-rate index (13-15)
    UnsupportedSampleRateIndex(u8),
    /// AVCDecoderConfigurationRecord failed validation
    InvalidAvcConfig,
    /// AudioSpecificConfig failed validation
    InvalidAudioConfig,
    /// AVC packet structure is malformed
    InvalidAvcPacket,
    /// AAC packet structure is malformed
    InvalidAacPacket,
    /// Tag payload shorter than its fixed header
    TruncatedPayload,
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::UnsupportedVideoCodec(id) => {
                write!(f, "Unsupported video codec id: {}", id)
            }
            MediaError::UnsupportedSoundFormat(id) => {
                write!(f, "Unsupported sound format: {}", id)
            }
            MediaError::UnsupportedSampleRateIndex(idx) => {
                write!(f, "Reserved AAC sample-rate index: {}", idx)
            }
            MediaError::InvalidAvcConfig => write!(f, "Invalid AVC decoder configuration"),
            MediaError::InvalidAudioConfig => write!(f, "Invalid AudioSpecificConfig"),
            MediaError::InvalidAvcPacket => write!(f, "Invalid AVC packet"),
            MediaError::InvalidAacPacket => write!(f, "Invalid AAC packet"),
            MediaError::TruncatedPayload => write!(f, "Truncated tag payload"),
        }
    }
}

impl std::error::Error for MediaError {}

/// Decoder errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderError {
    /// Decoder session could not be created; fatal for the current play attempt
    InitFailed(String),
    /// The platform rejected the SPS/PPS pair
    FormatDescriptionInvalid,
    /// A single unit failed to decode; the unit is dropped and playback continues
    DecodeFailed {
        /// Which decoder failed
        kind: MediaKind,
    },
    /// No decode backend was compiled in or provided
    NoBackend,
}

impl fmt::Display for DecoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderError::InitFailed(msg) => write!(f, "Decoder init failed: {}", msg),
            DecoderError::FormatDescriptionInvalid => {
                write!(f, "Format description rejected by decoder")
            }
            DecoderError::DecodeFailed { kind } => write!(f, "Failed to decode {} unit", kind),
            DecoderError::NoBackend => write!(f, "No decode backend available"),
        }
    }
}

impl std::error::Error for DecoderError {}

impl Error {
    /// Whether this error is fatal for the current play attempt.
    ///
    /// Only transport failures and decoder construction failures transition
    /// the session to the error state; everything else is recovered locally.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::Decoder(DecoderError::InitFailed(_))
                | Error::Decoder(DecoderError::FormatDescriptionInvalid)
                | Error::Decoder(DecoderError::NoBackend)
        )
    }
}
