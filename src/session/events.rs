//! Session output events
//!
//! Everything the session tells its subscriber is one tagged union,
//! published through a single channel so the subscriber observes a total
//! order: at most one state change per logical event, samples in emission
//! order.

use crate::decode::DecodedSample;
use crate::stats::PlaybackStats;

use super::state::SessionState;

/// One notification from the session to its subscriber
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Lifecycle transition
    StateChanged(SessionState),
    /// One decoded video frame with PTS and DTS
    VideoSample(DecodedSample),
    /// One decoded PCM buffer with PTS and duration
    AudioSample(DecodedSample),
    /// Picture dimensions and bitrate from stream metadata
    VideoConfigured {
        width: u32,
        height: u32,
        /// Video bitrate in kbps, when announced
        data_rate_kbps: Option<f64>,
    },
    /// Playback statistics snapshot
    Statistics(PlaybackStats),
    /// Resources were torn down (after stop or before a reconnect attempt)
    Cleanup,
}
