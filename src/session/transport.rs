//! RTMP transport interface (consumed)
//!
//! The transport library is an external collaborator; the session only
//! depends on this surface: start playback of a URL, tear the link down, and
//! six event streams (status, error, video, audio, metadata, statistics).

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;

/// Connection status notifications from the transport.
///
/// The session reacts to `Failed` (error path) and `PlayStart`/`Connect`
/// (promotion to playing); other variants are informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    HandshakeStart,
    HandshakeDone,
    Connect,
    PlayStart,
    Failed(String),
    Disconnected,
    Unknown,
}

/// Stream metadata from `onMetaData`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub framerate: Option<f64>,
    /// Video bitrate in kbps
    pub video_data_rate: Option<f64>,
    /// Audio bitrate in kbps
    pub audio_data_rate: Option<f64>,
}

/// Periodic transfer statistics from the transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStatistics {
    pub bytes_received: u64,
    /// Receive bitrate estimate in bits per second
    pub bitrate_bps: u64,
}

/// Control half of an open transport link
#[async_trait]
pub trait TransportControl: Send + Sync {
    /// Tear the connection down; further stream events stop
    async fn invalidate(&mut self);
}

/// An open transport link: control handle plus the six event streams.
///
/// Media streams yield `(payload, rtmp_timestamp_ms)` pairs; the payload is
/// the full FLV-style tag body starting at the codec header byte.
pub struct TransportLink {
    pub control: Box<dyn TransportControl>,
    pub status: mpsc::Receiver<TransportStatus>,
    pub errors: mpsc::Receiver<String>,
    pub video: mpsc::Receiver<(Bytes, i64)>,
    pub audio: mpsc::Receiver<(Bytes, i64)>,
    pub metadata: mpsc::Receiver<StreamMetadata>,
    pub statistics: mpsc::Receiver<TransportStatistics>,
}

/// Factory for transport links; one `play` call per connection attempt
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connect and start playing the stream at `url`.
    ///
    /// The overall connection timeout is the transport's responsibility.
    async fn play(&self, url: &str) -> Result<TransportLink>;
}
