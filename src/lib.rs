//! rtmp-player: RTMP playback client core
//!
//! This library ingests a live RTMP stream and produces an ordered sequence
//! of decoded, timestamped audio and video samples ready for a display/audio
//! sink:
//! - FLV-style tag demultiplexing for AVC (H.264) video and AAC audio
//! - Codec bootstrap from `AVCDecoderConfigurationRecord` / `AudioSpecificConfig`
//! - Per-frame DTS/PTS reconstruction from RTMP timestamps and composition time
//! - A playback session with pause/resume, reconnect backoff and statistics
//!
//! The RTMP transport itself and the rendering layer are external: the
//! session consumes a [`Transport`] implementation and notifies a
//! [`RendererSink`]. Decoders plug in through [`decode::DecoderBackend`];
//! an FFmpeg-based backend ships behind the `ffmpeg` feature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rtmp_player::{Player, PlayerConfig, RendererSink, DecodedSample};
//!
//! struct MyRenderer;
//!
//! #[async_trait::async_trait]
//! impl RendererSink for MyRenderer {
//!     async fn on_video_sample(&self, sample: DecodedSample) {
//!         println!("frame pts={}ms", sample.pts_ms);
//!     }
//! }
//!
//! # async fn run(transport: Arc<dyn rtmp_player::Transport>,
//! #              backend: Arc<dyn rtmp_player::decode::DecoderBackend>) {
//! let player = Player::new(PlayerConfig::default(), transport, backend, MyRenderer);
//! player.play("rtmp://example.com/live/stream").await;
//! # }
//! ```

pub mod decode;
pub mod error;
pub mod media;
pub mod session;
pub mod stats;

// Re-export main types for convenience
pub use decode::{AudioFormat, DecodedSample, MediaData, PixelFormat, VideoFormat};
pub use error::{Error, Result};
pub use media::{AudioConfig, AudioUnit, TagPayload, VideoConfig, VideoUnit};
pub use session::{
    LoggingSink, Player, PlayerConfig, RendererSink, SessionEvent, SessionState, Transport,
    TransportLink, TransportStatus,
};
pub use stats::{PerfMonitor, PlaybackStats};
