//! Playback session management
//!
//! This module manages the playback lifecycle:
//! - Session state machine (idle, connecting, playing, paused, stopped, error)
//! - Reconnect policy with linear backoff
//! - Dispatch of transport events into the demux/decode pipeline
//! - The renderer sink interface and its metering decorator

pub mod events;
pub mod player;
pub mod sink;
pub mod state;
pub mod transport;

pub use events::SessionEvent;
pub use player::{Player, PlayerConfig};
pub use sink::{LoggingSink, MeteredSink, RendererSink};
pub use state::SessionState;
pub use transport::{
    StreamMetadata, Transport, TransportControl, TransportLink, TransportStatistics,
    TransportStatus,
};
