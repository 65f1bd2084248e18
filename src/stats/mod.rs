//! Statistics and metrics
//!
//! Provides observability into playback performance.

pub mod monitor;

pub use monitor::{PerfMonitor, PlaybackStats};
