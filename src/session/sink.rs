//! Renderer sink trait
//!
//! The main extension point for playback applications. Implement this trait
//! to receive decoded samples and lifecycle notifications; all methods have
//! default no-op implementations. Notifications are delivered on a single
//! logical task in a total order.

use std::sync::Arc;

use async_trait::async_trait;

use crate::decode::DecodedSample;
use crate::stats::{PerfMonitor, PlaybackStats};

use super::events::SessionEvent;
use super::state::SessionState;

/// Subscriber for session output
///
/// # Example
///
/// ```ignore
/// use rtmp_player::{RendererSink, DecodedSample};
///
/// struct MyRenderer;
///
/// #[async_trait::async_trait]
/// impl RendererSink for MyRenderer {
///     async fn on_video_sample(&self, sample: DecodedSample) {
///         // hand the frame to the display queue, ordered by sample.pts_ms
///     }
/// }
/// ```
#[async_trait]
pub trait RendererSink: Send + Sync + 'static {
    /// Called on every lifecycle transition
    async fn on_state_change(&self, _state: SessionState) {}

    /// Called with each decoded video frame (PTS and DTS set)
    async fn on_video_sample(&self, _sample: DecodedSample) {}

    /// Called with each decoded PCM buffer (PTS and duration set)
    async fn on_audio_sample(&self, _sample: DecodedSample) {}

    /// Called when stream metadata announces the picture dimensions
    async fn on_video_config(&self, _width: u32, _height: u32, _data_rate_kbps: Option<f64>) {}

    /// Called with periodic playback statistics
    async fn on_statistics(&self, _stats: PlaybackStats) {}

    /// Called after teardown: on `stop()` and before each reconnect attempt
    async fn on_cleanup(&self) {}
}

/// Dispatch one session event to the matching sink notification
pub(crate) async fn deliver<S: RendererSink + ?Sized>(sink: &S, event: SessionEvent) {
    match event {
        SessionEvent::StateChanged(state) => sink.on_state_change(state).await,
        SessionEvent::VideoSample(sample) => sink.on_video_sample(sample).await,
        SessionEvent::AudioSample(sample) => sink.on_audio_sample(sample).await,
        SessionEvent::VideoConfigured {
            width,
            height,
            data_rate_kbps,
        } => sink.on_video_config(width, height, data_rate_kbps).await,
        SessionEvent::Statistics(stats) => sink.on_statistics(stats).await,
        SessionEvent::Cleanup => sink.on_cleanup().await,
    }
}

/// A sink that logs every notification
pub struct LoggingSink;

#[async_trait]
impl RendererSink for LoggingSink {
    async fn on_state_change(&self, state: SessionState) {
        tracing::info!(state = %state, "Session state changed");
    }

    async fn on_video_sample(&self, sample: DecodedSample) {
        tracing::trace!(pts = sample.pts_ms, dts = ?sample.dts_ms, "Video sample");
    }

    async fn on_audio_sample(&self, sample: DecodedSample) {
        tracing::trace!(pts = sample.pts_ms, duration = ?sample.duration_ms, "Audio sample");
    }

    async fn on_video_config(&self, width: u32, height: u32, data_rate_kbps: Option<f64>) {
        tracing::info!(width, height, data_rate_kbps = ?data_rate_kbps, "Video configured");
    }

    async fn on_statistics(&self, stats: PlaybackStats) {
        tracing::debug!(
            fps = stats.fps,
            total = stats.total_frames,
            dropped = stats.dropped_frames,
            "Playback statistics"
        );
    }

    async fn on_cleanup(&self) {
        tracing::debug!("Session cleaned up");
    }
}

/// Decorator that counts presented frames into a [`PerfMonitor`] before
/// forwarding to the wrapped sink. Applied at construction time by
/// [`crate::session::Player`]; it is not swapped in at runtime.
pub struct MeteredSink<S> {
    inner: S,
    monitor: Arc<PerfMonitor>,
}

impl<S: RendererSink> MeteredSink<S> {
    pub fn new(inner: S, monitor: Arc<PerfMonitor>) -> Self {
        Self { inner, monitor }
    }
}

#[async_trait]
impl<S: RendererSink> RendererSink for MeteredSink<S> {
    async fn on_state_change(&self, state: SessionState) {
        self.inner.on_state_change(state).await;
    }

    async fn on_video_sample(&self, sample: DecodedSample) {
        self.monitor.record_frame();
        self.inner.on_video_sample(sample).await;
    }

    async fn on_audio_sample(&self, sample: DecodedSample) {
        self.inner.on_audio_sample(sample).await;
    }

    async fn on_video_config(&self, width: u32, height: u32, data_rate_kbps: Option<f64>) {
        self.inner.on_video_config(width, height, data_rate_kbps).await;
    }

    async fn on_statistics(&self, stats: PlaybackStats) {
        self.inner.on_statistics(stats).await;
    }

    async fn on_cleanup(&self) {
        self.inner.on_cleanup().await;
    }
}
