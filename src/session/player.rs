//! Playback session
//!
//! The session owns the transport link, the decoders, the timestamp bases
//! and the reconnect timer. All mutation happens on one task; the public
//! [`Player`] handle posts operations onto that task and awaits an
//! acknowledgement, so `stop()` is synchronous from the caller's view.
//!
//! Per connection the session spawns one forwarder task per transport stream
//! (status, error, video, audio, metadata, statistics), funneling into a
//! single ordered feed. Tags are demultiplexed and decoded in feed order,
//! which serializes sample emission per media kind; cross-kind alignment is
//! the renderer's job, using the PTS values.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

use crate::decode::{AudioDecoder, DecoderBackend, VideoDecoder};
use crate::error::Error;
use crate::media::{
    AacPayload, AudioUnit, AvcPayload, TagPayload, Timeline, VideoCodecId, VideoConfig, VideoUnit,
};
use crate::media::flv::SoundFormat;
use crate::stats::{PerfMonitor, PlaybackStats};

use super::events::SessionEvent;
use super::sink::{deliver, MeteredSink, RendererSink};
use super::state::SessionState;
use super::transport::{
    StreamMetadata, Transport, TransportControl, TransportLink, TransportStatistics,
    TransportStatus,
};

/// Retries stop after this many consecutive failures
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Reconnect delay grows by this step per attempt (2 s, 4 s, 6 s)
const RECONNECT_STEP: Duration = Duration::from_secs(2);

/// Session configuration
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Reconnect automatically on transport failure
    pub auto_reconnect: bool,

    /// Capacity of the subscriber event channel
    pub event_capacity: usize,

    /// Capacity of the internal transport feed
    pub feed_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            event_capacity: 256,
            feed_capacity: 1024,
        }
    }
}

/// Operations posted to the session task
enum Command {
    Play { url: String, done: oneshot::Sender<()> },
    Pause { done: oneshot::Sender<()> },
    Resume { done: oneshot::Sender<()> },
    Stop { done: oneshot::Sender<()> },
    Restart { done: oneshot::Sender<()> },
}

/// Transport stream events, unified into one ordered feed
enum FeedEvent {
    Status(TransportStatus),
    TransportError(String),
    Video(Bytes, i64),
    Audio(Bytes, i64),
    Metadata(StreamMetadata),
    Statistics(TransportStatistics),
}

/// Handle to a playback session.
///
/// Dropping the handle shuts the session down.
pub struct Player {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<SessionState>,
    monitor: Arc<PerfMonitor>,
}

impl Player {
    /// Spawn a playback session.
    ///
    /// The sink is wrapped in a [`MeteredSink`] so presented frames are
    /// counted into this player's monitor. Must be called within a tokio
    /// runtime.
    pub fn new<S: RendererSink>(
        config: PlayerConfig,
        transport: Arc<dyn Transport>,
        backend: Arc<dyn DecoderBackend>,
        sink: S,
    ) -> Self {
        let monitor = Arc::new(PerfMonitor::new());
        let metered = MeteredSink::new(sink, Arc::clone(&monitor));

        let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(config.event_capacity);
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                deliver(&metered, event).await;
            }
        });

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let session = Session {
            config,
            transport,
            backend,
            events: event_tx,
            state_tx,
            monitor: Arc::clone(&monitor),
            state: SessionState::Idle,
            url: None,
            attempts: 0,
            retry_at: None,
            link: None,
            feed: None,
            forwarders: Vec::new(),
            video: None,
            audio: None,
            timeline: Timeline::new(),
            warned_video_codec: false,
            warned_audio_codec: false,
        };
        tokio::spawn(session.run(cmd_rx));

        Self {
            cmd_tx,
            state_rx,
            monitor,
        }
    }

    async fn post(&self, make: impl FnOnce(oneshot::Sender<()>) -> Command) {
        let (done, ack) = oneshot::channel();
        if self.cmd_tx.send(make(done)).is_ok() {
            let _ = ack.await;
        }
    }

    /// Start playing `url`. Valid from idle, stopped and error; ignored
    /// (with a log) otherwise.
    pub async fn play(&self, url: impl Into<String>) {
        let url = url.into();
        self.post(|done| Command::Play { url, done }).await;
    }

    /// Suspend playback. Incoming media is discarded while paused.
    pub async fn pause(&self) {
        self.post(|done| Command::Pause { done }).await;
    }

    /// Resume from pause.
    pub async fn resume(&self) {
        self.post(|done| Command::Resume { done }).await;
    }

    /// Stop playback and release all resources. Always valid; idempotent.
    pub async fn stop(&self) {
        self.post(|done| Command::Stop { done }).await;
    }

    /// Tear down and replay the last URL.
    pub async fn restart(&self) {
        self.post(|done| Command::Restart { done }).await;
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    /// Snapshot of playback statistics
    pub fn stats(&self) -> PlaybackStats {
        self.monitor.current_stats()
    }

    /// The session's performance monitor
    pub fn monitor(&self) -> &Arc<PerfMonitor> {
        &self.monitor
    }
}

struct Session {
    config: PlayerConfig,
    transport: Arc<dyn Transport>,
    backend: Arc<dyn DecoderBackend>,
    events: mpsc::Sender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
    monitor: Arc<PerfMonitor>,

    state: SessionState,
    url: Option<String>,
    attempts: u32,
    retry_at: Option<Instant>,

    link: Option<Box<dyn TransportControl>>,
    feed: Option<mpsc::Receiver<FeedEvent>>,
    forwarders: Vec<JoinHandle<()>>,

    video: Option<VideoDecoder>,
    audio: Option<AudioDecoder>,
    timeline: Timeline,

    warned_video_codec: bool,
    warned_audio_codec: bool,
}

/// Receive from the feed when a link is up, never resolving otherwise
async fn recv_feed(feed: &mut Option<mpsc::Receiver<FeedEvent>>) -> Option<FeedEvent> {
    match feed {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Resolve at the reconnect deadline, never resolving when none is set
async fn wait_retry(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl Session {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    // Handle dropped: shut down
                    None => break,
                },
                event = recv_feed(&mut self.feed) => match event {
                    Some(event) => self.handle_feed(event).await,
                    None => self.on_feed_closed().await,
                },
                _ = wait_retry(self.retry_at) => {
                    self.retry_at = None;
                    self.reconnect().await;
                }
            }
        }
        self.teardown(false).await;
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Play { url, done } => {
                self.cmd_play(url).await;
                let _ = done.send(());
            }
            Command::Pause { done } => {
                self.cmd_pause().await;
                let _ = done.send(());
            }
            Command::Resume { done } => {
                self.cmd_resume().await;
                let _ = done.send(());
            }
            Command::Stop { done } => {
                self.cmd_stop().await;
                let _ = done.send(());
            }
            Command::Restart { done } => {
                self.cmd_restart().await;
                let _ = done.send(());
            }
        }
    }

    async fn cmd_play(&mut self, url: String) {
        if !self.state.accepts_play() {
            let e = Error::InvalidState {
                op: "play",
                state: self.state.to_string(),
            };
            tracing::warn!(error = %e, "play() ignored");
            return;
        }

        tracing::info!(url = %url, "Starting playback");
        self.url = Some(url);
        self.attempts = 0;
        self.retry_at = None;
        self.timeline.reset();
        self.monitor.start();
        self.set_state(SessionState::Connecting).await;
        self.connect().await;
    }

    async fn cmd_pause(&mut self) {
        if self.state != SessionState::Playing {
            let e = Error::InvalidState {
                op: "pause",
                state: self.state.to_string(),
            };
            tracing::warn!(error = %e, "pause() ignored");
            return;
        }
        self.set_state(SessionState::Paused).await;
    }

    async fn cmd_resume(&mut self) {
        if self.state != SessionState::Paused {
            let e = Error::InvalidState {
                op: "resume",
                state: self.state.to_string(),
            };
            tracing::warn!(error = %e, "resume() ignored");
            return;
        }
        self.set_state(SessionState::Playing).await;
    }

    async fn cmd_stop(&mut self) {
        self.retry_at = None;
        self.teardown(true).await;
        self.set_state(SessionState::Stopped).await;
    }

    async fn cmd_restart(&mut self) {
        let url = match self.url.clone() {
            Some(url) => url,
            None => {
                tracing::warn!(error = %Error::NoUrl, "restart() ignored");
                return;
            }
        };

        tracing::info!(url = %url, "Restarting playback");
        self.retry_at = None;
        self.teardown(true).await;
        self.attempts = 0;
        self.monitor.start();
        self.set_state(SessionState::Connecting).await;
        self.connect().await;
    }

    /// Open the transport and wire its streams into the feed
    async fn connect(&mut self) {
        let url = match self.url.clone() {
            Some(url) => url,
            None => return,
        };

        match self.transport.play(&url).await {
            Ok(link) => self.attach_link(link),
            Err(e) => self.on_transport_failure(e.to_string()).await,
        }
    }

    fn attach_link(&mut self, link: TransportLink) {
        let (tx, rx) = mpsc::channel(self.config.feed_capacity);
        let TransportLink {
            control,
            status,
            errors,
            video,
            audio,
            metadata,
            statistics,
        } = link;

        self.link = Some(control);
        self.feed = Some(rx);
        self.forwarders = vec![
            forward(status, tx.clone(), FeedEvent::Status),
            forward(errors, tx.clone(), FeedEvent::TransportError),
            forward(video, tx.clone(), |(data, ts)| FeedEvent::Video(data, ts)),
            forward(audio, tx.clone(), |(data, ts)| FeedEvent::Audio(data, ts)),
            forward(metadata, tx.clone(), FeedEvent::Metadata),
            forward(statistics, tx, FeedEvent::Statistics),
        ];
    }

    /// Scheduled retry fired
    async fn reconnect(&mut self) {
        if self.url.is_none() {
            return;
        }
        tracing::info!(attempt = self.attempts, "Reconnecting");
        self.connect().await;
    }

    async fn handle_feed(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Status(status) => self.on_status(status).await,
            FeedEvent::TransportError(cause) => self.on_transport_failure(cause).await,
            FeedEvent::Video(data, ts) => self.on_video_tag(data, ts).await,
            FeedEvent::Audio(data, ts) => self.on_audio_tag(data, ts).await,
            FeedEvent::Metadata(meta) => self.on_metadata(meta).await,
            FeedEvent::Statistics(stats) => self.on_statistics(stats).await,
        }
    }

    /// All stream senders went away without an error event
    async fn on_feed_closed(&mut self) {
        self.feed = None;
        if self.link.is_some() {
            self.on_transport_failure("transport streams ended".into()).await;
        }
    }

    async fn on_status(&mut self, status: TransportStatus) {
        match status {
            TransportStatus::PlayStart | TransportStatus::Connect => {
                self.promote_to_playing().await;
            }
            TransportStatus::Failed(cause) => {
                self.on_transport_failure(cause).await;
            }
            other => {
                tracing::trace!(status = ?other, "Transport status");
            }
        }
    }

    /// Server confirmed playback, or first media arrived while waiting
    async fn promote_to_playing(&mut self) {
        if self.state.accepts_promotion() {
            self.attempts = 0;
            self.set_state(SessionState::Playing).await;
        }
    }

    async fn on_transport_failure(&mut self, cause: String) {
        tracing::error!(error = %cause, "Transport failed");
        self.teardown(true).await;
        self.set_state(SessionState::Error(cause)).await;

        if !self.config.auto_reconnect || self.url.is_none() {
            return;
        }
        if self.attempts >= MAX_RECONNECT_ATTEMPTS {
            tracing::warn!(attempts = self.attempts, "Reconnect attempts exhausted");
            return;
        }

        self.attempts += 1;
        let delay = RECONNECT_STEP * self.attempts;
        tracing::info!(
            attempt = self.attempts,
            delay_s = delay.as_secs(),
            "Scheduling reconnect"
        );
        self.retry_at = Some(Instant::now() + delay);
    }

    /// Decoder construction failed: fatal for this play attempt, no retry
    async fn on_decoder_failure(&mut self, error: Error) {
        tracing::error!(error = %error, "Decoder initialization failed");
        let cause = error.to_string();
        self.teardown(true).await;
        self.set_state(SessionState::Error(cause)).await;
    }

    async fn on_video_tag(&mut self, data: Bytes, timestamp_ms: i64) {
        if self.state == SessionState::Paused {
            return;
        }
        self.promote_to_playing().await;

        let tag = TagPayload::video(timestamp_ms, data);
        if tag.size() < 2 {
            tracing::warn!(len = tag.size(), "Truncated video tag dropped");
            return;
        }

        if tag.video_codec() != Some(VideoCodecId::Avc) {
            if !self.warned_video_codec {
                self.warned_video_codec = true;
                tracing::warn!(
                    codec_id = tag.data[0] & 0x0F,
                    "Unsupported video codec; dropping tags"
                );
            }
            return;
        }

        // Cheap header peek; the full parse below stays authoritative and
        // classifies the tag either way
        let peeked_config = tag.is_avc_sequence_header();

        match AvcPayload::parse(tag.data.clone()) {
            Ok(AvcPayload::Config(config)) => {
                if let Err(e) = self.ensure_video_decoder(config) {
                    self.on_decoder_failure(e).await;
                }
            }
            Ok(AvcPayload::Nalu {
                key_frame,
                composition_time_ms,
                data,
            }) => {
                let (dts_ms, pts_ms) = self
                    .timeline
                    .video_times(tag.timestamp_ms, composition_time_ms);
                let unit = VideoUnit {
                    avcc: data,
                    key_frame,
                    dts_ms,
                    pts_ms,
                };
                self.decode_video_unit(unit).await;
            }
            Ok(AvcPayload::EndOfSequence) => {}
            Err(e) if peeked_config => {
                // The stream may still play once a valid config arrives
                tracing::warn!(error = %e, "Malformed video config dropped");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Video tag dropped");
            }
        }
    }

    async fn decode_video_unit(&mut self, unit: VideoUnit) {
        if self.video.is_none() {
            if !unit.key_frame {
                self.monitor.record_dropped_frame();
                return;
            }
            // Cold start: no sequence header seen yet. Probe the keyframe
            // for inline parameter sets before giving up on it.
            match VideoConfig::probe_key_frame(&unit.avcc) {
                Some(config) => {
                    tracing::info!("Recovered video config from keyframe parameter sets");
                    if let Err(e) = self.ensure_video_decoder(config) {
                        self.on_decoder_failure(e).await;
                        return;
                    }
                }
                None => {
                    tracing::warn!("Keyframe before sequence header; dropped");
                    self.monitor.record_dropped_frame();
                    return;
                }
            }
        }

        let result = match self.video.as_mut() {
            Some(decoder) => decoder.decode(&unit),
            None => return,
        };
        match result {
            Ok(Some(sample)) => self.emit(SessionEvent::VideoSample(sample)).await,
            Ok(None) => {}
            Err(e) => {
                self.monitor.record_dropped_frame();
                tracing::debug!(dts = unit.dts_ms, error = %e, "Video unit dropped");
            }
        }
    }

    fn ensure_video_decoder(&mut self, config: VideoConfig) -> crate::error::Result<()> {
        if let Some(current) = &self.video {
            if current.config() == &config {
                tracing::debug!("Identical video config re-announced; decoder kept");
                return Ok(());
            }
        }
        self.video = Some(VideoDecoder::open(config, self.backend.as_ref())?);
        Ok(())
    }

    async fn on_audio_tag(&mut self, data: Bytes, timestamp_ms: i64) {
        if self.state == SessionState::Paused {
            return;
        }
        self.promote_to_playing().await;

        let tag = TagPayload::audio(timestamp_ms, data);
        if tag.size() < 2 {
            tracing::warn!(len = tag.size(), "Truncated audio tag dropped");
            return;
        }

        if tag.sound_format() != Some(SoundFormat::Aac) {
            if !self.warned_audio_codec {
                self.warned_audio_codec = true;
                tracing::warn!(
                    format = (tag.data[0] >> 4) & 0x0F,
                    "Unsupported sound format; dropping tags"
                );
            }
            return;
        }

        // Same advisory peek as the video path
        let peeked_config = tag.is_aac_sequence_header();

        match AacPayload::parse(tag.data.clone()) {
            Ok(AacPayload::Config(config)) => {
                if let Err(e) = self.ensure_audio_decoder(config) {
                    self.on_decoder_failure(e).await;
                }
            }
            Ok(AacPayload::Raw(data)) => {
                let pts_ms = self.timeline.audio_pts(tag.timestamp_ms);
                let unit = AudioUnit { aac_raw: data, pts_ms };
                self.decode_audio_unit(unit).await;
            }
            Err(e) if peeked_config => {
                tracing::warn!(error = %e, "Malformed audio config dropped");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Audio tag dropped");
            }
        }
    }

    async fn decode_audio_unit(&mut self, unit: AudioUnit) {
        let result = match self.audio.as_mut() {
            Some(decoder) => decoder.decode(&unit),
            None => {
                tracing::debug!("Audio unit before sequence header; dropped");
                return;
            }
        };
        match result {
            Ok(Some(sample)) => self.emit(SessionEvent::AudioSample(sample)).await,
            Ok(None) => {}
            Err(e) => {
                self.monitor.record_dropped_frame();
                tracing::debug!(pts = unit.pts_ms, error = %e, "Audio unit dropped");
            }
        }
    }

    fn ensure_audio_decoder(&mut self, config: crate::media::AudioConfig) -> crate::error::Result<()> {
        if let Some(current) = &self.audio {
            if current.config() == &config {
                tracing::debug!("Identical audio config re-announced; decoder kept");
                return Ok(());
            }
        }
        self.audio = Some(AudioDecoder::open(config, self.backend.as_ref())?);
        Ok(())
    }

    async fn on_metadata(&mut self, meta: StreamMetadata) {
        if let (Some(width), Some(height)) = (meta.width, meta.height) {
            self.emit(SessionEvent::VideoConfigured {
                width,
                height,
                data_rate_kbps: meta.video_data_rate,
            })
            .await;
        }
    }

    async fn on_statistics(&mut self, transport: TransportStatistics) {
        tracing::trace!(
            bytes = transport.bytes_received,
            bitrate = transport.bitrate_bps,
            "Transport statistics"
        );
        self.emit(SessionEvent::Statistics(self.monitor.current_stats()))
            .await;
    }

    /// Release the link, the decoders and the timestamp bases.
    ///
    /// Aborting the forwarders and dropping the feed discards any events the
    /// dying link still had in flight.
    async fn teardown(&mut self, emit_cleanup: bool) {
        let had_resources =
            self.link.is_some() || self.video.is_some() || self.audio.is_some();

        for task in self.forwarders.drain(..) {
            task.abort();
        }
        self.feed = None;
        if let Some(mut control) = self.link.take() {
            control.invalidate().await;
        }
        self.video = None;
        self.audio = None;
        self.timeline.reset();
        self.warned_video_codec = false;
        self.warned_audio_codec = false;

        if emit_cleanup && had_resources {
            self.emit(SessionEvent::Cleanup).await;
        }
    }

    async fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        tracing::debug!(from = %self.state, to = %next, "State transition");
        self.state = next.clone();
        self.state_tx.send_replace(next.clone());
        self.emit(SessionEvent::StateChanged(next)).await;
    }

    async fn emit(&self, event: SessionEvent) {
        // Bounded send: the session waits rather than dropping output
        let _ = self.events.send(event).await;
    }
}

fn forward<T: Send + 'static>(
    mut rx: mpsc::Receiver<T>,
    tx: mpsc::Sender<FeedEvent>,
    map: impl Fn(T) -> FeedEvent + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            if tx.send(map(item)).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::backend::{AudioDecode, RawVideoFrame, VideoDecode};
    use crate::decode::{DecodedSample, PixelFormat};
    use crate::error::{DecoderError, MediaKind, Result};
    use crate::media::AudioConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    // --- transport mock -------------------------------------------------

    struct MockHandles {
        status: mpsc::Sender<TransportStatus>,
        errors: mpsc::Sender<String>,
        video: mpsc::Sender<(Bytes, i64)>,
        audio: mpsc::Sender<(Bytes, i64)>,
        metadata: mpsc::Sender<StreamMetadata>,
        statistics: mpsc::Sender<TransportStatistics>,
        invalidated: Arc<AtomicBool>,
    }

    struct MockControl {
        invalidated: Arc<AtomicBool>,
    }

    #[async_trait]
    impl TransportControl for MockControl {
        async fn invalidate(&mut self) {
            self.invalidated.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct MockTransport {
        plays: StdMutex<Vec<String>>,
        conns: StdMutex<Vec<MockHandles>>,
    }

    impl MockTransport {
        fn play_count(&self) -> usize {
            self.plays.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn play(&self, url: &str) -> Result<TransportLink> {
            self.plays.lock().unwrap().push(url.to_string());

            let (status_tx, status_rx) = mpsc::channel(16);
            let (errors_tx, errors_rx) = mpsc::channel(16);
            let (video_tx, video_rx) = mpsc::channel(64);
            let (audio_tx, audio_rx) = mpsc::channel(64);
            let (metadata_tx, metadata_rx) = mpsc::channel(16);
            let (statistics_tx, statistics_rx) = mpsc::channel(16);
            let invalidated = Arc::new(AtomicBool::new(false));

            self.conns.lock().unwrap().push(MockHandles {
                status: status_tx,
                errors: errors_tx,
                video: video_tx,
                audio: audio_tx,
                metadata: metadata_tx,
                statistics: statistics_tx,
                invalidated: Arc::clone(&invalidated),
            });

            Ok(TransportLink {
                control: Box::new(MockControl { invalidated }),
                status: status_rx,
                errors: errors_rx,
                video: video_rx,
                audio: audio_rx,
                metadata: metadata_rx,
                statistics: statistics_rx,
            })
        }
    }

    // --- decoder mock ---------------------------------------------------

    struct MockVideoSession {
        fail: bool,
    }

    impl VideoDecode for MockVideoSession {
        fn decode(&mut self, _unit: &VideoUnit) -> Result<Option<RawVideoFrame>> {
            if self.fail {
                return Err(Error::Decoder(DecoderError::DecodeFailed {
                    kind: MediaKind::Video,
                }));
            }
            Ok(Some(RawVideoFrame {
                pixels: Bytes::from_static(&[0u8; 24]),
                width: 4,
                height: 4,
                pixel_format: PixelFormat::Nv12,
                backend_pts_ms: Some(-1),
            }))
        }
    }

    struct MockAudioSession;

    impl AudioDecode for MockAudioSession {
        fn decode_into(&mut self, _unit: &AudioUnit, out: &mut [u8]) -> Result<usize> {
            out.fill(0x22);
            Ok(out.len())
        }
    }

    #[derive(Default)]
    struct MockBackend {
        video_opens: AtomicUsize,
        audio_opens: AtomicUsize,
        fail_open: AtomicBool,
        fail_decode: AtomicBool,
    }

    impl DecoderBackend for MockBackend {
        fn open_video(&self, _config: &VideoConfig) -> Result<Box<dyn VideoDecode>> {
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(Error::Decoder(DecoderError::FormatDescriptionInvalid));
            }
            self.video_opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockVideoSession {
                fail: self.fail_decode.load(Ordering::SeqCst),
            }))
        }

        fn open_audio(&self, _config: &AudioConfig) -> Result<Box<dyn AudioDecode>> {
            self.audio_opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockAudioSession))
        }
    }

    // --- recording sink -------------------------------------------------

    #[derive(Default)]
    struct RecordingSink {
        states: StdMutex<Vec<SessionState>>,
        video: StdMutex<Vec<DecodedSample>>,
        audio: StdMutex<Vec<DecodedSample>>,
        configs: StdMutex<Vec<(u32, u32)>>,
        stats: StdMutex<Vec<PlaybackStats>>,
        cleanups: AtomicUsize,
    }

    #[async_trait]
    impl RendererSink for Arc<RecordingSink> {
        async fn on_state_change(&self, state: SessionState) {
            self.states.lock().unwrap().push(state);
        }
        async fn on_video_sample(&self, sample: DecodedSample) {
            self.video.lock().unwrap().push(sample);
        }
        async fn on_audio_sample(&self, sample: DecodedSample) {
            self.audio.lock().unwrap().push(sample);
        }
        async fn on_video_config(&self, width: u32, height: u32, _data_rate_kbps: Option<f64>) {
            self.configs.lock().unwrap().push((width, height));
        }
        async fn on_statistics(&self, stats: PlaybackStats) {
            self.stats.lock().unwrap().push(stats);
        }
        async fn on_cleanup(&self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
    }

    // --- tag builders ---------------------------------------------------

    const SPS: &[u8] = &[0x67, 0x42, 0x00, 0x1E, 0x9A, 0x66, 0x02, 0x80];
    const PPS: &[u8] = &[0x68, 0xCE, 0x06, 0xE2];

    fn video_config_tag() -> Bytes {
        let mut tag = vec![0x17, 0x00, 0x00, 0x00, 0x00];
        tag.extend_from_slice(&[0x01, 0x42, 0x00, 0x1E, 0xFF]);
        tag.push(0xE1);
        tag.extend_from_slice(&(SPS.len() as u16).to_be_bytes());
        tag.extend_from_slice(SPS);
        tag.push(0x01);
        tag.extend_from_slice(&(PPS.len() as u16).to_be_bytes());
        tag.extend_from_slice(PPS);
        Bytes::from(tag)
    }

    fn video_frame_tag(key_frame: bool, composition_time: i32) -> Bytes {
        let b0 = if key_frame { 0x17 } else { 0x27 };
        let ct = composition_time & 0xFF_FFFF;
        let mut tag = vec![
            b0,
            0x01,
            ((ct >> 16) & 0xFF) as u8,
            ((ct >> 8) & 0xFF) as u8,
            (ct & 0xFF) as u8,
        ];
        let nalu: &[u8] = if key_frame { &[0x65, 0x88] } else { &[0x41, 0x9A] };
        tag.extend_from_slice(&(nalu.len() as u32).to_be_bytes());
        tag.extend_from_slice(nalu);
        Bytes::from(tag)
    }

    /// Keyframe carrying inline SPS/PPS, for the cold-start path
    fn inline_config_key_frame_tag() -> Bytes {
        let mut tag = vec![0x17, 0x01, 0x00, 0x00, 0x00];
        for nalu in [SPS, PPS, &[0x65, 0x88][..]] {
            tag.extend_from_slice(&(nalu.len() as u32).to_be_bytes());
            tag.extend_from_slice(nalu);
        }
        Bytes::from(tag)
    }

    fn audio_config_tag() -> Bytes {
        Bytes::from_static(&[0xAF, 0x00, 0x12, 0x10])
    }

    fn audio_frame_tag() -> Bytes {
        Bytes::from_static(&[0xAF, 0x01, 0x21, 0x00, 0x49])
    }

    // --- helpers --------------------------------------------------------

    struct Fixture {
        player: Player,
        transport: Arc<MockTransport>,
        backend: Arc<MockBackend>,
        sink: Arc<RecordingSink>,
    }

    fn fixture_with(config: PlayerConfig) -> Fixture {
        let transport = Arc::new(MockTransport::default());
        let backend = Arc::new(MockBackend::default());
        let sink = Arc::new(RecordingSink::default());
        let player = Player::new(
            config,
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&backend) as Arc<dyn DecoderBackend>,
            Arc::clone(&sink),
        );
        Fixture {
            player,
            transport,
            backend,
            sink,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(PlayerConfig::default())
    }

    /// Let the session and driver tasks drain; auto-advances paused time
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    impl Fixture {
        fn conn(&self, index: usize) -> MockHandles {
            let mut conns = self.transport.conns.lock().unwrap();
            assert!(conns.len() > index, "connection {} not opened", index);
            conns.remove(index)
        }
    }

    // --- tests ----------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_play_connects_and_first_media_promotes() {
        let f = fixture();
        f.player.play("rtmp://example/live/stream").await;
        assert_eq!(f.player.state(), SessionState::Connecting);
        settle().await;
        assert_eq!(f.transport.play_count(), 1);

        let conn = f.conn(0);
        conn.video.send((video_config_tag(), 0)).await.unwrap();
        conn.video.send((video_frame_tag(true, 0), 1000)).await.unwrap();
        settle().await;

        assert_eq!(f.player.state(), SessionState::Playing);
        let video = f.sink.video.lock().unwrap();
        assert_eq!(video.len(), 1);
        assert_eq!(video[0].dts_ms, Some(0));
        assert_eq!(video[0].pts_ms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_start_status_promotes() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;

        let conn = f.conn(0);
        conn.status.send(TransportStatus::PlayStart).await.unwrap();
        settle().await;
        assert_eq!(f.player.state(), SessionState::Playing);

        // Informational statuses are not transitions
        conn.status.send(TransportStatus::HandshakeDone).await.unwrap();
        settle().await;
        assert_eq!(f.player.state(), SessionState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_timing_rebased_through_session() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        conn.video.send((video_config_tag(), 990)).await.unwrap();
        conn.video.send((video_frame_tag(true, 0), 1000)).await.unwrap();
        conn.video.send((video_frame_tag(false, 33), 1133)).await.unwrap();
        settle().await;

        let video = f.sink.video.lock().unwrap();
        assert_eq!(video.len(), 2);
        // First emitted sample rebases to zero
        assert_eq!(video[0].dts_ms, Some(0));
        assert_eq!(video[0].pts_ms, 0);
        // dts = 1133 - 1000, pts = dts + ct
        assert_eq!(video[1].dts_ms, Some(133));
        assert_eq!(video[1].pts_ms, 166);
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_decode_and_duration() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        conn.audio.send((audio_config_tag(), 500)).await.unwrap();
        conn.audio.send((audio_frame_tag(), 500)).await.unwrap();
        conn.audio.send((audio_frame_tag(), 523)).await.unwrap();
        settle().await;

        let audio = f.sink.audio.lock().unwrap();
        assert_eq!(audio.len(), 2);
        assert_eq!(audio[0].pts_ms, 0);
        assert_eq!(audio[1].pts_ms, 23);
        assert_eq!(audio[0].duration_ms, Some(23));
        assert_eq!(audio[0].dts_ms, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_discards_media() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        conn.video.send((video_config_tag(), 0)).await.unwrap();
        conn.video.send((video_frame_tag(true, 0), 0)).await.unwrap();
        settle().await;
        assert_eq!(f.player.state(), SessionState::Playing);
        assert_eq!(f.sink.video.lock().unwrap().len(), 1);

        f.player.pause().await;
        assert_eq!(f.player.state(), SessionState::Paused);

        conn.video.send((video_frame_tag(false, 0), 33)).await.unwrap();
        conn.audio.send((audio_frame_tag(), 33)).await.unwrap();
        settle().await;

        // Nothing buffered, nothing emitted, state unchanged
        assert_eq!(f.sink.video.lock().unwrap().len(), 1);
        assert_eq!(f.sink.audio.lock().unwrap().len(), 0);
        assert_eq!(f.player.state(), SessionState::Paused);

        f.player.resume().await;
        assert_eq!(f.player.state(), SessionState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_transitions_are_noops() {
        let f = fixture();

        f.player.pause().await;
        assert_eq!(f.player.state(), SessionState::Idle);
        f.player.resume().await;
        assert_eq!(f.player.state(), SessionState::Idle);
        f.player.restart().await;
        assert_eq!(f.player.state(), SessionState::Idle);
        settle().await;
        assert_eq!(f.transport.play_count(), 0);

        // play() while already connecting is ignored
        f.player.play("rtmp://example/live/a").await;
        f.player.play("rtmp://example/live/b").await;
        settle().await;
        assert_eq!(f.transport.play_count(), 1);
        assert_eq!(f.transport.plays.lock().unwrap()[0], "rtmp://example/live/a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_releases_everything() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        conn.video.send((video_config_tag(), 0)).await.unwrap();
        conn.video.send((video_frame_tag(true, 0), 0)).await.unwrap();
        settle().await;

        f.player.stop().await;
        settle().await;
        assert_eq!(f.player.state(), SessionState::Stopped);
        assert!(conn.invalidated.load(Ordering::SeqCst));
        assert_eq!(f.sink.cleanups.load(Ordering::SeqCst), 1);

        // Stale media after stop is discarded (forwarders are gone)
        let _ = conn.video.send((video_frame_tag(false, 0), 66)).await;
        settle().await;
        assert_eq!(f.sink.video.lock().unwrap().len(), 1);
        let states = f.sink.states.lock().unwrap().clone();
        assert_eq!(states.last(), Some(&SessionState::Stopped));

        // Idempotent: a second stop changes nothing
        f.player.stop().await;
        settle().await;
        assert_eq!(f.sink.cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(f.player.state(), SessionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_backoff_2_4_6() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        assert_eq!(f.transport.play_count(), 1);

        for (failure, expect_plays) in [(1usize, 2usize), (2, 3), (3, 4)] {
            let conn = f.conn(0);
            conn.errors.send(format!("failure {}", failure)).await.unwrap();
            settle().await;
            assert_eq!(
                f.player.state(),
                SessionState::Error(format!("failure {}", failure))
            );

            // Delay is attempts * 2s exactly: nothing fires early
            let delay_s = 2 * failure as u64;
            tokio::time::sleep(Duration::from_secs(delay_s) - Duration::from_millis(200)).await;
            assert_eq!(f.transport.play_count(), expect_plays - 1);
            tokio::time::sleep(Duration::from_millis(300)).await;
            assert_eq!(f.transport.play_count(), expect_plays);
        }

        // Fourth failure: no further retry
        let conn = f.conn(0);
        conn.errors.send("failure 4".into()).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(f.transport.play_count(), 4);
        assert_eq!(f.player.state(), SessionState::Error("failure 4".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_success_resets_attempts() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;

        let conn = f.conn(0);
        conn.errors.send("drop 1".into()).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(f.transport.play_count(), 2);

        // Reconnect succeeds: media flows again and the counter resets
        let conn = f.conn(0);
        conn.video.send((video_config_tag(), 0)).await.unwrap();
        conn.video.send((video_frame_tag(true, 0), 5000)).await.unwrap();
        settle().await;
        assert_eq!(f.player.state(), SessionState::Playing);

        // Timestamp base was rebuilt for the new attempt
        let video = f.sink.video.lock().unwrap().clone();
        assert_eq!(video.last().unwrap().dts_ms, Some(0));

        // Next failure backs off from 2s again
        let conn = f.conn(0);
        conn.errors.send("drop 2".into()).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(f.transport.play_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reconnect_when_disabled() {
        let f = fixture_with(PlayerConfig {
            auto_reconnect: false,
            ..PlayerConfig::default()
        });
        f.player.play("rtmp://example/live/a").await;
        settle().await;

        let conn = f.conn(0);
        conn.errors.send("gone".into()).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(f.transport.play_count(), 1);
        assert_eq!(f.player.state(), SessionState::Error("gone".into()));

        // stop() remains valid from error
        f.player.stop().await;
        assert_eq!(f.player.state(), SessionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_reconnect() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;

        let conn = f.conn(0);
        conn.errors.send("gone".into()).await.unwrap();
        settle().await;

        f.player.stop().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(f.transport.play_count(), 1);
        assert_eq!(f.player.state(), SessionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_idempotence() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        conn.video.send((video_config_tag(), 0)).await.unwrap();
        conn.video.send((video_config_tag(), 0)).await.unwrap();
        settle().await;

        // Same header twice: one decoder, no decoded sample emitted
        assert_eq!(f.backend.video_opens.load(Ordering::SeqCst), 1);
        assert_eq!(f.sink.video.lock().unwrap().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_config_dropped_then_recovers() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        // Sequence-header tag with a truncated record: dropped, not fatal
        conn.video
            .send((
                Bytes::from_static(&[0x17, 0x00, 0x00, 0x00, 0x00, 0x02, 0x64]),
                0,
            ))
            .await
            .unwrap();
        settle().await;
        assert_eq!(f.backend.video_opens.load(Ordering::SeqCst), 0);
        assert_eq!(f.player.state(), SessionState::Playing);

        // A valid config afterwards still brings the decoder up
        conn.video.send((video_config_tag(), 0)).await.unwrap();
        conn.video.send((video_frame_tag(true, 0), 0)).await.unwrap();
        settle().await;
        assert_eq!(f.backend.video_opens.load(Ordering::SeqCst), 1);
        assert_eq!(f.sink.video.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_start_keyframe_probe() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        // Keyframe with inline SPS/PPS before any sequence header
        conn.video.send((inline_config_key_frame_tag(), 0)).await.unwrap();
        settle().await;

        assert_eq!(f.backend.video_opens.load(Ordering::SeqCst), 1);
        assert_eq!(f.sink.video.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_start_without_parameter_sets_drops() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        // Plain keyframe, no config anywhere: dropped, playback continues
        conn.video.send((video_frame_tag(true, 0), 0)).await.unwrap();
        settle().await;

        assert_eq!(f.backend.video_opens.load(Ordering::SeqCst), 0);
        assert_eq!(f.sink.video.lock().unwrap().len(), 0);
        assert_eq!(f.player.stats().dropped_frames, 1);
        assert_eq!(f.player.state(), SessionState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_failure_counts_dropped() {
        let f = fixture();
        f.backend.fail_decode.store(true, Ordering::SeqCst);
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        conn.video.send((video_config_tag(), 0)).await.unwrap();
        conn.video.send((video_frame_tag(true, 0), 0)).await.unwrap();
        conn.video.send((video_frame_tag(false, 0), 33)).await.unwrap();
        settle().await;

        let stats = f.player.stats();
        assert_eq!(stats.total_frames, 0);
        assert_eq!(stats.dropped_frames, 2);
        // Per-unit failures are not fatal
        assert_eq!(f.player.state(), SessionState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decoder_init_failure_is_fatal_without_retry() {
        let f = fixture();
        f.backend.fail_open.store(true, Ordering::SeqCst);
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        conn.video.send((video_config_tag(), 0)).await.unwrap();
        settle().await;

        assert!(matches!(f.player.state(), SessionState::Error(_)));
        assert!(conn.invalidated.load(Ordering::SeqCst));

        // Unlike transport failures, no reconnect fires
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(f.transport.play_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_codecs_dropped() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        // Sorenson H.263 video, MP3 audio
        conn.video
            .send((Bytes::from_static(&[0x12, 0x00, 0x00]), 0))
            .await
            .unwrap();
        conn.audio
            .send((Bytes::from_static(&[0x2F, 0x01, 0x00]), 0))
            .await
            .unwrap();
        settle().await;

        assert_eq!(f.sink.video.lock().unwrap().len(), 0);
        assert_eq!(f.sink.audio.lock().unwrap().len(), 0);
        assert_eq!(f.backend.video_opens.load(Ordering::SeqCst), 0);
        // Tags are dropped recoverably; the session keeps playing
        assert_eq!(f.player.state(), SessionState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_drives_video_config() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        conn.metadata
            .send(StreamMetadata {
                width: Some(1280),
                height: Some(720),
                video_data_rate: Some(2500.0),
                ..StreamMetadata::default()
            })
            .await
            .unwrap();
        // Metadata without dimensions produces nothing
        conn.metadata.send(StreamMetadata::default()).await.unwrap();
        settle().await;

        let configs = f.sink.configs.lock().unwrap();
        assert_eq!(configs.as_slice(), &[(1280, 720)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_statistics_snapshot_on_transport_stats() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);

        conn.video.send((video_config_tag(), 0)).await.unwrap();
        conn.video.send((video_frame_tag(true, 0), 0)).await.unwrap();
        settle().await;
        conn.statistics
            .send(TransportStatistics {
                bytes_received: 4096,
                bitrate_bps: 500_000,
            })
            .await
            .unwrap();
        settle().await;

        let stats = f.sink.stats.lock().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_frames, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replays_last_url() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);
        conn.status.send(TransportStatus::PlayStart).await.unwrap();
        settle().await;

        f.player.restart().await;
        settle().await;
        assert!(conn.invalidated.load(Ordering::SeqCst));
        assert_eq!(f.transport.play_count(), 2);
        assert_eq!(f.transport.plays.lock().unwrap()[1], "rtmp://example/live/a");
        assert_eq!(f.player.state(), SessionState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_trace_is_reachable() {
        let f = fixture();
        f.player.play("rtmp://example/live/a").await;
        settle().await;
        let conn = f.conn(0);
        conn.status.send(TransportStatus::PlayStart).await.unwrap();
        settle().await;
        f.player.pause().await;
        f.player.resume().await;
        f.player.stop().await;
        settle().await;

        let states = f.sink.states.lock().unwrap().clone();
        assert_eq!(
            states,
            vec![
                SessionState::Connecting,
                SessionState::Playing,
                SessionState::Paused,
                SessionState::Playing,
                SessionState::Stopped,
            ]
        );
    }
}
