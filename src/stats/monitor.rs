//! Playback performance monitoring
//!
//! Counters live on the decode hot path and may be hit from decoder-callback
//! threads, so they are atomics; only the arrival ring takes a short lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

/// Arrival timestamps retained for windowed rate estimation
const ARRIVAL_RING_CAPACITY: usize = 1000;

/// Snapshot of playback counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackStats {
    /// Average frames per second since `start()`
    pub fps: f64,
    /// Frames presented since `start()`
    pub total_frames: u64,
    /// Frames dropped (decode failures, missing decoder)
    pub dropped_frames: u64,
    /// Wall-clock seconds since `start()`
    pub duration_s: f64,
}

/// Frame and timing counters for one playback session
#[derive(Debug)]
pub struct PerfMonitor {
    started_at: Mutex<Option<Instant>>,
    total_frames: AtomicU64,
    dropped_frames: AtomicU64,
    arrivals: Mutex<VecDeque<Instant>>,
}

impl PerfMonitor {
    pub fn new() -> Self {
        Self {
            started_at: Mutex::new(None),
            total_frames: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
            arrivals: Mutex::new(VecDeque::with_capacity(ARRIVAL_RING_CAPACITY)),
        }
    }

    /// Process-wide instance, for callers that track a single playback at a
    /// time. Sessions own their instance; this accessor is a convenience.
    pub fn global() -> &'static PerfMonitor {
        static GLOBAL: OnceLock<PerfMonitor> = OnceLock::new();
        GLOBAL.get_or_init(PerfMonitor::new)
    }

    /// Record the monotonic base time and zero the counters
    pub fn start(&self) {
        if let Ok(mut started) = self.started_at.lock() {
            *started = Some(Instant::now());
        }
        self.total_frames.store(0, Ordering::Relaxed);
        self.dropped_frames.store(0, Ordering::Relaxed);
        if let Ok(mut ring) = self.arrivals.lock() {
            ring.clear();
        }
    }

    /// Count one presented frame and note its arrival time
    pub fn record_frame(&self) {
        self.total_frames.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut ring) = self.arrivals.lock() {
            if ring.len() == ARRIVAL_RING_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(Instant::now());
        }
    }

    /// Count one dropped frame
    pub fn record_dropped_frame(&self) {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames presented since `start()`
    pub fn total_frames(&self) -> u64 {
        self.total_frames.load(Ordering::Relaxed)
    }

    /// Frames dropped since `start()`
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Snapshot the counters
    pub fn current_stats(&self) -> PlaybackStats {
        let total_frames = self.total_frames.load(Ordering::Relaxed);
        let dropped_frames = self.dropped_frames.load(Ordering::Relaxed);

        let duration_s = self
            .started_at
            .lock()
            .ok()
            .and_then(|s| *s)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        let fps = if duration_s > 0.0 {
            total_frames as f64 / duration_s
        } else {
            0.0
        };

        PlaybackStats {
            fps,
            total_frames,
            dropped_frames,
            duration_s,
        }
    }

    /// Frame rate over the retained arrival window, reacting faster to rate
    /// changes than the since-start average.
    pub fn instantaneous_fps(&self) -> f64 {
        let ring = match self.arrivals.lock() {
            Ok(ring) => ring,
            Err(_) => return 0.0,
        };
        let (first, last) = match (ring.front(), ring.back()) {
            (Some(f), Some(l)) if ring.len() >= 2 => (*f, *l),
            _ => return 0.0,
        };
        let window = last.duration_since(first).as_secs_f64();
        if window <= 0.0 {
            return 0.0;
        }
        (ring.len() - 1) as f64 / window
    }
}

impl Default for PerfMonitor {
    fn default() -> Self {
        Self::new()
    }
}
