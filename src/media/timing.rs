//! Per-session timestamp rebasing
//!
//! RTMP timestamps are relative to an arbitrary server epoch. The session
//! rebases them so the first decodable frame of each kind starts at zero:
//! `dts = rtmp_ts - first_ts`, `pts = dts + composition_time`.
//!
//! Bases are recorded on the first coded unit of each kind after `play()`
//! or a reconnect, and cleared on teardown. Sequence-header tags do not
//! establish a base, so the first emitted sample always lands at `dts = 0`.

/// Timestamp bases for one playback attempt
#[derive(Debug, Default)]
pub struct Timeline {
    first_video_ts: Option<i64>,
    first_audio_ts: Option<i64>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear both bases; called on teardown and before each reconnect
    pub fn reset(&mut self) {
        self.first_video_ts = None;
        self.first_audio_ts = None;
    }

    /// Rebase a video tag timestamp into `(dts_ms, pts_ms)`.
    ///
    /// The RTMP clock is monotonic within a stream, so `dts >= 0`. A negative
    /// composition time that would push `pts` below zero is clamped to `dts`.
    pub fn video_times(&mut self, rtmp_timestamp_ms: i64, composition_time_ms: i32) -> (i64, i64) {
        let base = *self.first_video_ts.get_or_insert(rtmp_timestamp_ms);
        let dts = rtmp_timestamp_ms - base;
        let pts = dts + composition_time_ms as i64;
        if pts < 0 {
            (dts, dts)
        } else {
            (dts, pts)
        }
    }

    /// Rebase an audio tag timestamp into `pts_ms`
    pub fn audio_pts(&mut self, rtmp_timestamp_ms: i64) -> i64 {
        let base = *self.first_audio_ts.get_or_insert(rtmp_timestamp_ms);
        rtmp_timestamp_ms - base
    }

    /// Whether a video base has been recorded this attempt
    pub fn has_video_base(&self) -> bool {
        self.first_video_ts.is_some()
    }
}
