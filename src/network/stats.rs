//! Sent/dropped frame counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Frame counters shared by a muxer and its dispatcher.
///
/// Counters only grow, except through the explicit `reset_*` calls, each of
/// which touches a single counter.
#[derive(Debug, Default)]
pub struct StreamStats {
    sent_audio: AtomicU64,
    sent_video: AtomicU64,
    dropped_audio: AtomicU64,
    dropped_video: AtomicU64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, is_audio: bool) {
        let counter = if is_audio { &self.sent_audio } else { &self.sent_video };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, is_audio: bool) {
        let counter = if is_audio { &self.dropped_audio } else { &self.dropped_video };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent_audio_frames(&self) -> u64 {
        self.sent_audio.load(Ordering::Relaxed)
    }

    pub fn sent_video_frames(&self) -> u64 {
        self.sent_video.load(Ordering::Relaxed)
    }

    pub fn dropped_audio_frames(&self) -> u64 {
        self.dropped_audio.load(Ordering::Relaxed)
    }

    pub fn dropped_video_frames(&self) -> u64 {
        self.dropped_video.load(Ordering::Relaxed)
    }

    pub fn reset_sent_audio_frames(&self) {
        self.sent_audio.store(0, Ordering::Relaxed);
    }

    pub fn reset_sent_video_frames(&self) {
        self.sent_video.store(0, Ordering::Relaxed);
    }

    pub fn reset_dropped_audio_frames(&self) {
        self.dropped_audio.store(0, Ordering::Relaxed);
    }

    pub fn reset_dropped_video_frames(&self) {
        self.dropped_video.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sent_audio_frames: self.sent_audio_frames(),
            sent_video_frames: self.sent_video_frames(),
            dropped_audio_frames: self.dropped_audio_frames(),
            dropped_video_frames: self.dropped_video_frames(),
        }
    }
}

/// Point-in-time copy of [`StreamStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub sent_audio_frames: u64,
    pub sent_video_frames: u64,
    pub dropped_audio_frames: u64,
    pub dropped_video_frames: u64,
}

impl StatsSnapshot {
    /// Fraction of frames dropped out of all frames handled
    pub fn drop_rate(&self) -> f32 {
        let dropped = self.dropped_audio_frames + self.dropped_video_frames;
        let total = dropped + self.sent_audio_frames + self.sent_video_frames;
        if total == 0 {
            0.0
        } else {
            dropped as f32 / total as f32
        }
    }
}
