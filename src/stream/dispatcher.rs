//! Stream dispatcher
//!
//! Bridges encoder callbacks to a [`NetworkMuxer`]. Forwarding takes no
//! locks; the only state of its own is the streaming flag and the video
//! unit counter that drives forced keyframes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::codec::encoder::VideoEncoderControl;
use crate::config::{ProfileIop, StreamConfig};
use crate::error::CacheError;
use crate::media::{AccessUnit, BufferInfo};
use crate::network::muxer::NetworkMuxer;
use crate::network::stats::{StatsSnapshot, StreamStats};

/// Platform handle of a display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Where the preview of the encoded stream is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayTarget {
    /// No preview
    #[default]
    Headless,
    /// Frames rendered straight into a native surface
    RawSurface(SurfaceId),
    /// Frames rendered through a managed GL surface
    ManagedGl(SurfaceId),
}

/// Forwards encoded access units to the network and drives reconnects
pub struct StreamDispatcher {
    display: DisplayTarget,
    muxer: Arc<dyn NetworkMuxer>,
    encoder: Arc<dyn VideoEncoderControl>,
    stats: Arc<StreamStats>,
    keyframe_interval: u64,
    reconnect_delay: Duration,
    streaming: AtomicBool,
    /// Forwarded video units; untouched by stats resets
    video_units: AtomicU64,
}

impl StreamDispatcher {
    pub fn new(
        target: DisplayTarget,
        muxer: Arc<dyn NetworkMuxer>,
        encoder: Arc<dyn VideoEncoderControl>,
        config: &StreamConfig,
    ) -> Self {
        muxer.set_retries(config.retries);
        muxer.set_profile_iop(config.profile_iop);
        if let Err(e) = muxer.resize_cache(config.cache_size) {
            tracing::warn!("Keeping muxer cache size {}: {}", muxer.cache_size(), e);
        }
        tracing::debug!("Stream dispatcher created for {:?}", target);

        Self {
            display: target,
            stats: muxer.stats(),
            muxer,
            encoder,
            keyframe_interval: config.keyframe_interval.max(1),
            reconnect_delay: config.reconnect_delay(),
            streaming: AtomicBool::new(false),
            video_units: AtomicU64::new(0),
        }
    }

    pub fn display(&self) -> DisplayTarget {
        self.display
    }

    /// Must precede [`start_stream`](Self::start_stream)
    pub fn configure_audio_params(&self, is_stereo: bool, sample_rate: u32) {
        self.muxer.set_audio_params(is_stereo, sample_rate);
    }

    /// Advertise the encoder geometry and begin connecting to `url`.
    ///
    /// Returns immediately; connection failures arrive through the
    /// muxer's [`ConnectChecker`](crate::network::muxer::ConnectChecker).
    pub fn start_stream(&self, url: &str) {
        let (width, height) = advertised_resolution(
            self.encoder.width(),
            self.encoder.height(),
            self.encoder.rotation(),
        );
        self.muxer.set_video_resolution(width, height);
        self.streaming.store(true, Ordering::Release);
        tracing::info!("Starting stream {}x{} to {}", width, height, url);
        self.muxer.start(url);
    }

    pub fn stop_stream(&self) {
        if !self.streaming.swap(false, Ordering::AcqRel) {
            return;
        }
        self.muxer.stop();
        tracing::info!("Stream dispatch stopped");
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    pub fn on_audio_access_unit(&self, payload: &[u8], info: BufferInfo) {
        if !self.is_streaming() {
            return;
        }
        self.muxer.send_audio(&AccessUnit {
            payload,
            info,
            is_audio: true,
        });
    }

    /// Forward SPS and PPS. A VPS is only produced by HEVC encoders and
    /// has no slot in the AVC configuration record.
    pub fn on_parameter_sets(&self, sps: &[u8], pps: &[u8], vps: Option<&[u8]>) {
        if vps.is_some() {
            tracing::debug!("Ignoring VPS parameter set");
        }
        self.muxer.set_parameter_sets(sps, pps);
    }

    /// Forward one video unit; every `keyframe_interval`-th forwarded unit
    /// also asks the encoder for a keyframe.
    pub fn on_video_access_unit(&self, payload: &[u8], info: BufferInfo) {
        if !self.is_streaming() {
            return;
        }
        self.muxer.send_video(&AccessUnit {
            payload,
            info,
            is_audio: false,
        });

        let forwarded = self.video_units.fetch_add(1, Ordering::AcqRel) + 1;
        if forwarded % self.keyframe_interval == 0 {
            tracing::trace!("Forcing keyframe after {} video units", forwarded);
            self.encoder.force_sync_frame();
        }
    }

    /// Video units forwarded since construction
    pub fn video_frames_forwarded(&self) -> u64 {
        self.video_units.load(Ordering::Acquire)
    }

    pub fn set_retry_count(&self, retries: u32) {
        self.muxer.set_retries(retries);
    }

    pub fn should_retry(&self, reason: &str) -> bool {
        self.muxer.should_retry(reason)
    }

    pub fn reconnect(&self, delay: Duration) {
        self.muxer.reconnect(delay);
    }

    /// Reconnect after the configured delay
    pub fn reconnect_after_default_delay(&self) {
        self.muxer.reconnect(self.reconnect_delay);
    }

    /// Applied on the next connect
    pub fn set_authorization(&self, user: &str, password: &str) {
        self.muxer.set_authorization(user, password);
    }

    pub fn set_profile_iop(&self, profile: ProfileIop) {
        self.muxer.set_profile_iop(profile);
    }

    /// Shrinking below the number of pending frames is rejected
    pub fn resize_cache(&self, size: usize) -> Result<(), CacheError> {
        self.muxer.resize_cache(size)
    }

    pub fn cache_size(&self) -> usize {
        self.muxer.cache_size()
    }

    pub fn sent_audio_frames(&self) -> u64 {
        self.stats.sent_audio_frames()
    }

    pub fn sent_video_frames(&self) -> u64 {
        self.stats.sent_video_frames()
    }

    pub fn dropped_audio_frames(&self) -> u64 {
        self.stats.dropped_audio_frames()
    }

    pub fn dropped_video_frames(&self) -> u64 {
        self.stats.dropped_video_frames()
    }

    pub fn reset_sent_audio_frames(&self) {
        self.stats.reset_sent_audio_frames();
    }

    pub fn reset_sent_video_frames(&self) {
        self.stats.reset_sent_video_frames();
    }

    pub fn reset_dropped_audio_frames(&self) {
        self.stats.reset_dropped_audio_frames();
    }

    pub fn reset_dropped_video_frames(&self) {
        self.stats.reset_dropped_video_frames();
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// Width and height as seen by viewers of the rotated output
fn advertised_resolution(width: u32, height: u32, rotation: u32) -> (u32, u32) {
    match rotation {
        90 | 270 => (height, width),
        _ => (width, height),
    }
}
