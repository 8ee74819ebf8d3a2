//! Upstream video encoder boundary
//!
//! The dispatcher only needs the encoder's output geometry and a way to
//! ask for a sync frame; encoding itself happens elsewhere.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Controls the dispatcher needs from a video encoder
pub trait VideoEncoderControl: Send + Sync {
    /// Rotation applied to encoded frames, in degrees
    fn rotation(&self) -> u32;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Ask the encoder to make its next frame a keyframe
    fn force_sync_frame(&self);
}

/// Shared encoder state for encoders driven from another thread.
///
/// The encoder polls [`take_sync_request`](Self::take_sync_request) before
/// each frame and emits an IDR frame when it returns `true`.
#[derive(Debug)]
pub struct EncoderHandle {
    width: AtomicU32,
    height: AtomicU32,
    rotation: AtomicU32,
    force_idr: AtomicBool,
    sync_requests: AtomicU64,
}

impl EncoderHandle {
    pub fn new(width: u32, height: u32, rotation: u32) -> Self {
        Self {
            width: AtomicU32::new(width),
            height: AtomicU32::new(height),
            rotation: AtomicU32::new(rotation % 360),
            force_idr: AtomicBool::new(false),
            sync_requests: AtomicU64::new(0),
        }
    }

    pub fn set_resolution(&self, width: u32, height: u32) {
        self.width.store(width, Ordering::Relaxed);
        self.height.store(height, Ordering::Relaxed);
    }

    pub fn set_rotation(&self, rotation: u32) {
        self.rotation.store(rotation % 360, Ordering::Relaxed);
    }

    /// Consume a pending keyframe request
    pub fn take_sync_request(&self) -> bool {
        self.force_idr.swap(false, Ordering::AcqRel)
    }

    /// Total keyframe requests received
    pub fn sync_requests(&self) -> u64 {
        self.sync_requests.load(Ordering::Relaxed)
    }
}

impl VideoEncoderControl for EncoderHandle {
    fn rotation(&self) -> u32 {
        self.rotation.load(Ordering::Relaxed)
    }

    fn width(&self) -> u32 {
        self.width.load(Ordering::Relaxed)
    }

    fn height(&self) -> u32 {
        self.height.load(Ordering::Relaxed)
    }

    fn force_sync_frame(&self) {
        self.sync_requests.fetch_add(1, Ordering::Relaxed);
        self.force_idr.store(true, Ordering::Release);
    }
}
