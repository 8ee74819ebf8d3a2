//! # Live Media Relay
//!
//! Audio decode pipeline and live-stream frame dispatch for device streaming.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────── DECODE SIDE ────────────────────────────┐
//! │                                                                     │
//! │  ┌─────────────┐   samples   ┌──────────────────┐   fixed-size PCM  │
//! │  │ AudioSource │ ──────────▶ │ HardwareAudio-   │ ───────────────┐  │
//! │  │ (container) │             │ Decoder (pools)  │                │  │
//! │  └─────────────┘             └──────────────────┘                ▼  │
//! │         ▲        AudioDecodePipeline worker thread       ┌─────────┐│
//! │         └──── seek to sync point on loop ─────────────── │ PcmSink ││
//! │                                                          └─────────┘│
//! └─────────────────────────────────────────────────────────────────────┘
//!
//! ┌──────────────────────────── STREAM SIDE ────────────────────────────┐
//! │                                                                     │
//! │  ┌─────────┐ access units ┌──────────────────┐        ┌───────────┐ │
//! │  │ Encoder │ ───────────▶ │ StreamDispatcher │ ─────▶ │ Network-  │ │
//! │  │         │ ◀─────────── │ (keyframe every  │        │ Muxer     │ │
//! │  └─────────┘ force sync   │  30 video units) │        │ cache+net │ │
//! │                           └──────────────────┘        └─────┬─────┘ │
//! │                              retry / reconnect ◀────────────┘       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod media;
pub mod network;
pub mod stream;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Codec the decode pipeline selects tracks for (AAC)
    pub const AUDIO_CODEC_MIME: &str = "audio/mp4a-latm";

    /// Length of a delivered PCM chunk while unmuted
    pub const PCM_CHUNK_LEN: usize = 4096;

    /// Length of a delivered PCM chunk while muted
    pub const MUTED_CHUNK_LEN: usize = 11;

    /// Sample rate used when the container hides it
    pub const FALLBACK_SAMPLE_RATE: u32 = 44100;

    /// Number of buffers in each decoder pool
    pub const DECODER_POOL_SIZE: usize = 4;

    /// Capacity of one decoder buffer in bytes
    pub const DECODER_BUFFER_CAPACITY: usize = 16 * 1024;

    /// Forwarded video units between forced keyframes
    pub const KEYFRAME_INTERVAL: u64 = 30;

    /// Default reconnect budget
    pub const DEFAULT_RETRIES: u32 = 3;

    /// Default reconnect delay in milliseconds
    pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;

    /// Default pending-frame cache size
    pub const DEFAULT_CACHE_SIZE: usize = 60;

    /// Default RTMP port
    pub const DEFAULT_RTMP_PORT: u16 = 1935;

    /// Default RTMPS port
    pub const DEFAULT_RTMPS_PORT: u16 = 443;
}
