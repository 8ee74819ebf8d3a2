//! Compressed audio sources
//!
//! [`AudioSource`] is the seekable, track-selectable container reader the
//! decode pipeline pulls samples from. [`MemorySource`] keeps whole tracks
//! in memory and is used by tests and the relay tool.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::SourceError;

/// Format of one container track.
///
/// Audio parameters are optional because some containers do not expose them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    pub mime: String,
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u16>,
}

impl TrackFormat {
    pub fn new(mime: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            sample_rate: None,
            channel_count: None,
        }
    }

    pub fn audio(mime: impl Into<String>, sample_rate: u32, channel_count: u16) -> Self {
        Self {
            mime: mime.into(),
            sample_rate: Some(sample_rate),
            channel_count: Some(channel_count),
        }
    }

    pub fn sample_rate(&self) -> Result<u32, SourceError> {
        self.sample_rate.ok_or(SourceError::MissingKey("sample-rate"))
    }

    pub fn channel_count(&self) -> Result<u16, SourceError> {
        self.channel_count.ok_or(SourceError::MissingKey("channel-count"))
    }
}

/// How a seek resolves to a sync point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Last sync point at or before the target
    PreviousSync,
    /// First sync point at or after the target
    NextSync,
    /// Whichever sync point is nearest the target
    ClosestSync,
}

/// Seekable reader of compressed samples
pub trait AudioSource: Send {
    fn track_count(&self) -> usize;

    fn track_format(&self, index: usize) -> Result<TrackFormat, SourceError>;

    fn select_track(&mut self, index: usize) -> Result<(), SourceError>;

    /// Copy the current sample into `buf`.
    ///
    /// Returns `Ok(None)` once the selected track has no more samples.
    fn read_sample(&mut self, buf: &mut [u8]) -> Result<Option<usize>, SourceError>;

    /// Presentation time of the current sample in microseconds
    fn sample_time_us(&self) -> i64;

    /// Move to the next sample; returns `false` at the end of the track
    fn advance(&mut self) -> bool;

    fn seek_to(&mut self, time_us: i64, mode: SeekMode);

    fn release(&mut self) {}
}

/// Opens sources by URI
pub trait SourceFactory: Send + Sync {
    fn open(&self, uri: &str) -> Result<Box<dyn AudioSource>, SourceError>;
}

/// One compressed sample of a [`MemoryTrack`]
#[derive(Debug, Clone)]
pub struct MemorySample {
    pub data: Bytes,
    pub time_us: i64,
    pub sync: bool,
}

/// In-memory track
#[derive(Debug, Clone)]
pub struct MemoryTrack {
    pub format: TrackFormat,
    pub samples: Vec<MemorySample>,
}

impl MemoryTrack {
    pub fn new(format: TrackFormat) -> Self {
        Self {
            format,
            samples: Vec::new(),
        }
    }

    pub fn with_sample(mut self, data: impl Into<Bytes>, time_us: i64, sync: bool) -> Self {
        self.samples.push(MemorySample {
            data: data.into(),
            time_us,
            sync,
        });
        self
    }

    /// 16-bit little-endian sine tone split into `chunk_bytes` samples, all sync points
    pub fn pcm_tone(
        mime: &str,
        sample_rate: u32,
        channels: u16,
        frequency: f32,
        duration_ms: u64,
        chunk_bytes: usize,
    ) -> Self {
        let frames = (sample_rate as u64 * duration_ms / 1000) as usize;
        let mut pcm = Vec::with_capacity(frames * channels as usize * 2);
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let value = ((t * frequency * 2.0 * PI).sin() * 0.5 * i16::MAX as f32) as i16;
            for _ in 0..channels {
                pcm.extend_from_slice(&value.to_le_bytes());
            }
        }

        let bytes_per_second = sample_rate as i64 * channels as i64 * 2;
        let mut track = Self::new(TrackFormat::audio(mime, sample_rate, channels));
        let pcm = Bytes::from(pcm);
        let mut offset = 0;
        while offset < pcm.len() {
            let end = (offset + chunk_bytes.max(1)).min(pcm.len());
            let time_us = offset as i64 * 1_000_000 / bytes_per_second.max(1);
            track = track.with_sample(pcm.slice(offset..end), time_us, true);
            offset = end;
        }
        track
    }
}

/// Counters shared between a [`MemorySource`] and its observers
#[derive(Debug, Default)]
pub struct SourceActivity {
    released: AtomicBool,
    seeks: AtomicUsize,
    reads: AtomicUsize,
}

impl SourceActivity {
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn seek_count(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Source backed by in-memory tracks
#[derive(Debug, Clone)]
pub struct MemorySource {
    tracks: Vec<MemoryTrack>,
    selected: Option<usize>,
    position: usize,
    activity: Arc<SourceActivity>,
}

impl MemorySource {
    pub fn new(tracks: Vec<MemoryTrack>) -> Self {
        Self {
            tracks,
            selected: None,
            position: 0,
            activity: Arc::new(SourceActivity::default()),
        }
    }

    pub fn activity(&self) -> Arc<SourceActivity> {
        self.activity.clone()
    }

    /// Index of the current sample within the selected track
    pub fn position(&self) -> usize {
        self.position
    }

    fn current(&self) -> Option<&MemorySample> {
        let track = self.tracks.get(self.selected?)?;
        track.samples.get(self.position)
    }
}

impl AudioSource for MemorySource {
    fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn track_format(&self, index: usize) -> Result<TrackFormat, SourceError> {
        self.tracks
            .get(index)
            .map(|track| track.format.clone())
            .ok_or(SourceError::TrackOutOfRange(index))
    }

    fn select_track(&mut self, index: usize) -> Result<(), SourceError> {
        if index >= self.tracks.len() {
            return Err(SourceError::TrackOutOfRange(index));
        }
        self.selected = Some(index);
        self.position = 0;
        Ok(())
    }

    fn read_sample(&mut self, buf: &mut [u8]) -> Result<Option<usize>, SourceError> {
        let Some(sample) = self.current() else {
            return Ok(None);
        };
        let size = sample.data.len();
        if size > buf.len() {
            return Err(SourceError::SampleTooLarge {
                size,
                capacity: buf.len(),
            });
        }
        buf[..size].copy_from_slice(&sample.data);
        self.activity.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Some(size))
    }

    fn sample_time_us(&self) -> i64 {
        self.current().map_or(-1, |sample| sample.time_us)
    }

    fn advance(&mut self) -> bool {
        let Some(track) = self.selected.and_then(|index| self.tracks.get(index)) else {
            return false;
        };
        if self.position < track.samples.len() {
            self.position += 1;
        }
        self.position < track.samples.len()
    }

    fn seek_to(&mut self, time_us: i64, mode: SeekMode) {
        let Some(track) = self.selected.and_then(|index| self.tracks.get(index)) else {
            return;
        };
        self.activity.seeks.fetch_add(1, Ordering::SeqCst);

        let syncs = track.samples.iter().enumerate().filter(|(_, s)| s.sync);
        let previous = syncs.clone().filter(|(_, s)| s.time_us <= time_us).last();
        let next = syncs.clone().find(|(_, s)| s.time_us >= time_us);

        let target = match mode {
            SeekMode::PreviousSync => previous.or(next),
            SeekMode::NextSync => next.or(previous),
            SeekMode::ClosestSync => match (previous, next) {
                (Some(p), Some(n)) => {
                    if time_us - p.1.time_us <= n.1.time_us - time_us {
                        Some(p)
                    } else {
                        Some(n)
                    }
                }
                (p, n) => p.or(n),
            },
        };

        self.position = target.map_or(0, |(index, _)| index);
    }

    fn release(&mut self) {
        self.selected = None;
        self.activity.released.store(true, Ordering::SeqCst);
    }
}

/// Serves registered [`MemorySource`]s by URI
#[derive(Default)]
pub struct MemorySourceFactory {
    sources: HashMap<String, MemorySource>,
}

impl MemorySourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri: impl Into<String>, source: MemorySource) {
        self.sources.insert(uri.into(), source);
    }

    pub fn with_source(mut self, uri: impl Into<String>, source: MemorySource) -> Self {
        self.insert(uri, source);
        self
    }
}

impl SourceFactory for MemorySourceFactory {
    fn open(&self, uri: &str) -> Result<Box<dyn AudioSource>, SourceError> {
        self.sources
            .get(uri)
            .map(|source| Box::new(source.clone()) as Box<dyn AudioSource>)
            .ok_or_else(|| SourceError::Open {
                uri: uri.to_string(),
                reason: "not registered".to_string(),
            })
    }
}
