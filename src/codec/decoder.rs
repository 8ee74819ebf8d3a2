//! Hardware audio decoder boundary
//!
//! Decoders expose fixed input and output buffer pools addressed by index:
//! the caller checks an input buffer out, fills it, queues it, then polls
//! for decoded output and hands each output buffer back once consumed.

use std::time::Duration;

use crate::audio::source::TrackFormat;
use crate::error::DecoderError;
use crate::media::BufferInfo;

/// Result of polling a decoder for output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStatus {
    /// Output buffer `index` holds decoded data described by `info`
    Ready { index: usize, info: BufferInfo },
    /// The output buffer set was replaced
    BuffersChanged,
    /// The output format changed
    FormatChanged,
    /// No output available yet
    TryAgain,
}

/// Asynchronous audio codec in decode mode
pub trait HardwareAudioDecoder: Send {
    /// Configure for decoding `format` without an output surface
    fn configure(&mut self, format: &TrackFormat) -> Result<(), DecoderError>;

    fn start(&mut self) -> Result<(), DecoderError>;

    /// Check out a free input buffer, waiting at most `timeout`
    fn dequeue_input(&mut self, timeout: Duration) -> Option<usize>;

    /// Writable view of a checked-out input buffer
    fn input_buffer(&mut self, index: usize) -> Result<&mut [u8], DecoderError>;

    /// Submit a filled input buffer
    fn queue_input(&mut self, index: usize, info: BufferInfo) -> Result<(), DecoderError>;

    /// Poll for decoded output, waiting at most `timeout`
    fn dequeue_output(&mut self, timeout: Duration) -> OutputStatus;

    /// Decoded bytes of a ready output buffer
    fn output_buffer(&self, index: usize) -> Result<&[u8], DecoderError>;

    /// Hand a consumed output buffer back without rendering it
    fn release_output(&mut self, index: usize) -> Result<(), DecoderError>;

    /// Drop all queued input and pending output
    fn flush(&mut self) {}

    fn stop(&mut self);

    fn release(&mut self);
}

/// Instantiates decoders by codec type
pub trait DecoderFactory: Send + Sync {
    fn create(&self, mime: &str) -> Result<Box<dyn HardwareAudioDecoder>, DecoderError>;
}
