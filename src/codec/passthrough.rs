//! Software decoder that forwards sample bytes unchanged
//!
//! Useful for containers that already carry PCM, and for exercising the
//! decode pipeline without codec hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::audio::buffer::BufferPool;
use crate::audio::source::TrackFormat;
use crate::codec::decoder::{DecoderFactory, HardwareAudioDecoder, OutputStatus};
use crate::constants::{DECODER_BUFFER_CAPACITY, DECODER_POOL_SIZE};
use crate::error::DecoderError;
use crate::media::BufferInfo;

/// Lifecycle observations of a [`PassthroughDecoder`]
#[derive(Debug, Default)]
pub struct DecoderActivity {
    started: AtomicBool,
    stopped: AtomicBool,
    released: AtomicBool,
    flushes: AtomicUsize,
    format: Mutex<Option<TrackFormat>>,
}

impl DecoderActivity {
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Format passed to `configure`
    pub fn configured_format(&self) -> Option<TrackFormat> {
        self.format.lock().clone()
    }
}

/// Decoder copying each input buffer into an output buffer
pub struct PassthroughDecoder {
    input: BufferPool,
    output: BufferPool,
    /// Queued inputs waiting for a free output buffer
    pending: VecDeque<(usize, BufferInfo)>,
    ready: VecDeque<(usize, BufferInfo)>,
    configured: bool,
    started: bool,
    /// Report a format change before the first output, like hardware codecs do
    announce_format: bool,
    activity: Arc<DecoderActivity>,
}

impl PassthroughDecoder {
    pub fn new(pool_size: usize, buffer_capacity: usize) -> Self {
        Self {
            input: BufferPool::new(pool_size, buffer_capacity),
            output: BufferPool::new(pool_size, buffer_capacity),
            pending: VecDeque::with_capacity(pool_size),
            ready: VecDeque::with_capacity(pool_size),
            configured: false,
            started: false,
            announce_format: false,
            activity: Arc::new(DecoderActivity::default()),
        }
    }

    pub fn activity(&self) -> Arc<DecoderActivity> {
        self.activity.clone()
    }

    /// Move pending input into free output buffers
    fn pump(&mut self) -> Result<(), DecoderError> {
        while let Some(&(input_index, info)) = self.pending.front() {
            let Some(output_index) = self.output.checkout() else {
                break;
            };
            self.pending.pop_front();

            let data = self.input.filled(input_index)?;
            let size = data.len().min(self.output.buffer_capacity());
            self.output.slot_mut(output_index)?[..size].copy_from_slice(&data[..size]);
            self.output.set_filled(output_index, size)?;
            self.input.checkin(input_index)?;

            self.ready.push_back((output_index, BufferInfo { size, ..info }));
        }
        Ok(())
    }
}

impl Default for PassthroughDecoder {
    fn default() -> Self {
        Self::new(DECODER_POOL_SIZE, DECODER_BUFFER_CAPACITY)
    }
}

impl HardwareAudioDecoder for PassthroughDecoder {
    fn configure(&mut self, format: &TrackFormat) -> Result<(), DecoderError> {
        if format.sample_rate.is_none() || format.channel_count.is_none() {
            return Err(DecoderError::Configure(format!(
                "{} track lacks sample rate or channel count",
                format.mime
            )));
        }
        *self.activity.format.lock() = Some(format.clone());
        self.configured = true;
        Ok(())
    }

    fn start(&mut self) -> Result<(), DecoderError> {
        if !self.configured {
            return Err(DecoderError::NotStarted);
        }
        self.started = true;
        self.announce_format = true;
        self.activity.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn dequeue_input(&mut self, _timeout: Duration) -> Option<usize> {
        // Buffers are only freed by calls on this same thread, so waiting cannot help
        if !self.started {
            return None;
        }
        self.input.checkout()
    }

    fn input_buffer(&mut self, index: usize) -> Result<&mut [u8], DecoderError> {
        Ok(self.input.slot_mut(index)?)
    }

    fn queue_input(&mut self, index: usize, info: BufferInfo) -> Result<(), DecoderError> {
        if !self.started {
            return Err(DecoderError::NotStarted);
        }
        let capacity = self.input.buffer_capacity();
        if info.size > capacity {
            return Err(DecoderError::BufferTooSmall {
                size: info.size,
                capacity,
            });
        }
        self.input.set_filled(index, info.size)?;
        self.pending.push_back((index, info));
        self.pump()
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> OutputStatus {
        if !self.started {
            return OutputStatus::TryAgain;
        }
        if self.announce_format {
            self.announce_format = false;
            return OutputStatus::FormatChanged;
        }
        match self.ready.pop_front() {
            Some((index, info)) => OutputStatus::Ready { index, info },
            None => OutputStatus::TryAgain,
        }
    }

    fn output_buffer(&self, index: usize) -> Result<&[u8], DecoderError> {
        Ok(self.output.filled(index)?)
    }

    fn release_output(&mut self, index: usize) -> Result<(), DecoderError> {
        self.output.checkin(index)?;
        self.pump()
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.ready.clear();
        self.input.reset();
        self.output.reset();
        self.activity.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.flush();
        self.started = false;
        self.activity.stopped.store(true, Ordering::SeqCst);
    }

    fn release(&mut self) {
        self.configured = false;
        self.activity.released.store(true, Ordering::SeqCst);
    }
}

/// Factory producing [`PassthroughDecoder`]s
pub struct PassthroughDecoderFactory {
    /// Accepted codec types; empty accepts every type
    supported: Vec<String>,
    pool_size: usize,
    buffer_capacity: usize,
    /// Activity of the most recently created decoder
    last_activity: Mutex<Option<Arc<DecoderActivity>>>,
}

impl PassthroughDecoderFactory {
    pub fn new() -> Self {
        Self {
            supported: Vec::new(),
            pool_size: DECODER_POOL_SIZE,
            buffer_capacity: DECODER_BUFFER_CAPACITY,
            last_activity: Mutex::new(None),
        }
    }

    /// Only create decoders for the given codec types
    pub fn supporting(mimes: &[&str]) -> Self {
        Self {
            supported: mimes.iter().map(|m| m.to_string()).collect(),
            ..Self::new()
        }
    }

    pub fn with_buffers(mut self, pool_size: usize, buffer_capacity: usize) -> Self {
        self.pool_size = pool_size;
        self.buffer_capacity = buffer_capacity;
        self
    }

    pub fn last_activity(&self) -> Option<Arc<DecoderActivity>> {
        self.last_activity.lock().clone()
    }
}

impl Default for PassthroughDecoderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderFactory for PassthroughDecoderFactory {
    fn create(&self, mime: &str) -> Result<Box<dyn HardwareAudioDecoder>, DecoderError> {
        if !self.supported.is_empty() && !self.supported.iter().any(|m| m == mime) {
            return Err(DecoderError::Init(format!("no decoder for {}", mime)));
        }
        let decoder = PassthroughDecoder::new(self.pool_size, self.buffer_capacity);
        *self.last_activity.lock() = Some(decoder.activity());
        Ok(Box::new(decoder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::BufferFlags;

    fn started_decoder(pool_size: usize) -> PassthroughDecoder {
        let mut decoder = PassthroughDecoder::new(pool_size, 16);
        decoder
            .configure(&TrackFormat::audio("audio/mp4a-latm", 44100, 2))
            .unwrap();
        decoder.start().unwrap();
        decoder
    }

    fn queue(decoder: &mut PassthroughDecoder, data: &[u8], flags: BufferFlags) {
        let index = decoder.dequeue_input(Duration::ZERO).unwrap();
        decoder.input_buffer(index).unwrap()[..data.len()].copy_from_slice(data);
        decoder
            .queue_input(index, BufferInfo::new(data.len(), 0, flags))
            .unwrap();
    }

    #[test]
    fn test_requires_configure_and_start() {
        let mut decoder = PassthroughDecoder::new(2, 16);
        assert!(decoder.dequeue_input(Duration::ZERO).is_none());
        assert!(decoder.start().is_err());
        assert!(decoder
            .configure(&TrackFormat::new("audio/mp4a-latm"))
            .is_err());
    }

    #[test]
    fn test_forwards_bytes() {
        let mut decoder = started_decoder(2);
        queue(&mut decoder, &[1, 2, 3], BufferFlags::NONE);

        assert_eq!(decoder.dequeue_output(Duration::ZERO), OutputStatus::FormatChanged);
        let OutputStatus::Ready { index, info } = decoder.dequeue_output(Duration::ZERO) else {
            panic!("expected output");
        };
        assert_eq!(info.size, 3);
        assert_eq!(decoder.output_buffer(index).unwrap(), &[1, 2, 3]);
        decoder.release_output(index).unwrap();
        assert_eq!(decoder.dequeue_output(Duration::ZERO), OutputStatus::TryAgain);
    }

    #[test]
    fn test_zero_pool_size_still_decodes() {
        let mut decoder = started_decoder(0);
        queue(&mut decoder, &[9], BufferFlags::NONE);

        assert_eq!(decoder.dequeue_output(Duration::ZERO), OutputStatus::FormatChanged);
        let OutputStatus::Ready { index, info } = decoder.dequeue_output(Duration::ZERO) else {
            panic!("expected output");
        };
        assert_eq!(info.size, 1);
        assert_eq!(decoder.output_buffer(index).unwrap(), &[9]);
    }

    #[test]
    fn test_backpressure_until_output_released() {
        let mut decoder = started_decoder(1);
        queue(&mut decoder, &[1], BufferFlags::NONE);
        // Output pool is full, so the next input stays pending
        queue(&mut decoder, &[2], BufferFlags::END_OF_STREAM);
        assert!(decoder.dequeue_input(Duration::ZERO).is_none());

        decoder.dequeue_output(Duration::ZERO);
        let OutputStatus::Ready { index, .. } = decoder.dequeue_output(Duration::ZERO) else {
            panic!("expected output");
        };
        decoder.release_output(index).unwrap();

        let OutputStatus::Ready { info, .. } = decoder.dequeue_output(Duration::ZERO) else {
            panic!("expected pending output");
        };
        assert!(info.flags.is_end_of_stream());
    }

    #[test]
    fn test_oversized_input() {
        let mut decoder = started_decoder(1);
        let index = decoder.dequeue_input(Duration::ZERO).unwrap();
        assert!(matches!(
            decoder.queue_input(index, BufferInfo::new(64, 0, BufferFlags::NONE)),
            Err(DecoderError::BufferTooSmall { size: 64, capacity: 16 })
        ));
    }

    #[test]
    fn test_factory_support_list() {
        let factory = PassthroughDecoderFactory::supporting(&["audio/raw"]);
        assert!(matches!(
            factory.create("audio/mp4a-latm"),
            Err(DecoderError::Init(_))
        ));
        assert!(factory.create("audio/raw").is_ok());
        assert!(factory.last_activity().is_some());
    }

    #[test]
    fn test_lifecycle_activity() {
        let mut decoder = started_decoder(2);
        let activity = decoder.activity();
        assert!(activity.is_started());
        assert_eq!(activity.configured_format().unwrap().sample_rate, Some(44100));

        decoder.stop();
        decoder.release();
        assert!(activity.is_stopped());
        assert!(activity.is_released());
        assert_eq!(activity.flush_count(), 1);
    }
}
