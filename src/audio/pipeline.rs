//! Audio decode pipeline
//!
//! Pulls compressed samples from an [`AudioSource`], pushes them through a
//! [`HardwareAudioDecoder`] on a dedicated worker thread and hands fixed-size
//! PCM chunks to a [`PcmSink`].
//!
//! The worker owns the source and the decoder from `start()` until it exits,
//! so no other thread touches them while a session is live. It also releases
//! them itself on the way out, which keeps release ordered after the last use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};

use crate::audio::buffer::PcmScratch;
use crate::audio::sink::PcmSink;
use crate::audio::source::{AudioSource, SeekMode, SourceFactory, TrackFormat};
use crate::codec::decoder::{DecoderFactory, HardwareAudioDecoder, OutputStatus};
use crate::config::DecoderConfig;
use crate::error::{DecoderError, OpenError, PipelineError, PrepareError, SourceError};
use crate::media::{BufferFlags, BufferInfo};

/// Audio parameters of the selected track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrackDescriptor {
    pub mime: String,
    pub sample_rate: u32,
    /// 1 or 2
    pub channel_count: u16,
}

impl AudioTrackDescriptor {
    pub fn new(mime: impl Into<String>, is_stereo: bool, sample_rate: u32) -> Self {
        Self {
            mime: mime.into(),
            sample_rate,
            channel_count: if is_stereo { 2 } else { 1 },
        }
    }

    pub fn is_stereo(&self) -> bool {
        self.channel_count == 2
    }
}

/// Lifecycle of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Opened,
    Prepared,
    Running,
    Stopped,
}

/// State shared between the pipeline, its handles and the worker
struct Shared {
    running: AtomicBool,
    muted: AtomicBool,
    loop_mode: AtomicBool,
    state: Mutex<PipelineState>,
    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            loop_mode: AtomicBool::new(false),
            state: Mutex::new(PipelineState::Idle),
            wake_lock: Mutex::new(()),
            wake: Condvar::new(),
        }
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.lock() = state;
    }

    /// Clear the running flag and wake a waiting worker
    fn interrupt(&self) {
        self.running.store(false, Ordering::Release);
        let _guard = self.wake_lock.lock();
        self.wake.notify_all();
    }

    /// Sleep up to `timeout` unless interrupted first
    fn wait(&self, timeout: Duration) {
        let mut guard = self.wake_lock.lock();
        if self.running.load(Ordering::Acquire) {
            let _ = self.wake.wait_for(&mut guard, timeout);
        }
    }
}

/// Cloneable control surface usable from any thread
#[derive(Clone)]
pub struct PipelineHandle {
    shared: Arc<Shared>,
}

impl PipelineHandle {
    /// Ask the worker to exit after its current iteration without waiting for it
    pub fn request_stop(&self) {
        self.shared.interrupt();
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> PipelineState {
        *self.shared.state.lock()
    }

    pub fn mute(&self) {
        self.shared.muted.store(true, Ordering::Release);
    }

    pub fn un_mute(&self) {
        self.shared.muted.store(false, Ordering::Release);
    }

    pub fn is_muted(&self) -> bool {
        self.shared.muted.load(Ordering::Acquire)
    }

    pub fn set_loop_mode(&self, enabled: bool) {
        self.shared.loop_mode.store(enabled, Ordering::Release);
    }
}

/// A started worker
struct DecoderSession {
    thread: JoinHandle<()>,
    /// Disconnects when the worker exits
    done: Receiver<()>,
}

impl DecoderSession {
    /// Interrupt the worker and wait for it, giving up after two bounded attempts
    fn shutdown(self, shared: &Shared, timeout: Duration) {
        if self.thread.thread().id() == thread::current().id() {
            shared.interrupt();
            return;
        }

        for attempt in 1..=2 {
            shared.interrupt();
            match self.done.recv_timeout(timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if self.thread.join().is_err() {
                        tracing::error!("Audio decode worker panicked");
                    }
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(attempt, "Audio decode worker did not exit within {:?}", timeout);
                }
            }
        }

        tracing::warn!("Detaching audio decode worker; it releases its resources on exit");
    }
}

/// What one worker iteration produced
enum Step {
    /// Keep looping
    Continue,
    /// No input buffer was free
    Idle,
    /// The decoder emitted its end-of-stream buffer
    EndOfStream,
}

struct DecodeWorker {
    decoder: Box<dyn HardwareAudioDecoder>,
    source: Box<dyn AudioSource>,
    sink: Arc<dyn PcmSink>,
    shared: Arc<Shared>,
    scratch: PcmScratch,
    input_timeout: Duration,
    _done: Sender<()>,
}

impl DecodeWorker {
    fn run(mut self) {
        tracing::debug!("Audio decode worker started");

        while self.shared.running.load(Ordering::Acquire) {
            match self.step() {
                Ok(Step::Continue) => {}
                Ok(Step::Idle) => self.shared.wait(self.input_timeout),
                Ok(Step::EndOfStream) => {
                    if self.shared.loop_mode.load(Ordering::Acquire) {
                        tracing::debug!("End of stream, looping");
                        self.decoder.flush();
                        self.source.seek_to(0, SeekMode::PreviousSync);
                    } else {
                        tracing::info!("End of stream, stopping audio decode");
                        self.finish();
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Audio decode failed: {}", e);
                    self.finish();
                    break;
                }
            }
        }

        self.decoder.stop();
        self.decoder.release();
        self.source.release();
        tracing::debug!("Audio decode worker exited");
    }

    fn finish(&self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.set_state(PipelineState::Stopped);
    }

    fn step(&mut self) -> Result<Step, DecoderError> {
        let Some(input_index) = self.decoder.dequeue_input(self.input_timeout) else {
            return Ok(Step::Idle);
        };

        let buffer = self.decoder.input_buffer(input_index)?;
        let read = match self.source.read_sample(buffer) {
            Ok(read) => read,
            Err(e) => {
                tracing::warn!("Source read failed, ending stream: {}", e);
                None
            }
        };

        match read {
            None => {
                let info = BufferInfo::new(0, 0, BufferFlags::END_OF_STREAM);
                self.decoder.queue_input(input_index, info)?;
            }
            Some(size) => {
                let info = BufferInfo::new(size, self.source.sample_time_us(), BufferFlags::NONE);
                self.decoder.queue_input(input_index, info)?;
                self.source.advance();
            }
        }

        match self.decoder.dequeue_output(Duration::ZERO) {
            OutputStatus::BuffersChanged => {
                tracing::debug!("Decoder output buffers changed");
                Ok(Step::Continue)
            }
            OutputStatus::FormatChanged | OutputStatus::TryAgain => Ok(Step::Continue),
            OutputStatus::Ready { index, info } => {
                let muted = self.shared.muted.load(Ordering::Acquire);
                let chunk = self.scratch.fill(self.decoder.output_buffer(index)?, muted);
                self.sink.deliver(chunk);
                self.decoder.release_output(index)?;

                if info.flags.is_end_of_stream() {
                    Ok(Step::EndOfStream)
                } else {
                    Ok(Step::Continue)
                }
            }
        }
    }
}

/// Decodes one compressed audio track into a real-time stream of PCM chunks
pub struct AudioDecodePipeline {
    config: DecoderConfig,
    sources: Arc<dyn SourceFactory>,
    decoders: Arc<dyn DecoderFactory>,
    sink: Arc<dyn PcmSink>,
    shared: Arc<Shared>,
    track: Option<AudioTrackDescriptor>,
    format: Option<TrackFormat>,
    source: Option<Box<dyn AudioSource>>,
    decoder: Option<Box<dyn HardwareAudioDecoder>>,
    session: Option<DecoderSession>,
    on_worker_start: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl AudioDecodePipeline {
    pub fn new(
        config: DecoderConfig,
        sources: Arc<dyn SourceFactory>,
        decoders: Arc<dyn DecoderFactory>,
        sink: Arc<dyn PcmSink>,
    ) -> Self {
        Self {
            config,
            sources,
            decoders,
            sink,
            shared: Arc::new(Shared::new()),
            track: None,
            format: None,
            source: None,
            decoder: None,
            session: None,
            on_worker_start: None,
        }
    }

    /// Run `hook` on the worker thread before decoding starts.
    ///
    /// This is where platform audio scheduling priority gets applied.
    pub fn with_worker_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_worker_start = Some(Arc::new(hook));
        self
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            shared: self.shared.clone(),
        }
    }

    /// Open `uri` and select its first track of the configured codec.
    ///
    /// Unreadable channel count or sample rate falls back to the configured
    /// defaults (stereo, 44100 Hz).
    pub fn open_track(&mut self, uri: &str) -> Result<AudioTrackDescriptor, OpenError> {
        let (source, format) = self.open_matching(uri)?;

        let (is_stereo, sample_rate) = match (format.channel_count(), format.sample_rate()) {
            (Ok(channels), Ok(sample_rate)) => (channels == 2, sample_rate),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(
                    "Track metadata unreadable ({}), assuming {} Hz {}",
                    e,
                    self.config.fallback_sample_rate,
                    if self.config.fallback_stereo { "stereo" } else { "mono" }
                );
                (self.config.fallback_stereo, self.config.fallback_sample_rate)
            }
        };

        let track = AudioTrackDescriptor::new(format.mime.clone(), is_stereo, sample_rate);
        self.install(source, format, track.clone());
        Ok(track)
    }

    /// Open `uri` with caller-supplied audio parameters.
    ///
    /// Returns whether a track of the configured codec was found.
    pub fn open_track_with_hints(
        &mut self,
        uri: &str,
        is_stereo: bool,
        sample_rate: u32,
    ) -> Result<bool, OpenError> {
        match self.open_matching(uri) {
            Ok((source, format)) => {
                let track = AudioTrackDescriptor::new(format.mime.clone(), is_stereo, sample_rate);
                self.install(source, format, track);
                Ok(true)
            }
            Err(OpenError::NoMatchingTrack { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create and configure the decoder for the opened track
    pub fn prepare(&mut self) -> Result<(), PrepareError> {
        let (Some(track), Some(format)) = (self.track.as_ref(), self.format.as_mut()) else {
            return Err(PrepareError::NotOpened);
        };
        if self.source.is_none() {
            return Err(PrepareError::NotOpened);
        }

        let mut decoder = self.decoders.create(&self.config.codec_mime).map_err(|e| {
            tracing::error!("Prepare decoder error: {}", e);
            e
        })?;

        format.sample_rate = Some(track.sample_rate);
        format.channel_count = Some(track.channel_count);
        decoder.configure(format)?;

        if let Some(mut previous) = self.decoder.replace(decoder) {
            previous.release();
        }
        self.shared.set_state(PipelineState::Prepared);
        tracing::info!(
            "Audio decoder prepared: {} Hz, {} channel(s)",
            track.sample_rate,
            track.channel_count
        );
        Ok(())
    }

    /// Start the decoder and spawn the worker thread
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.session.is_some() && self.shared.running.load(Ordering::Acquire) {
            return Err(PipelineError::AlreadyRunning);
        }
        // A worker that stopped at end of stream leaves a finished session behind
        if let Some(session) = self.session.take() {
            session.shutdown(&self.shared, self.config.join_timeout());
        }

        let (Some(mut decoder), Some(source)) = (self.decoder.take(), self.source.take()) else {
            return Err(PipelineError::NotPrepared);
        };
        if let Err(e) = decoder.start() {
            self.decoder = Some(decoder);
            self.source = Some(source);
            return Err(e.into());
        }

        let (done_tx, done_rx) = bounded::<()>(1);
        let worker = DecodeWorker {
            decoder,
            source,
            sink: self.sink.clone(),
            shared: self.shared.clone(),
            scratch: PcmScratch::new(self.config.pcm_chunk_len, self.config.muted_chunk_len),
            input_timeout: self.config.input_timeout(),
            _done: done_tx,
        };
        let hook = self.on_worker_start.clone();

        // Running before spawn: a short clip may reach Stopped before spawn returns
        self.shared.running.store(true, Ordering::Release);
        self.shared.set_state(PipelineState::Running);
        let spawned = thread::Builder::new()
            .name(self.config.worker_name.clone())
            .spawn(move || {
                if let Some(hook) = hook {
                    hook();
                }
                worker.run();
            });

        match spawned {
            Ok(thread) => {
                self.session = Some(DecoderSession {
                    thread,
                    done: done_rx,
                });
                tracing::info!("Audio decode started");
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                self.shared.set_state(PipelineState::Stopped);
                Err(e.into())
            }
        }
    }

    /// Stop decoding and release the decoder and source.
    ///
    /// Calling this on a stopped pipeline does nothing.
    pub fn stop(&mut self) {
        let mut stopped = false;

        if let Some(session) = self.session.take() {
            session.shutdown(&self.shared, self.config.join_timeout());
            stopped = true;
        }
        if let Some(mut decoder) = self.decoder.take() {
            decoder.release();
            stopped = true;
        }
        if let Some(mut source) = self.source.take() {
            source.release();
            stopped = true;
        }

        if stopped {
            self.shared.running.store(false, Ordering::Release);
            self.shared.set_state(PipelineState::Stopped);
            tracing::info!("Audio decode stopped");
        }
    }

    pub fn set_loop_mode(&self, enabled: bool) {
        self.shared.loop_mode.store(enabled, Ordering::Release);
    }

    pub fn is_loop_mode(&self) -> bool {
        self.shared.loop_mode.load(Ordering::Acquire)
    }

    /// Deliver short muted chunks from the next chunk on
    pub fn mute(&self) {
        self.shared.muted.store(true, Ordering::Release);
    }

    pub fn un_mute(&self) {
        self.shared.muted.store(false, Ordering::Release);
    }

    pub fn is_muted(&self) -> bool {
        self.shared.muted.load(Ordering::Acquire)
    }

    /// Sample rate of the opened track, 0 before a track is opened
    pub fn sample_rate(&self) -> u32 {
        self.track.as_ref().map_or(0, |t| t.sample_rate)
    }

    pub fn is_stereo(&self) -> bool {
        self.track.as_ref().is_some_and(|t| t.is_stereo())
    }

    pub fn track(&self) -> Option<&AudioTrackDescriptor> {
        self.track.as_ref()
    }

    pub fn state(&self) -> PipelineState {
        *self.shared.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Open `uri` and find the first track of the configured codec
    fn open_matching(&mut self, uri: &str) -> Result<(Box<dyn AudioSource>, TrackFormat), OpenError> {
        // Reopening replaces any previous session
        self.stop();
        self.track = None;
        self.format = None;
        self.shared.set_state(PipelineState::Idle);

        let mut source = self.sources.open(uri)?;
        match find_track(source.as_ref(), &self.config.codec_mime) {
            Ok(Some((index, format))) => {
                source.select_track(index)?;
                tracing::info!("Selected track {} ({}) of {}", index, format.mime, uri);
                Ok((source, format))
            }
            Ok(None) => {
                source.release();
                tracing::warn!("No {} track in {}", self.config.codec_mime, uri);
                Err(OpenError::NoMatchingTrack {
                    mime: self.config.codec_mime.clone(),
                })
            }
            Err(e) => {
                source.release();
                Err(e.into())
            }
        }
    }

    fn install(&mut self, source: Box<dyn AudioSource>, format: TrackFormat, track: AudioTrackDescriptor) {
        self.source = Some(source);
        self.format = Some(format);
        self.track = Some(track);
        self.shared.set_state(PipelineState::Opened);
    }
}

impl Drop for AudioDecodePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// First track whose codec type equals `mime`
fn find_track(source: &dyn AudioSource, mime: &str) -> Result<Option<(usize, TrackFormat)>, SourceError> {
    for index in 0..source.track_count() {
        let format = source.track_format(index)?;
        if format.mime == mime {
            return Ok(Some((index, format)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::{MemorySource, MemorySourceFactory, MemoryTrack};
    use crate::codec::passthrough::PassthroughDecoderFactory;
    use std::time::Instant;

    const AAC: &str = "audio/mp4a-latm";

    fn video_and_audio(audio: TrackFormat) -> MemorySource {
        MemorySource::new(vec![
            MemoryTrack::new(TrackFormat::new("video/avc")).with_sample(vec![0u8; 8], 0, true),
            MemoryTrack::new(audio)
                .with_sample(vec![1u8; 32], 0, true)
                .with_sample(vec![2u8; 32], 23_000, true)
                .with_sample(vec![3u8; 32], 46_000, true),
        ])
    }

    fn pipeline(source: MemorySource, sink: Arc<dyn PcmSink>) -> AudioDecodePipeline {
        let factory = MemorySourceFactory::new().with_source("mem://clip", source);
        AudioDecodePipeline::new(
            DecoderConfig::default(),
            Arc::new(factory),
            Arc::new(PassthroughDecoderFactory::new()),
            sink,
        )
    }

    fn discard() -> Arc<dyn PcmSink> {
        Arc::new(|_: &[u8]| {})
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_open_selects_first_matching_track() {
        let mut pipeline = pipeline(video_and_audio(TrackFormat::audio(AAC, 48000, 2)), discard());

        let track = pipeline.open_track("mem://clip").unwrap();
        assert_eq!(track.sample_rate, 48000);
        assert!(track.is_stereo());
        assert!(pipeline.is_stereo());
        assert_eq!(pipeline.sample_rate(), 48000);
        assert_eq!(pipeline.state(), PipelineState::Opened);
    }

    #[test]
    fn test_open_falls_back_on_missing_metadata() {
        let format = TrackFormat {
            mime: AAC.to_string(),
            sample_rate: Some(48000),
            channel_count: None,
        };
        let mut pipeline = pipeline(video_and_audio(format), discard());

        let track = pipeline.open_track("mem://clip").unwrap();
        assert!(track.is_stereo());
        assert_eq!(track.sample_rate, 44100);
    }

    #[test]
    fn test_open_without_matching_track() {
        let source = MemorySource::new(vec![MemoryTrack::new(TrackFormat::new("video/avc"))]);
        let activity = source.activity();
        let mut pipeline = pipeline(source, discard());

        assert!(matches!(
            pipeline.open_track("mem://clip"),
            Err(OpenError::NoMatchingTrack { .. })
        ));
        assert!(activity.is_released());
        assert!(matches!(pipeline.prepare(), Err(PrepareError::NotOpened)));
        assert_eq!(pipeline.state(), PipelineState::Idle);

        assert!(!pipeline.open_track_with_hints("mem://clip", true, 48000).unwrap());
    }

    #[test]
    fn test_hints_override_metadata() {
        let mut pipeline = pipeline(video_and_audio(TrackFormat::audio(AAC, 48000, 2)), discard());

        assert!(pipeline.open_track_with_hints("mem://clip", false, 22050).unwrap());
        assert!(!pipeline.is_stereo());
        assert_eq!(pipeline.sample_rate(), 22050);
    }

    #[test]
    fn test_prepare_injects_track_parameters() {
        let factory = Arc::new(PassthroughDecoderFactory::new());
        let sources = MemorySourceFactory::new()
            .with_source("mem://clip", video_and_audio(TrackFormat::new(AAC)));
        let mut pipeline = AudioDecodePipeline::new(
            DecoderConfig::default(),
            Arc::new(sources),
            factory.clone(),
            discard(),
        );

        pipeline.open_track_with_hints("mem://clip", false, 16000).unwrap();
        pipeline.prepare().unwrap();

        let format = factory.last_activity().unwrap().configured_format().unwrap();
        assert_eq!(format.sample_rate, Some(16000));
        assert_eq!(format.channel_count, Some(1));
        assert_eq!(pipeline.state(), PipelineState::Prepared);
    }

    #[test]
    fn test_prepare_reports_decoder_failure() {
        let sources = MemorySourceFactory::new()
            .with_source("mem://clip", video_and_audio(TrackFormat::audio(AAC, 44100, 2)));
        let mut pipeline = AudioDecodePipeline::new(
            DecoderConfig::default(),
            Arc::new(sources),
            Arc::new(PassthroughDecoderFactory::supporting(&["audio/opus"])),
            discard(),
        );

        pipeline.open_track("mem://clip").unwrap();
        assert!(matches!(
            pipeline.prepare(),
            Err(PrepareError::Decoder(DecoderError::Init(_)))
        ));
        assert!(matches!(pipeline.start(), Err(PipelineError::NotPrepared)));
    }

    #[test]
    fn test_end_of_stream_stops_session() {
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let recorded = lengths.clone();
        let sink: Arc<dyn PcmSink> = Arc::new(move |pcm: &[u8]| recorded.lock().push(pcm.len()));

        let source = video_and_audio(TrackFormat::audio(AAC, 44100, 2));
        let source_activity = source.activity();
        let factory = Arc::new(PassthroughDecoderFactory::new());
        let sources = MemorySourceFactory::new().with_source("mem://clip", source);
        let mut pipeline =
            AudioDecodePipeline::new(DecoderConfig::default(), Arc::new(sources), factory.clone(), sink);

        pipeline.open_track("mem://clip").unwrap();
        pipeline.prepare().unwrap();
        pipeline.start().unwrap();
        let decoder_activity = factory.last_activity().unwrap();

        assert!(wait_until(|| pipeline.state() == PipelineState::Stopped));
        assert!(wait_until(|| decoder_activity.is_released() && source_activity.is_released()));
        assert!(!pipeline.is_running());
        assert!(decoder_activity.is_stopped());

        // Three samples plus the end-of-stream buffer
        assert_eq!(*lengths.lock(), vec![4096; 4]);

        pipeline.stop();
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn test_loop_mode_keeps_delivering() {
        let chunks = Arc::new(Mutex::new(0usize));
        let counter = chunks.clone();
        let sink: Arc<dyn PcmSink> = Arc::new(move |_: &[u8]| *counter.lock() += 1);

        let source = video_and_audio(TrackFormat::audio(AAC, 44100, 2));
        let activity = source.activity();
        let mut pipeline = pipeline(source, sink);
        pipeline.set_loop_mode(true);
        assert!(pipeline.is_loop_mode());

        pipeline.open_track("mem://clip").unwrap();
        pipeline.prepare().unwrap();
        pipeline.start().unwrap();

        assert!(wait_until(|| *chunks.lock() >= 12));
        assert!(activity.seek_count() >= 2);
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert!(pipeline.is_running());

        pipeline.stop();
        assert!(!pipeline.is_running());
        assert!(activity.is_released());
    }

    #[test]
    fn test_mute_changes_next_chunk() {
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let recorded = lengths.clone();

        let source = video_and_audio(TrackFormat::audio(AAC, 44100, 2));
        let factory = MemorySourceFactory::new().with_source("mem://clip", source);
        let shared_handle: Arc<Mutex<Option<PipelineHandle>>> = Arc::new(Mutex::new(None));
        let handle_slot = shared_handle.clone();
        let sink: Arc<dyn PcmSink> = Arc::new(move |pcm: &[u8]| {
            let mut lengths = recorded.lock();
            lengths.push(pcm.len());
            if lengths.len() == 2 {
                if let Some(handle) = handle_slot.lock().as_ref() {
                    handle.mute();
                }
            }
        });

        let mut pipeline = AudioDecodePipeline::new(
            DecoderConfig::default(),
            Arc::new(factory),
            Arc::new(PassthroughDecoderFactory::new()),
            sink,
        );
        *shared_handle.lock() = Some(pipeline.handle());

        pipeline.open_track("mem://clip").unwrap();
        pipeline.prepare().unwrap();
        pipeline.start().unwrap();

        assert!(wait_until(|| pipeline.state() == PipelineState::Stopped));
        assert_eq!(*lengths.lock(), vec![4096, 4096, 11, 11]);
        assert!(pipeline.is_muted());
        pipeline.un_mute();
        assert!(!pipeline.is_muted());
    }

    #[test]
    fn test_stop_before_start_releases_resources() {
        let source = video_and_audio(TrackFormat::audio(AAC, 44100, 2));
        let activity = source.activity();
        let factory = Arc::new(PassthroughDecoderFactory::new());
        let sources = MemorySourceFactory::new().with_source("mem://clip", source);
        let mut pipeline =
            AudioDecodePipeline::new(DecoderConfig::default(), Arc::new(sources), factory.clone(), discard());

        pipeline.open_track("mem://clip").unwrap();
        pipeline.prepare().unwrap();
        pipeline.stop();

        assert!(activity.is_released());
        assert!(factory.last_activity().unwrap().is_released());
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut source_track = MemoryTrack::new(TrackFormat::audio(AAC, 44100, 2));
        for i in 0..64 {
            source_track = source_track.with_sample(vec![0u8; 16], i * 1000, true);
        }
        let mut pipeline = pipeline(MemorySource::new(vec![source_track]), discard());
        pipeline.set_loop_mode(true);
        pipeline.open_track("mem://clip").unwrap();
        pipeline.prepare().unwrap();
        pipeline.start().unwrap();

        assert!(matches!(pipeline.start(), Err(PipelineError::AlreadyRunning)));
        pipeline.stop();
    }

    #[test]
    fn test_worker_hook_runs_on_worker_thread() {
        let name = Arc::new(Mutex::new(None));
        let seen = name.clone();
        let mut pipeline = pipeline(video_and_audio(TrackFormat::audio(AAC, 44100, 2)), discard())
            .with_worker_hook(move || {
                *seen.lock() = thread::current().name().map(str::to_string);
            });

        pipeline.open_track("mem://clip").unwrap();
        pipeline.prepare().unwrap();
        pipeline.start().unwrap();
        assert!(wait_until(|| name.lock().is_some()));
        assert_eq!(name.lock().as_deref(), Some("audio-decode"));
        pipeline.stop();
    }
}
