//! Live Media Relay
//!
//! Decodes a generated test tone through the audio pipeline and streams the
//! PCM chunks as audio access units to a stream server.
//!
//! Usage: `relay [rtmp://host[:port]/app/stream]`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_media_relay::{
    audio::{AudioDecodePipeline, MemorySource, MemorySourceFactory, MemoryTrack},
    codec::{EncoderHandle, PassthroughDecoderFactory},
    config::AppConfig,
    media::{BufferFlags, BufferInfo},
    network::{CachedMuxer, ChannelChecker, ConnectionEvent, TcpTransportFactory},
    stream::{DisplayTarget, StreamDispatcher},
};

const TONE_URI: &str = "memory://tone";
const DEFAULT_URL: &str = "rtmp://127.0.0.1/live/relay";
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Holds delivery to real time and stamps each chunk
struct Pacer {
    started: Instant,
    bytes_per_second: u64,
    delivered: AtomicU64,
}

impl Pacer {
    fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            started: Instant::now(),
            bytes_per_second: (sample_rate as u64 * channels as u64 * 2).max(1),
            delivered: AtomicU64::new(0),
        }
    }

    /// Presentation time of a chunk of `len` bytes, after waiting for it to be due
    fn pace(&self, len: usize) -> i64 {
        let offset = self.delivered.fetch_add(len as u64, Ordering::Relaxed);
        let due = Duration::from_micros(offset * 1_000_000 / self.bytes_per_second);
        if let Some(ahead) = due.checked_sub(self.started.elapsed()) {
            std::thread::sleep(ahead);
        }
        due.as_micros() as i64
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Live Media Relay");

    let config = AppConfig::load_or_default();
    let url = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());

    // Stream side
    let (checker, events) = ChannelChecker::new();
    let muxer = Arc::new(CachedMuxer::new(
        Handle::current(),
        Arc::new(TcpTransportFactory::new(config.stream.connect_timeout())),
        Arc::new(checker),
        &config.stream,
    ));
    // Audio only; no video encoder feeds this relay
    let encoder = Arc::new(EncoderHandle::new(0, 0, 0));
    let dispatcher = Arc::new(StreamDispatcher::new(
        DisplayTarget::Headless,
        muxer,
        encoder,
        &config.stream,
    ));

    // Decode side
    let (sample_rate, channels) = (config.decoder.fallback_sample_rate, 2);
    let tone = MemoryTrack::pcm_tone(
        &config.decoder.codec_mime,
        sample_rate,
        channels,
        440.0,
        2_000,
        config.decoder.pcm_chunk_len,
    );
    let sources = MemorySourceFactory::new().with_source(TONE_URI, MemorySource::new(vec![tone]));

    let pacer = Pacer::new(sample_rate, channels);
    let sink_dispatcher = dispatcher.clone();
    let sink = move |pcm: &[u8]| {
        let pts = pacer.pace(pcm.len());
        sink_dispatcher.on_audio_access_unit(pcm, BufferInfo::new(pcm.len(), pts, BufferFlags::NONE));
    };

    let mut pipeline = AudioDecodePipeline::new(
        config.decoder.clone(),
        Arc::new(sources),
        Arc::new(PassthroughDecoderFactory::new()),
        Arc::new(sink),
    );
    pipeline.set_loop_mode(true);
    let track = pipeline.open_track(TONE_URI).context("Failed to open tone track")?;
    pipeline.prepare().context("Failed to prepare decoder")?;
    tracing::info!(
        "Decoding {} ({} Hz, {})",
        track.mime,
        track.sample_rate,
        if track.is_stereo() { "stereo" } else { "mono" }
    );

    dispatcher.configure_audio_params(track.is_stereo(), track.sample_rate);
    dispatcher.start_stream(&url);
    pipeline.start().context("Failed to start decode pipeline")?;

    tracing::info!("Streaming to {}; press Ctrl+C to stop", url);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let mut last_report = Instant::now();

    'relay: loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutting down...");
                break 'relay;
            }
            _ = ticker.tick() => {}
        }

        for event in events.try_iter() {
            match event {
                ConnectionEvent::Started(url) => tracing::debug!("Connecting to {}", url),
                ConnectionEvent::Connected => tracing::info!("Connected"),
                ConnectionEvent::Bitrate(bitrate) => tracing::debug!("Bitrate: {} bps", bitrate),
                ConnectionEvent::Disconnected => tracing::info!("Disconnected"),
                ConnectionEvent::AuthSuccess => tracing::info!("Authenticated"),
                ConnectionEvent::AuthError => {
                    tracing::error!("Server rejected credentials, giving up");
                    break 'relay;
                }
                ConnectionEvent::Failed(reason) => {
                    if dispatcher.should_retry(&reason) {
                        tracing::warn!("Connection failed ({}), retrying", reason);
                        dispatcher.reconnect_after_default_delay();
                    } else {
                        tracing::error!("Connection failed ({}), giving up", reason);
                        break 'relay;
                    }
                }
            }
        }

        if last_report.elapsed() >= STATS_INTERVAL {
            let stats = serde_json::to_string(&dispatcher.stats_snapshot())?;
            tracing::info!("Stats: {}", stats);
            last_report = Instant::now();
        }
    }

    pipeline.stop();
    dispatcher.stop_stream();
    tracing::info!(
        "Final stats: {}",
        serde_json::to_string(&dispatcher.stats_snapshot())?
    );

    Ok(())
}
