//! Network muxer boundary and connection callbacks

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::config::ProfileIop;
use crate::error::CacheError;
use crate::media::AccessUnit;
use crate::network::stats::StreamStats;

/// Packages access units for the wire and owns the connection.
///
/// All methods take `&self` and may be called from encoder callback threads.
/// None of them wait for network I/O.
pub trait NetworkMuxer: Send + Sync {
    fn set_audio_params(&self, is_stereo: bool, sample_rate: u32);

    fn set_video_resolution(&self, width: u32, height: u32);

    fn set_profile_iop(&self, profile: ProfileIop);

    /// Begin connecting to `url` in the background
    fn start(&self, url: &str);

    fn stop(&self);

    /// Copy and queue one audio unit
    fn send_audio(&self, unit: &AccessUnit<'_>);

    /// Copy and queue one video unit
    fn send_video(&self, unit: &AccessUnit<'_>);

    fn set_parameter_sets(&self, sps: &[u8], pps: &[u8]);

    fn set_retries(&self, retries: u32);

    fn should_retry(&self, reason: &str) -> bool;

    /// Reconnect to the last URL after `delay`
    fn reconnect(&self, delay: Duration);

    fn set_authorization(&self, user: &str, password: &str);

    /// Counters maintained by this muxer
    fn stats(&self) -> Arc<StreamStats>;

    fn resize_cache(&self, size: usize) -> Result<(), CacheError>;

    fn cache_size(&self) -> usize;
}

/// Connection lifecycle callbacks
pub trait ConnectChecker: Send + Sync {
    fn on_connection_started(&self, _url: &str) {}

    fn on_connection_success(&self) {}

    /// The connection failed or dropped; decide with `should_retry`
    fn on_connection_failed(&self, reason: &str);

    /// Outgoing bitrate over the last second, in bits per second
    fn on_new_bitrate(&self, _bitrate: u64) {}

    /// The server rejected the credentials; reconnecting with the same ones will not help
    fn on_auth_error(&self) {}

    fn on_auth_success(&self) {}

    fn on_disconnect(&self) {}
}

/// Connection events as delivered by [`ChannelChecker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Started(String),
    Connected,
    Failed(String),
    Bitrate(u64),
    AuthError,
    AuthSuccess,
    Disconnected,
}

/// Forwards connection callbacks to a channel
pub struct ChannelChecker {
    tx: Sender<ConnectionEvent>,
}

impl ChannelChecker {
    pub fn new() -> (Self, Receiver<ConnectionEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.tx.send(event);
    }
}

impl ConnectChecker for ChannelChecker {
    fn on_connection_started(&self, url: &str) {
        self.emit(ConnectionEvent::Started(url.to_string()));
    }

    fn on_connection_success(&self) {
        self.emit(ConnectionEvent::Connected);
    }

    fn on_connection_failed(&self, reason: &str) {
        self.emit(ConnectionEvent::Failed(reason.to_string()));
    }

    fn on_new_bitrate(&self, bitrate: u64) {
        self.emit(ConnectionEvent::Bitrate(bitrate));
    }

    fn on_auth_error(&self) {
        self.emit(ConnectionEvent::AuthError);
    }

    fn on_auth_success(&self) {
        self.emit(ConnectionEvent::AuthSuccess);
    }

    fn on_disconnect(&self) {
        self.emit(ConnectionEvent::Disconnected);
    }
}
