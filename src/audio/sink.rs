//! PCM sinks fed by the decode pipeline

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};

/// Consumer of decoded PCM chunks.
///
/// `deliver` runs synchronously on the decode worker thread; the slice is
/// only valid for the duration of the call. A slow sink stalls decoding.
pub trait PcmSink: Send + Sync {
    fn deliver(&self, pcm: &[u8]);
}

impl<F> PcmSink for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn deliver(&self, pcm: &[u8]) {
        self(pcm)
    }
}

/// Sink that forwards copies of each chunk over a bounded channel.
///
/// A full channel blocks the decoder until the consumer catches up.
pub struct ChannelSink {
    tx: Sender<Bytes>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Bytes>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end
    pub fn bounded(capacity: usize) -> (Self, Receiver<Bytes>) {
        let (tx, rx) = bounded(capacity);
        (Self::new(tx), rx)
    }
}

impl PcmSink for ChannelSink {
    fn deliver(&self, pcm: &[u8]) {
        if self.tx.send(Bytes::copy_from_slice(pcm)).is_err() {
            tracing::trace!("PCM receiver dropped, discarding chunk");
        }
    }
}
