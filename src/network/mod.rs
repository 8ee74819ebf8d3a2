//! Network subsystem: muxer boundary, pending-frame cache and transports

pub mod cache;
pub mod cached;
pub mod endpoint;
pub mod frame;
pub mod muxer;
pub mod retry;
pub mod stats;
pub mod transport;

pub use cache::FrameCache;
pub use cached::CachedMuxer;
pub use endpoint::Endpoint;
pub use frame::{FrameKind, MediaFrame, StreamMetadata};
pub use muxer::{ChannelChecker, ConnectChecker, ConnectionEvent, NetworkMuxer};
pub use retry::RetryPolicy;
pub use stats::{StatsSnapshot, StreamStats};
pub use transport::{ChannelTransportFactory, Credentials, Transport, TransportFactory};
#[cfg(feature = "tcp")]
pub use transport::{TcpTransport, TcpTransportFactory};
