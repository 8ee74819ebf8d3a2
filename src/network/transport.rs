//! Byte transports under the muxer
//!
//! [`TcpTransport`] writes header-prefixed frames over a tuned TCP socket.
//! [`ChannelTransport`] hands frames to an in-process channel, with
//! injectable failures for exercising reconnect paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::NetworkError;
use crate::network::endpoint::Endpoint;
use crate::network::frame::{ConnectRequest, FrameKind, MediaFrame};

/// Destination credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// One connection to a stream server
#[async_trait]
pub trait Transport: Send {
    async fn connect(
        &mut self,
        endpoint: &Endpoint,
        credentials: Option<&Credentials>,
    ) -> Result<(), NetworkError>;

    async fn write_frame(&mut self, frame: &MediaFrame) -> Result<(), NetworkError>;

    async fn close(&mut self);
}

/// Creates a fresh transport per connection attempt
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Box<dyn Transport>;
}

fn connect_frame(endpoint: &Endpoint, credentials: Option<&Credentials>) -> Result<MediaFrame, NetworkError> {
    let request = ConnectRequest {
        app: endpoint.app.clone(),
        stream_name: endpoint.stream_name.clone(),
        user: credentials.map(|c| c.user.clone()),
        password: credentials.map(|c| c.password.clone()),
    };
    Ok(MediaFrame::control(
        FrameKind::Connect,
        Bytes::from(bincode::serialize(&request)?),
    ))
}

#[cfg(feature = "tcp")]
pub use tcp::{TcpTransport, TcpTransportFactory};

#[cfg(feature = "tcp")]
mod tcp {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    /// Frames over a plain TCP connection
    pub struct TcpTransport {
        stream: Option<TcpStream>,
        connect_timeout: Duration,
    }

    impl TcpTransport {
        pub fn new(connect_timeout: Duration) -> Self {
            Self {
                stream: None,
                connect_timeout,
            }
        }

        fn configure_socket(stream: &TcpStream) -> Result<(), NetworkError> {
            let socket = socket2::SockRef::from(stream);
            socket.set_nodelay(true)?;
            socket.set_keepalive(true)?;
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for TcpTransport {
        async fn connect(
            &mut self,
            endpoint: &Endpoint,
            credentials: Option<&Credentials>,
        ) -> Result<(), NetworkError> {
            if endpoint.tls {
                return Err(NetworkError::ConnectionFailed(
                    "TLS endpoints are not supported by the TCP transport".to_string(),
                ));
            }

            let address = endpoint.address();
            let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&address))
                .await
                .map_err(|_| NetworkError::Timeout)?
                .map_err(|e| NetworkError::ConnectionFailed(format!("{}: {}", address, e)))?;
            Self::configure_socket(&stream)?;
            self.stream = Some(stream);

            self.write_frame(&connect_frame(endpoint, credentials)?).await
        }

        async fn write_frame(&mut self, frame: &MediaFrame) -> Result<(), NetworkError> {
            let stream = self.stream.as_mut().ok_or(NetworkError::NotConnected)?;
            let bytes = frame.encode()?;
            stream
                .write_all(&bytes)
                .await
                .map_err(|e| NetworkError::SendFailed(e.to_string()))
        }

        async fn close(&mut self) {
            if let Some(mut stream) = self.stream.take() {
                let _ = stream.shutdown().await;
            }
        }
    }

    /// Creates [`TcpTransport`]s
    pub struct TcpTransportFactory {
        connect_timeout: Duration,
    }

    impl TcpTransportFactory {
        pub fn new(connect_timeout: Duration) -> Self {
            Self { connect_timeout }
        }
    }

    impl TransportFactory for TcpTransportFactory {
        fn create(&self) -> Box<dyn Transport> {
            Box::new(TcpTransport::new(self.connect_timeout))
        }
    }
}

/// Failure injection shared by channel transports
#[derive(Debug, Default)]
struct FailurePlan {
    /// Remaining connect attempts to refuse
    refuse_connects: AtomicUsize,
    /// Fail the write after this many successful writes (0 = never)
    fail_after_writes: AtomicUsize,
    writes: AtomicUsize,
    /// Drop each connection right after its connect frame
    drop_after_connect: AtomicBool,
    connects: AtomicUsize,
    /// Credentials the simulated server accepts, if it checks any
    accepted: Mutex<Option<Credentials>>,
}

/// Transport delivering frames to an in-process receiver
pub struct ChannelTransport {
    tx: Sender<MediaFrame>,
    plan: Arc<FailurePlan>,
    connected: bool,
    /// Frames written on this connection
    written: usize,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(
        &mut self,
        endpoint: &Endpoint,
        credentials: Option<&Credentials>,
    ) -> Result<(), NetworkError> {
        self.plan.connects.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .plan
            .refuse_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(NetworkError::ConnectionFailed(format!("{} refused", endpoint)));
        }
        let rejected = {
            let accepted = self.plan.accepted.lock();
            accepted.as_ref().is_some_and(|accepted| credentials != Some(accepted))
        };
        if rejected {
            return Err(NetworkError::AuthFailed(format!("{} rejected credentials", endpoint)));
        }
        self.connected = true;
        self.written = 0;
        self.write_frame(&connect_frame(endpoint, credentials)?).await
    }

    async fn write_frame(&mut self, frame: &MediaFrame) -> Result<(), NetworkError> {
        if !self.connected {
            return Err(NetworkError::NotConnected);
        }
        let limit = self.plan.fail_after_writes.load(Ordering::SeqCst);
        let written = self.plan.writes.fetch_add(1, Ordering::SeqCst);
        let dropped = self.plan.drop_after_connect.load(Ordering::SeqCst) && self.written > 0;
        if dropped || (limit > 0 && written >= limit) {
            self.connected = false;
            return Err(NetworkError::SendFailed("connection reset".to_string()));
        }
        self.written += 1;
        self.tx
            .send(frame.clone())
            .map_err(|_| NetworkError::SendFailed("receiver closed".to_string()))
    }

    async fn close(&mut self) {
        self.connected = false;
    }
}

/// Creates [`ChannelTransport`]s feeding one receiver
pub struct ChannelTransportFactory {
    tx: Sender<MediaFrame>,
    plan: Arc<FailurePlan>,
}

impl ChannelTransportFactory {
    pub fn new() -> (Self, Receiver<MediaFrame>) {
        let (tx, rx) = unbounded();
        (
            Self {
                tx,
                plan: Arc::new(FailurePlan::default()),
            },
            rx,
        )
    }

    /// Refuse the next `count` connect attempts
    pub fn refuse_connects(&self, count: usize) {
        self.plan.refuse_connects.store(count, Ordering::SeqCst);
    }

    /// Fail every write once `writes` frames have been written in total
    pub fn fail_after_writes(&self, writes: usize) {
        self.plan.writes.store(0, Ordering::SeqCst);
        self.plan.fail_after_writes.store(writes, Ordering::SeqCst);
    }

    /// Accept every connect, then reset the connection on its next write
    pub fn drop_after_connect(&self) {
        self.plan.drop_after_connect.store(true, Ordering::SeqCst);
    }

    /// Reject connects that do not present these credentials
    pub fn require_credentials(&self, user: &str, password: &str) {
        *self.plan.accepted.lock() = Some(Credentials {
            user: user.to_string(),
            password: password.to_string(),
        });
    }

    /// Stop injecting write failures
    pub fn heal(&self) {
        self.plan.fail_after_writes.store(0, Ordering::SeqCst);
        self.plan.refuse_connects.store(0, Ordering::SeqCst);
        self.plan.drop_after_connect.store(false, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.plan.connects.load(Ordering::SeqCst)
    }
}

impl TransportFactory for ChannelTransportFactory {
    fn create(&self) -> Box<dyn Transport> {
        Box::new(ChannelTransport {
            tx: self.tx.clone(),
            plan: self.plan.clone(),
            connected: false,
            written: 0,
        })
    }
}
