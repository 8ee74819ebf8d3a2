//! Error types for the media relay

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Open error: {0}")]
    Open(#[from] OpenError),

    #[error("Prepare error: {0}")]
    Prepare(#[from] PrepareError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Container/source errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open source {uri}: {reason}")]
    Open { uri: String, reason: String },

    #[error("Track index {0} out of range")]
    TrackOutOfRange(usize),

    #[error("Track format has no readable `{0}`")]
    MissingKey(&'static str),

    #[error("Sample of {size} bytes exceeds buffer capacity {capacity}")]
    SampleTooLarge { size: usize, capacity: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Track selection errors
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("No track matching {mime}")]
    NoMatchingTrack { mime: String },

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Hardware decoder errors
#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("Decoder initialization failed: {0}")]
    Init(String),

    #[error("Decoder configuration failed: {0}")]
    Configure(String),

    #[error("Invalid buffer index: {0}")]
    InvalidBufferIndex(usize),

    #[error("Sample of {size} bytes exceeds buffer capacity {capacity}")]
    BufferTooSmall { size: usize, capacity: usize },

    #[error("Decoder not started")]
    NotStarted,

    #[error("Buffer pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Errors from `AudioDecodePipeline::prepare`
#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("No track opened")]
    NotOpened,

    #[error(transparent)]
    Decoder(#[from] DecoderError),
}

/// Pipeline lifecycle errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline is not prepared")]
    NotPrepared,

    #[error("Pipeline is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Decoder(#[from] DecoderError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Buffer pool misuse
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    #[error("Buffer index {0} out of range")]
    InvalidIndex(usize),

    #[error("Buffer {0} is not checked out")]
    NotCheckedOut(usize),
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Endpoint malformed: {0}")]
    MalformedEndpoint(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Timeout")]
    Timeout,

    #[error("Not connected")]
    NotConnected,

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Frame header encoding failed: {0}")]
    Encode(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frame cache misuse
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cannot resize cache to {requested}: it holds {len} frames")]
    WouldTruncate { len: usize, requested: usize },
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
