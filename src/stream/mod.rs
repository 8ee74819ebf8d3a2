//! Live-stream dispatch from encoder callbacks to the network muxer

pub mod dispatcher;

pub use dispatcher::{DisplayTarget, StreamDispatcher, SurfaceId};
