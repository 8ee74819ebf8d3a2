//! Codec boundaries
//!
//! The hardware audio decoder the pipeline drives and the video encoder
//! controls the dispatcher uses.

pub mod decoder;
pub mod encoder;
pub mod passthrough;

pub use decoder::{DecoderFactory, HardwareAudioDecoder, OutputStatus};
pub use encoder::{EncoderHandle, VideoEncoderControl};
pub use passthrough::{DecoderActivity, PassthroughDecoder, PassthroughDecoderFactory};
