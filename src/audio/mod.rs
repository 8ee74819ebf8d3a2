//! Audio decode subsystem

pub mod buffer;
pub mod pipeline;
pub mod sink;
pub mod source;

pub use buffer::{BufferPool, PcmScratch};
pub use pipeline::{AudioDecodePipeline, AudioTrackDescriptor, PipelineHandle, PipelineState};
pub use sink::{ChannelSink, PcmSink};
pub use source::{
    AudioSource, MemorySample, MemorySource, MemorySourceFactory, MemoryTrack, SeekMode, SourceFactory,
    SourceActivity, TrackFormat,
};
