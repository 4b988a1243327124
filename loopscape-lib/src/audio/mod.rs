//! Audio buffers plus decode/encode at the edges of the pipeline.

pub mod buffer;
pub mod decode;
pub mod encode;

pub use buffer::AudioBuffer;
pub use encode::{FrameSink, OutputFormat, WavSink};
