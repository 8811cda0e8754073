//! # Video Module
//!
//! Rendered frames, the ffmpeg encoder and decoder, and the assembler that
//! turns frame sequences into videos or tiles existing videos together.

pub mod assembler;
pub mod encoder;
pub mod reader;
pub mod types;

pub use assembler::{combine_frames, concat_streams, even_size, write_sequence, PaddedSink, VideoAssembler};
pub use encoder::{ffmpeg_available, FfmpegWriter, FrameSink};
pub use reader::{probe, FfmpegReader, FrameStream};
pub use types::{EncodedVideo, Orientation, RenderedFrame, VideoInfo, VideoParams};
