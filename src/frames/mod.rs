//! # Frame Module
//!
//! Source frames: the filename grammar, decoding into normalized grayscale,
//! and grouping a flat directory listing into ordered clips.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hyper_image::frames::{group_clips, DirectorySource};
//!
//! # fn main() -> hyper_image::Result<()> {
//! let source = DirectorySource::new("dataset/images");
//! let clips = group_clips(source.list_frames(&["jpg".to_string()])?);
//!
//! for clip in clips.iter() {
//!     println!("{}: {} frames", clip.key(), clip.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod grouper;
pub mod source;
pub mod types;

pub use grouper::{group_clips, Clip, ClipSet};
pub use source::{DirectorySource, FrameSource};
pub use types::{Frame, FrameName};
