//! # Pipeline
//!
//! The engine that runs a whole dataset: every configured directory, mode and
//! window width, followed by optional clip-set and side-by-side videos.

pub mod engine;
pub mod summary;

pub use engine::{
    build_variant, render_clip_set_stills, render_clip_set_video, write_clip_set, ClipLayout,
    HyperImageEngine,
};
pub use summary::{ClipCounts, RunSummary, VariantReport};
