//! # Hyper-Image Module
//!
//! Builds multi-channel hyper-images from temporal windows of a clip and
//! persists them for training and review.
//!
//! - [`WindowComposer`] combines one window under a [`CompositionMode`]
//! - [`ClipProcessor`] slides the window across a clip
//! - [`HyperImageWriter`] writes `.npy` arrays, rendered JPEGs and label copies

pub mod composer;
pub mod processor;
pub mod types;
pub mod writer;

pub use composer::WindowComposer;
pub use processor::{clip_mean, ClipOutput, ClipProcessor, WindowStats};
pub use types::{CompositionMode, HyperImage, WindowSpec};
pub use writer::{HyperImageWriter, LabelOutcome, LabelSource};
