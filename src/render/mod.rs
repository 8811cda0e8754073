//! # Rendering Module
//!
//! Turns hyper-images into 8-bit RGB composites for human review, using a
//! temporal colour code: frames before the center tint blue, frames after it
//! tint red, on top of the grayscale center frame.

pub mod renderer;

pub use renderer::{render, Renderer};
