//! # Hyper-Image
//!
//! Turn sequences of single-channel frames into multi-channel "hyper-images"
//! for object-detection training, and render them back into viewable images
//! and videos.
//!
//! A hyper-image stacks a fixed-width temporal window around a center frame.
//! Side channels can hold the raw neighbours, their difference to the center
//! frame, or their difference to the clip mean.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hyper_image::{config::Config, pipeline::HyperImageEngine};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let mut config = Config::default();
//! config.dataset.base_dir = "datasets".into();
//! config.dataset.directories = vec!["train".to_string(), "val".to_string()];
//!
//! let engine = HyperImageEngine::new(config)?;
//! let summary = engine.run().await?;
//! println!("{} hyper-images written", summary.hyper_images());
//! # Ok(())
//! # }
//! ```
//!
//! ## Composing a single window
//!
//! ```rust
//! use hyper_image::frames::Frame;
//! use hyper_image::hyper::{CompositionMode, WindowComposer, WindowSpec};
//! use hyper_image::render::Renderer;
//!
//! # fn main() -> hyper_image::Result<()> {
//! let frames: Vec<Frame> = (0..3).map(|i| Frame::filled(4, 4, i as f32 * 0.25)).collect();
//! let window: Vec<&Frame> = frames.iter().collect();
//!
//! let composer = WindowComposer::new(WindowSpec::new(CompositionMode::Diff, 3)?);
//! let hyper = composer.compose(&window, None)?;
//! assert_eq!(hyper.channels(), 3);
//!
//! let rendered = Renderer::default().render(&hyper)?;
//! assert_eq!(rendered.dimensions(), (4, 4));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`frames`] - filename grammar, frame decoding and clip grouping
//! - [`hyper`] - window composition, clip processing and persistence
//! - [`render`] - temporal colour coding into RGB
//! - [`video`] - video assembly and side-by-side combination
//! - [`pipeline`] - dataset runs
//! - [`config`] - configuration management

pub mod config;
pub mod error;
pub mod frames;
pub mod hyper;
pub mod pipeline;
pub mod render;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{HyperImageError, Result},
    hyper::{CompositionMode, HyperImage, WindowSpec},
    pipeline::HyperImageEngine,
    render::Renderer,
};
