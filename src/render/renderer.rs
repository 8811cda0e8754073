use image::{ImageBuffer, Rgb};
use ndarray::{ArrayView2, Zip};

use crate::config::RenderConfig;
use crate::error::{ConfigError, Result};
use crate::hyper::HyperImage;
use crate::video::RenderedFrame;

/// Reduces an N-channel hyper-image to a viewable RGB composite
///
/// The center channel is the grayscale backdrop. Every other channel `i`
/// is decoded back to a signed value `(v - 0.5) * 2` and spread over red and
/// blue by its temporal position `i / (2n)`: late channels lean red, early
/// channels lean blue. Green is never touched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Renderer {
    scale: f32,
    rgb_passthrough: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rgb_passthrough: true,
        }
    }
}

impl Renderer {
    /// Renderer with the given contrast gain
    pub fn new(scale: f32) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            scale: config.scale,
            rgb_passthrough: config.rgb_passthrough,
        }
    }

    /// Show 3-channel hyper-images as a plain RGB triple (the default)
    /// instead of colour-coding them
    pub fn with_rgb_passthrough(mut self, enabled: bool) -> Self {
        self.rgb_passthrough = enabled;
        self
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn render(&self, hyper: &HyperImage) -> Result<RenderedFrame> {
        let channels = hyper.channels();

        match channels {
            0 => Err(invalid_channels(channels)),
            1 => Ok(to_rgb8(hyper.channel(0), hyper.channel(0), hyper.channel(0))),
            3 if self.rgb_passthrough => {
                Ok(to_rgb8(hyper.channel(0), hyper.channel(1), hyper.channel(2)))
            }
            c if c % 2 == 0 => Err(invalid_channels(channels)),
            _ => Ok(self.render_temporal(hyper)),
        }
    }

    fn render_temporal(&self, hyper: &HyperImage) -> RenderedFrame {
        let n = (hyper.channels() - 1) / 2;
        let center = hyper.channel(n);

        let mut red = center.to_owned();
        let mut blue = center.to_owned();

        for i in (0..=2 * n).filter(|&i| i != n) {
            let factor = i as f32 / (2 * n) as f32;
            let red_gain = factor / n as f32 * self.scale;
            let blue_gain = (1.0 - factor) / n as f32 * self.scale;

            Zip::from(&mut red)
                .and(&mut blue)
                .and(hyper.channel(i))
                .for_each(|r, b, &v| {
                    let delta = (v - 0.5) * 2.0;
                    *r += delta * red_gain;
                    *b += delta * blue_gain;
                });
        }

        to_rgb8(red.view(), center, blue.view())
    }
}

/// Render with a one-off gain
pub fn render(hyper: &HyperImage, scale: f32) -> Result<RenderedFrame> {
    Renderer::new(scale).render(hyper)
}

fn invalid_channels(channels: usize) -> crate::error::HyperImageError {
    ConfigError::InvalidValue {
        key: "hyper_image.channels".to_string(),
        value: format!("{} (must be odd to colour-code around a center channel)", channels),
    }
    .into()
}

/// Clip each plane to `[0, 1]` and quantize to 8 bits
fn to_rgb8(red: ArrayView2<'_, f32>, green: ArrayView2<'_, f32>, blue: ArrayView2<'_, f32>) -> RenderedFrame {
    let (height, width) = red.dim();
    let buffer = ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            quantize(red[[y, x]]),
            quantize(green[[y, x]]),
            quantize(blue[[y, x]]),
        ])
    });
    RenderedFrame::new(buffer)
}

fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}
