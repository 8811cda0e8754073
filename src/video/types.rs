use std::path::PathBuf;

use image::{imageops, ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// A rendered 3-channel 8-bit frame
///
/// This is a thin wrapper around an RGB image buffer, produced by the
/// renderer and consumed by image writers and video encoders.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedFrame {
    buffer: RgbImage,
}

impl RenderedFrame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        Self {
            buffer: ImageBuffer::new(width, height),
        }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self {
            buffer: ImageBuffer::from_pixel(width, height, Rgb(color)),
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Raw interleaved RGB bytes, row-major
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// Copy onto a black canvas of `width` x `height`, anchored top-left
    ///
    /// Parts that do not fit the canvas are cropped.
    pub fn padded(&self, width: u32, height: u32) -> Self {
        let mut canvas: RgbImage = ImageBuffer::new(width, height);
        imageops::replace(&mut canvas, &self.buffer, 0, 0);
        Self { buffer: canvas }
    }

    /// Scale to `width` x `height` with a triangle filter
    pub fn resized(&self, width: u32, height: u32) -> Self {
        Self {
            buffer: imageops::resize(&self.buffer, width, height, imageops::FilterType::Triangle),
        }
    }

    /// Save the frame as an image file, format chosen by extension
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

/// How inputs are laid out when videos are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Side by side, left to right
    #[default]
    Horizontal,
    /// Stacked, top to bottom
    Vertical,
}

/// Video encoding parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoParams {
    /// Output frame rate
    pub fps: f64,

    /// ffmpeg video codec
    pub codec: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            fps: 10.0,
            codec: "libx264".to_string(),
            quality: 85,
        }
    }
}

impl VideoParams {
    /// Map the 0-100 quality onto x264's CRF scale (51 worst, 0 lossless)
    pub fn crf(&self) -> u8 {
        (51 - ((self.quality.min(100) as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
    }
}

/// Stream geometry reported by ffprobe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Represents an encoded video output
#[derive(Debug, Clone)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub file_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_bytes_round_trip() {
        let frame = RenderedFrame::new_filled(3, 2, [10, 20, 30]);
        let bytes = frame.as_rgb_bytes().to_vec();
        assert_eq!(bytes.len(), 3 * 2 * 3);

        let rebuilt = RenderedFrame::from_rgb_bytes(3, 2, bytes).unwrap();
        assert_eq!(rebuilt, frame);
        assert!(RenderedFrame::from_rgb_bytes(3, 3, vec![0; 4]).is_none());
    }

    #[test]
    fn test_padding_keeps_content_top_left() {
        let frame = RenderedFrame::new_filled(5, 3, [200, 100, 50]);
        let padded = frame.padded(6, 4);
        assert_eq!(padded.dimensions(), (6, 4));
        assert_eq!(padded.get_pixel(4, 2), [200, 100, 50]);
        assert_eq!(padded.get_pixel(5, 0), [0, 0, 0]);
        assert_eq!(padded.get_pixel(0, 3), [0, 0, 0]);
    }

    #[test]
    fn test_resize_solid_frame() {
        let resized = RenderedFrame::new_filled(3, 2, [40, 80, 120]).resized(6, 4);
        assert_eq!(resized.dimensions(), (6, 4));
        for (got, want) in resized.get_pixel(5, 3).iter().zip([40u8, 80, 120]) {
            assert!(got.abs_diff(want) <= 1);
        }
    }

    #[test]
    fn test_quality_to_crf() {
        let mut params = VideoParams::default();
        params.quality = 100;
        assert_eq!(params.crf(), 0);
        params.quality = 0;
        assert_eq!(params.crf(), 51);
    }
}
