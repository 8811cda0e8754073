use std::fmt;
use std::path::Path;

use image::GrayImage;
use ndarray::Array2;

use crate::error::{ConfigError, Result};

/// A decoded single-channel frame
///
/// Intensities are normalized into `[0, 1]` and stored row-major as
/// `(height, width)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Array2<f32>,
}

impl Frame {
    /// Wrap an existing intensity grid
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// Create a frame where every pixel has the same intensity
    pub fn filled(height: usize, width: usize, value: f32) -> Self {
        Self {
            data: Array2::from_elem((height, width), value),
        }
    }

    /// Convert an 8-bit grayscale image into a normalized frame
    pub fn from_luma(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let data = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            image.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
        });
        Self { data }
    }

    /// Frame height in pixels
    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Frame width in pixels
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// `(height, width)`, matching the array layout
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Borrow the underlying intensity grid
    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    /// Take ownership of the underlying intensity grid
    pub fn into_data(self) -> Array2<f32> {
        self.data
    }
}

/// A frame filename split into its clip key and frame index
///
/// The grammar is `<tokens joined by '_'>_<index>.<ext>`: every token but the
/// last forms the clip key, the last token is the numeric frame index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameName {
    file_name: String,
    clip_key: String,
    index: u64,
}

impl FrameName {
    /// Parse a bare filename such as `"survey_07_012.jpg"`
    pub fn parse(file_name: &str) -> Result<Self> {
        let malformed = |reason: &str| ConfigError::MalformedFilename {
            name: file_name.to_string(),
            reason: reason.to_string(),
        };

        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| malformed("missing file stem"))?;

        let (clip_key, index) = stem
            .rsplit_once('_')
            .ok_or_else(|| malformed("expected '<clip>_<index>'"))?;

        if clip_key.is_empty() {
            return Err(malformed("empty clip key").into());
        }

        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("frame index is not a number").into());
        }

        let index = index
            .parse::<u64>()
            .map_err(|_| malformed("frame index out of range"))?;

        Ok(Self {
            file_name: file_name.to_string(),
            clip_key: clip_key.to_string(),
            index,
        })
    }

    /// The full filename, extension included
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Filename without its extension
    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }

    pub fn clip_key(&self) -> &str {
        &self.clip_key
    }

    pub fn index(&self) -> u64 {
        self.index
    }
}

impl fmt::Display for FrameName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_parse_splits_key_and_index() {
        let name = FrameName::parse("Stratum1_run_3_012.jpg").unwrap();
        assert_eq!(name.clip_key(), "Stratum1_run_3");
        assert_eq!(name.index(), 12);
        assert_eq!(name.stem(), "Stratum1_run_3_012");
        assert_eq!(name.file_name(), "Stratum1_run_3_012.jpg");
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        assert!(FrameName::parse("frame.jpg").is_err());
        assert!(FrameName::parse("_001.jpg").is_err());
        assert!(FrameName::parse("clip_abc.jpg").is_err());
        assert!(FrameName::parse("clip_.jpg").is_err());
        assert!(FrameName::parse("clip_-1.jpg").is_err());
    }

    #[test]
    fn test_from_luma_normalizes() {
        let mut image = GrayImage::new(2, 1);
        image.put_pixel(0, 0, Luma([0]));
        image.put_pixel(1, 0, Luma([255]));

        let frame = Frame::from_luma(&image);
        assert_eq!(frame.dim(), (1, 2));
        assert_eq!(frame.data()[[0, 0]], 0.0);
        assert_eq!(frame.data()[[0, 1]], 1.0);
    }
}
