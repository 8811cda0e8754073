use std::fmt;
use std::str::FromStr;

use ndarray::{Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, HyperImageError, Result};

/// How a window of frames is combined into a hyper-image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositionMode {
    /// Channels are the raw window frames
    Stack,
    /// Side channels are re-centered differences against the center frame
    Diff,
    /// Side channels are re-centered differences against the clip mean
    Mean,
}

impl CompositionMode {
    pub const ALL: [CompositionMode; 3] = [Self::Stack, Self::Diff, Self::Mean];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stack => "stack",
            Self::Diff => "diff",
            Self::Mean => "mean",
        }
    }
}

impl fmt::Display for CompositionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompositionMode {
    type Err = HyperImageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stack" => Ok(Self::Stack),
            "diff" => Ok(Self::Diff),
            "mean" => Ok(Self::Mean),
            _ => Err(ConfigError::InvalidValue {
                key: "composition.mode".to_string(),
                value: s.to_string(),
            }
            .into()),
        }
    }
}

/// Composition mode and window width for one pipeline run
///
/// Built once, validated, then passed by value to everything that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowSpec {
    mode: CompositionMode,
    width: usize,
}

impl WindowSpec {
    /// Fails with [`ConfigError::InvalidWindowWidth`] unless `width` is odd
    pub fn new(mode: CompositionMode, width: usize) -> Result<Self> {
        if width == 0 || width % 2 == 0 {
            return Err(ConfigError::InvalidWindowWidth { width }.into());
        }
        Ok(Self { mode, width })
    }

    pub fn mode(&self) -> CompositionMode {
        self.mode
    }

    /// Total frames per window (`2 * half + 1`)
    pub fn width(&self) -> usize {
        self.width
    }

    /// Neighbors on each side of the center frame
    pub fn half(&self) -> usize {
        self.width / 2
    }

    /// Short tag used in output names, e.g. `diff_3`
    pub fn label(&self) -> String {
        format!("{}_{}", self.mode, self.width)
    }
}

/// A multi-channel array built from one temporal window
///
/// Shape is `(height, width, channels)`. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperImage {
    data: Array3<f32>,
}

impl HyperImage {
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    /// One channel as a `(height, width)` view
    pub fn channel(&self, index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(2), index)
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn into_data(self) -> Array3<f32> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_spec_requires_odd_width() {
        assert!(WindowSpec::new(CompositionMode::Stack, 1).is_ok());
        assert!(WindowSpec::new(CompositionMode::Diff, 5).is_ok());
        assert!(WindowSpec::new(CompositionMode::Diff, 0).is_err());
        assert!(WindowSpec::new(CompositionMode::Mean, 4).is_err());

        let spec = WindowSpec::new(CompositionMode::Mean, 7).unwrap();
        assert_eq!(spec.half(), 3);
        assert_eq!(spec.label(), "mean_7");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Diff".parse::<CompositionMode>().unwrap(), CompositionMode::Diff);
        assert!("median".parse::<CompositionMode>().is_err());
    }
}
