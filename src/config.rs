use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    hyper::{CompositionMode, WindowSpec},
    video::{Orientation, VideoParams},
};

/// Main configuration for a hyper-image run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the source frames live
    pub dataset: DatasetConfig,

    /// Composition modes and window widths to produce
    pub composition: CompositionConfig,

    /// What gets written per hyper-image
    pub output: OutputConfig,

    /// Renderer settings
    pub render: RenderConfig,

    /// Clip-set video settings
    pub video: VideoConfig,

    /// Parallelism settings
    pub processing: ProcessingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.dataset.validate()?;
        self.composition.validate()?;
        self.output.validate()?;
        self.render.validate()?;
        self.video.validate()?;
        self.processing.validate()?;
        Ok(())
    }

    /// Every mode × width combination, in configuration order
    pub fn window_specs(&self) -> Result<Vec<WindowSpec>> {
        self.composition.window_specs()
    }

    /// Video output directory, relative paths resolved against `dataset.base_dir`
    pub fn video_output_dir(&self) -> PathBuf {
        if self.video.output_dir.is_absolute() {
            self.video.output_dir.clone()
        } else {
            self.dataset.base_dir.join(&self.video.output_dir)
        }
    }
}

fn invalid<T: ToString>(key: &str, value: T) -> crate::error::HyperImageError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}

/// Dataset layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Root holding one folder per dataset
    pub base_dir: PathBuf,

    /// Dataset folder names under `base_dir`
    pub directories: Vec<String>,

    /// Frame subdirectory inside each dataset
    pub images_subdir: String,

    /// Label subdirectory inside each dataset
    pub labels_subdir: String,

    /// Accepted frame file extensions (case-insensitive)
    pub extensions: Vec<String>,

    /// Extension of label files
    pub label_extension: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            directories: Vec::new(),
            images_subdir: "images".to_string(),
            labels_subdir: "labels".to_string(),
            extensions: vec!["jpg".to_string()],
            label_extension: "txt".to_string(),
        }
    }
}

impl DatasetConfig {
    /// `<base_dir>/<directory>/<images_subdir>`
    pub fn images_dir(&self, directory: &str) -> PathBuf {
        self.base_dir.join(directory).join(&self.images_subdir)
    }

    /// `<base_dir>/<directory>/<labels_subdir>`
    pub fn labels_dir(&self, directory: &str) -> PathBuf {
        self.base_dir.join(directory).join(&self.labels_subdir)
    }

    /// `<base_dir>/<directory>_<mode>_<width>`
    pub fn output_dir(&self, directory: &str, spec: &WindowSpec) -> PathBuf {
        self.base_dir.join(format!("{}_{}", directory, spec.label()))
    }

    fn validate(&self) -> Result<()> {
        if self.extensions.is_empty() {
            return Err(invalid("dataset.extensions", "[]"));
        }

        if let Some(name) = self.directories.iter().find(|d| d.is_empty() || d.contains(['/', '\\'])) {
            return Err(invalid("dataset.directories", format!("'{}'", name)));
        }

        if self.images_subdir.is_empty() {
            return Err(invalid("dataset.images_subdir", "''"));
        }

        Ok(())
    }
}

/// Which hyper-image variants to produce
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    pub modes: Vec<CompositionMode>,

    /// Window widths; each must be odd
    pub window_sizes: Vec<usize>,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            modes: CompositionMode::ALL.to_vec(),
            window_sizes: vec![3],
        }
    }
}

impl CompositionConfig {
    pub fn window_specs(&self) -> Result<Vec<WindowSpec>> {
        let mut specs = Vec::with_capacity(self.modes.len() * self.window_sizes.len());
        for &mode in &self.modes {
            for &width in &self.window_sizes {
                specs.push(WindowSpec::new(mode, width)?);
            }
        }
        Ok(specs)
    }

    fn validate(&self) -> Result<()> {
        if self.modes.is_empty() {
            return Err(invalid("composition.modes", "[]"));
        }

        if self.window_sizes.is_empty() {
            return Err(invalid("composition.window_sizes", "[]"));
        }

        self.window_specs().map(|_| ())
    }
}

/// Per hyper-image outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Raw float32 `.npy` dump
    pub write_arrays: bool,

    /// Rendered 8-bit JPEG
    pub write_images: bool,

    /// Copy the center frame's label next to the hyper-image
    pub copy_labels: bool,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            write_arrays: true,
            write_images: true,
            copy_labels: true,
            jpeg_quality: 95,
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(invalid("output.jpeg_quality", self.jpeg_quality));
        }

        Ok(())
    }
}

/// Renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Gain applied to the temporal colour offsets
    pub scale: f32,

    /// Show 3-channel hyper-images as a plain RGB triple
    pub rgb_passthrough: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rgb_passthrough: true,
        }
    }
}

impl RenderConfig {
    /// Rendering settings with the given gain, checked
    pub fn with_scale(scale: f32) -> Result<Self> {
        let config = Self {
            scale,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(invalid("render.scale", self.scale));
        }

        Ok(())
    }
}

/// Clip-set video configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Render videos after the dataset run
    pub enabled: bool,

    /// Output directory; relative to `dataset.base_dir` unless absolute
    pub output_dir: PathBuf,

    /// Blank frames before and after each clip
    pub blank_frames: usize,

    /// Extra copies of each clip's middle frame, written right after it
    pub hold_frames: usize,

    /// Resize clips to the first clip's frame size instead of failing the video
    pub resize_clips: bool,

    /// Also combine the per-mode videos of each dataset and width
    pub side_by_side: bool,

    /// Layout of the combined video
    pub orientation: Orientation,

    /// Encoding parameters
    pub params: VideoParams,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: PathBuf::from("videos"),
            blank_frames: 0,
            hold_frames: 0,
            resize_clips: false,
            side_by_side: false,
            orientation: Orientation::Horizontal,
            params: VideoParams::default(),
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if !self.params.fps.is_finite() || self.params.fps <= 0.0 {
            return Err(invalid("video.params.fps", self.params.fps));
        }

        if self.params.quality > 100 {
            return Err(invalid("video.params.quality", self.params.quality));
        }

        if self.params.codec.trim().is_empty() {
            return Err(invalid("video.params.codec", "''"));
        }

        Ok(())
    }
}

/// Parallelism settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Clips processed concurrently
    pub workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
        }
    }
}

impl ProcessingConfig {
    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(invalid("processing.workers", self.workers));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_specs().unwrap().len(), 3);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.dataset.directories = vec!["train".to_string(), "val".to_string()];
        original_config.composition.window_sizes = vec![3, 5];
        original_config.video.orientation = Orientation::Vertical;
        original_config.video.hold_frames = 18;
        original_config.video.resize_clips = true;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.dataset.directories, original_config.dataset.directories);
        assert_eq!(loaded_config.composition.modes, original_config.composition.modes);
        assert_eq!(loaded_config.composition.window_sizes, vec![3, 5]);
        assert_eq!(loaded_config.video.params, original_config.video.params);
        assert_eq!(loaded_config.video.orientation, Orientation::Vertical);
        assert_eq!(loaded_config.video.hold_frames, 18);
        assert!(loaded_config.video.resize_clips);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(
            &file_path,
            "[dataset]\nbase_dir = \"/data\"\ndirectories = [\"train\"]\n\n[composition]\nmodes = [\"diff\"]\n",
        )
        .unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.dataset.base_dir, PathBuf::from("/data"));
        assert_eq!(config.dataset.images_subdir, "images");
        assert_eq!(config.composition.modes, vec![CompositionMode::Diff]);
        assert_eq!(config.composition.window_sizes, vec![3]);
        assert_eq!(config.output.jpeg_quality, 95);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_even_window_rejected() {
        let mut config = Config::default();
        config.composition.window_sizes = vec![3, 4];
        assert!(matches!(
            config.validate(),
            Err(crate::HyperImageError::Config(ConfigError::InvalidWindowWidth { width: 4 }))
        ));
    }

    #[test]
    fn test_unknown_mode_fails_to_parse() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bad.toml");
        std::fs::write(&file_path, "[composition]\nmodes = [\"blend\"]\n").unwrap();

        let err = Config::from_file(&file_path).unwrap_err();
        assert!(matches!(err, crate::HyperImageError::Config(ConfigError::ParseFailed { .. })));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        config.render.scale = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scale_checked_on_its_own() {
        assert_eq!(RenderConfig::with_scale(2.5).unwrap().scale, 2.5);
        assert!(RenderConfig::with_scale(2.5).unwrap().rgb_passthrough);

        for scale in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let err = RenderConfig::with_scale(scale).unwrap_err();
            assert!(matches!(
                err,
                crate::HyperImageError::Config(ConfigError::InvalidValue { .. })
            ));
        }
    }

    #[test]
    fn test_output_paths() {
        let mut config = Config::default();
        config.dataset.base_dir = PathBuf::from("/data");
        let spec = WindowSpec::new(CompositionMode::Mean, 5).unwrap();

        assert_eq!(config.dataset.images_dir("train"), PathBuf::from("/data/train/images"));
        assert_eq!(config.dataset.output_dir("train", &spec), PathBuf::from("/data/train_mean_5"));
        assert_eq!(config.video_output_dir(), PathBuf::from("/data/videos"));
    }
}
