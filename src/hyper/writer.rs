use std::fs::{create_dir_all, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use tracing::{debug, warn};

use crate::config::OutputConfig;
use crate::error::{FrameError, Result};
use crate::frames::FrameName;
use crate::hyper::types::HyperImage;
use crate::render::Renderer;
use crate::video::RenderedFrame;

/// Where label files come from and how they are named
#[derive(Debug, Clone)]
pub struct LabelSource {
    pub dir: PathBuf,
    pub extension: String,
}

/// What happened to one hyper-image's label file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOutcome {
    Copied,
    Missing,
    Disabled,
}

/// Persists hyper-images as raw arrays, rendered images and label copies
///
/// Layout under the output root:
///
/// ```text
/// <root>/images/<stem>.npy   float32 (height, width, channels)
/// <root>/images/<stem>.jpg   rendered composite
/// <root>/labels/<stem>.txt   label copied unchanged
/// ```
#[derive(Debug, Clone)]
pub struct HyperImageWriter {
    images_dir: PathBuf,
    labels_dir: PathBuf,
    renderer: Renderer,
    write_arrays: bool,
    write_images: bool,
    jpeg_quality: u8,
    labels: Option<LabelSource>,
}

impl HyperImageWriter {
    pub fn new<P: AsRef<Path>>(output_root: P, options: &OutputConfig, renderer: Renderer) -> Self {
        let root = output_root.as_ref();
        Self {
            images_dir: root.join("images"),
            labels_dir: root.join("labels"),
            renderer,
            write_arrays: options.write_arrays,
            write_images: options.write_images,
            jpeg_quality: options.jpeg_quality,
            labels: None,
        }
    }

    /// Copy labels from `source` next to every written hyper-image
    pub fn with_labels(mut self, source: LabelSource) -> Self {
        self.labels = Some(source);
        self
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn labels_dir(&self) -> &Path {
        &self.labels_dir
    }

    /// Create the output directories
    pub fn prepare(&self) -> Result<()> {
        create_dir_all(&self.images_dir)?;
        if self.labels.is_some() {
            create_dir_all(&self.labels_dir)?;
        }
        Ok(())
    }

    /// Write every enabled form of one hyper-image
    pub fn write(&self, name: &FrameName, hyper: &HyperImage) -> Result<LabelOutcome> {
        let stem = name.stem();

        if self.write_arrays {
            save_array(self.images_dir.join(format!("{}.npy", stem)), hyper)?;
        }

        if self.write_images {
            let rendered = self.renderer.render(hyper)?;
            save_jpeg(self.images_dir.join(format!("{}.jpg", stem)), &rendered, self.jpeg_quality)?;
        }

        match &self.labels {
            Some(labels) => {
                let copied = copy_label(&labels.dir, &self.labels_dir, stem, &labels.extension)?;
                Ok(if copied { LabelOutcome::Copied } else { LabelOutcome::Missing })
            }
            None => Ok(LabelOutcome::Disabled),
        }
    }
}

/// Dump the full-precision array in NumPy `.npy` format
pub fn save_array<P: AsRef<Path>>(path: P, hyper: &HyperImage) -> Result<()> {
    let path = path.as_ref();
    ndarray_npy::write_npy(path, hyper.data()).map_err(|e| FrameError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Encode a rendered frame as JPEG at the given quality
pub fn save_jpeg<P: AsRef<Path>>(path: P, frame: &RenderedFrame, quality: u8) -> Result<()> {
    let path = path.as_ref();
    let write_failed = |reason: String| FrameError::WriteFailed {
        path: path.display().to_string(),
        reason,
    };

    let mut writer = BufWriter::new(File::create(path)?);
    let image = frame.as_image();
    JpegEncoder::new_with_quality(&mut writer, quality)
        .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .map_err(|e| write_failed(e.to_string()))?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// Copy `<label_dir>/<stem>.<ext>` into `dest_dir`
///
/// Returns `false` and logs a warning when the label does not exist.
pub fn copy_label(label_dir: &Path, dest_dir: &Path, stem: &str, extension: &str) -> Result<bool> {
    let file_name = format!("{}.{}", stem, extension);
    let source = label_dir.join(&file_name);

    if !source.is_file() {
        warn!("Label file {} does not exist", source.display());
        return Ok(false);
    }

    std::fs::copy(&source, dest_dir.join(&file_name))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use tempfile::tempdir;

    fn hyper() -> HyperImage {
        HyperImage::new(Array3::from_shape_fn((4, 6, 3), |(y, x, c)| {
            (y * 6 + x) as f32 / 24.0 * (c as f32 + 1.0) / 3.0
        }))
    }

    #[test]
    fn test_writes_arrays_images_and_labels() {
        let dir = tempdir().unwrap();
        let labels = dir.path().join("labels_in");
        std::fs::create_dir(&labels).unwrap();
        std::fs::write(labels.join("c_002.txt"), "0 0.5 0.5 0.1 0.1\n").unwrap();

        let out = dir.path().join("out");
        let writer = HyperImageWriter::new(&out, &OutputConfig::default(), Renderer::default())
            .with_labels(LabelSource {
                dir: labels.clone(),
                extension: "txt".to_string(),
            });
        writer.prepare().unwrap();

        let outcome = writer.write(&FrameName::parse("c_002.jpg").unwrap(), &hyper()).unwrap();
        assert_eq!(outcome, LabelOutcome::Copied);
        assert!(out.join("images/c_002.npy").is_file());
        assert!(out.join("images/c_002.jpg").is_file());
        assert_eq!(
            std::fs::read_to_string(out.join("labels/c_002.txt")).unwrap(),
            "0 0.5 0.5 0.1 0.1\n"
        );

        let outcome = writer.write(&FrameName::parse("c_003.jpg").unwrap(), &hyper()).unwrap();
        assert_eq!(outcome, LabelOutcome::Missing);
    }

    #[test]
    fn test_array_dump_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.npy");
        let original = hyper();
        save_array(&path, &original).unwrap();

        let loaded: Array3<f32> = ndarray_npy::read_npy(&path).unwrap();
        assert_eq!(&loaded, original.data());
    }

    #[test]
    fn test_rendered_jpeg_decodes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.jpg");
        let rendered = Renderer::default().render(&hyper()).unwrap();
        save_jpeg(&path, &rendered, 95).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (6, 4));
    }
}
