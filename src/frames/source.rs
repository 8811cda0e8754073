use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, FrameError, Result};
use crate::frames::types::{Frame, FrameName};

/// Anything that can hand out decoded frames by name
///
/// The Clip Processor only talks to this trait, so frames may come from a
/// directory on disk or be synthesized in memory.
pub trait FrameSource: Send + Sync {
    /// Decode one frame into normalized grayscale
    fn load(&self, name: &FrameName) -> Result<Frame>;
}

/// Frame source backed by a directory of image files
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of a frame inside this directory
    pub fn path_for(&self, name: &FrameName) -> PathBuf {
        self.root.join(name.file_name())
    }

    /// List frame filenames with one of the given extensions, sorted by name
    ///
    /// Hidden files and subdirectories are ignored. A missing directory is a
    /// configuration error.
    pub fn list_frames(&self, extensions: &[String]) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(ConfigError::MissingDirectory {
                path: self.root.display().to_string(),
            }
            .into());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() || is_hidden_file(&path) || !has_extension(&path, extensions) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }

        names.sort();
        info!("Found {} frame files in {}", names.len(), self.root.display());
        Ok(names)
    }
}

impl FrameSource for DirectorySource {
    fn load(&self, name: &FrameName) -> Result<Frame> {
        let path = self.path_for(name);
        debug!("Decoding frame {}", path.display());

        let image = image::open(&path).map_err(|e| FrameError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Frame::from_luma(&image.to_luma8()))
    }
}

fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use tempfile::tempdir;

    #[test]
    fn test_list_frames_filters_and_sorts() {
        let dir = tempdir().unwrap();
        for name in ["b_002.jpg", "b_001.JPG", ".hidden_001.jpg", "notes.txt", "a_001.png"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub_001.jpg")).unwrap();

        let source = DirectorySource::new(dir.path());
        let names = source.list_frames(&["jpg".to_string()]).unwrap();
        assert_eq!(names, vec!["b_001.JPG", "b_002.jpg"]);
    }

    #[test]
    fn test_missing_directory_is_config_error() {
        let dir = tempdir().unwrap();
        let source = DirectorySource::new(dir.path().join("nope"));
        assert!(source.list_frames(&["jpg".to_string()]).is_err());
    }

    #[test]
    fn test_load_decodes_grayscale() {
        let dir = tempdir().unwrap();
        let image = GrayImage::from_pixel(4, 3, Luma([51]));
        image.save(dir.path().join("c_001.png")).unwrap();

        let source = DirectorySource::new(dir.path());
        let frame = source.load(&FrameName::parse("c_001.png").unwrap()).unwrap();
        assert_eq!(frame.dim(), (3, 4));
        assert!((frame.data()[[1, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_load_corrupt_file_fails() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("c_001.png"), b"not an image").unwrap();

        let source = DirectorySource::new(dir.path());
        let err = source.load(&FrameName::parse("c_001.png").unwrap()).unwrap_err();
        assert!(err.is_recoverable());
    }
}
