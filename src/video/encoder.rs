use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, warn};

use crate::error::{Result, VideoError};
use crate::video::types::{RenderedFrame, VideoParams};

/// Destination for an ordered stream of rendered frames
pub trait FrameSink {
    /// Append one frame; frames are kept in call order
    fn write_frame(&mut self, frame: &RenderedFrame) -> Result<()>;

    /// Flush and close the sink
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects frames in memory
impl FrameSink for Vec<RenderedFrame> {
    fn write_frame(&mut self, frame: &RenderedFrame) -> Result<()> {
        self.push(frame.clone());
        Ok(())
    }
}

pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Streams raw RGB frames into an `ffmpeg` child process
///
/// Width and height must be even. The writer owns the output path for its
/// lifetime: dropping it before [`FrameSink::finish`] kills ffmpeg and removes
/// the partial file, and so does a `finish` that fails.
pub struct FfmpegWriter {
    path: PathBuf,
    size: (u32, u32),
    child: Child,
    stdin: Option<ChildStdin>,
    frames_written: usize,
}

impl FfmpegWriter {
    /// Start an encoder for frames of `size` (`width`, `height`)
    pub fn create<P: AsRef<Path>>(path: P, size: (u32, u32), params: &VideoParams) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (width, height) = size;

        if width == 0 || height == 0 || !(params.fps > 0.0) {
            return Err(VideoError::EncodingFailed {
                reason: format!("invalid video geometry {}x{} @ {} fps", width, height, params.fps),
            }
            .into());
        }

        // yuv420p output
        if width % 2 != 0 || height % 2 != 0 {
            return Err(VideoError::EncodingFailed {
                reason: format!("video size {}x{} must be even", width, height),
            }
            .into());
        }

        if !ffmpeg_available() {
            return Err(VideoError::FfmpegUnavailable.into());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.args([
            "-y",
            "-loglevel", "error",
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-s", &format!("{}x{}", width, height),
            "-r", &params.fps.to_string(),
            "-i", "pipe:0",
            "-an",
            "-c:v", &params.codec,
            "-crf", &params.crf().to_string(),
            "-pix_fmt", "yuv420p",
        ])
        .arg(&path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| VideoError::EncodingFailed {
            reason: format!("Failed to spawn FFmpeg process: {}", e),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| VideoError::EncodingFailed {
            reason: "FFmpeg stdin unavailable".to_string(),
        })?;

        debug!("Encoding {}x{} @ {} fps into {}", width, height, params.fps, path.display());

        Ok(Self {
            path,
            size,
            child,
            stdin: Some(stdin),
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    fn remove_output(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove partial video {}: {}", self.path.display(), e);
            }
        }
    }
}

impl FrameSink for FfmpegWriter {
    fn write_frame(&mut self, frame: &RenderedFrame) -> Result<()> {
        if frame.dimensions() != self.size {
            return Err(VideoError::SizeMismatch {
                index: self.frames_written,
                expected: self.size,
                actual: frame.dimensions(),
            }
            .into());
        }

        let stdin = self.stdin.as_mut().ok_or_else(|| VideoError::EncodingFailed {
            reason: "encoder already finished".to_string(),
        })?;

        stdin.write_all(frame.as_rgb_bytes()).map_err(|e| VideoError::EncodingFailed {
            reason: format!("Failed to write frame to FFmpeg: {}", e),
        })?;

        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let Some(stdin) = self.stdin.take() else {
            return Ok(());
        };
        drop(stdin);

        let mut stderr = String::new();
        if let Some(mut pipe) = self.child.stderr.take() {
            use std::io::Read;
            let _ = pipe.read_to_string(&mut stderr);
        }

        let failure = match self.child.wait() {
            Ok(status) if status.success() => return Ok(()),
            Ok(_) => format!("FFmpeg failed: {}", stderr.trim()),
            Err(e) => format!("FFmpeg execution failed: {}", e),
        };

        self.remove_output();
        Err(VideoError::EncodingFailed { reason: failure }.into())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if self.stdin.take().is_none() {
            return;
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
        self.remove_output();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HyperImageError;
    use tempfile::tempdir;

    #[test]
    fn test_odd_size_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("odd.mp4");

        for size in [(5, 3), (6, 3), (5, 4)] {
            let err = FfmpegWriter::create(&path, size, &VideoParams::default()).err().unwrap();
            assert!(matches!(err, HyperImageError::Video(VideoError::EncodingFailed { .. })));
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_zero_size_and_bad_fps_rejected() {
        let params = VideoParams {
            fps: 0.0,
            ..VideoParams::default()
        };
        assert!(FfmpegWriter::create("never.mp4", (4, 4), &params).is_err());
        assert!(FfmpegWriter::create("never.mp4", (0, 4), &VideoParams::default()).is_err());
    }

    #[test]
    fn test_failed_finish_removes_output() {
        if !ffmpeg_available() {
            eprintln!("ffmpeg not on PATH, skipping");
            return;
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.mp4");
        std::fs::write(&path, b"stale").unwrap();
        let params = VideoParams {
            codec: "no_such_codec".to_string(),
            ..VideoParams::default()
        };

        let mut writer = FfmpegWriter::create(&path, (4, 4), &params).unwrap();
        assert!(writer.finish().is_err());
        assert!(!path.exists());
    }
}
