use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, VideoError};
use crate::video::types::{RenderedFrame, VideoInfo};

/// Source of decoded frames, read strictly in order
pub trait FrameStream {
    /// Next frame, or `None` once the stream is exhausted
    fn next_frame(&mut self) -> Result<Option<RenderedFrame>>;
}

/// In-memory frames
impl FrameStream for std::vec::IntoIter<RenderedFrame> {
    fn next_frame(&mut self) -> Result<Option<RenderedFrame>> {
        Ok(self.next())
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    #[serde(default)]
    r_frame_rate: String,
    #[serde(default)]
    avg_frame_rate: String,
}

/// Read width, height and frame rate of the first video stream with ffprobe
pub fn probe<P: AsRef<Path>>(path: P) -> Result<VideoInfo> {
    let path = path.as_ref();
    let probe_failed = |reason: String| VideoError::ProbeFailed {
        path: path.display().to_string(),
        reason,
    };

    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,r_frame_rate,avg_frame_rate",
            "-of", "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| probe_failed(format!("ffprobe failed to start: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(probe_failed(stderr.trim().to_string()).into());
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| probe_failed(format!("invalid ffprobe output: {}", e)))?;

    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| probe_failed("no video stream".to_string()))?;

    let fps = parse_frame_rate(&stream.r_frame_rate)
        .or_else(|| parse_frame_rate(&stream.avg_frame_rate))
        .ok_or_else(|| probe_failed(format!("unreadable frame rate '{}'", stream.r_frame_rate)))?;

    let info = VideoInfo {
        width: stream.width,
        height: stream.height,
        fps,
    };
    info!("Video metadata for {}: {}x{} @ {:.2}fps", path.display(), info.width, info.height, info.fps);
    Ok(info)
}

/// Parse ffprobe rates such as `"30000/1001"` or `"10"`
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Decodes a video file frame by frame through an `ffmpeg` child process
pub struct FfmpegReader {
    path: PathBuf,
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    frames_read: usize,
}

impl FfmpegReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let info = probe(&path)?;

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(&path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VideoError::DecodingFailed {
                path: path.display().to_string(),
                reason: format!("Failed to spawn FFmpeg process: {}", e),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| VideoError::DecodingFailed {
            path: path.display().to_string(),
            reason: "FFmpeg stdout unavailable".to_string(),
        })?;

        Ok(Self {
            path,
            info,
            child,
            stdout,
            frames_read: 0,
        })
    }

    pub fn info(&self) -> VideoInfo {
        self.info
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameStream for FfmpegReader {
    fn next_frame(&mut self) -> Result<Option<RenderedFrame>> {
        let frame_len = self.info.width as usize * self.info.height as usize * 3;
        let mut buffer = vec![0u8; frame_len];

        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("{} exhausted after {} frames", self.path.display(), self.frames_read);
                return Ok(None);
            }
            Err(e) => {
                return Err(VideoError::DecodingFailed {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        }

        self.frames_read += 1;
        RenderedFrame::from_rgb_bytes(self.info.width, self.info.height, buffer)
            .map(Some)
            .ok_or_else(|| {
                VideoError::DecodingFailed {
                    path: self.path.display().to_string(),
                    reason: "frame buffer has the wrong length".to_string(),
                }
                .into()
            })
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("10/1"), Some(10.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate(""), None);
    }

    #[test]
    fn test_memory_stream_ends() {
        let mut stream = vec![RenderedFrame::new_black(2, 2)].into_iter();
        assert!(stream.next_frame().unwrap().is_some());
        assert!(stream.next_frame().unwrap().is_none());
    }
}
