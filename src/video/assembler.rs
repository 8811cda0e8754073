use std::path::Path;

use image::imageops;
use tracing::{debug, info};

use crate::error::{ConfigError, Result, VideoError};
use crate::video::encoder::{FfmpegWriter, FrameSink};
use crate::video::reader::{FfmpegReader, FrameStream};
use crate::video::types::{EncodedVideo, Orientation, RenderedFrame, VideoParams};

/// Sequences rendered frames into video files
pub struct VideoAssembler {
    params: VideoParams,
}

impl VideoAssembler {
    pub fn new(params: VideoParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &VideoParams {
        &self.params
    }

    /// Encode `frames` into `output`, padded with solid black frames
    ///
    /// Every frame must be exactly `size` (`width`, `height`); a mismatch
    /// aborts the video and removes the partial file. `size` must be even,
    /// see [`PaddedSink`] for odd-sized content.
    pub fn assemble<I, P>(
        &self,
        frames: I,
        size: (u32, u32),
        leading_blank: usize,
        trailing_blank: usize,
        output: P,
    ) -> Result<EncodedVideo>
    where
        I: IntoIterator<Item = RenderedFrame>,
        P: AsRef<Path>,
    {
        let output = output.as_ref();
        info!("Assembling video {}", output.display());

        let mut writer = FfmpegWriter::create(output, size, &self.params)?;
        let frame_count = write_sequence(&mut writer, frames, size, leading_blank, trailing_blank)?;
        writer.finish()?;

        encoded_video(output, frame_count, size, self.params.fps)
    }

    /// Combine already-rendered videos frame by frame
    ///
    /// Stops as soon as any input runs out. Output frame rate is taken from
    /// the first input.
    pub fn concat<P, Q>(&self, inputs: &[P], orientation: Orientation, output: Q) -> Result<EncodedVideo>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        if inputs.len() < 2 {
            return Err(ConfigError::NotEnoughVideos { count: inputs.len() }.into());
        }

        let output = output.as_ref();
        let readers = inputs
            .iter()
            .map(FfmpegReader::open)
            .collect::<Result<Vec<_>>>()?;

        let infos: Vec<_> = readers.iter().map(FfmpegReader::info).collect();
        let sizes: Vec<(u32, u32)> = infos.iter().map(|i| (i.width, i.height)).collect();
        let size = combined_size(&sizes, orientation)?;
        let fps = infos[0].fps;

        info!("Combining {} videos into {} ({}x{} @ {:.2}fps)",
              inputs.len(), output.display(), size.0, size.1, fps);

        let params = VideoParams {
            fps,
            ..self.params.clone()
        };
        let mut writer = FfmpegWriter::create(output, size, &params)?;

        let mut streams: Vec<Box<dyn FrameStream>> = readers
            .into_iter()
            .map(|r| Box::new(r) as Box<dyn FrameStream>)
            .collect();
        let frame_count = concat_streams(&mut streams, orientation, &mut writer)?;
        writer.finish()?;

        encoded_video(output, frame_count, size, fps)
    }
}

/// Forwards frames to an inner sink, padded with black up to a fixed size
///
/// Lets odd-sized renders go into an encoder that needs even dimensions.
/// Frames larger than the target are rejected, never cropped.
pub struct PaddedSink<K> {
    inner: K,
    size: (u32, u32),
    written: usize,
}

impl<K: FrameSink> PaddedSink<K> {
    pub fn new(inner: K, size: (u32, u32)) -> Self {
        Self {
            inner,
            size,
            written: 0,
        }
    }

    /// Padded output size
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn into_inner(self) -> K {
        self.inner
    }
}

impl<K: FrameSink> FrameSink for PaddedSink<K> {
    fn write_frame(&mut self, frame: &RenderedFrame) -> Result<()> {
        let (width, height) = frame.dimensions();
        if width > self.size.0 || height > self.size.1 {
            return Err(VideoError::SizeMismatch {
                index: self.written,
                expected: self.size,
                actual: (width, height),
            }
            .into());
        }

        if (width, height) == self.size {
            self.inner.write_frame(frame)?;
        } else {
            self.inner.write_frame(&frame.padded(self.size.0, self.size.1))?;
        }
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.finish()
    }
}

/// Round `size` up to the next even width and height
pub fn even_size(size: (u32, u32)) -> (u32, u32) {
    (size.0 + size.0 % 2, size.1 + size.1 % 2)
}

/// Write `leading_blank` black frames, the content frames, then
/// `trailing_blank` black frames. Returns the number of frames written.
pub fn write_sequence<S, I>(
    sink: &mut S,
    frames: I,
    size: (u32, u32),
    leading_blank: usize,
    trailing_blank: usize,
) -> Result<usize>
where
    S: FrameSink + ?Sized,
    I: IntoIterator<Item = RenderedFrame>,
{
    let blank = RenderedFrame::new_black(size.0, size.1);
    let mut written = 0;

    for _ in 0..leading_blank {
        sink.write_frame(&blank)?;
        written += 1;
    }

    for (index, frame) in frames.into_iter().enumerate() {
        if frame.dimensions() != size {
            return Err(VideoError::SizeMismatch {
                index,
                expected: size,
                actual: frame.dimensions(),
            }
            .into());
        }
        sink.write_frame(&frame)?;
        written += 1;
    }

    for _ in 0..trailing_blank {
        sink.write_frame(&blank)?;
        written += 1;
    }

    Ok(written)
}

/// Read one frame from every stream per step and write them combined
///
/// Truncates to the shortest stream. Returns the number of combined frames.
pub fn concat_streams<S: FrameSink + ?Sized>(
    streams: &mut [Box<dyn FrameStream>],
    orientation: Orientation,
    sink: &mut S,
) -> Result<usize> {
    if streams.len() < 2 {
        return Err(ConfigError::NotEnoughVideos { count: streams.len() }.into());
    }

    let mut written = 0;
    'frames: loop {
        let mut frames = Vec::with_capacity(streams.len());
        for stream in streams.iter_mut() {
            match stream.next_frame()? {
                Some(frame) => frames.push(frame),
                None => break 'frames,
            }
        }

        sink.write_frame(&combine_frames(&frames, orientation)?)?;
        written += 1;
    }

    debug!("Combined {} frames from {} streams", written, streams.len());
    Ok(written)
}

/// Place frames next to each other along `orientation`
pub fn combine_frames(frames: &[RenderedFrame], orientation: Orientation) -> Result<RenderedFrame> {
    let sizes: Vec<(u32, u32)> = frames.iter().map(RenderedFrame::dimensions).collect();
    let (width, height) = combined_size(&sizes, orientation)?;

    let mut canvas = RenderedFrame::new_black(width, height).as_image().clone();
    let mut offset: i64 = 0;
    for frame in frames {
        match orientation {
            Orientation::Horizontal => {
                imageops::replace(&mut canvas, frame.as_image(), offset, 0);
                offset += frame.width() as i64;
            }
            Orientation::Vertical => {
                imageops::replace(&mut canvas, frame.as_image(), 0, offset);
                offset += frame.height() as i64;
            }
        }
    }

    Ok(RenderedFrame::new(canvas))
}

/// Size of the combined frame; the shared edge must match across inputs
fn combined_size(sizes: &[(u32, u32)], orientation: Orientation) -> Result<(u32, u32)> {
    let Some(&first) = sizes.first() else {
        return Err(ConfigError::NotEnoughVideos { count: 0 }.into());
    };

    for (index, &size) in sizes.iter().enumerate() {
        let matches = match orientation {
            Orientation::Horizontal => size.1 == first.1,
            Orientation::Vertical => size.0 == first.0,
        };
        if !matches {
            return Err(VideoError::SizeMismatch {
                index,
                expected: first,
                actual: size,
            }
            .into());
        }
    }

    Ok(match orientation {
        Orientation::Horizontal => (sizes.iter().map(|s| s.0).sum(), first.1),
        Orientation::Vertical => (first.0, sizes.iter().map(|s| s.1).sum()),
    })
}

pub(crate) fn encoded_video(path: &Path, frame_count: usize, size: (u32, u32), fps: f64) -> Result<EncodedVideo> {
    let metadata = std::fs::metadata(path)?;
    info!("Video saved at {} ({} frames, {:.1} KB)",
          path.display(), frame_count, metadata.len() as f64 / 1024.0);

    Ok(EncodedVideo {
        path: path.to_path_buf(),
        frame_count,
        width: size.0,
        height: size.1,
        fps,
        file_size: metadata.len(),
    })
}
