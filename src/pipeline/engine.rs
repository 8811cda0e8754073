use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    config::{Config, VideoConfig},
    error::{ConfigError, FrameError, HyperImageError, Result, VideoError},
    frames::{group_clips, ClipSet, DirectorySource, FrameSource},
    hyper::{ClipProcessor, HyperImageWriter, LabelOutcome, LabelSource, WindowSpec},
    pipeline::summary::{ClipCounts, RunSummary, VariantReport},
    render::Renderer,
    video::{
        assembler::encoded_video, even_size, ffmpeg_available, EncodedVideo, FfmpegWriter,
        FrameSink, PaddedSink, RenderedFrame, VideoAssembler, VideoParams,
    },
};

/// Orchestrates a dataset run
///
/// The run goes through two stages:
/// 1. Dataset build - every dataset × mode × window width is composed and
///    persisted as arrays, rendered images and label copies
/// 2. Videos (optional) - one clip-set video per variant, plus side-by-side
///    videos across modes
///
/// Clips are independent, so each variant fans its clips out over a rayon
/// pool sized by `processing.workers`. Blocking work runs on tokio's blocking
/// threads.
pub struct HyperImageEngine {
    config: Arc<Config>,
}

impl HyperImageEngine {
    /// Create an engine; fails if the configuration does not validate
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the dataset, then render videos when `video.enabled`
    ///
    /// A failed video stage is logged and leaves `videos` empty; the dataset
    /// is already on disk by then.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = self.build_dataset().await?;

        if self.config.video.enabled {
            match self.render_videos().await {
                Ok(videos) => summary.videos = videos,
                Err(e) => warn!("Video stage failed, dataset kept: {}", e),
            }
        }

        summary.log();
        Ok(summary)
    }

    /// Compose and persist every configured variant
    ///
    /// Fails only when `base_dir` or a dataset's image directory is missing.
    /// Clip failures are logged and counted in the summary.
    pub async fn build_dataset(&self) -> Result<RunSummary> {
        info!("Step 1: Building hyper-image dataset in {}", self.config.dataset.base_dir.display());
        self.check_directories().await?;

        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || build_dataset_blocking(&config))
            .await
            .map_err(|e| HyperImageError::generic(format!("dataset worker failed: {}", e)))?
    }

    /// Render one video per dataset × mode × window width
    ///
    /// Videos that fail (size mismatch, encoder error) are logged and skipped.
    pub async fn render_videos(&self) -> Result<Vec<EncodedVideo>> {
        info!("Step 2: Rendering clip-set videos");
        self.check_directories().await?;

        if !ffmpeg_available() {
            return Err(VideoError::FfmpegUnavailable.into());
        }

        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || render_videos_blocking(&config))
            .await
            .map_err(|e| HyperImageError::generic(format!("video worker failed: {}", e)))?
    }

    async fn check_directories(&self) -> Result<()> {
        let dataset = &self.config.dataset;
        require_dir(&dataset.base_dir).await?;
        for directory in &dataset.directories {
            require_dir(&dataset.images_dir(directory)).await?;
        }
        Ok(())
    }
}

async fn require_dir(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(ConfigError::MissingDirectory {
            path: path.display().to_string(),
        }
        .into()),
    }
}

fn worker_pool(workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| HyperImageError::generic(format!("Failed to start worker pool: {}", e)))
}

/// List and group one dataset's frames
fn load_clips(config: &Config, directory: &str) -> Result<(DirectorySource, ClipSet)> {
    let source = DirectorySource::new(config.dataset.images_dir(directory));
    let clips = group_clips(source.list_frames(&config.dataset.extensions)?);
    info!("   {}: {} clips, {} frames, {} rejected files",
          directory, clips.len(), clips.total_frames(), clips.rejected().len());
    Ok((source, clips))
}

fn build_dataset_blocking(config: &Config) -> Result<RunSummary> {
    let specs = config.window_specs()?;
    let pool = worker_pool(config.processing.workers)?;
    let mut summary = RunSummary::default();

    for directory in &config.dataset.directories {
        let (source, clips) = load_clips(config, directory)?;
        summary.rejected_files += clips.rejected().len();

        for &spec in &specs {
            let report = pool.install(|| build_variant(config, directory, &source, &clips, spec))?;
            summary.variants.push(report);
        }
    }

    info!("Dataset build complete: {} hyper-images, {} failed clips",
          summary.hyper_images(), summary.clips_failed());
    Ok(summary)
}

/// Compose every clip of one dataset under `spec` and write the results
pub fn build_variant<S: FrameSource + ?Sized>(
    config: &Config,
    directory: &str,
    source: &S,
    clips: &ClipSet,
    spec: WindowSpec,
) -> Result<VariantReport> {
    let output_dir = config.dataset.output_dir(directory, &spec);
    let mut writer = HyperImageWriter::new(&output_dir, &config.output, Renderer::from_config(&config.render));

    if config.output.copy_labels {
        let labels_dir = config.dataset.labels_dir(directory);
        if labels_dir.is_dir() {
            writer = writer.with_labels(LabelSource {
                dir: labels_dir,
                extension: config.dataset.label_extension.clone(),
            });
        } else {
            warn!("Labels directory {} not found, labels will not be copied", labels_dir.display());
        }
    }
    writer.prepare()?;

    info!("   Composing {} {} into {}", directory, spec.label(), output_dir.display());

    let processor = ClipProcessor::new(spec);
    let results: Vec<(&str, Result<ClipCounts>)> = clips
        .clips()
        .par_iter()
        .map(|clip| (clip.key(), persist_clip(&processor, source, &writer, clip)))
        .collect();

    let mut report = VariantReport::new(directory, spec, output_dir);
    for (key, result) in results {
        match result {
            Ok(counts) => report.add_clip(counts),
            Err(e) => {
                warn!("Clip '{}' failed for {} {}: {}", key, directory, spec.label(), e);
                report.clips_failed += 1;
            }
        }
    }

    Ok(report)
}

fn persist_clip<S: FrameSource + ?Sized>(
    processor: &ClipProcessor,
    source: &S,
    writer: &HyperImageWriter,
    clip: &crate::frames::Clip,
) -> Result<ClipCounts> {
    let mut counts = ClipCounts::default();
    let stats = processor.for_each_window(clip, source, |name, hyper| {
        match writer.write(name, &hyper)? {
            LabelOutcome::Copied => counts.labels_copied += 1,
            LabelOutcome::Missing => counts.labels_missing += 1,
            LabelOutcome::Disabled => {}
        }
        Ok(())
    })?;

    counts.hyper_images = stats.produced;
    counts.windows_skipped = stats.skipped;
    Ok(counts)
}

fn render_videos_blocking(config: &Config) -> Result<Vec<EncodedVideo>> {
    let specs = config.window_specs()?;
    let pool = worker_pool(config.processing.workers)?;
    let output_dir = config.video_output_dir();
    let renderer = Renderer::from_config(&config.render);
    let layout = ClipLayout::from_config(&config.video);
    let mut videos = Vec::new();

    for directory in &config.dataset.directories {
        let (source, clips) = load_clips(config, directory)?;

        let rendered: Vec<(WindowSpec, Option<EncodedVideo>)> = pool.install(|| {
            specs
                .par_iter()
                .map(|&spec| {
                    let path = output_dir.join(format!("{}_{}.mp4", directory, spec.label()));
                    let video = render_clip_set_video(
                        &source,
                        &clips,
                        spec,
                        &renderer,
                        layout,
                        &config.video.params,
                        &path,
                    );
                    match video {
                        Ok(video) => (spec, video),
                        Err(e) => {
                            warn!("Video {} failed: {}", path.display(), e);
                            (spec, None)
                        }
                    }
                })
                .collect()
        });

        let mut by_width: BTreeMap<usize, Vec<PathBuf>> = BTreeMap::new();
        for (spec, video) in rendered {
            if let Some(video) = video {
                by_width.entry(spec.width()).or_default().push(video.path.clone());
                videos.push(video);
            }
        }

        if config.video.side_by_side {
            let assembler = VideoAssembler::new(config.video.params.clone());
            for (width, paths) in by_width {
                if paths.len() < 2 {
                    debug!("Only {} video(s) for {} width {}, no side-by-side", paths.len(), directory, width);
                    continue;
                }
                let path = output_dir.join(format!("{}_{}_side_by_side.mp4", directory, width));
                match assembler.concat(&paths, config.video.orientation, &path) {
                    Ok(video) => videos.push(video),
                    Err(e) => warn!("Side-by-side video {} failed: {}", path.display(), e),
                }
            }
        }
    }

    info!("Video rendering complete: {} videos", videos.len());
    Ok(videos)
}

/// How clips are laid out in a clip-set video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipLayout {
    /// Black frames before and after each clip
    pub blank_frames: usize,

    /// Extra copies of each clip's middle frame, written right after it
    pub hold_frames: usize,

    /// Resize frames to the first rendered frame's size instead of failing
    pub resize: bool,
}

impl ClipLayout {
    pub fn from_config(video: &VideoConfig) -> Self {
        Self {
            blank_frames: video.blank_frames,
            hold_frames: video.hold_frames,
            resize: video.resize_clips,
        }
    }
}

/// Encode every clip's rendered hyper-images into one video at `output`
///
/// Odd frame sizes are padded with black up to the next even size, which is
/// the size reported in the result. Returns `None` when no clip produced a
/// hyper-image.
pub fn render_clip_set_video<S: FrameSource + ?Sized>(
    source: &S,
    clips: &ClipSet,
    spec: WindowSpec,
    renderer: &Renderer,
    layout: ClipLayout,
    params: &VideoParams,
    output: &Path,
) -> Result<Option<EncodedVideo>> {
    let processor = ClipProcessor::new(spec);
    let written = write_clip_set(&processor, source, clips, renderer, layout, |frame_size| {
        let size = even_size(frame_size);
        if size != frame_size {
            debug!("Padding {}x{} frames to {}x{}", frame_size.0, frame_size.1, size.0, size.1);
        }
        FfmpegWriter::create(output, size, params).map(|writer| PaddedSink::new(writer, size))
    })?;

    match written {
        Some((sink, frame_count)) => encoded_video(output, frame_count, sink.size(), params.fps).map(Some),
        None => {
            warn!("No hyper-images for {}, video not written", output.display());
            Ok(None)
        }
    }
}

/// Stream every clip's rendered hyper-images into one sink
///
/// Clips are written in order, each framed by `layout.blank_frames` black
/// frames before and after. The frame rendered at a clip's middle position is
/// followed by `layout.hold_frames` copies of itself. The sink is opened lazily
/// with the size of the first rendered frame; later frames of another size are
/// resized to it when `layout.resize` is set and fail the sequence otherwise.
/// A clip that fails is logged and skipped, a sink failure aborts the whole
/// sequence.
///
/// Returns the finished sink and the number of frames written, or `None` if
/// nothing was rendered.
pub fn write_clip_set<S, K, F>(
    processor: &ClipProcessor,
    source: &S,
    clips: &ClipSet,
    renderer: &Renderer,
    layout: ClipLayout,
    mut open: F,
) -> Result<Option<(K, usize)>>
where
    S: FrameSource + ?Sized,
    K: FrameSink,
    F: FnMut((u32, u32)) -> Result<K>,
{
    let mut sink: Option<K> = None;
    let mut blank: Option<RenderedFrame> = None;
    let mut written = 0;

    for clip in clips.iter() {
        let mut clip_frames = 0;
        let middle = clip.frames().get(clip.len() / 2).map(|name| name.index());

        let result = processor.for_each_window(clip, source, |name, hyper| {
            let mut frame = renderer.render(&hyper)?;

            if sink.is_none() {
                let (width, height) = frame.dimensions();
                sink = Some(open((width, height))?);
                blank = Some(RenderedFrame::new_black(width, height));
            }
            let (Some(out), Some(blank)) = (sink.as_mut(), blank.as_ref()) else {
                return Err(HyperImageError::generic("video sink was not opened"));
            };

            if frame.dimensions() != blank.dimensions() {
                if !layout.resize {
                    return Err(VideoError::SizeMismatch {
                        index: written,
                        expected: blank.dimensions(),
                        actual: frame.dimensions(),
                    }
                    .into());
                }
                debug!("Resizing {} from {:?} to {:?}", name, frame.dimensions(), blank.dimensions());
                frame = frame.resized(blank.width(), blank.height());
            }

            if clip_frames == 0 {
                for _ in 0..layout.blank_frames {
                    out.write_frame(blank)?;
                    written += 1;
                }
            }

            debug!("Video frame {} from {}", written, name);
            out.write_frame(&frame)?;
            written += 1;
            clip_frames += 1;

            if Some(name.index()) == middle {
                for _ in 0..layout.hold_frames {
                    out.write_frame(&frame)?;
                    written += 1;
                }
            }
            Ok(())
        });

        if clip_frames > 0 {
            if let (Some(out), Some(blank)) = (sink.as_mut(), blank.as_ref()) {
                for _ in 0..layout.blank_frames {
                    out.write_frame(blank)?;
                    written += 1;
                }
            }
        }

        match result {
            Ok(_) => {}
            Err(e @ HyperImageError::Video(_)) => return Err(e),
            Err(e) => warn!("Clip '{}' left out of the video: {}", clip.key(), e),
        }
    }

    match sink {
        Some(mut sink) => {
            sink.finish()?;
            Ok(Some((sink, written)))
        }
        None => Ok(None),
    }
}

/// Write every rendered hyper-image of `clips` as `<output_dir>/<stem>.png`
pub fn render_clip_set_stills<S: FrameSource + ?Sized>(
    source: &S,
    clips: &ClipSet,
    spec: WindowSpec,
    renderer: &Renderer,
    output_dir: &Path,
) -> Result<usize> {
    std::fs::create_dir_all(output_dir)?;
    let processor = ClipProcessor::new(spec);
    let mut written = 0;

    for clip in clips.iter() {
        let result = processor.for_each_window(clip, source, |name, hyper| {
            let path = output_dir.join(format!("{}.png", name.stem()));
            renderer
                .render(&hyper)?
                .save(&path)
                .map_err(|e| FrameError::WriteFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            written += 1;
            Ok(())
        });

        if let Err(e) = result {
            warn!("Clip '{}' failed: {}", clip.key(), e);
        }
    }

    info!("Rendered {} images into {}", written, output_dir.display());
    Ok(written)
}
