use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use hyper_image::{
    config::{Config, RenderConfig},
    frames::{group_clips, DirectorySource},
    hyper::{CompositionMode, WindowSpec},
    pipeline::{render_clip_set_stills, render_clip_set_video, ClipLayout, HyperImageEngine},
    render::Renderer,
    video::{Orientation, VideoAssembler, VideoParams},
};

#[derive(Parser)]
#[command(
    name = "hyper-image",
    version,
    about = "Build multi-channel hyper-images from frame sequences",
    long_about = "Hyper-Image stacks temporal windows of grayscale frames into multi-channel arrays for detector training, and renders them back into colour-coded images and videos for review."
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the hyper-image dataset (and videos if enabled)
    Build {
        /// Configuration file (optional)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override dataset.base_dir
        #[arg(short, long)]
        base_dir: Option<PathBuf>,
    },

    /// Render one clip-set video straight from a frame directory
    Video {
        /// Directory of frame images
        #[arg(short, long)]
        frames: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,

        /// Composition mode (stack, diff, mean)
        #[arg(short, long, default_value = "diff")]
        mode: CompositionMode,

        /// Window width (odd)
        #[arg(short, long, default_value_t = 3)]
        window: usize,

        /// Frame rate
        #[arg(long, default_value_t = 10.0)]
        fps: f64,

        /// Blank frames before and after each clip
        #[arg(long, default_value_t = 0)]
        blank_frames: usize,

        /// Extra copies of each clip's middle frame
        #[arg(long, default_value_t = 0)]
        hold_frames: usize,

        /// Resize clips to the first clip's frame size
        #[arg(long)]
        resize: bool,

        /// Colour gain
        #[arg(short, long, default_value_t = 1.0)]
        scale: f32,

        /// Accepted frame extensions
        #[arg(long, value_delimiter = ',', default_value = "jpg,png")]
        extensions: Vec<String>,
    },

    /// Combine rendered videos side by side
    Concat {
        /// Output video file
        #[arg(short, long)]
        output: PathBuf,

        /// Stack videos top to bottom instead
        #[arg(long)]
        vertical: bool,

        /// Input videos, at least two
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Render still images from a frame directory
    Render {
        /// Directory of frame images
        #[arg(short, long)]
        frames: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Composition mode (stack, diff, mean)
        #[arg(short, long, default_value = "diff")]
        mode: CompositionMode,

        /// Window width (odd)
        #[arg(short, long, default_value_t = 3)]
        window: usize,

        /// Colour gain
        #[arg(short, long, default_value_t = 1.0)]
        scale: f32,

        /// Accepted frame extensions
        #[arg(long, value_delimiter = ',', default_value = "jpg,png")]
        extensions: Vec<String>,
    },

    /// Write the default configuration to a TOML file
    InitConfig {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    match EnvFilter::try_from_default_env() {
        Ok(filter) => tracing_subscriber::fmt().with_env_filter(filter).init(),
        Err(_) => tracing_subscriber::fmt().with_max_level(log_level).init(),
    }

    info!("Starting Hyper-Image v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Command::Build { config, base_dir } => build(config, base_dir).await,
        Command::Video { frames, output, mode, window, fps, blank_frames, hold_frames, resize, scale, extensions } => {
            let layout = ClipLayout {
                blank_frames,
                hold_frames,
                resize,
            };
            video(frames, output, mode, window, fps, layout, scale, extensions).await
        }
        Command::Concat { output, vertical, inputs } => concat(output, vertical, inputs).await,
        Command::Render { frames, output, mode, window, scale, extensions } => {
            render(frames, output, mode, window, scale, extensions).await
        }
        Command::InitConfig { file } => {
            Config::default()
                .save_to_file(&file)
                .with_context(|| format!("Failed to write {}", file.display()))?;
            info!("Default configuration written to {:?}", file);
            Ok(())
        }
    };

    if let Err(e) = &result {
        if let Some(lib_err) = e.downcast_ref::<hyper_image::HyperImageError>() {
            warn!("{}", lib_err.user_message());
        }
    }
    result
}

async fn build(config_path: Option<PathBuf>, base_dir: Option<PathBuf>) -> Result<()> {
    let mut config = match config_path {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(&config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    if let Some(base_dir) = base_dir {
        config.dataset.base_dir = base_dir;
    }

    if config.dataset.directories.is_empty() {
        bail!("No dataset directories configured (dataset.directories)");
    }

    let engine = HyperImageEngine::new(config)?;
    let summary = engine.run().await?;

    info!("Done! {} hyper-images written, {} clips failed",
          summary.hyper_images(), summary.clips_failed());
    Ok(())
}

fn spec_and_source(
    frames: PathBuf,
    mode: CompositionMode,
    window: usize,
    extensions: &[String],
) -> Result<(WindowSpec, DirectorySource, hyper_image::frames::ClipSet)> {
    let spec = WindowSpec::new(mode, window)?;
    let source = DirectorySource::new(frames);
    let clips = group_clips(source.list_frames(extensions)?);
    info!("Found {} clips ({} frames) in {:?}", clips.len(), clips.total_frames(), source.root());
    Ok((spec, source, clips))
}

#[allow(clippy::too_many_arguments)]
async fn video(
    frames: PathBuf,
    output: PathBuf,
    mode: CompositionMode,
    window: usize,
    fps: f64,
    layout: ClipLayout,
    scale: f32,
    extensions: Vec<String>,
) -> Result<()> {
    let renderer = Renderer::from_config(&RenderConfig::with_scale(scale)?);
    let (spec, source, clips) = spec_and_source(frames, mode, window, &extensions)?;
    let params = VideoParams {
        fps,
        ..VideoParams::default()
    };

    let video = tokio::task::spawn_blocking(move || {
        render_clip_set_video(&source, &clips, spec, &renderer, layout, &params, &output)
    })
    .await??;

    match video {
        Some(video) => info!("Video saved to {:?} ({} frames)", video.path, video.frame_count),
        None => bail!("No hyper-images could be built; is the window wider than every clip?"),
    }
    Ok(())
}

async fn concat(output: PathBuf, vertical: bool, inputs: Vec<PathBuf>) -> Result<()> {
    let orientation = if vertical { Orientation::Vertical } else { Orientation::Horizontal };

    let video = tokio::task::spawn_blocking(move || {
        VideoAssembler::new(VideoParams::default()).concat(&inputs, orientation, &output)
    })
    .await??;

    info!("Combined video saved to {:?} ({}x{}, {} frames)",
          video.path, video.width, video.height, video.frame_count);
    Ok(())
}

async fn render(
    frames: PathBuf,
    output: PathBuf,
    mode: CompositionMode,
    window: usize,
    scale: f32,
    extensions: Vec<String>,
) -> Result<()> {
    let renderer = Renderer::from_config(&RenderConfig::with_scale(scale)?);
    let (spec, source, clips) = spec_and_source(frames, mode, window, &extensions)?;

    let written = tokio::task::spawn_blocking(move || {
        render_clip_set_stills(&source, &clips, spec, &renderer, &output)
    })
    .await??;

    info!("Rendered {} images", written);
    Ok(())
}
