use std::path::PathBuf;

use tracing::{info, warn};

use crate::hyper::WindowSpec;
use crate::video::EncodedVideo;

/// Counters for one clip of one variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipCounts {
    pub hyper_images: usize,
    pub windows_skipped: usize,
    pub labels_copied: usize,
    pub labels_missing: usize,
}

/// Outcome of one dataset × mode × window width
#[derive(Debug, Clone)]
pub struct VariantReport {
    pub directory: String,
    pub spec: WindowSpec,
    pub output_dir: PathBuf,
    pub clips_processed: usize,
    pub clips_failed: usize,
    pub hyper_images: usize,
    pub windows_skipped: usize,
    pub labels_copied: usize,
    pub labels_missing: usize,
}

impl VariantReport {
    pub fn new(directory: &str, spec: WindowSpec, output_dir: PathBuf) -> Self {
        Self {
            directory: directory.to_string(),
            spec,
            output_dir,
            clips_processed: 0,
            clips_failed: 0,
            hyper_images: 0,
            windows_skipped: 0,
            labels_copied: 0,
            labels_missing: 0,
        }
    }

    pub fn add_clip(&mut self, counts: ClipCounts) {
        self.clips_processed += 1;
        self.hyper_images += counts.hyper_images;
        self.windows_skipped += counts.windows_skipped;
        self.labels_copied += counts.labels_copied;
        self.labels_missing += counts.labels_missing;
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub variants: Vec<VariantReport>,

    /// Frame files that did not match the naming grammar or duplicated an index
    pub rejected_files: usize,

    pub videos: Vec<EncodedVideo>,
}

impl RunSummary {
    pub fn hyper_images(&self) -> usize {
        self.variants.iter().map(|v| v.hyper_images).sum()
    }

    pub fn clips_failed(&self) -> usize {
        self.variants.iter().map(|v| v.clips_failed).sum()
    }

    pub fn variant(&self, directory: &str, spec: WindowSpec) -> Option<&VariantReport> {
        self.variants
            .iter()
            .find(|v| v.directory == directory && v.spec == spec)
    }

    pub fn log(&self) {
        info!("Run summary:");
        for variant in &self.variants {
            info!("   {} {}: {} hyper-images from {} clips ({} windows skipped, {} labels copied)",
                  variant.directory, variant.spec.label(), variant.hyper_images,
                  variant.clips_processed, variant.windows_skipped, variant.labels_copied);
            if variant.clips_failed > 0 {
                warn!("   {} {}: {} clips failed", variant.directory, variant.spec.label(), variant.clips_failed);
            }
            if variant.labels_missing > 0 {
                warn!("   {} {}: {} labels missing", variant.directory, variant.spec.label(), variant.labels_missing);
            }
        }
        if self.rejected_files > 0 {
            warn!("   {} frame files rejected", self.rejected_files);
        }
        for video in &self.videos {
            info!("   video {} ({} frames)", video.path.display(), video.frame_count);
        }
    }
}
