use std::collections::VecDeque;

use ndarray::{Array2, Zip};
use tracing::{debug, warn};

use crate::error::{FrameError, HyperImageError, Result};
use crate::frames::{Clip, Frame, FrameName, FrameSource};
use crate::hyper::composer::WindowComposer;
use crate::hyper::types::{CompositionMode, HyperImage, WindowSpec};

/// Hyper-images produced for one clip, in center-position order
#[derive(Debug, Clone, Default)]
pub struct ClipOutput {
    pub hyper_images: Vec<(FrameName, HyperImage)>,
    pub skipped_windows: usize,
}

impl ClipOutput {
    pub fn len(&self) -> usize {
        self.hyper_images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hyper_images.is_empty()
    }
}

/// Counters from one pass over a clip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub produced: usize,
    pub skipped: usize,
}

/// Drives the [`WindowComposer`] over every full window of a clip
///
/// Centers run over `[half, len - half)`. Frames nearer the clip edges than
/// `half` never become centers, so every hyper-image has a symmetric context.
#[derive(Debug, Clone, Copy)]
pub struct ClipProcessor {
    composer: WindowComposer,
}

impl ClipProcessor {
    pub fn new(spec: WindowSpec) -> Self {
        Self {
            composer: WindowComposer::new(spec),
        }
    }

    pub fn spec(&self) -> WindowSpec {
        self.composer.spec()
    }

    /// Collect every hyper-image of the clip in memory
    pub fn process<S: FrameSource + ?Sized>(&self, clip: &Clip, source: &S) -> Result<ClipOutput> {
        let mut output = ClipOutput::default();
        let stats = self.for_each_window(clip, source, |name, hyper| {
            output.hyper_images.push((name.clone(), hyper));
            Ok(())
        })?;
        output.skipped_windows = stats.skipped;
        Ok(output)
    }

    /// Stream hyper-images to `sink` one center position at a time
    ///
    /// Windows touching a frame that failed to decode, or whose frames differ
    /// in size, are skipped with a warning. Errors returned by `sink` and
    /// failures while computing the clip mean abort the clip.
    pub fn for_each_window<S, F>(&self, clip: &Clip, source: &S, mut sink: F) -> Result<WindowStats>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&FrameName, HyperImage) -> Result<()>,
    {
        let spec = self.spec();
        let half = spec.half();
        let frames = clip.frames();
        let mut stats = WindowStats::default();

        if frames.len() < spec.width() {
            debug!("Clip '{}' has {} frames, too short for width {}",
                   clip.key(), frames.len(), spec.width());
            return Ok(stats);
        }

        let clip_mean = match spec.mode() {
            CompositionMode::Mean => Some(clip_mean(clip, source)?),
            _ => None,
        };

        let mut cache = WindowCache::new(source, frames);

        for center in half..frames.len() - half {
            let start = center - half;
            let end = center + half + 1;
            let name = &frames[center];

            cache.fill(start, end);
            let Some(window) = cache.window(start, end) else {
                warn!("Skipping window centered on {}: a frame in the window could not be decoded", name);
                stats.skipped += 1;
                continue;
            };

            match self.composer.compose(&window, clip_mean.as_ref()) {
                Ok(hyper) => {
                    sink(name, hyper)?;
                    stats.produced += 1;
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping window centered on {}: {}", name, e);
                    stats.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        debug!("Clip '{}' ({}): {} hyper-images, {} windows skipped",
               clip.key(), spec.label(), stats.produced, stats.skipped);

        Ok(stats)
    }
}

/// Mean frame over the entire clip; every frame weighs `1 / len`
pub fn clip_mean<S: FrameSource + ?Sized>(clip: &Clip, source: &S) -> Result<Frame> {
    let total = clip.len() as f32;
    let mut mean: Option<Array2<f32>> = None;

    for name in clip.frames() {
        let frame = source.load(name)?;
        match mean.as_mut() {
            None => mean = Some(frame.data().mapv(|v| v / total)),
            Some(acc) => {
                if acc.dim() != frame.dim() {
                    return Err(FrameError::SizeMismatch {
                        path: name.file_name().to_string(),
                        expected: acc.dim(),
                        actual: frame.dim(),
                    }
                    .into());
                }
                Zip::from(acc)
                    .and(frame.data())
                    .for_each(|a, &v| *a += v / total);
            }
        }
    }

    mean.map(Frame::new)
        .ok_or_else(|| HyperImageError::generic(format!("clip '{}' has no frames", clip.key())))
}

/// Decoded frames for the current window and the ones it overlaps next
///
/// Positions before the window start are dropped as the window slides, so
/// each frame is decoded once. Failed decodes are kept as `None`.
struct WindowCache<'a, S: ?Sized> {
    source: &'a S,
    names: &'a [FrameName],
    first: usize,
    loaded: VecDeque<Option<Frame>>,
}

impl<'a, S: FrameSource + ?Sized> WindowCache<'a, S> {
    fn new(source: &'a S, names: &'a [FrameName]) -> Self {
        Self {
            source,
            names,
            first: 0,
            loaded: VecDeque::new(),
        }
    }

    fn fill(&mut self, start: usize, end: usize) {
        while self.first < start {
            self.loaded.pop_front();
            self.first += 1;
        }

        while self.first + self.loaded.len() < end {
            let name = &self.names[self.first + self.loaded.len()];
            let frame = match self.source.load(name) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!("Could not decode {}: {}", name, e);
                    None
                }
            };
            self.loaded.push_back(frame);
        }
    }

    fn window(&self, start: usize, end: usize) -> Option<Vec<&Frame>> {
        (start..end)
            .map(|i| self.loaded.get(i - self.first).and_then(Option::as_ref))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::frames::group_clips;

    /// In-memory frames keyed by filename; missing names fail to load
    pub(crate) struct MemorySource {
        pub frames: HashMap<String, Frame>,
        pub loads: AtomicUsize,
    }

    impl MemorySource {
        pub fn new() -> Self {
            Self {
                frames: HashMap::new(),
                loads: AtomicUsize::new(0),
            }
        }

        pub fn insert(&mut self, name: &str, frame: Frame) {
            self.frames.insert(name.to_string(), frame);
        }
    }

    impl FrameSource for MemorySource {
        fn load(&self, name: &FrameName) -> Result<Frame> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.frames.get(name.file_name()).cloned().ok_or_else(|| {
                FrameError::LoadFailed {
                    path: name.file_name().to_string(),
                    reason: "not in memory".to_string(),
                }
                .into()
            })
        }
    }

    /// Clip `c_001..c_<len>` where frame i is filled with `i / 10`
    pub(crate) fn ramp_clip(len: usize) -> (Clip, MemorySource) {
        let mut source = MemorySource::new();
        let names: Vec<String> = (1..=len).map(|i| format!("c_{:03}.png", i)).collect();
        for (i, name) in names.iter().enumerate() {
            source.insert(name, Frame::filled(2, 3, i as f32 / 10.0));
        }
        let clip = group_clips(&names).clips()[0].clone();
        (clip, source)
    }

    fn processor(mode: CompositionMode, width: usize) -> ClipProcessor {
        ClipProcessor::new(WindowSpec::new(mode, width).unwrap())
    }

    #[test]
    fn test_emits_len_minus_two_half() {
        for len in 1..8 {
            let (clip, source) = ramp_clip(len);
            for width in [1, 3, 5] {
                let output = processor(CompositionMode::Stack, width).process(&clip, &source).unwrap();
                assert_eq!(output.len(), len.saturating_sub(width - 1));
                assert_eq!(output.len(), clip.window_count(width));
            }
        }
    }

    #[test]
    fn test_centers_and_center_channel() {
        let (clip, source) = ramp_clip(5);
        let output = processor(CompositionMode::Diff, 3).process(&clip, &source).unwrap();

        let names: Vec<&str> = output.hyper_images.iter().map(|(n, _)| n.file_name()).collect();
        assert_eq!(names, vec!["c_002.png", "c_003.png", "c_004.png"]);

        for (name, hyper) in &output.hyper_images {
            let original = &source.frames[name.file_name()];
            assert_eq!(hyper.channel(1), original.data().view());
        }
    }

    #[test]
    fn test_each_frame_decoded_once() {
        let (clip, source) = ramp_clip(6);
        processor(CompositionMode::Diff, 3).process(&clip, &source).unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_failed_frame_skips_only_its_windows() {
        let (clip, mut source) = ramp_clip(7);
        source.frames.remove("c_004.png");

        let output = processor(CompositionMode::Stack, 3).process(&clip, &source).unwrap();
        let names: Vec<&str> = output.hyper_images.iter().map(|(n, _)| n.file_name()).collect();
        assert_eq!(names, vec!["c_002.png", "c_006.png"]);
        assert_eq!(output.skipped_windows, 3);
    }

    #[test]
    fn test_size_mismatch_skips_window() {
        let (clip, mut source) = ramp_clip(4);
        source.insert("c_004.png", Frame::filled(5, 5, 0.0));

        let output = processor(CompositionMode::Stack, 3).process(&clip, &source).unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output.skipped_windows, 1);
    }

    #[test]
    fn test_mean_mode_reverses_against_clip_mean() {
        let (clip, source) = ramp_clip(5);
        let mean = clip_mean(&clip, &source).unwrap();
        // (0.0 + 0.1 + 0.2 + 0.3 + 0.4) / 5
        assert!((mean.data()[[0, 0]] - 0.2).abs() < 1e-6);

        let output = processor(CompositionMode::Mean, 3).process(&clip, &source).unwrap();
        for (name, hyper) in &output.hyper_images {
            let center = clip.frames().iter().position(|n| n == name).unwrap();
            assert_eq!(hyper.channel(1), source.frames[name.file_name()].data().view());
            for (channel, offset) in [(0usize, center - 1), (2, center + 1)] {
                let original = source.frames[clip.frames()[offset].file_name()].data()[[0, 0]];
                let recovered = (hyper.channel(channel)[[0, 0]] - 0.5) * 2.0 + mean.data()[[0, 0]];
                assert!((recovered - original).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_mean_mode_aborts_clip_on_bad_frame() {
        let (clip, mut source) = ramp_clip(5);
        source.frames.remove("c_001.png");
        let result = processor(CompositionMode::Mean, 3).process(&clip, &source);
        assert!(result.is_err());
    }

    #[test]
    fn test_sink_error_aborts_clip() {
        let (clip, source) = ramp_clip(5);
        let result = processor(CompositionMode::Stack, 3)
            .for_each_window(&clip, &source, |_, _| Err(HyperImageError::generic("disk full")));
        assert!(result.is_err());
    }
}
