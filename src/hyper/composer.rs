use ndarray::{stack, Array2, ArrayView2, Axis, Zip};

use crate::error::{ConfigError, FrameError, HyperImageError, Result};
use crate::frames::Frame;
use crate::hyper::types::{CompositionMode, HyperImage, WindowSpec};

/// Combines one window of frames into a hyper-image
#[derive(Debug, Clone, Copy)]
pub struct WindowComposer {
    spec: WindowSpec,
}

impl WindowComposer {
    pub fn new(spec: WindowSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> WindowSpec {
        self.spec
    }

    /// Build a hyper-image from `window`, which must hold exactly `width` frames
    /// in temporal order.
    ///
    /// `clip_mean` is the mean frame of the whole clip and is required in
    /// [`CompositionMode::Mean`]; the other modes ignore it.
    ///
    /// In `diff` and `mean` mode each side channel becomes
    /// `(frame - reference) / 2 + 0.5` while the center channel keeps the raw
    /// center frame.
    pub fn compose(&self, window: &[&Frame], clip_mean: Option<&Frame>) -> Result<HyperImage> {
        let half = self.spec.half();
        if window.len() != self.spec.width() {
            return Err(ConfigError::InvalidValue {
                key: "window.frames".to_string(),
                value: format!("{} frames for a window of width {}", window.len(), self.spec.width()),
            }
            .into());
        }

        let center = window[half];
        let expected = center.dim();
        for (i, frame) in window.iter().enumerate() {
            if frame.dim() != expected {
                return Err(FrameError::SizeMismatch {
                    path: format!("window channel {}", i),
                    expected,
                    actual: frame.dim(),
                }
                .into());
            }
        }

        let reference = match self.spec.mode() {
            CompositionMode::Stack => None,
            CompositionMode::Diff => Some(center),
            CompositionMode::Mean => {
                let mean = clip_mean.ok_or_else(|| ConfigError::InvalidValue {
                    key: "composition.mode".to_string(),
                    value: "mean mode requires the clip mean frame".to_string(),
                })?;
                if mean.dim() != expected {
                    return Err(FrameError::SizeMismatch {
                        path: "clip mean".to_string(),
                        expected,
                        actual: mean.dim(),
                    }
                    .into());
                }
                Some(mean)
            }
        };

        let channels: Vec<Array2<f32>> = window
            .iter()
            .enumerate()
            .map(|(i, frame)| match reference {
                Some(reference) if i != half => recentered_difference(frame, reference),
                _ => frame.data().clone(),
            })
            .collect();

        let views: Vec<ArrayView2<'_, f32>> = channels.iter().map(|c| c.view()).collect();
        let data = stack(Axis(2), &views)
            .map_err(|e| HyperImageError::generic(format!("failed to stack window: {}", e)))?;

        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };

        Ok(HyperImage::new(data))
    }
}

/// Signed difference mapped from `[-1, 1]` into `[0, 1]`
fn recentered_difference(frame: &Frame, reference: &Frame) -> Array2<f32> {
    Zip::from(frame.data())
        .and(reference.data())
        .map_collect(|&value, &base| (value - base) / 2.0 + 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const EPS: f32 = 1e-6;

    fn frames() -> Vec<Frame> {
        vec![
            Frame::new(array![[0.1, 0.2], [0.3, 0.4]]),
            Frame::new(array![[0.5, 0.5], [0.5, 0.5]]),
            Frame::new(array![[0.9, 0.0], [1.0, 0.25]]),
        ]
    }

    fn composer(mode: CompositionMode, width: usize) -> WindowComposer {
        WindowComposer::new(WindowSpec::new(mode, width).unwrap())
    }

    #[test]
    fn test_stack_is_identity() {
        let frames = frames();
        let window: Vec<&Frame> = frames.iter().collect();
        let hyper = composer(CompositionMode::Stack, 3).compose(&window, None).unwrap();

        assert_eq!(hyper.channels(), 3);
        assert_eq!((hyper.height(), hyper.width()), (2, 2));
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(hyper.channel(i), frame.data().view());
        }
    }

    #[test]
    fn test_diff_keeps_center_and_is_reversible() {
        let frames = frames();
        let window: Vec<&Frame> = frames.iter().collect();
        let hyper = composer(CompositionMode::Diff, 3).compose(&window, None).unwrap();

        assert_eq!(hyper.channel(1), frames[1].data().view());

        let center = frames[1].data();
        for i in [0, 2] {
            let recovered = hyper.channel(i).mapv(|v| (v - 0.5) * 2.0) + center;
            Zip::from(&recovered)
                .and(frames[i].data())
                .for_each(|&r, &o| assert!((r - o).abs() < EPS));
        }
    }

    #[test]
    fn test_mean_uses_clip_mean() {
        let frames = frames();
        let window: Vec<&Frame> = frames.iter().collect();
        let mean = Frame::filled(2, 2, 0.25);
        let hyper = composer(CompositionMode::Mean, 3).compose(&window, Some(&mean)).unwrap();

        assert_eq!(hyper.channel(1), frames[1].data().view());
        // (0.9 - 0.25) / 2 + 0.5
        assert!((hyper.channel(2)[[0, 0]] - 0.825).abs() < EPS);
        // (0.1 - 0.25) / 2 + 0.5
        assert!((hyper.channel(0)[[0, 0]] - 0.425).abs() < EPS);
    }

    #[test]
    fn test_mean_without_reference_fails() {
        let frames = frames();
        let window: Vec<&Frame> = frames.iter().collect();
        assert!(composer(CompositionMode::Mean, 3).compose(&window, None).is_err());
    }

    #[test]
    fn test_single_frame_window() {
        let frames = frames();
        let hyper = composer(CompositionMode::Diff, 1).compose(&[&frames[2]], None).unwrap();
        assert_eq!(hyper.channels(), 1);
        assert_eq!(hyper.channel(0), frames[2].data().view());
    }

    #[test]
    fn test_size_mismatch_is_recoverable() {
        let frames = frames();
        let odd = Frame::filled(3, 2, 0.5);
        let window = vec![&frames[0], &frames[1], &odd];
        let err = composer(CompositionMode::Stack, 3).compose(&window, None).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_wrong_window_length_fails() {
        let frames = frames();
        let window = vec![&frames[0], &frames[1]];
        assert!(composer(CompositionMode::Stack, 3).compose(&window, None).is_err());
    }
}
