//! Frame-extraction strategies.
//!
//! Every strategy writes at most `max_frames` JPEGs into its output
//! directory, in increasing frame order, and leaves an extraction log.
//! A stream that cannot be opened yields zero frames; a read failure
//! mid-stream ends the run with whatever was already written.

pub mod adaptive;
pub mod interval;
pub mod keyframes;
pub mod motion;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use adaptive::AdaptiveParams;
pub use interval::IntervalParams;
pub use keyframes::KeyframeParams;
pub use motion::MotionParams;

use crate::extraction_log::{ExtractionLog, ExtractionLogEntry};
use crate::selector::Strategy;
use crate::source::{VideoOpener, VideoSource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StrategyParams {
    TimeIntervals(IntervalParams),
    MotionBased(MotionParams),
    Keyframes(KeyframeParams),
    Adaptive(AdaptiveParams),
}

impl StrategyParams {
    pub fn strategy(&self) -> Strategy {
        match self {
            StrategyParams::TimeIntervals(_) => Strategy::TimeIntervals,
            StrategyParams::MotionBased(_) => Strategy::MotionBased,
            StrategyParams::Keyframes(_) => Strategy::Keyframes,
            StrategyParams::Adaptive(_) => Strategy::Adaptive,
        }
    }

    /// Parameters used when a strategy is picked by hand.
    pub fn defaults(strategy: Strategy) -> Self {
        match strategy {
            Strategy::TimeIntervals => StrategyParams::TimeIntervals(IntervalParams::default()),
            Strategy::MotionBased => StrategyParams::MotionBased(MotionParams::default()),
            Strategy::Keyframes => StrategyParams::Keyframes(KeyframeParams::default()),
            Strategy::Adaptive => StrategyParams::Adaptive(AdaptiveParams::default()),
        }
    }

    /// Parameters used when the selector picked the strategy.
    pub fn for_smart_batch(strategy: Strategy) -> Self {
        match strategy {
            Strategy::TimeIntervals => StrategyParams::TimeIntervals(IntervalParams {
                interval_seconds: 8.0,
            }),
            Strategy::MotionBased => StrategyParams::MotionBased(MotionParams {
                motion_threshold: 1200,
                ..Default::default()
            }),
            other => Self::defaults(other),
        }
    }

    /// Frame cap used when none is given.
    pub fn default_max_frames(strategy: Strategy) -> usize {
        match strategy {
            Strategy::TimeIntervals => 1000,
            Strategy::MotionBased => 800,
            Strategy::Keyframes => 300,
            Strategy::Adaptive => 600,
        }
    }
}

/// Where one extraction run reads from and writes to.
#[derive(Debug, Clone)]
pub struct ExtractionTarget {
    pub video: PathBuf,
    pub output_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl ExtractionTarget {
    pub fn new(video: &Path, output_dir: &Path, logs_dir: &Path) -> Self {
        Self {
            video: video.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            logs_dir: logs_dir.to_path_buf(),
        }
    }

    fn subdir(&self, name: &str) -> Self {
        Self {
            output_dir: self.output_dir.join(name),
            ..self.clone()
        }
    }

    fn video_name(&self) -> String {
        self.video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Runs `params` over an open source and returns the number of frames written.
pub fn run(
    source: &mut dyn VideoSource,
    target: &ExtractionTarget,
    params: &StrategyParams,
    max_frames: usize,
) -> usize {
    let entries: Vec<ExtractionLogEntry> = match params {
        StrategyParams::TimeIntervals(p) => interval::extract(source, &target.output_dir, p, max_frames),
        StrategyParams::MotionBased(p) => motion::extract(source, &target.output_dir, p, max_frames),
        StrategyParams::Keyframes(p) => keyframes::extract(source, &target.output_dir, p, max_frames),
        StrategyParams::Adaptive(p) => return adaptive::extract(source, target, p, max_frames),
    };
    let extraction = ExtractionLog::new(&target.video, params.strategy(), entries);
    if let Err(err) = extraction.save(&target.logs_dir) {
        log::warn!("Could not write extraction log for {:?}: {err}", target.video);
    }
    log::info!(
        "{}: {} frames written ({})",
        target.video_name(),
        extraction.frames.len(),
        params.strategy()
    );
    extraction.frames.len()
}

/// Opens `target.video` and runs `params` over it. Unlike a batch run, an
/// unopenable video is an error here.
pub fn extract_video(
    opener: &dyn VideoOpener,
    target: &ExtractionTarget,
    params: &StrategyParams,
    max_frames: usize,
) -> anyhow::Result<usize> {
    let mut source = opener.open(&target.video)?;
    Ok(run(source.as_mut(), target, params, max_frames))
}

/// Reads the next frame of a strategy loop, folding end of stream and read
/// errors into `None`.
fn read_frame(source: &mut dyn VideoSource, frame_number: u64) -> Option<image::RgbImage> {
    match source.read_at(frame_number) {
        Ok(frame) => frame,
        Err(err) => {
            log::warn!("Read failed at frame {frame_number}, stopping early: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::SyntheticOpener;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_unopenable_video_is_an_error() {
        let dir = TempDir::new().unwrap();
        let target = ExtractionTarget::new(
            &dir.path().join("missing.mp4"),
            &dir.path().join("out"),
            &dir.path().join("logs"),
        );
        let params = StrategyParams::defaults(Strategy::TimeIntervals);
        let err = extract_video(&SyntheticOpener::default(), &target, &params, 10).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<dataset_common::Error>(),
            Some(dataset_common::Error::UnopenableMedia { .. })
        ));
        assert!(!dir.path().join("logs").exists());
    }

    #[test]
    fn test_run_writes_log() {
        let dir = TempDir::new().unwrap();
        let opener = SyntheticOpener::default().with_video("clip.mp4", 10.0, 100, |_| {
            image::RgbImage::new(32, 24)
        });
        let target = ExtractionTarget::new(
            &dir.path().join("clip.mp4"),
            &dir.path().join("out"),
            &dir.path().join("logs"),
        );
        let params = StrategyParams::TimeIntervals(IntervalParams {
            interval_seconds: 2.0,
        });
        assert_eq!(extract_video(&opener, &target, &params, 3).unwrap(), 3);

        let log = ExtractionLog::load(&dir.path().join("logs/clip_time_intervals.json")).unwrap();
        assert_eq!(log.strategy, Strategy::TimeIntervals);
        let numbers: Vec<u64> = log.frames.iter().map(|f| f.frame_number).collect();
        assert_eq!(numbers, vec![0, 20, 40]);
        assert_eq!(log.frames[1].timestamp, 2.0);
        assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 3);
    }

    #[test]
    fn test_smart_batch_parameters() {
        assert_eq!(
            StrategyParams::for_smart_batch(Strategy::TimeIntervals),
            StrategyParams::TimeIntervals(IntervalParams {
                interval_seconds: 8.0
            })
        );
        match StrategyParams::for_smart_batch(Strategy::MotionBased) {
            StrategyParams::MotionBased(p) => assert_eq!(p.motion_threshold, 1200),
            other => panic!("unexpected {other:?}"),
        }
        for strategy in Strategy::ALL {
            assert_eq!(StrategyParams::defaults(strategy).strategy(), strategy);
        }
    }
}
