use serde::{Deserialize, Serialize};

use super::{run, ExtractionTarget, IntervalParams, KeyframeParams, MotionParams, StrategyParams};
use crate::analyzer::analyze;
use crate::selector::SelectorThresholds;
use crate::source::VideoSource;

pub const TIME_BASED_DIR: &str = "time_based";
pub const MOTION_BASED_DIR: &str = "motion_based";
pub const KEYFRAMES_DIR: &str = "keyframes";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveParams {
    pub interval_seconds: f64,
    pub motion_threshold: u64,
    pub keyframes: KeyframeParams,
    pub thresholds: SelectorThresholds,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            interval_seconds: 10.0,
            motion_threshold: 800,
            keyframes: KeyframeParams::default(),
            thresholds: SelectorThresholds::default(),
        }
    }
}

/// Splits `max_frames` into time, motion and keyframe shares (1/2, 1/4, 1/4).
pub fn budget(max_frames: usize) -> (usize, usize, usize) {
    (max_frames / 2, max_frames / 4, max_frames / 4)
}

/// Analyzes the video, then runs all three strategies into their own
/// subdirectories and returns the combined count.
pub fn extract(
    source: &mut dyn VideoSource,
    target: &ExtractionTarget,
    params: &AdaptiveParams,
    max_frames: usize,
) -> usize {
    let name = target.video_name();
    let analysis = match analyze(source, &name, &params.thresholds) {
        Ok(analysis) => analysis,
        Err(err) => {
            log::warn!("Adaptive extraction skipped: {err}");
            return 0;
        }
    };
    log::info!(
        "{name}: adaptive extraction ({:?}, selector suggests {})",
        analysis.content_type,
        analysis.recommended_strategy
    );

    let (time_budget, motion_budget, keyframe_budget) = budget(max_frames);
    let time = run(
        source,
        &target.subdir(TIME_BASED_DIR),
        &StrategyParams::TimeIntervals(IntervalParams {
            interval_seconds: params.interval_seconds,
        }),
        time_budget,
    );
    let motion = run(
        source,
        &target.subdir(MOTION_BASED_DIR),
        &StrategyParams::MotionBased(MotionParams {
            motion_threshold: params.motion_threshold,
            ..Default::default()
        }),
        motion_budget,
    );
    let keyframes = run(
        source,
        &target.subdir(KEYFRAMES_DIR),
        &StrategyParams::Keyframes(params.keyframes),
        keyframe_budget,
    );
    log::info!("{name}: {time} interval + {motion} motion + {keyframes} keyframes");
    time + motion + keyframes
}
