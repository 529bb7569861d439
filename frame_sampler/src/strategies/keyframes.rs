use std::path::Path;

use serde::{Deserialize, Serialize};

use super::read_frame;
use crate::analyzer::to_gray;
use crate::extraction_log::ExtractionLogEntry;
use crate::features::{count_matches, Feature, FeatureExtractor, FeatureParams};
use crate::selector::Strategy;
use crate::source::VideoSource;
use crate::writer::FrameWriter;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyframeParams {
    /// A candidate whose matched share of features falls below this is new
    /// content.
    pub match_ratio: f64,
    pub features: FeatureParams,
}

impl Default for KeyframeParams {
    fn default() -> Self {
        Self {
            match_ratio: 0.6,
            features: FeatureParams::default(),
        }
    }
}

/// Whether `current` differs enough from the last saved keyframe.
/// Without a usable reference every candidate qualifies; a candidate with
/// no features never does.
fn is_keyframe(current: &[Feature], reference: Option<&[Feature]>, params: &KeyframeParams) -> bool {
    match reference {
        None => true,
        Some(prev) if prev.is_empty() => true,
        Some(_) if current.is_empty() => false,
        Some(prev) => {
            let matches = count_matches(current, prev, params.features.max_hamming_distance);
            (matches as f64) < current.len() as f64 * params.match_ratio
        }
    }
}

/// Inspects evenly spaced candidates (`total_frames / max_frames` apart)
/// and writes those whose features no longer match the previous keyframe.
pub fn extract(
    source: &mut dyn VideoSource,
    output_dir: &Path,
    params: &KeyframeParams,
    max_frames: usize,
) -> Vec<ExtractionLogEntry> {
    let info = *source.info();
    let interval = (info.total_frames / max_frames.max(1) as u64).max(1);
    let mut writer = match FrameWriter::create(output_dir, "keyframe", Strategy::Keyframes, info, max_frames) {
        Ok(writer) => writer,
        Err(err) => {
            log::warn!("Cannot prepare {output_dir:?}: {err}");
            return Vec::new();
        }
    };
    let extractor = FeatureExtractor::new(params.features);
    let mut reference: Option<Vec<Feature>> = None;
    log::debug!("Keyframes: candidate every {interval} frames");

    let mut frame_number = 0;
    while frame_number < info.total_frames && !writer.is_full() {
        let Some(frame) = read_frame(source, frame_number) else {
            break;
        };
        let features = extractor.detect(&to_gray(&frame));
        if is_keyframe(&features, reference.as_deref(), params) {
            match writer.write(frame_number, &frame) {
                Ok(entry) => entry.keypoints_count = Some(features.len()),
                Err(err) => {
                    log::warn!("Writing frame {frame_number} failed: {err}");
                    break;
                }
            }
            reference = Some(features);
        }
        frame_number += interval;
    }
    writer.finish()
}
