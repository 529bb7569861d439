//! Sampling a video for motion and brightness statistics.

use std::fmt;
use std::path::Path;

use anyhow::bail;
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::selector::{SelectorThresholds, Strategy};
use crate::source::{VideoOpener, VideoSource};

/// Upper bound on frames inspected per video.
pub const MAX_SAMPLES: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "alto_movimiento")]
    HighMotion,
    #[serde(rename = "movimiento_moderado")]
    ModerateMotion,
    #[serde(rename = "estatico")]
    Static,
}

impl ContentType {
    pub fn classify(avg_motion: f64) -> Self {
        if avg_motion > 5000.0 {
            ContentType::HighMotion
        } else if avg_motion > 1000.0 {
            ContentType::ModerateMotion
        } else {
            ContentType::Static
        }
    }

    /// The name used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::HighMotion => "alto_movimiento",
            ContentType::ModerateMotion => "movimiento_moderado",
            ContentType::Static => "estatico",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    pub filename: String,
    pub duration_minutes: f64,
    pub total_frames: u64,
    pub fps: f64,
    pub resolution: String,
    pub avg_motion: f64,
    pub motion_variance: f64,
    pub avg_brightness: f64,
    pub content_type: ContentType,
    pub recommended_strategy: Strategy,
}

pub(crate) fn to_gray(frame: &RgbImage) -> GrayImage {
    image::imageops::grayscale(frame)
}

/// Pixels that differ at all between two equally sized frames.
fn changed_pixels(prev: &GrayImage, cur: &GrayImage) -> u64 {
    prev.as_raw()
        .iter()
        .zip(cur.as_raw())
        .filter(|(a, b)| a != b)
        .count() as u64
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance.
fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Samples up to [`MAX_SAMPLES`] evenly spaced frames, measuring how many
/// pixels change between consecutive samples and their mean brightness.
/// The first sample is compared against frame 0.
pub fn analyze(
    source: &mut dyn VideoSource,
    filename: &str,
    thresholds: &SelectorThresholds,
) -> anyhow::Result<VideoAnalysis> {
    let info = *source.info();
    let samples = MAX_SAMPLES.min(info.total_frames);
    let interval = (info.total_frames / samples.max(1)).max(1);

    let Some(first) = source.read_at(0)? else {
        bail!("{filename}: no decodable frames");
    };
    let mut prev = to_gray(&first);
    let mut motion = Vec::with_capacity(samples as usize);
    let mut brightness = Vec::with_capacity(samples as usize);

    for i in 0..samples {
        let frame = match source.read_at(i * interval) {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                log::warn!("{filename}: sampling stopped at frame {}: {err}", i * interval);
                break;
            }
        };
        let gray = to_gray(&frame);
        if gray.dimensions() != prev.dimensions() {
            bail!("{filename}: frame size changed mid-stream");
        }
        motion.push(changed_pixels(&prev, &gray) as f64);
        brightness.push(gray.as_raw().iter().map(|&p| p as f64).sum::<f64>() / gray.len() as f64);
        prev = gray;
    }

    if motion.is_empty() {
        bail!("{filename}: no frames could be sampled");
    }

    let avg_motion = mean(&motion);
    let motion_variance = variance(&motion);
    let duration_seconds = info.duration_seconds();
    let analysis = VideoAnalysis {
        filename: filename.to_string(),
        duration_minutes: duration_seconds / 60.0,
        total_frames: info.total_frames,
        fps: info.fps,
        resolution: format!("{}x{}", info.width, info.height),
        avg_motion,
        motion_variance,
        avg_brightness: mean(&brightness),
        content_type: ContentType::classify(avg_motion),
        recommended_strategy: thresholds.select(avg_motion, motion_variance, duration_seconds),
    };
    log::info!(
        "{}: {:?}, motion {:.0} (var {:.0}), recommending {}",
        filename,
        analysis.content_type,
        analysis.avg_motion,
        analysis.motion_variance,
        analysis.recommended_strategy
    );
    Ok(analysis)
}

/// Opens `path` and analyzes it; the handle is closed before returning.
pub fn analyze_path(
    opener: &dyn VideoOpener,
    path: &Path,
    thresholds: &SelectorThresholds,
) -> anyhow::Result<VideoAnalysis> {
    let mut source = opener.open(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    analyze(source.as_mut(), &filename, thresholds)
}
