//! Timestamped JSON reports for analysis and batch runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::analyzer::{ContentType, VideoAnalysis};
use crate::selector::Strategy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub content_types: BTreeMap<ContentType, usize>,
    pub average_duration_minutes: f64,
    pub total_duration_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_date: DateTime<Local>,
    pub total_videos_analyzed: usize,
    pub videos: Vec<VideoAnalysis>,
    pub summary: AnalysisSummary,
}

impl AnalysisReport {
    pub fn new(videos: Vec<VideoAnalysis>) -> Self {
        let mut content_types = BTreeMap::new();
        for video in &videos {
            *content_types.entry(video.content_type).or_insert(0) += 1;
        }
        let total_minutes: f64 = videos.iter().map(|v| v.duration_minutes).sum();
        let average_duration_minutes = if videos.is_empty() {
            0.0
        } else {
            total_minutes / videos.len() as f64
        };
        Self {
            analysis_date: Local::now(),
            total_videos_analyzed: videos.len(),
            summary: AnalysisSummary {
                content_types,
                average_duration_minutes,
                total_duration_hours: total_minutes / 60.0,
            },
            videos,
        }
    }

    pub fn save(&self, reports_dir: &Path) -> anyhow::Result<PathBuf> {
        write_timestamped(reports_dir, "video_analysis", &self.analysis_date, self)
    }
}

/// One processed video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingEntry {
    pub video: String,
    pub strategy: Strategy,
    pub frames_extracted: usize,
    pub analysis: VideoAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub by_strategy: BTreeMap<Strategy, usize>,
    pub total_duration_minutes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub timestamp: DateTime<Local>,
    pub total_frames_extracted: usize,
    pub videos_processed: usize,
    /// Videos left out because they could not be opened or analyzed.
    #[serde(default)]
    pub videos_skipped: Vec<String>,
    pub processing_log: Vec<ProcessingEntry>,
    pub summary: ProcessingSummary,
}

impl ProcessingReport {
    pub fn new(processing_log: Vec<ProcessingEntry>, videos_skipped: Vec<String>) -> Self {
        let mut by_strategy = BTreeMap::new();
        for entry in &processing_log {
            *by_strategy.entry(entry.strategy).or_insert(0) += entry.frames_extracted;
        }
        Self {
            timestamp: Local::now(),
            total_frames_extracted: processing_log.iter().map(|e| e.frames_extracted).sum(),
            videos_processed: processing_log.len(),
            videos_skipped,
            summary: ProcessingSummary {
                by_strategy,
                total_duration_minutes: processing_log.iter().map(|e| e.analysis.duration_minutes).sum(),
            },
            processing_log,
        }
    }

    pub fn save(&self, reports_dir: &Path) -> anyhow::Result<PathBuf> {
        write_timestamped(reports_dir, "processing_report", &self.timestamp, self)
    }
}

/// Writes `<prefix>_<YYYYmmdd_HHMMSS>.json`, adding `_1`, `_2`, ... when a
/// report from the same second already exists.
fn write_timestamped<T: Serialize>(
    dir: &Path,
    prefix: &str,
    at: &DateTime<Local>,
    value: &T,
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let stamp = at.format("%Y%m%d_%H%M%S");
    let mut path = dir.join(format!("{prefix}_{stamp}.json"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{prefix}_{stamp}_{n}.json"));
        n += 1;
    }
    fs::write(&path, serde_json::to_string_pretty(value)?)?;
    log::info!("Report saved: {path:?}");
    Ok(path)
}
