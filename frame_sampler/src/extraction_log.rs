use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::selector::Strategy;

/// One written frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionLogEntry {
    pub frame_number: u64,
    /// Seconds from the start of the video.
    pub timestamp: f64,
    pub filename: String,
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_pixels: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypoints_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionLog {
    pub video: PathBuf,
    pub strategy: Strategy,
    pub extraction_time: DateTime<Local>,
    pub frames: Vec<ExtractionLogEntry>,
}

impl ExtractionLog {
    pub fn new(video: &Path, strategy: Strategy, frames: Vec<ExtractionLogEntry>) -> Self {
        Self {
            video: video.to_path_buf(),
            strategy,
            extraction_time: Local::now(),
            frames,
        }
    }

    /// `<logs_dir>/<video stem>_<strategy>.json`
    pub fn path_in(&self, logs_dir: &Path) -> PathBuf {
        let stem = self
            .video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        logs_dir.join(format!("{stem}_{}.json", self.strategy))
    }

    /// Writes the log, replacing an earlier run for the same video and strategy.
    pub fn save(&self, logs_dir: &Path) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(logs_dir)?;
        let path = self.path_in(logs_dir);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}
