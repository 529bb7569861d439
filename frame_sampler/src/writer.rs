use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};

use crate::extraction_log::ExtractionLogEntry;
use crate::selector::Strategy;
use crate::source::VideoInfo;

/// Writes numbered JPEG frames for one strategy run, stopping at `max_frames`.
pub(crate) struct FrameWriter {
    dir: PathBuf,
    prefix: &'static str,
    strategy: Strategy,
    info: VideoInfo,
    max_frames: usize,
    entries: Vec<ExtractionLogEntry>,
}

impl FrameWriter {
    pub fn create(
        dir: &Path,
        prefix: &'static str,
        strategy: Strategy,
        info: VideoInfo,
        max_frames: usize,
    ) -> anyhow::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            prefix,
            strategy,
            info,
            max_frames,
            entries: Vec::new(),
        })
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_frames
    }

    /// Encodes `frame` and returns its log entry for the caller to annotate.
    pub fn write(&mut self, frame_number: u64, frame: &RgbImage) -> anyhow::Result<&mut ExtractionLogEntry> {
        let filename = format!("{}_{:06}.jpg", self.prefix, self.entries.len());
        frame.save_with_format(self.dir.join(&filename), ImageFormat::Jpeg)?;
        self.entries.push(ExtractionLogEntry {
            frame_number,
            timestamp: self.info.timestamp(frame_number),
            filename,
            strategy: self.strategy,
            motion_pixels: None,
            keypoints_count: None,
        });
        let last = self.entries.len() - 1;
        Ok(&mut self.entries[last])
    }

    pub fn finish(self) -> Vec<ExtractionLogEntry> {
        self.entries
    }
}
