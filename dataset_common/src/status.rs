use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::config::ProjectConfig;
use crate::frame_store::{FrameStore, SPLITS};
use crate::label::{self, LabelState};
use crate::Result;

/// Below this many labeled images training is not worth starting.
pub const MIN_LABELS_FOR_TRAINING: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelingStatus {
    pub videos: usize,
    pub images: usize,
    pub label_files: usize,
    /// Images with a non-empty label file.
    pub labeled: usize,
}

impl LabelingStatus {
    pub fn collect(config: &ProjectConfig) -> Result<Self> {
        let mut status = Self {
            videos: count_videos(&config.paths.raw_videos_dir())?,
            ..Default::default()
        };
        let store = config.frame_store();
        for split in SPLITS {
            for image in store.list_images(split)? {
                status.images += 1;
                let label_path = FrameStore::label_path_for(&image)?;
                match label::label_state(&label_path) {
                    LabelState::Missing => {}
                    LabelState::Empty => status.label_files += 1,
                    LabelState::Labeled => {
                        status.label_files += 1;
                        status.labeled += 1;
                    }
                }
            }
        }
        Ok(status)
    }

    pub fn percent_labeled(&self) -> f64 {
        if self.images == 0 {
            0.0
        } else {
            self.labeled as f64 / self.images as f64 * 100.0
        }
    }

    pub fn ready_to_train(&self) -> bool {
        self.labeled >= MIN_LABELS_FOR_TRAINING
    }

    pub fn next_step(&self) -> &'static str {
        if self.videos == 0 && self.images == 0 {
            "add videos to data/raw/videos and run `ffmpeg_dataset process`"
        } else if self.images == 0 {
            "extract frames with `ffmpeg_dataset process`"
        } else if !self.ready_to_train() {
            "label more images (at least 50), e.g. with `ffmpeg_dataset prelabel`"
        } else {
            "ready to train with `ffmpeg_dataset train`"
        }
    }
}

fn count_videos(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"))
        {
            count += 1;
        }
    }
    Ok(count)
}
