use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::detector::{Detector, PRELABEL_CONFIDENCE};
use crate::frame_store::FrameStore;
use crate::label::{self, LabelLine, LabelState};
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrelabelSummary {
    pub images_found: usize,
    pub already_labeled: usize,
    pub labeled: usize,
    /// Processed with nothing found; an empty label file marks them.
    pub empty: usize,
    pub failed: usize,
    /// Detections whose class has no project counterpart.
    pub unmapped_detections: usize,
}

/// Writes detector output as project labels for every image that has no
/// non-empty label file yet. Re-running only touches unfinished images.
pub struct Prelabeler<'a> {
    detector: &'a mut dyn Detector,
    mapping: BTreeMap<u32, u32>,
    confidence: f32,
}

impl<'a> Prelabeler<'a> {
    /// `mapping` goes from detector class id to project class id.
    pub fn new(detector: &'a mut dyn Detector, mapping: BTreeMap<u32, u32>) -> Self {
        Self {
            detector,
            mapping,
            confidence: PRELABEL_CONFIDENCE,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn run(&mut self, store: &FrameStore, split: &str) -> Result<PrelabelSummary> {
        let images = store.list_images(split)?;
        let mut summary = PrelabelSummary {
            images_found: images.len(),
            ..Default::default()
        };
        if images.is_empty() {
            log::warn!("No images under {:?}", store.images_dir(split));
            return Ok(summary);
        }
        if self.mapping.is_empty() {
            log::warn!("Detector mapping is empty; every image will get an empty label file");
        }

        for (idx, image_path) in images.iter().enumerate() {
            let label_path = FrameStore::label_path_for(image_path)?;
            let state = label::label_state(&label_path);
            if state == LabelState::Labeled {
                summary.already_labeled += 1;
                continue;
            }
            match self.label_one(image_path, &label_path, state, &mut summary) {
                Ok(0) => {
                    summary.empty += 1;
                    log::debug!("[{}/{}] nothing found in {:?}", idx + 1, images.len(), image_path);
                }
                Ok(count) => {
                    summary.labeled += 1;
                    log::info!("[{}/{}] {} objects in {:?}", idx + 1, images.len(), count, image_path);
                }
                Err(err) => {
                    summary.failed += 1;
                    log::warn!("Skipping {image_path:?}: {err}");
                }
            }
        }
        log::info!(
            "Pre-labeling done: {} labeled, {} empty, {} skipped, {} failed",
            summary.labeled,
            summary.empty,
            summary.already_labeled,
            summary.failed
        );
        Ok(summary)
    }

    fn label_one(
        &mut self,
        image_path: &Path,
        label_path: &Path,
        state: LabelState,
        summary: &mut PrelabelSummary,
    ) -> Result<usize> {
        let image = image::open(image_path)?;
        let detections = self.detector.infer(&image, self.confidence)?;
        let mut lines = Vec::with_capacity(detections.len());
        for detection in detections {
            match self.mapping.get(&detection.class_id) {
                Some(&class_id) => lines.push(LabelLine {
                    class_id,
                    bbox: detection.bbox,
                }),
                None => summary.unmapped_detections += 1,
            }
        }
        // An existing empty marker already says "nothing found".
        if !(lines.is_empty() && state == LabelState::Empty) {
            label::write_label_file(label_path, &lines)?;
        }
        Ok(lines.len())
    }
}
