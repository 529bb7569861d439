use image::DynamicImage;

use crate::class_map::ClassMap;
use crate::label::NormalizedBox;
use crate::Result;

/// Confidence floor used for pre-labeling.
pub const PRELABEL_CONFIDENCE: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Id in the detector's own vocabulary.
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: NormalizedBox,
}

/// An opaque object detector.
pub trait Detector {
    /// The detector's class vocabulary.
    fn class_names(&self) -> &ClassMap;

    /// Runs inference, returning detections at or above `confidence`.
    fn infer(&mut self, image: &DynamicImage, confidence: f32) -> Result<Vec<Detection>>;
}
