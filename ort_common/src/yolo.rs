use std::path::Path;

use anyhow::{anyhow, bail, Context};
use dataset_common::class_map::ClassMap;
use dataset_common::detector::{Detection, Detector};
use dataset_common::label::NormalizedBox;
use fast_image_resize::{images::Image, PixelType, Resizer};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::{Array4, CowArray};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use crate::coco_classes::coco_class_map;

/// Square model input edge, in pixels.
pub const INPUT_SIZE: u32 = 640;
/// Overlap above which the weaker of two same-class boxes is dropped.
pub const NMS_IOU: f32 = 0.45;
const PAD_VALUE: u8 = 114;

/// Maps model-input coordinates back onto the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub src_width: u32,
    pub src_height: u32,
}

impl Letterbox {
    pub fn new(src_width: u32, src_height: u32, size: u32) -> Self {
        let scale = (size as f32 / src_width as f32).min(size as f32 / src_height as f32);
        let (new_w, new_h) = scaled_dims(src_width, src_height, scale);
        Self {
            scale,
            pad_x: ((size - new_w) / 2) as f32,
            pad_y: ((size - new_h) / 2) as f32,
            src_width,
            src_height,
        }
    }

    pub fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

fn scaled_dims(width: u32, height: u32, scale: f32) -> (u32, u32) {
    (
        ((width as f32 * scale).round() as u32).max(1),
        ((height as f32 * scale).round() as u32).max(1),
    )
}

/// Resizes `image` to fit a `size` square, keeping aspect ratio, and pads
/// the remainder with gray.
pub fn letterbox(image: &DynamicImage, size: u32) -> anyhow::Result<(RgbImage, Letterbox)> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        bail!("empty image");
    }
    let geometry = Letterbox::new(width, height, size);
    let (new_w, new_h) = scaled_dims(width, height, geometry.scale);

    let src = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut dst = Image::new(new_w, new_h, PixelType::U8x3);
    Resizer::new().resize(&src, &mut dst, None)?;
    let resized = RgbImage::from_raw(new_w, new_h, dst.into_vec())
        .ok_or_else(|| anyhow!("resized buffer has unexpected size"))?;

    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    image::imageops::replace(
        &mut canvas,
        &resized,
        geometry.pad_x as i64,
        geometry.pad_y as i64,
    );
    Ok((canvas, geometry))
}

/// NCHW float input scaled to `[0, 1]`.
fn image_to_array(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            array[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }
    array
}

/// A detection in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub class_id: u32,
    pub confidence: f32,
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl PixelBox {
    fn area(&self) -> f32 {
        (self.xmax - self.xmin).max(0.0) * (self.ymax - self.ymin).max(0.0)
    }

    pub fn iou(&self, other: &PixelBox) -> f32 {
        let w = (self.xmax.min(other.xmax) - self.xmin.max(other.xmin)).max(0.0);
        let h = (self.ymax.min(other.ymax) - self.ymin.max(other.ymin)).max(0.0);
        let intersection = w * h;
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    pub fn normalized(&self, width: u32, height: u32) -> NormalizedBox {
        NormalizedBox::from_corners(
            self.xmin,
            self.ymin,
            self.xmax,
            self.ymax,
            width as f32,
            height as f32,
        )
    }
}

/// Decodes a `[1, 4 + classes, anchors]` YOLOv8 output, keeping the best
/// class of each anchor when it reaches `confidence`.
pub fn decode(
    output: &[f32],
    shape: &[i64],
    geometry: &Letterbox,
    confidence: f32,
) -> anyhow::Result<Vec<PixelBox>> {
    let [1, features, anchors] = shape else {
        bail!("unexpected output shape {shape:?}");
    };
    let (features, anchors) = (*features as usize, *anchors as usize);
    if features <= 4 || output.len() != features * anchors {
        bail!("output of {} values does not fit shape {shape:?}", output.len());
    }
    let at = |feature: usize, anchor: usize| output[feature * anchors + anchor];

    let mut boxes = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..features)
            .map(|f| (f - 4, at(f, anchor)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if score < confidence {
            continue;
        }
        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        let (xmin, ymin) = geometry.unmap(cx - w / 2.0, cy - h / 2.0);
        let (xmax, ymax) = geometry.unmap(cx + w / 2.0, cy + h / 2.0);
        let (src_w, src_h) = (geometry.src_width as f32, geometry.src_height as f32);
        boxes.push(PixelBox {
            class_id: class_id as u32,
            confidence: score,
            xmin: xmin.clamp(0.0, src_w),
            ymin: ymin.clamp(0.0, src_h),
            xmax: xmax.clamp(0.0, src_w),
            ymax: ymax.clamp(0.0, src_h),
        });
    }
    Ok(boxes)
}

/// Greedy per-class non-maximum suppression, strongest first.
pub fn nms(mut boxes: Vec<PixelBox>, iou_threshold: f32) -> Vec<PixelBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut keep: Vec<PixelBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

/// A YOLOv8 detector exported to ONNX with the COCO vocabulary.
pub struct YoloDetector {
    session: Session,
    classes: ClassMap,
    input_size: u32,
    nms_iou: f32,
}

impl YoloDetector {
    pub fn new(model_path: &Path) -> anyhow::Result<Self> {
        if !model_path.exists() {
            bail!("model file {model_path:?} not found; export a YOLOv8 model to ONNX first");
        }
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load {model_path:?}"))?;
        log::info!("Loaded detector model {model_path:?}");
        Ok(Self {
            session,
            classes: coco_class_map(),
            input_size: INPUT_SIZE,
            nms_iou: NMS_IOU,
        })
    }

    pub fn detect(&mut self, image: &DynamicImage, confidence: f32) -> anyhow::Result<Vec<PixelBox>> {
        let (canvas, geometry) = letterbox(image, self.input_size)?;
        let input_array = CowArray::from(image_to_array(&canvas)).into_dyn();
        let input = ort::inputs![TensorRef::from_array_view(&input_array)?];
        let outputs = self.session.run(input)?;
        let (shape, output) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        let boxes = decode(output, &dims, &geometry, confidence)?;
        let kept = nms(boxes, self.nms_iou);
        log::debug!("{} detections after NMS", kept.len());
        Ok(kept)
    }
}

impl Detector for YoloDetector {
    fn class_names(&self) -> &ClassMap {
        &self.classes
    }

    fn infer(&mut self, image: &DynamicImage, confidence: f32) -> dataset_common::Result<Vec<Detection>> {
        let (width, height) = image.dimensions();
        let boxes = self
            .detect(image, confidence)
            .map_err(|err| dataset_common::Error::Detector(format!("{err:#}")))?;
        Ok(boxes
            .iter()
            .map(|b| Detection {
                class_id: b.class_id,
                confidence: b.confidence,
                bbox: b.normalized(width, height),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel_box(class_id: u32, confidence: f32, xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> PixelBox {
        PixelBox {
            class_id,
            confidence,
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    #[test]
    fn test_letterbox_geometry() {
        let geometry = Letterbox::new(1280, 640, 640);
        assert_eq!(geometry.scale, 0.5);
        assert_eq!(geometry.pad_x, 0.0);
        assert_eq!(geometry.pad_y, 160.0);
        assert_eq!(geometry.unmap(320.0, 320.0), (640.0, 320.0));
    }

    #[test]
    fn test_letterbox_pads_with_gray() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([255, 0, 0])));
        let (canvas, geometry) = letterbox(&image, 64).unwrap();
        assert_eq!(canvas.dimensions(), (64, 64));
        assert_eq!(geometry.pad_y, 16.0);
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([PAD_VALUE; 3]));
        let center = canvas.get_pixel(32, 32);
        assert!(center[0] > 250 && center[1] < 5 && center[2] < 5);
    }

    #[test]
    fn test_decode_picks_best_class_and_unmaps() {
        // Two anchors, two classes; feature-major layout.
        let geometry = Letterbox::new(1280, 640, 640);
        #[rustfmt::skip]
        let output = [
            320.0, 100.0, // cx
            320.0, 100.0, // cy
            100.0, 10.0,  // w
            50.0,  10.0,  // h
            0.1,   0.2,   // class 0
            0.9,   0.3,   // class 1
        ];
        let boxes = decode(&output, &[1, 6, 2], &geometry, 0.4).unwrap();
        assert_eq!(boxes.len(), 1);
        let b = boxes[0];
        assert_eq!(b.class_id, 1);
        assert_eq!(b.confidence, 0.9);
        assert_eq!((b.xmin, b.xmax), (540.0, 740.0));
        assert_eq!((b.ymin, b.ymax), (270.0, 370.0));

        let normalized = b.normalized(1280, 640);
        assert!((normalized.cx - 0.5).abs() < 1e-6);
        assert!((normalized.h - 100.0 / 640.0).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        let geometry = Letterbox::new(640, 640, 640);
        assert!(decode(&[0.0; 10], &[1, 5, 3], &geometry, 0.4).is_err());
        assert!(decode(&[0.0; 8], &[1, 4, 2], &geometry, 0.4).is_err());
        assert!(decode(&[0.0; 8], &[8], &geometry, 0.4).is_err());
    }

    #[test]
    fn test_nms_is_per_class() {
        let boxes = vec![
            pixel_box(0, 0.6, 0.0, 0.0, 10.0, 10.0),
            pixel_box(0, 0.9, 1.0, 1.0, 11.0, 11.0),
            pixel_box(1, 0.5, 1.0, 1.0, 11.0, 11.0),
            pixel_box(0, 0.7, 50.0, 50.0, 60.0, 60.0),
        ];
        let kept = nms(boxes, NMS_IOU);
        let confidences: Vec<f32> = kept.iter().map(|b| b.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7, 0.5]);
    }
}
