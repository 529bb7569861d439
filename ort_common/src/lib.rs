//! YOLOv8 object detection through onnxruntime.

pub mod coco_classes;
pub mod yolo;

pub use yolo::YoloDetector;
