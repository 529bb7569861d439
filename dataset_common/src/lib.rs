//! Shared dataset plumbing: project configuration, class vocabularies,
//! YOLO label files, the on-disk frame store, dataset merging and
//! detector-driven pre-labeling.

pub mod class_map;
pub mod config;
pub mod detector;
pub mod error;
pub mod frame_store;
pub mod label;
pub mod merge;
pub mod prelabel;
pub mod status;
pub mod training;
pub mod translation;

pub use error::{Error, Result};
