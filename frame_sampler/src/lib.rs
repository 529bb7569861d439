//! Turning raw videos into training frames: content analysis, strategy
//! selection, the extraction strategies themselves and batch processing.

pub mod analyzer;
pub mod batch;
pub mod extraction_log;
pub mod features;
pub mod ffmpeg_source;
pub mod report;
pub mod selector;
pub mod source;
pub mod strategies;
mod writer;

pub use analyzer::{analyze, ContentType, VideoAnalysis};
pub use selector::{select_strategy, SelectorThresholds, Strategy};
pub use source::{VideoInfo, VideoOpener, VideoSource};
