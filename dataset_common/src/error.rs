use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by dataset operations.
///
/// Variants that describe a missing artefact carry a `hint` naming the step
/// that produces it, so a CLI can print something actionable.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path:?} not found ({hint})")]
    ConfigNotFound { path: PathBuf, hint: &'static str },
    #[error("invalid configuration {path:?}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },
    #[error("cannot open media {path:?}: {reason}")]
    UnopenableMedia { path: PathBuf, reason: String },
    #[error("class list in {path:?} is neither a sequence of names nor an id->name mapping")]
    UnsupportedClassList { path: PathBuf },
    #[error("unexpected dataset layout at {path:?}: {reason}")]
    DatasetLayout { path: PathBuf, reason: String },
    #[error("malformed label line {line:?}: {reason}")]
    MalformedLabel { line: String, reason: String },
    #[error("detector failed: {0}")]
    Detector(String),
    #[error("training failed: {0}")]
    Training(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}
