use std::path::Path;

use image::RgbImage;

/// Stream properties known once a video is open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub fps: f64,
    pub total_frames: u64,
    pub width: u32,
    pub height: u32,
}

impl VideoInfo {
    pub fn duration_seconds(&self) -> f64 {
        if self.fps > 0.0 {
            self.total_frames as f64 / self.fps
        } else {
            0.0
        }
    }

    /// Seconds from the start of the stream to `frame`.
    pub fn timestamp(&self, frame: u64) -> f64 {
        if self.fps > 0.0 {
            frame as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// A decoded video, read one frame at a time in increasing frame order.
///
/// Implementations release their underlying handle on drop, so every exit
/// path of a strategy closes the stream.
pub trait VideoSource {
    fn info(&self) -> &VideoInfo;

    /// Index of the frame the next call to [`VideoSource::next_frame`] returns.
    fn position(&self) -> u64;

    /// Decodes the frame at `position()` and advances by one. `None` at the
    /// end of the stream.
    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>>;

    fn seek(&mut self, frame: u64) -> anyhow::Result<()>;

    fn read_at(&mut self, frame: u64) -> anyhow::Result<Option<RgbImage>> {
        if frame != self.position() {
            self.seek(frame)?;
        }
        self.next_frame()
    }
}

/// Opens video files as [`VideoSource`]s.
pub trait VideoOpener {
    fn open(&self, path: &Path) -> anyhow::Result<Box<dyn VideoSource>>;
}
