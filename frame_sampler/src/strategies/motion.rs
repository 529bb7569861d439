use std::path::Path;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::read_frame;
use crate::analyzer::to_gray;
use crate::extraction_log::ExtractionLogEntry;
use crate::selector::Strategy;
use crate::source::VideoSource;
use crate::writer::FrameWriter;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionParams {
    /// Changed pixels needed before a frame is written.
    pub motion_threshold: u64,
    /// Per-pixel absolute difference counted as a change.
    pub pixel_threshold: u8,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            motion_threshold: 1000,
            pixel_threshold: 25,
        }
    }
}

/// Pixels whose absolute difference exceeds `pixel_threshold`.
pub fn motion_pixels(prev: &GrayImage, cur: &GrayImage, pixel_threshold: u8) -> u64 {
    prev.as_raw()
        .iter()
        .zip(cur.as_raw())
        .filter(|(a, b)| a.abs_diff(**b) > pixel_threshold)
        .count() as u64
}

/// Walks every frame, writing those that differ enough from their
/// predecessor.
pub fn extract(
    source: &mut dyn VideoSource,
    output_dir: &Path,
    params: &MotionParams,
    max_frames: usize,
) -> Vec<ExtractionLogEntry> {
    let info = *source.info();
    let mut writer = match FrameWriter::create(output_dir, "motion", Strategy::MotionBased, info, max_frames) {
        Ok(writer) => writer,
        Err(err) => {
            log::warn!("Cannot prepare {output_dir:?}: {err}");
            return Vec::new();
        }
    };
    let Some(first) = read_frame(source, 0) else {
        return writer.finish();
    };
    let mut prev = to_gray(&first);
    log::debug!("Motion: threshold {} pixels", params.motion_threshold);

    let mut frame_number = 1;
    while !writer.is_full() {
        let Some(frame) = read_frame(source, frame_number) else {
            break;
        };
        let gray = to_gray(&frame);
        let pixels = motion_pixels(&prev, &gray, params.pixel_threshold);
        if pixels > params.motion_threshold {
            match writer.write(frame_number, &frame) {
                Ok(entry) => entry.motion_pixels = Some(pixels),
                Err(err) => {
                    log::warn!("Writing frame {frame_number} failed: {err}");
                    break;
                }
            }
        }
        prev = gray;
        frame_number += 1;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::SyntheticVideo;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    /// Black until 50, flickering through 60, white afterwards.
    fn burst_video() -> SyntheticVideo {
        SyntheticVideo::new(25.0, 200, |n| {
            let white = match n {
                0..=49 => false,
                50..=60 => n % 2 == 0,
                _ => true,
            };
            let v = if white { 255 } else { 0 };
            RgbImage::from_pixel(64, 48, Rgb([v, v, v]))
        })
    }

    #[test]
    fn test_only_burst_frames_written() {
        let dir = TempDir::new().unwrap();
        let entries = extract(&mut burst_video(), dir.path(), &MotionParams::default(), 100);
        let numbers: Vec<u64> = entries.iter().map(|e| e.frame_number).collect();
        assert_eq!(numbers, (50..=60).collect::<Vec<_>>());
        assert!(entries.iter().all(|e| e.motion_pixels == Some(64 * 48)));
        assert_eq!(entries[0].filename, "motion_000000.jpg");
        assert_eq!(entries[0].timestamp, 2.0);
    }

    #[test]
    fn test_cap_applies() {
        let dir = TempDir::new().unwrap();
        let entries = extract(&mut burst_video(), dir.path(), &MotionParams::default(), 4);
        let numbers: Vec<u64> = entries.iter().map(|e| e.frame_number).collect();
        assert_eq!(numbers, vec![50, 51, 52, 53]);
    }

    #[test]
    fn test_small_changes_ignored() {
        let dir = TempDir::new().unwrap();
        // A 20-level shift stays under the per-pixel threshold.
        let mut video = SyntheticVideo::new(25.0, 100, |n| {
            let v = if n % 2 == 0 { 100 } else { 120 };
            RgbImage::from_pixel(64, 48, Rgb([v, v, v]))
        });
        assert!(extract(&mut video, dir.path(), &MotionParams::default(), 100).is_empty());
    }

    #[test]
    fn test_motion_pixels_threshold_is_strict() {
        let a = GrayImage::from_pixel(4, 4, image::Luma([0]));
        let b = GrayImage::from_pixel(4, 4, image::Luma([25]));
        let c = GrayImage::from_pixel(4, 4, image::Luma([26]));
        assert_eq!(motion_pixels(&a, &b, 25), 0);
        assert_eq!(motion_pixels(&a, &c, 25), 16);
    }
}
