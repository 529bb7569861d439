use std::path::Path;

use serde::{Deserialize, Serialize};

use super::read_frame;
use crate::extraction_log::ExtractionLogEntry;
use crate::selector::Strategy;
use crate::source::VideoSource;
use crate::writer::FrameWriter;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalParams {
    pub interval_seconds: f64,
}

impl Default for IntervalParams {
    fn default() -> Self {
        Self {
            interval_seconds: 5.0,
        }
    }
}

impl IntervalParams {
    /// Frames between two writes, never less than one.
    pub fn step(&self, fps: f64) -> u64 {
        let step = (fps * self.interval_seconds).round();
        if step.is_finite() && step >= 1.0 {
            step as u64
        } else {
            1
        }
    }
}

/// Writes frames `0, step, 2*step, ...` until the cap or the end of the video.
pub fn extract(
    source: &mut dyn VideoSource,
    output_dir: &Path,
    params: &IntervalParams,
    max_frames: usize,
) -> Vec<ExtractionLogEntry> {
    let info = *source.info();
    let step = params.step(info.fps);
    let mut writer = match FrameWriter::create(output_dir, "interval", Strategy::TimeIntervals, info, max_frames) {
        Ok(writer) => writer,
        Err(err) => {
            log::warn!("Cannot prepare {output_dir:?}: {err}");
            return Vec::new();
        }
    };
    log::debug!(
        "Time intervals: one frame every {}s ({} frames)",
        params.interval_seconds,
        step
    );

    let mut frame_number = 0;
    while frame_number < info.total_frames && !writer.is_full() {
        let Some(frame) = read_frame(source, frame_number) else {
            break;
        };
        if let Err(err) = writer.write(frame_number, &frame) {
            log::warn!("Writing frame {frame_number} failed: {err}");
            break;
        }
        frame_number += step;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::SyntheticVideo;
    use tempfile::TempDir;

    fn numbers(entries: &[ExtractionLogEntry]) -> Vec<u64> {
        entries.iter().map(|e| e.frame_number).collect()
    }

    #[test]
    fn test_step_rounds() {
        let params = IntervalParams {
            interval_seconds: 5.0,
        };
        assert_eq!(params.step(20.0), 100);
        assert_eq!(params.step(29.97), 150);
        assert_eq!(params.step(0.0), 1);
    }

    #[test]
    fn test_stops_at_end_of_short_video() {
        let dir = TempDir::new().unwrap();
        let mut video = SyntheticVideo::flat(20.0, 400, |_| 10);
        let params = IntervalParams {
            interval_seconds: 5.0,
        };
        let entries = extract(&mut video, dir.path(), &params, 10);
        assert_eq!(numbers(&entries), vec![0, 100, 200, 300]);
        assert_eq!(entries[3].timestamp, 15.0);
        assert_eq!(entries[0].filename, "interval_000000.jpg");
        assert!(dir.path().join("interval_000003.jpg").is_file());
    }

    #[test]
    fn test_cap_dominates_long_video() {
        let dir = TempDir::new().unwrap();
        let mut video = SyntheticVideo::flat(20.0, 2000, |_| 10);
        let params = IntervalParams {
            interval_seconds: 5.0,
        };
        let entries = extract(&mut video, dir.path(), &params, 10);
        assert_eq!(numbers(&entries), (0..10).map(|i| i * 100).collect::<Vec<_>>());
        assert!(!dir.path().join("interval_000010.jpg").exists());

        for cap in [0, 1, 3] {
            let sub = dir.path().join(format!("cap{cap}"));
            assert_eq!(extract(&mut video, &sub, &params, cap).len(), cap);
        }
    }

    #[test]
    fn test_read_failure_keeps_partial_output() {
        let dir = TempDir::new().unwrap();
        let mut video = SyntheticVideo::flat(20.0, 2000, |_| 10);
        video.fail_at = Some(250);
        let params = IntervalParams {
            interval_seconds: 5.0,
        };
        let entries = extract(&mut video, dir.path(), &params, 10);
        assert_eq!(numbers(&entries), vec![0, 100, 200]);
    }
}
