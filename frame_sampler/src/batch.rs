//! Running analysis and extraction over a directory of raw videos.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use dataset_common::config::ProjectConfig;

use crate::analyzer::{analyze, analyze_path, VideoAnalysis};
use crate::report::{AnalysisReport, ProcessingEntry, ProcessingReport};
use crate::selector::SelectorThresholds;
use crate::source::VideoOpener;
use crate::strategies::{self, ExtractionTarget, StrategyParams};

/// Split receiving extracted frames.
pub const TRAIN_SPLIT: &str = "train";

#[derive(Debug, Clone)]
pub struct BatchPaths {
    pub videos_dir: PathBuf,
    /// Per-video folders are created below this one.
    pub frames_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl BatchPaths {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            videos_dir: config.paths.raw_videos_dir(),
            frames_dir: config.frame_store().images_dir(TRAIN_SPLIT),
            logs_dir: config.paths.processing_logs_dir(),
            reports_dir: config.paths.reports_dir(),
        }
    }
}

/// `.mp4` files directly inside `dir`, in directory-listing order.
pub fn list_videos(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).with_context(|| format!("Cannot list videos in {dir:?}"))?;
    let mut videos = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"))
        {
            videos.push(path);
        }
    }
    Ok(videos)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct BatchProcessor<'a> {
    opener: &'a dyn VideoOpener,
    paths: BatchPaths,
    thresholds: SelectorThresholds,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(opener: &'a dyn VideoOpener, paths: BatchPaths) -> Self {
        Self {
            opener,
            paths,
            thresholds: SelectorThresholds::default(),
        }
    }

    pub fn paths(&self) -> &BatchPaths {
        &self.paths
    }

    /// Frames of `video` go to `<frames_dir>/<video stem>/`.
    pub fn output_dir_for(&self, video: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        self.paths.frames_dir.join(stem)
    }

    fn videos(&self) -> anyhow::Result<Vec<PathBuf>> {
        let videos = list_videos(&self.paths.videos_dir)?;
        if videos.is_empty() {
            bail!(
                "no .mp4 videos in {:?}; copy recordings there first",
                self.paths.videos_dir
            );
        }
        Ok(videos)
    }

    /// Analyzes every video and writes a `video_analysis_*.json` report.
    /// Returns `None` when no video could be analyzed.
    pub fn analyze_all(&self) -> anyhow::Result<Option<(AnalysisReport, PathBuf)>> {
        let videos = self.videos()?;
        log::info!("Analyzing {} videos", videos.len());
        let mut analyses = Vec::with_capacity(videos.len());
        for video in &videos {
            match analyze_path(self.opener, video, &self.thresholds) {
                Ok(analysis) => analyses.push(analysis),
                Err(err) => log::warn!("Skipping {video:?}: {err:#}"),
            }
        }
        if analyses.is_empty() {
            return Ok(None);
        }
        let report = AnalysisReport::new(analyses);
        let path = report.save(&self.paths.reports_dir)?;
        Ok(Some((report, path)))
    }

    /// Lets the selector pick a strategy per video, extracting up to
    /// `frames_per_video` frames from each.
    pub fn smart_process(&self, frames_per_video: usize) -> anyhow::Result<(ProcessingReport, PathBuf)> {
        self.process(|analysis| {
            (
                StrategyParams::for_smart_batch(analysis.recommended_strategy),
                frames_per_video,
            )
        })
    }

    /// Processes every video with the same strategy and parameters.
    pub fn process_with_strategy(
        &self,
        params: &StrategyParams,
        max_frames: usize,
    ) -> anyhow::Result<(ProcessingReport, PathBuf)> {
        self.process(|_| (params.clone(), max_frames))
    }

    fn process(
        &self,
        choose: impl Fn(&VideoAnalysis) -> (StrategyParams, usize),
    ) -> anyhow::Result<(ProcessingReport, PathBuf)> {
        let videos = self.videos()?;
        let mut processing_log = Vec::new();
        let mut skipped = Vec::new();

        for (idx, video) in videos.iter().enumerate() {
            let name = file_name(video);
            log::info!("[{}/{}] {}", idx + 1, videos.len(), name);
            let mut source = match self.opener.open(video) {
                Ok(source) => source,
                Err(err) => {
                    log::warn!("Skipping {name}: {err:#}");
                    skipped.push(name);
                    continue;
                }
            };
            let analysis = match analyze(source.as_mut(), &name, &self.thresholds) {
                Ok(analysis) => analysis,
                Err(err) => {
                    log::warn!("Skipping {name}: {err:#}");
                    skipped.push(name);
                    continue;
                }
            };

            let (params, max_frames) = choose(&analysis);
            let target = ExtractionTarget::new(video, &self.output_dir_for(video), &self.paths.logs_dir);
            let frames = strategies::run(source.as_mut(), &target, &params, max_frames);
            processing_log.push(ProcessingEntry {
                video: name,
                strategy: params.strategy(),
                frames_extracted: frames,
                analysis,
            });
        }

        let report = ProcessingReport::new(processing_log, skipped);
        log::info!(
            "Batch done: {} frames from {} videos ({} skipped)",
            report.total_frames_extracted,
            report.videos_processed,
            report.videos_skipped.len()
        );
        let path = report.save(&self.paths.reports_dir)?;
        Ok((report, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ContentType;
    use crate::selector::Strategy;
    use crate::source::testing::SyntheticOpener;
    use crate::strategies::IntervalParams;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn setup() -> (TempDir, BatchPaths, SyntheticOpener) {
        let dir = TempDir::new().unwrap();
        let paths = BatchPaths {
            videos_dir: dir.path().join("videos"),
            frames_dir: dir.path().join("images/train/chef"),
            logs_dir: dir.path().join("logs"),
            reports_dir: dir.path().join("reports"),
        };
        fs::create_dir_all(&paths.videos_dir).unwrap();
        for name in ["still.mp4", "busy.MP4", "broken.mp4", "notes.txt"] {
            fs::write(paths.videos_dir.join(name), b"").unwrap();
        }
        let opener = SyntheticOpener::default()
            .with_video("still.mp4", 25.0, 250, |_| {
                RgbImage::from_pixel(32, 24, Rgb([100, 100, 100]))
            })
            .with_video("busy.MP4", 25.0, 1000, |n| {
                let v = if (n / 2) % 2 == 0 { 0 } else { 200 };
                RgbImage::from_pixel(64, 48, Rgb([v, v, v]))
            });
        (dir, paths, opener)
    }

    fn entry<'r>(report: &'r ProcessingReport, video: &str) -> &'r ProcessingEntry {
        report
            .processing_log
            .iter()
            .find(|e| e.video == video)
            .unwrap()
    }

    #[test]
    fn test_list_videos_filters_extension() {
        let (_dir, paths, _) = setup();
        let mut names: Vec<String> = list_videos(&paths.videos_dir)
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        names.sort();
        assert_eq!(names, vec!["broken.mp4", "busy.MP4", "still.mp4"]);
    }

    #[test]
    fn test_smart_process_skips_bad_videos() {
        let (_dir, paths, opener) = setup();
        let batch = BatchProcessor::new(&opener, paths.clone());
        let (report, path) = batch.smart_process(5).unwrap();

        assert!(path.is_file());
        assert_eq!(report.videos_processed, 2);
        assert_eq!(report.videos_skipped, vec!["broken.mp4".to_string()]);

        let still = entry(&report, "still.mp4");
        assert_eq!(still.strategy, Strategy::Keyframes);
        assert_eq!(still.frames_extracted, 5);
        assert_eq!(still.analysis.content_type, ContentType::Static);

        let busy = entry(&report, "busy.MP4");
        assert_eq!(busy.strategy, Strategy::Adaptive);
        assert_eq!(busy.frames_extracted, 4);
        assert!(paths.frames_dir.join("busy/time_based").is_dir());

        assert_eq!(report.total_frames_extracted, 9);
        assert_eq!(report.summary.by_strategy[&Strategy::Keyframes], 5);
        assert!(paths.logs_dir.join("still_keyframes.json").is_file());
        assert_eq!(
            fs::read_dir(paths.frames_dir.join("still")).unwrap().count(),
            5
        );
    }

    #[test]
    fn test_forced_strategy() {
        let (_dir, paths, opener) = setup();
        let batch = BatchProcessor::new(&opener, paths);
        let params = StrategyParams::TimeIntervals(IntervalParams {
            interval_seconds: 5.0,
        });
        let (report, _) = batch.process_with_strategy(&params, 3).unwrap();
        assert_eq!(entry(&report, "still.mp4").frames_extracted, 2);
        assert_eq!(entry(&report, "busy.MP4").frames_extracted, 3);
        assert!(report
            .processing_log
            .iter()
            .all(|e| e.strategy == Strategy::TimeIntervals));
    }

    #[test]
    fn test_analyze_all_writes_report() {
        let (_dir, paths, opener) = setup();
        let batch = BatchProcessor::new(&opener, paths);
        let (report, path) = batch.analyze_all().unwrap().unwrap();
        assert_eq!(report.total_videos_analyzed, 2);
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("video_analysis_"));
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let paths = BatchPaths {
            videos_dir: dir.path().to_path_buf(),
            frames_dir: dir.path().join("frames"),
            logs_dir: dir.path().join("logs"),
            reports_dir: dir.path().join("reports"),
        };
        let opener = SyntheticOpener::default();
        let batch = BatchProcessor::new(&opener, paths);
        assert!(batch.smart_process(10).is_err());
    }
}
