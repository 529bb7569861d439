use std::path::PathBuf;

use clap::Args;
use dataset_common::config::ProjectConfig;
use frame_sampler::batch::{BatchPaths, BatchProcessor};
use frame_sampler::ffmpeg_source::FfmpegOpener;
use frame_sampler::report::ProcessingReport;
use frame_sampler::strategies::{self, ExtractionTarget, StrategyParams};
use frame_sampler::Strategy;

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// One of `time_intervals`, `motion_based`, `keyframes`, `adaptive`.
    strategy: Strategy,
    /// Seconds between frames for the interval strategies.
    #[arg(long)]
    interval: Option<f64>,
    /// Changed pixels needed to keep a frame for the motion strategies.
    #[arg(long)]
    motion_threshold: Option<u64>,
    /// Frame cap per video; defaults depend on the strategy.
    #[arg(long)]
    max_frames: Option<usize>,
    /// Extract from this video only instead of every raw video.
    #[arg(long)]
    video: Option<PathBuf>,
}

impl ExtractArgs {
    /// Strategy defaults with the command-line overrides applied.
    fn params(&self) -> StrategyParams {
        let mut params = StrategyParams::defaults(self.strategy);
        match &mut params {
            StrategyParams::TimeIntervals(p) => {
                if let Some(interval) = self.interval {
                    p.interval_seconds = interval;
                }
            }
            StrategyParams::MotionBased(p) => {
                if let Some(threshold) = self.motion_threshold {
                    p.motion_threshold = threshold;
                }
            }
            StrategyParams::Keyframes(_) => {}
            StrategyParams::Adaptive(p) => {
                if let Some(interval) = self.interval {
                    p.interval_seconds = interval;
                }
                if let Some(threshold) = self.motion_threshold {
                    p.motion_threshold = threshold;
                }
            }
        }
        params
    }

    fn max_frames(&self) -> usize {
        self.max_frames
            .unwrap_or_else(|| StrategyParams::default_max_frames(self.strategy))
    }
}

pub fn analyze(config: &ProjectConfig) -> anyhow::Result<()> {
    let opener = FfmpegOpener::new()?;
    let processor = BatchProcessor::new(&opener, BatchPaths::from_config(config));
    let Some((report, path)) = processor.analyze_all()? else {
        log::warn!("No video could be analyzed");
        return Ok(());
    };
    for video in &report.videos {
        println!(
            "{:<40} {:>7.1} min  {:<9} {:<19} -> {}",
            video.filename,
            video.duration_minutes,
            video.resolution,
            video.content_type.as_str(),
            video.recommended_strategy
        );
    }
    println!(
        "{} videos, {:.2} h total; report written to {path:?}",
        report.total_videos_analyzed, report.summary.total_duration_hours
    );
    Ok(())
}

pub fn process(config: &ProjectConfig, frames_per_video: usize) -> anyhow::Result<()> {
    let opener = FfmpegOpener::new()?;
    let processor = BatchProcessor::new(&opener, BatchPaths::from_config(config));
    let (report, path) = processor.smart_process(frames_per_video)?;
    print_processing(&report, &path);
    Ok(())
}

pub fn extract(config: &ProjectConfig, args: &ExtractArgs) -> anyhow::Result<()> {
    let opener = FfmpegOpener::new()?;
    let processor = BatchProcessor::new(&opener, BatchPaths::from_config(config));
    let params = args.params();
    let max_frames = args.max_frames();

    match &args.video {
        Some(video) => {
            let paths = processor.paths();
            let target = ExtractionTarget::new(video, &processor.output_dir_for(video), &paths.logs_dir);
            let frames = strategies::extract_video(&opener, &target, &params, max_frames)?;
            println!("{frames} frames extracted from {video:?} ({})", params.strategy());
        }
        None => {
            let (report, path) = processor.process_with_strategy(&params, max_frames)?;
            print_processing(&report, &path);
        }
    }
    Ok(())
}

fn print_processing(report: &ProcessingReport, path: &std::path::Path) {
    for (strategy, frames) in &report.summary.by_strategy {
        println!("{:<15} {frames:>6} frames", strategy.as_str());
    }
    if !report.videos_skipped.is_empty() {
        println!("Skipped: {}", report.videos_skipped.join(", "));
    }
    println!(
        "{} frames from {} videos; report written to {path:?}",
        report.total_frames_extracted, report.videos_processed
    );
}
