mod extract;
mod merge;
mod prelabel;
mod train;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dataset_common::config::ProjectConfig;
use dataset_common::status::LabelingStatus;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[command(about = "Builds YOLO training datasets from workplace videos")]
pub struct Args {
    /// Project directory holding `configs/`, `data/` and `results/`.
    #[arg(long, global = true, default_value = ".")]
    project_root: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Writes fresh configuration files and creates the directory tree.
    Setup {
        /// Work type being analyzed, e.g. `programador`.
        #[arg(long, default_value = "")]
        work_type: String,
        /// Activity classes; `persona` is always added as class 0.
        #[arg(long, value_delimiter = ',')]
        activities: Vec<String>,
    },
    /// Analyzes every raw video and writes an analysis report.
    Analyze,
    /// Extracts frames from every raw video with the recommended strategy.
    Process {
        #[arg(long, default_value_t = 500)]
        frames_per_video: usize,
    },
    /// Extracts frames with one named strategy.
    Extract(extract::ExtractArgs),
    /// Writes detector output as labels for unlabeled frames.
    Prelabel(prelabel::PrelabelArgs),
    /// Merges a downloaded YOLO dataset (directory or `.zip`) into the project.
    Merge(merge::MergeArgs),
    /// Trains (or resumes) the project model.
    Train(train::TrainArgs),
    /// Reports labeling progress.
    Status,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Setup { .. } => "setup",
            Command::Analyze => "analyze",
            Command::Process { .. } => "process",
            Command::Extract(_) => "extract",
            Command::Prelabel(_) => "prelabel",
            Command::Merge(_) => "merge",
            Command::Train(_) => "train",
            Command::Status => "status",
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "warn,ffmpeg_dataset=info,frame_sampler=info,dataset_common=info,ort_common=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let span = tracing::info_span!("command", name = args.command.name());
    let _guard = span.enter();

    let root = args.project_root.as_path();
    match args.command {
        Command::Setup {
            work_type,
            activities,
        } => setup(root, &work_type, &activities),
        Command::Analyze => extract::analyze(&load(root)?),
        Command::Process { frames_per_video } => extract::process(&load(root)?, frames_per_video),
        Command::Extract(extract_args) => extract::extract(&load(root)?, &extract_args),
        Command::Prelabel(prelabel_args) => prelabel::prelabel(&load(root)?, &prelabel_args),
        Command::Merge(merge_args) => merge::merge(&load(root)?, &merge_args),
        Command::Train(train_args) => train::train(&load(root)?, &train_args),
        Command::Status => status(&load(root)?),
    }
}

/// Loads the project and makes sure every output directory exists.
fn load(root: &Path) -> anyhow::Result<ProjectConfig> {
    let config = ProjectConfig::load(root)?;
    config.ensure_directories()?;
    Ok(config)
}

fn setup(root: &Path, work_type: &str, activities: &[String]) -> anyhow::Result<()> {
    let config = ProjectConfig::initialize(root, work_type, activities)?;
    config.ensure_directories()?;
    println!(
        "Project ready for '{}' with classes: {}",
        config.work_type(),
        config.classes()
    );
    Ok(())
}

fn status(config: &ProjectConfig) -> anyhow::Result<()> {
    let status = LabelingStatus::collect(config)?;
    println!("Work type:      {}", config.work_type());
    println!("Raw videos:     {}", status.videos);
    println!("Images:         {}", status.images);
    println!("Label files:    {}", status.label_files);
    println!(
        "Labeled images: {} ({:.1}%)",
        status.labeled,
        status.percent_labeled()
    );
    println!("Next step:      {}", status.next_step());
    Ok(())
}
