//! Training is delegated to an external framework; this module only
//! prepares its arguments and locates its output.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::config::ProjectConfig;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingPlan {
    /// Weights to start from: a previous run's `best.pt` or the base model.
    pub model: PathBuf,
    pub resumed: bool,
    pub data: PathBuf,
    pub epochs: u32,
    pub imgsz: u32,
    pub batch: u32,
    pub project: PathBuf,
    pub name: String,
}

impl TrainingPlan {
    pub fn resolve(config: &ProjectConfig) -> Self {
        let params = &config.work.training;
        let project = config.paths.results_dir();
        let name = format!("{}_model", config.work_type());
        let previous = project.join(&name).join("weights").join("best.pt");
        let resumed = previous.is_file();
        let model = if resumed {
            log::info!("Resuming from {previous:?}");
            previous
        } else {
            log::info!("Starting from base model {}", params.base_model);
            PathBuf::from(&params.base_model)
        };
        Self {
            model,
            resumed,
            data: config.paths.dataset_config(),
            epochs: params.epochs,
            imgsz: params.image_size,
            batch: params.batch_size,
            project,
            name,
        }
    }

    /// Where the framework leaves the best checkpoint of this run.
    pub fn best_weights(&self) -> PathBuf {
        self.project.join(&self.name).join("weights").join("best.pt")
    }

    /// `key=value` arguments in the order the CLI prints them.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            format!("model={}", self.model.display()),
            format!("data={}", self.data.display()),
            format!("epochs={}", self.epochs),
            format!("imgsz={}", self.imgsz),
            format!("batch={}", self.batch),
            format!("project={}", self.project.display()),
            format!("name={}", self.name),
            "exist_ok=True".to_string(),
            "save=True".to_string(),
        ]
    }
}

/// An opaque training loop.
pub trait Trainer {
    /// Runs `plan` to completion and returns the produced weights.
    fn train(&mut self, plan: &TrainingPlan) -> Result<PathBuf>;
}

/// Runs `yolo detect train` as a child process.
pub struct YoloCliTrainer {
    executable: PathBuf,
}

impl YoloCliTrainer {
    pub fn new() -> Result<Self> {
        let executable = which::which("yolo").map_err(|err| {
            Error::Training(format!("`yolo` executable not found ({err}); install ultralytics first"))
        })?;
        Ok(Self { executable })
    }

    pub fn with_executable(executable: impl AsRef<Path>) -> Self {
        Self {
            executable: executable.as_ref().to_path_buf(),
        }
    }

    pub fn command(&self, plan: &TrainingPlan) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(["detect", "train"]).args(plan.to_args());
        cmd
    }
}

impl Trainer for YoloCliTrainer {
    fn train(&mut self, plan: &TrainingPlan) -> Result<PathBuf> {
        log::info!("Running {:?} {}", self.executable, plan.to_args().join(" "));
        let status = self.command(plan).status()?;
        if !status.success() {
            return Err(Error::Training(format!("trainer exited with {status}")));
        }
        let weights = plan.best_weights();
        if !weights.is_file() {
            return Err(Error::Training(format!("no weights at {weights:?} after training")));
        }
        Ok(weights)
    }
}
