//! Project configuration: `configs/work_config.yaml` and
//! `configs/dataset.yaml`, loaded once and handed to every component.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::class_map::{ClassMap, PERSON_ID};
use crate::frame_store::FrameStore;
use crate::{Error, Result};

/// Work type used when the work config does not name one.
pub const DEFAULT_WORK_TYPE: &str = "default_job";
/// Work type written by `setup` when the caller leaves it blank.
pub const SETUP_WORK_TYPE: &str = "programador";
/// Class always present at id 0.
pub const PERSON_CLASS: &str = "persona";

const SETUP_HINT: &str = "run `ffmpeg_dataset setup` first";

/// Hyper-parameters handed to the external trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    pub base_model: String,
    pub epochs: u32,
    pub image_size: u32,
    pub batch_size: u32,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            base_model: "yolov8n.pt".to_string(),
            epochs: 50,
            image_size: 416,
            batch_size: 4,
        }
    }
}

/// Contents of `configs/work_config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_work_type")]
    pub work_type: String,
    #[serde(default)]
    pub activities: ClassMap,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub training: TrainingParams,
}

fn default_project_name() -> String {
    "analisis_productividad".to_string()
}

fn default_work_type() -> String {
    DEFAULT_WORK_TYPE.to_string()
}

/// Contents of `configs/dataset.yaml`, the file the trainer consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub train: String,
    pub val: String,
    pub nc: usize,
    pub names: ClassMap,
}

/// Well-known locations under a project root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.root.join("configs")
    }

    pub fn work_config(&self) -> PathBuf {
        self.configs_dir().join("work_config.yaml")
    }

    pub fn dataset_config(&self) -> PathBuf {
        self.configs_dir().join("dataset.yaml")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn raw_videos_dir(&self) -> PathBuf {
        self.data_dir().join("raw").join("videos")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir().join("processed")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir().join("analysis").join("reports")
    }

    pub fn visualizations_dir(&self) -> PathBuf {
        self.data_dir().join("analysis").join("visualizations")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn processing_logs_dir(&self) -> PathBuf {
        self.results_dir().join("processing_logs")
    }
}

/// Both configuration files plus the root they were loaded from.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub paths: ProjectPaths,
    pub work: WorkConfig,
    pub dataset: DatasetConfig,
}

impl ProjectConfig {
    /// Loads and validates both configuration files under `root`.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let paths = ProjectPaths::new(root);
        let work: WorkConfig = read_yaml(&paths.work_config())?;
        let dataset: DatasetConfig = read_yaml(&paths.dataset_config())?;
        let config = Self {
            paths,
            work,
            dataset,
        };
        config.validate()?;
        log::info!(
            "Loaded project config for work type '{}' ({} classes)",
            config.work.work_type,
            config.dataset.names.len()
        );
        Ok(config)
    }

    /// Writes fresh configuration files for `work_type` and returns the
    /// loaded result. `person` is always class 0; duplicates are dropped.
    pub fn initialize(root: impl Into<PathBuf>, work_type: &str, activities: &[String]) -> Result<Self> {
        let paths = ProjectPaths::new(root);
        let work_type = match work_type.trim() {
            "" => SETUP_WORK_TYPE.to_string(),
            other => other.to_lowercase(),
        };

        let mut names: Vec<String> = vec![PERSON_CLASS.to_string()];
        for activity in activities {
            let activity = activity.trim();
            if !activity.is_empty() && !names.iter().any(|n| n == activity) {
                names.push(activity.to_string());
            }
        }
        let classes = ClassMap::from_names(names);

        let work = WorkConfig {
            project_name: default_project_name(),
            work_type,
            activities: classes.clone(),
            metrics: vec![
                "tiempo_activo".to_string(),
                "cambios_actividad".to_string(),
                "eficiencia_trabajo".to_string(),
                "tiempo_herramientas".to_string(),
            ],
            training: TrainingParams::default(),
        };
        let dataset = DatasetConfig {
            path: paths.data_dir(),
            train: "processed/images/train".to_string(),
            val: "processed/images/val".to_string(),
            nc: classes.len(),
            names: classes,
        };

        fs::create_dir_all(paths.configs_dir())?;
        fs::write(paths.work_config(), serde_yaml::to_string(&work)?)?;
        fs::write(paths.dataset_config(), serde_yaml::to_string(&dataset)?)?;
        log::info!(
            "Wrote {:?} and {:?} for work type '{}'",
            paths.work_config(),
            paths.dataset_config(),
            work.work_type
        );

        let config = Self {
            paths,
            work,
            dataset,
        };
        config.validate()?;
        Ok(config)
    }

    /// Guards against label ids drifting away from the training vocabulary.
    pub fn validate(&self) -> Result<()> {
        let path = self.paths.dataset_config();
        let names = &self.dataset.names;
        if names.is_empty() {
            return Err(Error::ConfigInvalid {
                path,
                reason: "no class names defined".to_string(),
            });
        }
        if self.dataset.nc != names.len() {
            return Err(Error::ConfigInvalid {
                path,
                reason: format!("nc is {} but {} names are listed", self.dataset.nc, names.len()),
            });
        }
        if !names.is_dense() {
            return Err(Error::ConfigInvalid {
                path,
                reason: "class ids must run from 0 without gaps".to_string(),
            });
        }
        if names.name(PERSON_ID) != Some(PERSON_CLASS) {
            return Err(Error::ConfigInvalid {
                path,
                reason: format!("class {PERSON_ID} must be '{PERSON_CLASS}'"),
            });
        }
        for (id, activity) in self.work.activities.iter() {
            if names.id_of(activity).is_none() {
                return Err(Error::ConfigInvalid {
                    path: self.paths.work_config(),
                    reason: format!("activity '{activity}' (id {id}) is missing from dataset names"),
                });
            }
        }
        Ok(())
    }

    pub fn work_type(&self) -> &str {
        &self.work.work_type
    }

    /// The project class vocabulary; `dataset.yaml` is the source of truth.
    pub fn classes(&self) -> &ClassMap {
        &self.dataset.names
    }

    pub fn frame_store(&self) -> FrameStore {
        FrameStore::new(self.paths.processed_dir(), &self.work.work_type)
    }

    /// Creates every directory the pipeline writes into.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.paths.raw_videos_dir(),
            self.paths.reports_dir(),
            self.paths.visualizations_dir(),
            self.paths.processing_logs_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        self.frame_store().ensure_layout()
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
            hint: SETUP_HINT,
        });
    }
    let text = fs::read_to_string(path)?;
    serde_yaml::from_str(&text).map_err(|err| Error::ConfigInvalid {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}
