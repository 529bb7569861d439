//! Folding a foreign YOLO dataset into the project's Frame Store.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml::Value;

use crate::class_map::ClassMap;
use crate::frame_store::{self, FrameStore};
use crate::translation::{TranslationTable, TranslationTarget};
use crate::{Error, Result};

const DATA_YAML: &str = "data.yaml";
const DATA_YAML_HINT: &str = "a YOLO export must carry data.yaml at its root";

/// A downloaded dataset: `data.yaml` plus `<train>/images` and `<train>/labels`.
#[derive(Debug, Clone)]
pub struct ForeignDataset {
    pub root: PathBuf,
    pub name: String,
    pub classes: ClassMap,
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
}

impl ForeignDataset {
    /// Loads a dataset directory, or a `.zip` which is first extracted
    /// into a sibling directory named after the archive.
    pub fn load(path: &Path) -> Result<Self> {
        let root = if is_zip(path) {
            extract_archive(path)?
        } else {
            path.to_path_buf()
        };
        let root = locate_data_yaml(&root)?;
        let config_path = root.join(DATA_YAML);
        let config: Value = serde_yaml::from_str(&fs::read_to_string(&config_path)?)?;

        let classes = config
            .get("names")
            .and_then(ClassMap::from_yaml_value)
            .ok_or_else(|| Error::UnsupportedClassList {
                path: config_path.clone(),
            })?;
        let train = config
            .get("train")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::DatasetLayout {
                path: config_path.clone(),
                reason: "no `train` entry".to_string(),
            })?;

        let train_dir = root.join(train);
        let (images_dir, labels_dir) = if train_dir.join("images").is_dir() {
            (train_dir.join("images"), train_dir.join("labels"))
        } else if train_dir.file_name().is_some_and(|n| n == "images") {
            // `train: train/images` style; labels sit next to it.
            let labels = train_dir.with_file_name("labels");
            (train_dir.clone(), labels)
        } else {
            (train_dir.join("images"), train_dir.join("labels"))
        };
        if !images_dir.is_dir() || !labels_dir.is_dir() {
            return Err(Error::DatasetLayout {
                path: train_dir,
                reason: "missing `images` or `labels` directory".to_string(),
            });
        }

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        log::info!("Foreign dataset '{}' with {} classes", name, classes.len());
        Ok(Self {
            root,
            name,
            classes,
            images_dir,
            labels_dir,
        })
    }

    /// Top-level images of the training split, sorted.
    pub fn images(&self) -> Result<Vec<PathBuf>> {
        let mut images = Vec::new();
        for entry in fs::read_dir(&self.images_dir)? {
            let path = entry?.path();
            if path.is_file() && frame_store::is_image(&path) {
                images.push(path);
            }
        }
        images.sort();
        Ok(images)
    }
}

fn is_zip(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

fn extract_archive(path: &Path) -> Result<PathBuf> {
    let stem = path.file_stem().unwrap_or_default();
    let target = path.with_file_name(stem);
    log::info!("Extracting {path:?} into {target:?}");
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    archive.extract(&target)?;
    Ok(target)
}

/// Accepts `data.yaml` at `root` or inside its only subdirectory.
fn locate_data_yaml(root: &Path) -> Result<PathBuf> {
    if root.join(DATA_YAML).is_file() {
        return Ok(root.to_path_buf());
    }
    if root.is_dir() {
        let dirs: Vec<PathBuf> = fs::read_dir(root)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        if let [only] = dirs.as_slice() {
            if only.join(DATA_YAML).is_file() {
                return Ok(only.clone());
            }
        }
    }
    Err(Error::ConfigNotFound {
        path: root.join(DATA_YAML),
        hint: DATA_YAML_HINT,
    })
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Frame Store split receiving the merged pairs.
    pub split: String,
    /// Copy images whose every line translates to ignore, with an empty
    /// label file, instead of dropping them.
    pub keep_negatives: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            split: "train".to_string(),
            keep_negatives: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeSummary {
    pub images_found: usize,
    pub merged: usize,
    pub negatives_kept: usize,
    pub skipped_unlabeled: usize,
    pub skipped_all_ignored: usize,
    pub lines_ignored: usize,
    /// Lines whose class had no table entry; dropped like ignored ones.
    pub lines_unmapped: usize,
    pub lines_malformed: usize,
    pub failed: Vec<(PathBuf, String)>,
}

impl MergeSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_unlabeled + self.skipped_all_ignored + self.failed.len()
    }
}

/// Copies every translatable image/label pair of `foreign` into `store`
/// under `merged_<source>_<stem>` names. A failure on one pair is
/// recorded and the merge moves on.
pub fn merge_dataset(
    foreign: &ForeignDataset,
    table: &TranslationTable,
    store: &FrameStore,
    options: &MergeOptions,
) -> Result<MergeSummary> {
    let dest_images = store.images_dir(&options.split);
    let dest_labels = store.labels_dir(&options.split);
    fs::create_dir_all(&dest_images)?;
    fs::create_dir_all(&dest_labels)?;

    let images = foreign.images()?;
    let mut summary = MergeSummary {
        images_found: images.len(),
        ..Default::default()
    };
    log::info!("Merging {} images from '{}'", images.len(), foreign.name);

    for image in &images {
        let Some(stem) = image.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let label = foreign.labels_dir.join(format!("{stem}.txt"));
        let text = match fs::read_to_string(&label) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) | Err(_) => {
                log::debug!("No label for {image:?}");
                summary.skipped_unlabeled += 1;
                continue;
            }
        };

        let lines = translate_lines(&text, table, &mut summary);
        if lines.is_empty() && !options.keep_negatives {
            summary.skipped_all_ignored += 1;
            continue;
        }

        let prefix = format!("merged_{}_{}", foreign.name, stem);
        let dest_image = match image.extension() {
            Some(ext) => dest_images.join(format!("{prefix}.{}", ext.to_string_lossy())),
            None => dest_images.join(&prefix),
        };
        let dest_label = dest_labels.join(format!("{prefix}.txt"));
        match copy_pair(image, &dest_image, &dest_label, &lines) {
            Ok(()) if lines.is_empty() => summary.negatives_kept += 1,
            Ok(()) => summary.merged += 1,
            Err(err) => {
                log::warn!("Failed to merge {image:?}: {err}");
                summary.failed.push((image.clone(), err.to_string()));
            }
        }
    }

    log::info!(
        "Merged {} pairs ({} negatives), skipped {}",
        summary.merged,
        summary.negatives_kept,
        summary.skipped()
    );
    Ok(summary)
}

/// Rewrites the leading class id of each line, keeping the geometry text.
fn translate_lines(text: &str, table: &TranslationTable, summary: &mut MergeSummary) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let Some(first) = parts.next() else {
            continue;
        };
        let Ok(foreign_id) = first.parse::<u32>() else {
            summary.lines_malformed += 1;
            continue;
        };
        match table.get(foreign_id) {
            Some(TranslationTarget::Class(id)) => {
                let rest: Vec<&str> = parts.collect();
                out.push(format!("{} {}", id, rest.join(" ")));
            }
            Some(TranslationTarget::Ignore) => summary.lines_ignored += 1,
            None => summary.lines_unmapped += 1,
        }
    }
    out
}

fn copy_pair(image: &Path, dest_image: &Path, dest_label: &Path, lines: &[String]) -> Result<()> {
    fs::copy(image, dest_image)?;
    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    if let Err(err) = fs::write(dest_label, text) {
        // Never leave an image without its label.
        let _ = fs::remove_file(dest_image);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Foreign classes: 0 keyboard, 1 cat, 2 mouse.
    fn foreign_dataset(root: &Path, names_yaml: &str) {
        fs::create_dir_all(root.join("train/images")).unwrap();
        fs::create_dir_all(root.join("train/labels")).unwrap();
        fs::write(root.join(DATA_YAML), format!("train: train\nnc: 3\nnames: {names_yaml}\n")).unwrap();
        let pairs = [
            ("mixed", "0 0.5 0.5 0.2 0.2\n1 0.1 0.1 0.1 0.1\n2 0.3 0.3 0.1 0.1\n"),
            ("cats", "1 0.5 0.5 0.5 0.5\n"),
            ("unknown", "7 0.5 0.5 0.5 0.5\n"),
        ];
        for (stem, label) in pairs {
            fs::write(root.join(format!("train/images/{stem}.jpg")), b"jpeg").unwrap();
            fs::write(root.join(format!("train/labels/{stem}.txt")), label).unwrap();
        }
        fs::write(root.join("train/images/orphan.png"), b"png").unwrap();
    }

    fn table() -> TranslationTable {
        let mut table = TranslationTable::new();
        table.insert(0, TranslationTarget::Class(1));
        table.insert(1, TranslationTarget::Ignore);
        table.insert(2, TranslationTarget::Class(2));
        table
    }

    #[test]
    fn test_load_accepts_list_and_map_names() {
        let dir = TempDir::new().unwrap();
        let as_list = dir.path().join("listed");
        foreign_dataset(&as_list, "['keyboard', 'cat', 'mouse']");
        let as_map = dir.path().join("mapped");
        foreign_dataset(&as_map, "{0: keyboard, 1: cat, 2: mouse}");

        let a = ForeignDataset::load(&as_list).unwrap();
        let b = ForeignDataset::load(&as_map).unwrap();
        assert_eq!(a.classes, b.classes);
        assert_eq!(a.classes.name(2), Some("mouse"));
        assert_eq!(a.name, "listed");
        assert_eq!(a.images().unwrap().len(), 4);
    }

    #[test]
    fn test_load_rejects_missing_config_and_bad_names() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ForeignDataset::load(dir.path()),
            Err(Error::ConfigNotFound { .. })
        ));
        foreign_dataset(dir.path(), "keyboard");
        assert!(matches!(
            ForeignDataset::load(dir.path()),
            Err(Error::UnsupportedClassList { .. })
        ));
    }

    #[test]
    fn test_merge_drops_ignored_lines_and_images() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("office");
        foreign_dataset(&source, "['keyboard', 'cat', 'mouse']");
        let foreign = ForeignDataset::load(&source).unwrap();
        let store = FrameStore::new(dir.path().join("processed"), "programador");

        let summary = merge_dataset(&foreign, &table(), &store, &MergeOptions::default()).unwrap();
        assert_eq!(summary.images_found, 4);
        assert_eq!(summary.merged, 1);
        assert_eq!(summary.skipped_unlabeled, 1);
        assert_eq!(summary.skipped_all_ignored, 2);
        assert_eq!(summary.lines_ignored, 2);
        assert_eq!(summary.lines_unmapped, 1);
        assert!(summary.failed.is_empty());

        let label = store.labels_dir("train").join("merged_office_mixed.txt");
        assert_eq!(
            fs::read_to_string(label).unwrap(),
            "1 0.5 0.5 0.2 0.2\n2 0.3 0.3 0.1 0.1\n"
        );
        assert!(store.images_dir("train").join("merged_office_mixed.jpg").is_file());
        assert!(!store.images_dir("train").join("merged_office_cats.jpg").exists());
        assert!(!store.labels_dir("train").join("merged_office_cats.txt").exists());
    }

    #[test]
    fn test_keep_negatives_copies_empty_labels() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("office");
        foreign_dataset(&source, "['keyboard', 'cat', 'mouse']");
        let foreign = ForeignDataset::load(&source).unwrap();
        let store = FrameStore::new(dir.path().join("processed"), "programador");
        let options = MergeOptions {
            keep_negatives: true,
            ..Default::default()
        };

        let summary = merge_dataset(&foreign, &table(), &store, &options).unwrap();
        assert_eq!(summary.merged, 1);
        assert_eq!(summary.negatives_kept, 2);
        let cats = store.labels_dir("train").join("merged_office_cats.txt");
        assert_eq!(fs::read_to_string(cats).unwrap(), "");
    }

    #[test]
    fn test_load_accepts_images_subpath() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("train/images")).unwrap();
        fs::create_dir_all(dir.path().join("train/labels")).unwrap();
        fs::write(dir.path().join(DATA_YAML), "train: train/images
names: ['mouse']
").unwrap();

        let foreign = ForeignDataset::load(dir.path()).unwrap();
        assert_eq!(foreign.images_dir, dir.path().join("train/images"));
        assert_eq!(foreign.labels_dir, dir.path().join("train/labels"));

        fs::remove_dir_all(dir.path().join("train/labels")).unwrap();
        match ForeignDataset::load(dir.path()) {
            Err(Error::DatasetLayout { path, .. }) => assert_eq!(path, dir.path().join("train/images")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_write_failure_skips_pair_and_continues() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("office");
        foreign_dataset(&source, "['keyboard', 'cat', 'mouse']");
        fs::write(source.join("train/images/desk.jpg"), b"jpeg").unwrap();
        fs::write(source.join("train/labels/desk.txt"), "2 0.5 0.5 0.1 0.1\n").unwrap();
        let foreign = ForeignDataset::load(&source).unwrap();
        let store = FrameStore::new(dir.path().join("processed"), "programador");
        // A directory where the label file should go makes the write fail.
        fs::create_dir_all(store.labels_dir("train").join("merged_office_mixed.txt")).unwrap();

        let summary = merge_dataset(&foreign, &table(), &store, &MergeOptions::default()).unwrap();
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, source.join("train/images/mixed.jpg"));
        assert_eq!(summary.merged, 1);
        assert!(!store.images_dir("train").join("merged_office_mixed.jpg").exists());
        assert!(store.images_dir("train").join("merged_office_desk.jpg").is_file());
        assert_eq!(
            fs::read_to_string(store.labels_dir("train").join("merged_office_desk.txt")).unwrap(),
            "2 0.5 0.5 0.1 0.1\n"
        );
    }

    #[test]
    fn test_load_extracts_zip() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("desk.zip");
        let mut writer = zip::ZipWriter::new(File::create(&zip_path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("data.yaml", options).unwrap();
        writer.write_all(b"train: train\nnames: ['mouse']\n").unwrap();
        writer.add_directory("train/images/", options).unwrap();
        writer.add_directory("train/labels/", options).unwrap();
        writer.start_file("train/images/a.jpg", options).unwrap();
        writer.write_all(b"jpeg").unwrap();
        writer.start_file("train/labels/a.txt", options).unwrap();
        writer.write_all(b"0 0.5 0.5 0.1 0.1\n").unwrap();
        writer.finish().unwrap();

        let foreign = ForeignDataset::load(&zip_path).unwrap();
        assert_eq!(foreign.name, "desk");
        assert_eq!(foreign.root, dir.path().join("desk"));
        assert_eq!(foreign.images().unwrap().len(), 1);
    }
}
