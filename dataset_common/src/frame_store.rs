use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::{Error, Result};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
pub const SPLITS: &[&str] = &["train", "val"];

/// On-disk layout consumed by the trainer:
/// `images/<split>/<work_type>/...` with a mirrored `labels/...` tree.
#[derive(Debug, Clone)]
pub struct FrameStore {
    root: PathBuf,
    work_type: String,
}

impl FrameStore {
    pub fn new(root: impl Into<PathBuf>, work_type: &str) -> Self {
        Self {
            root: root.into(),
            work_type: work_type.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn work_type(&self) -> &str {
        &self.work_type
    }

    pub fn images_dir(&self, split: &str) -> PathBuf {
        self.root.join("images").join(split).join(&self.work_type)
    }

    pub fn labels_dir(&self, split: &str) -> PathBuf {
        self.root.join("labels").join(split).join(&self.work_type)
    }

    /// Swaps the last `images` path component for `labels` and the
    /// extension for `.txt`, the same substitution the trainer applies.
    pub fn label_path_for(image: &Path) -> Result<PathBuf> {
        let components: Vec<Component> = image.components().collect();
        let pos = components
            .iter()
            .rposition(|c| c.as_os_str() == "images")
            .ok_or_else(|| Error::DatasetLayout {
                path: image.to_path_buf(),
                reason: "no `images` directory in path".to_string(),
            })?;
        let mut label: PathBuf = components[..pos].iter().collect();
        label.push("labels");
        for component in &components[pos + 1..] {
            label.push(component);
        }
        label.set_extension("txt");
        Ok(label)
    }

    pub fn ensure_layout(&self) -> Result<()> {
        for split in SPLITS {
            fs::create_dir_all(self.images_dir(split))?;
            fs::create_dir_all(self.labels_dir(split))?;
        }
        Ok(())
    }

    /// All images below `images/<split>/<work_type>`, sorted. Symlinks
    /// are not followed; a missing directory yields nothing.
    pub fn list_images(&self, split: &str) -> Result<Vec<PathBuf>> {
        let dir = self.images_dir(split);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut images = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && is_image(entry.path()) {
                images.push(entry.into_path());
            }
        }
        images.sort();
        Ok(images)
    }
}

pub fn is_image(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_label_path_mirrors_images() {
        let image = Path::new("/data/processed/images/train/chef/clip/interval_000010.jpg");
        assert_eq!(
            FrameStore::label_path_for(image).unwrap(),
            PathBuf::from("/data/processed/labels/train/chef/clip/interval_000010.txt")
        );
    }

    #[test]
    fn test_label_path_uses_last_images_component() {
        let image = Path::new("images/set/images/a.png");
        assert_eq!(
            FrameStore::label_path_for(image).unwrap(),
            PathBuf::from("images/set/labels/a.txt")
        );
        assert!(FrameStore::label_path_for(Path::new("frames/a.jpg")).is_err());
    }

    #[test]
    fn test_layout_and_listing() {
        let dir = TempDir::new().unwrap();
        let store = FrameStore::new(dir.path(), "chef");
        store.ensure_layout().unwrap();
        for split in SPLITS {
            assert!(store.images_dir(split).is_dir());
            assert!(store.labels_dir(split).is_dir());
        }

        let nested = store.images_dir("train").join("clip_a");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("b.jpg"), b"x").unwrap();
        fs::write(store.images_dir("train").join("a.PNG"), b"x").unwrap();
        fs::write(store.images_dir("train").join("notes.md"), b"x").unwrap();

        let images = store.list_images("train").unwrap();
        assert_eq!(images.len(), 2);
        assert!(store.list_images("val").unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_listing_skips_symlinked_directories() {
        let dir = TempDir::new().unwrap();
        let store = FrameStore::new(dir.path(), "chef");
        store.ensure_layout().unwrap();
        let images_dir = store.images_dir("train");
        fs::write(images_dir.join("a.jpg"), b"x").unwrap();
        std::os::unix::fs::symlink(&images_dir, images_dir.join("loop")).unwrap();

        assert_eq!(store.list_images("train").unwrap(), vec![images_dir.join("a.jpg")]);
    }
}
