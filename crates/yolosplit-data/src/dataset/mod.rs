//! Dataset locations: the shared source pool and per-version output trees

pub mod loader;
pub mod materializer;
pub mod unify;

pub use loader::{IndexLoader, LoadedIndex};
pub use materializer::{Materializer, MaterializeStats};
pub use unify::{UnifyReport, apply_plan, check_test_dirs, scan_test_ids};

use crate::Result;
use crate::utils::fs::ensure_dirs;
use std::path::{Path, PathBuf};
use yolosplit_core::{Bucket, ExampleId};

/// Suffix of every detection label file
pub const LABEL_SUFFIX: &str = ".txt";

/// `jpg` and `.jpg` both become `.jpg`
pub fn normalize_ext(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

pub fn label_file_name(id: &ExampleId) -> String {
    format!("{id}{LABEL_SUFFIX}")
}

/// Source images and their detection labels, paired by file stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePool {
    images_dir: PathBuf,
    labels_dir: PathBuf,
    image_ext: String,
}

impl SourcePool {
    pub fn new(images_dir: impl Into<PathBuf>, labels_dir: impl Into<PathBuf>, image_ext: &str) -> Self {
        Self {
            images_dir: images_dir.into(),
            labels_dir: labels_dir.into(),
            image_ext: normalize_ext(image_ext),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn labels_dir(&self) -> &Path {
        &self.labels_dir
    }

    pub fn image_ext(&self) -> &str {
        &self.image_ext
    }

    pub fn image_file_name(&self, id: &ExampleId) -> String {
        format!("{id}{}", self.image_ext)
    }

    pub fn image_path(&self, id: &ExampleId) -> PathBuf {
        self.images_dir.join(self.image_file_name(id))
    }

    pub fn label_path(&self, id: &ExampleId) -> PathBuf {
        self.labels_dir.join(label_file_name(id))
    }
}

/// Output tree of one dataset version:
/// `{root}/images/{train,val,test}` and `{root}/labels/{train,val,test}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout of the version called `name` under `output_root`
    pub fn for_version(output_root: &Path, name: &str) -> Self {
        Self::new(output_root.join(name))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self, bucket: Bucket) -> PathBuf {
        self.root.join("images").join(bucket.as_str())
    }

    pub fn labels_dir(&self, bucket: Bucket) -> PathBuf {
        self.root.join("labels").join(bucket.as_str())
    }

    pub fn all_dirs(&self) -> Vec<PathBuf> {
        Bucket::ALL
            .into_iter()
            .flat_map(|bucket| [self.images_dir(bucket), self.labels_dir(bucket)])
            .collect()
    }

    /// Create all six bucket directories
    pub fn create(&self) -> Result<()> {
        ensure_dirs(self.all_dirs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = DatasetLayout::for_version(Path::new("out"), "VHR10_10");

        assert_eq!(layout.images_dir(Bucket::Val), Path::new("out/VHR10_10/images/val"));
        assert_eq!(layout.labels_dir(Bucket::Test), Path::new("out/VHR10_10/labels/test"));
        assert_eq!(layout.all_dirs().len(), 6);
    }

    #[test]
    fn test_pool_paths_normalize_extension() {
        let pool = SourcePool::new("imgs", "lbls", "jpg");
        let id = ExampleId::from("001");

        assert_eq!(pool.image_ext(), ".jpg");
        assert_eq!(pool.image_path(&id), Path::new("imgs/001.jpg"));
        assert_eq!(pool.label_path(&id), Path::new("lbls/001.txt"));
    }
}
