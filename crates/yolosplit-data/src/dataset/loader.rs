//! Label index loading from a directory of detection label files

use super::{LABEL_SUFFIX, SourcePool, normalize_ext};
use crate::bbox::LabelFile;
use crate::error::{DatasetError, Result};
use crate::utils::fs::{files_with_suffix, stem_before};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use yolosplit_core::{ExampleId, LabelIndex};

/// Index plus the label files that were left out for lack of an image
#[derive(Debug, Clone, Default)]
pub struct LoadedIndex {
    pub index: LabelIndex,
    pub skipped: Vec<ExampleId>,
}

/// Read and parse one detection label file
pub fn read_label_file(path: &Path) -> Result<LabelFile> {
    let text = fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
    LabelFile::parse(&text).map_err(|source| DatasetError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds a [`LabelIndex`] from `*.txt` label files
pub struct IndexLoader {
    labels_dir: PathBuf,
    images: Option<(PathBuf, String)>,
}

impl IndexLoader {
    pub fn new<P: AsRef<Path>>(labels_dir: P) -> Self {
        Self {
            labels_dir: labels_dir.as_ref().to_path_buf(),
            images: None,
        }
    }

    /// Only index label files with a matching `{stem}{image_ext}` image
    pub fn with_images<P: AsRef<Path>>(mut self, images_dir: P, image_ext: &str) -> Self {
        self.images = Some((images_dir.as_ref().to_path_buf(), normalize_ext(image_ext)));
        self
    }

    pub fn from_pool(pool: &SourcePool) -> Self {
        Self::new(pool.labels_dir()).with_images(pool.images_dir(), pool.image_ext())
    }

    pub fn load(&self) -> Result<LoadedIndex> {
        let mut loaded = LoadedIndex::default();

        for path in files_with_suffix(&self.labels_dir, LABEL_SUFFIX)? {
            let Some(stem) = stem_before(&path, LABEL_SUFFIX) else {
                continue;
            };
            let id = ExampleId::new(stem);

            if let Some((images_dir, ext)) = &self.images {
                let image = images_dir.join(format!("{id}{ext}"));
                if !image.is_file() {
                    debug!("No image for label {:?}, skipping", path);
                    loaded.skipped.push(id);
                    continue;
                }
            }

            let labels = read_label_file(&path)?;
            loaded.index.insert(id, labels.class_counts());
        }

        info!(
            "Indexed {} examples from {:?} ({} without image)",
            loaded.index.len(),
            self.labels_dir,
            loaded.skipped.len()
        );
        Ok(loaded)
    }
}
