//! Gathers a pre-split dataset tree into one flat images/labels pool

use crate::dataset::LABEL_SUFFIX;
use crate::error::{DatasetError, Result};
use crate::traits::FileTransfer;
use crate::utils::ImageUtils;
use crate::utils::fs::ensure_dirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Split directory names looked for under the raw root
pub const DEFAULT_SPLITS: [&str; 4] = ["train", "val", "valid", "test"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenStats {
    pub images: usize,
    pub labels: usize,
}

/// Bring `{raw}/{split}/images/*` and `{raw}/{split}/labels/*.txt` into
/// `images_out` and `labels_out`. Missing split directories are ignored.
pub fn flatten_dataset<S, T>(
    raw_dir: &Path,
    splits: &[S],
    images_out: &Path,
    labels_out: &Path,
    transfer: &T,
) -> Result<FlattenStats>
where
    S: AsRef<str>,
    T: FileTransfer + ?Sized,
{
    ensure_dirs([images_out, labels_out])?;
    let mut stats = FlattenStats::default();

    for split in splits {
        let split_dir = raw_dir.join(split.as_ref());

        let images_dir = split_dir.join("images");
        if images_dir.is_dir() {
            stats.images += transfer_matching(&images_dir, images_out, transfer, |name| {
                ImageUtils::is_image_file(name)
            })?;
        } else {
            debug!("No images under {:?}", split_dir);
        }

        let labels_dir = split_dir.join("labels");
        if labels_dir.is_dir() {
            stats.labels += transfer_matching(&labels_dir, labels_out, transfer, |name| {
                name.ends_with(LABEL_SUFFIX)
            })?;
        }
    }

    info!(
        "Flattened {} images and {} labels from {:?}",
        stats.images, stats.labels, raw_dir
    );
    Ok(stats)
}

fn transfer_matching<T, F>(from_dir: &Path, to_dir: &Path, transfer: &T, keep: F) -> Result<usize>
where
    T: FileTransfer + ?Sized,
    F: Fn(&str) -> bool,
{
    let entries = fs::read_dir(from_dir).map_err(|e| DatasetError::io(from_dir, e))?;
    let mut moved = 0;
    for entry in entries {
        let entry = entry.map_err(|e| DatasetError::io(from_dir, e))?;
        let name = entry.file_name();
        if !entry.path().is_file() || !keep(&name.to_string_lossy()) {
            continue;
        }
        transfer.transfer(&entry.path(), &to_dir.join(&name))?;
        moved += 1;
    }
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::fs::{CopyFile, MoveFile, touch};

    fn raw_tree(root: &Path) {
        for (split, stem) in [("train", "t1"), ("valid", "v1"), ("test", "x1")] {
            ensure_dirs([root.join(split).join("images"), root.join(split).join("labels")]).unwrap();
            touch(&root.join(split).join("images").join(format!("{stem}.jpg"))).unwrap();
            touch(&root.join(split).join("labels").join(format!("{stem}.txt"))).unwrap();
        }
        touch(&root.join("train").join("images").join("notes.csv")).unwrap();
    }

    #[test]
    fn test_flatten_moves_known_files() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw");
        raw_tree(&raw);
        let images = dir.path().join("flat/images");
        let labels = dir.path().join("flat/labels");

        let stats = flatten_dataset(&raw, &DEFAULT_SPLITS, &images, &labels, &MoveFile)?;

        assert_eq!(stats, FlattenStats { images: 3, labels: 3 });
        assert!(images.join("v1.jpg").exists());
        assert!(labels.join("x1.txt").exists());
        assert!(!raw.join("train/images/t1.jpg").exists());
        assert!(raw.join("train/images/notes.csv").exists());
        Ok(())
    }

    #[test]
    fn test_flatten_copy_keeps_source() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw");
        raw_tree(&raw);

        let stats = flatten_dataset(
            &raw,
            &["train"],
            &dir.path().join("i"),
            &dir.path().join("l"),
            &CopyFile,
        )?;

        assert_eq!(stats.images, 1);
        assert!(raw.join("train/images/t1.jpg").exists());
        Ok(())
    }
}
