//! Writes a bucket assignment to a version's output tree

use super::{DatasetLayout, LABEL_SUFFIX, SourcePool, label_file_name, normalize_ext};
use crate::error::Result;
use crate::traits::FileTransfer;
use crate::utils::fs::{CopyFile, clear_files, files_with_suffix, stem_before, touch};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};
use yolosplit_core::{Allocation, Bucket, ExampleId};

/// Files written per bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializeStats {
    pub train: usize,
    pub val: usize,
    pub test: usize,
    pub negatives: usize,
}

impl MaterializeStats {
    fn record(&mut self, bucket: Bucket) {
        match bucket {
            Bucket::Train => self.train += 1,
            Bucket::Val => self.val += 1,
            Bucket::Test => self.test += 1,
        }
    }
}

/// Copies image + label pairs from the source pool into one version
pub struct Materializer<'a> {
    pool: &'a SourcePool,
    layout: DatasetLayout,
    transfer: CopyFile,
}

impl<'a> Materializer<'a> {
    pub fn new(pool: &'a SourcePool, layout: DatasetLayout) -> Self {
        Self {
            pool,
            layout,
            transfer: CopyFile,
        }
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Create the six bucket directories, emptying whatever an earlier run
    /// left in them
    pub fn prepare_dirs(&self) -> Result<()> {
        self.layout.create()?;
        let mut stale = 0;
        for dir in self.layout.all_dirs() {
            stale += clear_files(&dir)?;
        }
        if stale > 0 {
            debug!("Removed {} stale files under {:?}", stale, self.layout.root());
        }
        Ok(())
    }

    /// Whether `stem` already names a source example or a file in this tree
    fn stem_taken(&self, stem: &str, image_name: &std::ffi::OsStr) -> bool {
        let id = ExampleId::new(stem);
        if self.pool.image_path(&id).exists() || self.pool.label_path(&id).exists() {
            return true;
        }
        Bucket::ALL.iter().any(|&bucket| {
            self.layout.labels_dir(bucket).join(label_file_name(&id)).exists()
                || self.layout.images_dir(bucket).join(image_name).exists()
        })
    }

    /// Copy one example's image and label into `bucket`
    pub fn write_example(&self, bucket: Bucket, id: &ExampleId) -> Result<()> {
        let image_name = self.pool.image_file_name(id);
        let label_name = label_file_name(id);

        self.transfer.transfer(
            &self.pool.images_dir().join(&image_name),
            &self.layout.images_dir(bucket).join(&image_name),
        )?;
        self.transfer.transfer(
            &self.pool.labels_dir().join(&label_name),
            &self.layout.labels_dir(bucket).join(&label_name),
        )
    }

    /// Write every assigned example exactly once
    pub fn write_allocation(&self, allocation: &Allocation) -> Result<MaterializeStats> {
        self.prepare_dirs()?;

        let mut stats = MaterializeStats::default();
        for (bucket, id) in allocation.iter() {
            self.write_example(bucket, id)?;
            stats.record(bucket);
        }

        debug!(
            "Materialized {:?}: {} train, {} val, {} test",
            self.layout.root(),
            stats.train,
            stats.val,
            stats.test
        );
        Ok(stats)
    }

    /// Add up to `count` background images to train, each with an empty
    /// label file. Candidates are taken in sorted order, shuffled by `rng`.
    /// A candidate whose stem is already a source example or present in the
    /// tree is skipped.
    pub fn inject_negatives<R: Rng + ?Sized>(
        &self,
        negatives_dir: &Path,
        image_ext: &str,
        count: usize,
        rng: &mut R,
    ) -> Result<usize> {
        if count == 0 {
            return Ok(0);
        }
        let ext = normalize_ext(image_ext);
        let mut candidates = files_with_suffix(negatives_dir, &ext)?;
        candidates.shuffle(rng);

        let images_dir = self.layout.images_dir(Bucket::Train);
        let labels_dir = self.layout.labels_dir(Bucket::Train);
        let mut added = 0;
        for image in &candidates {
            if added == count {
                break;
            }
            let (Some(name), Some(stem)) = (image.file_name(), stem_before(image, &ext)) else {
                continue;
            };
            if self.stem_taken(&stem, name) {
                warn!(
                    "Negative {:?} shares stem `{}` with an existing example, skipping",
                    image, stem
                );
                continue;
            }
            self.transfer.transfer(image, &images_dir.join(name))?;
            touch(&labels_dir.join(format!("{stem}{LABEL_SUFFIX}")))?;
            added += 1;
        }

        debug!("Added {} negative samples to {:?}", added, images_dir);
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use yolosplit_core::seeded_rng;

    fn pool_with(dir: &Path, stems: &[&str]) -> SourcePool {
        let pool = SourcePool::new(dir.join("images"), dir.join("labels"), ".jpg");
        fs::create_dir_all(pool.images_dir()).unwrap();
        fs::create_dir_all(pool.labels_dir()).unwrap();
        for stem in stems {
            let id = ExampleId::from(*stem);
            fs::write(pool.image_path(&id), b"img").unwrap();
            fs::write(pool.label_path(&id), "0 0.5 0.5 0.1 0.1\n").unwrap();
        }
        pool
    }

    fn ids(names: &[&str]) -> BTreeSet<ExampleId> {
        names.iter().map(|&n| ExampleId::from(n)).collect()
    }

    fn names_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_writes_each_example_once_per_bucket() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(dir.path(), &["a", "b", "c"]);
        let layout = DatasetLayout::new(dir.path().join("v1"));
        let allocation = Allocation {
            train: ids(&["a", "c"]),
            val: ids(&["b"]),
            ..Default::default()
        };

        let stats = Materializer::new(&pool, layout.clone()).write_allocation(&allocation)?;

        assert_eq!((stats.train, stats.val, stats.test), (2, 1, 0));
        assert_eq!(names_in(&layout.images_dir(Bucket::Train)), vec!["a.jpg", "c.jpg"]);
        assert_eq!(names_in(&layout.labels_dir(Bucket::Val)), vec!["b.txt"]);
        assert!(names_in(&layout.images_dir(Bucket::Test)).is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_source_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(dir.path(), &[]);
        let allocation = Allocation {
            test: ids(&["ghost"]),
            ..Default::default()
        };

        let result = Materializer::new(&pool, DatasetLayout::new(dir.path().join("v")))
            .write_allocation(&allocation);
        assert!(result.is_err());
    }

    #[test]
    fn test_negatives_get_empty_labels() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(dir.path(), &[]);
        let negatives = dir.path().join("negatives");
        fs::create_dir_all(&negatives).unwrap();
        for name in ["n1.jpg", "n2.jpg", "n3.jpg", "skip.png"] {
            fs::write(negatives.join(name), b"bg").unwrap();
        }
        let materializer = Materializer::new(&pool, DatasetLayout::new(dir.path().join("v")));
        materializer.prepare_dirs()?;

        let added = materializer.inject_negatives(&negatives, "jpg", 2, &mut seeded_rng(5))?;

        assert_eq!(added, 2);
        let labels_dir = materializer.layout().labels_dir(Bucket::Train);
        let labels = names_in(&labels_dir);
        assert_eq!(labels.len(), 2);
        for label in labels {
            assert_eq!(fs::read_to_string(labels_dir.join(label)).unwrap(), "");
        }
        Ok(())
    }

    #[test]
    fn test_rewrite_clears_previous_run() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(dir.path(), &["a", "b"]);
        let layout = DatasetLayout::new(dir.path().join("v"));
        let materializer = Materializer::new(&pool, layout.clone());

        materializer.write_allocation(&Allocation {
            test: ids(&["a", "b"]),
            ..Default::default()
        })?;
        materializer.write_allocation(&Allocation {
            train: ids(&["a"]),
            test: ids(&["b"]),
            ..Default::default()
        })?;

        assert_eq!(names_in(&layout.images_dir(Bucket::Train)), vec!["a.jpg"]);
        assert_eq!(names_in(&layout.images_dir(Bucket::Test)), vec!["b.jpg"]);
        assert_eq!(names_in(&layout.labels_dir(Bucket::Test)), vec!["b.txt"]);
        Ok(())
    }

    #[test]
    fn test_negatives_never_replace_examples() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(dir.path(), &["001", "002"]);
        let negatives = dir.path().join("negatives");
        fs::create_dir_all(&negatives).unwrap();
        for name in ["001.jpg", "002.jpg", "100.jpg"] {
            fs::write(negatives.join(name), b"bg").unwrap();
        }
        let layout = DatasetLayout::new(dir.path().join("v"));
        let materializer = Materializer::new(&pool, layout.clone());
        materializer.write_allocation(&Allocation {
            train: ids(&["001"]),
            test: ids(&["002"]),
            ..Default::default()
        })?;

        let added = materializer.inject_negatives(&negatives, ".jpg", 3, &mut seeded_rng(3))?;

        assert_eq!(added, 1);
        assert_eq!(names_in(&layout.images_dir(Bucket::Train)), vec!["001.jpg", "100.jpg"]);
        assert_eq!(
            fs::read_to_string(layout.labels_dir(Bucket::Train).join("001.txt")).unwrap(),
            "0 0.5 0.5 0.1 0.1\n"
        );
        assert_eq!(fs::read(layout.images_dir(Bucket::Train).join("001.jpg")).unwrap(), b"img");
        assert_eq!(names_in(&layout.images_dir(Bucket::Test)), vec!["002.jpg"]);
        Ok(())
    }

    #[test]
    fn test_negative_count_larger_than_pool() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(dir.path(), &[]);
        let negatives = dir.path().join("negatives");
        fs::create_dir_all(&negatives).unwrap();
        fs::write(negatives.join("only.jpg"), b"bg").unwrap();
        let materializer = Materializer::new(&pool, DatasetLayout::new(dir.path().join("v")));
        materializer.prepare_dirs()?;

        let added = materializer.inject_negatives(&negatives, ".jpg", 10, &mut seeded_rng(1))?;
        assert_eq!(added, 1);
        Ok(())
    }
}
