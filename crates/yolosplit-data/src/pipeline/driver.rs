//! Runs every configured version, then unifies their test sets

use super::config::{Config, VersionConfig};
use crate::dataset::{
    DatasetLayout, IndexLoader, LoadedIndex, Materializer, SourcePool, UnifyReport, apply_plan,
    check_test_dirs, scan_test_ids,
};
use crate::error::{DatasetError, Result};
use crate::prepare::{ConvertStats, FlattenStats, convert_annotations, flatten_dataset};
use crate::utils::{CopyFile, MoveFile};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};
use yolosplit_core::{Allocation, ClassCounts, ExampleId, LabelIndex, UnifyPlan, seeded_rng};

/// Outcome of one materialized dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReport {
    pub name: String,
    pub seed: u64,
    pub train: usize,
    pub val: usize,
    /// Test size before unification
    pub test: usize,
    pub negatives: usize,
    pub train_counts: ClassCounts,
    pub val_counts: ClassCounts,
    pub processing_time_ms: u64,
}

/// A finished version: its allocation plus the report
#[derive(Debug, Clone)]
pub struct VersionRun {
    pub name: String,
    pub allocation: Allocation,
    pub report: VersionReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub examples: usize,
    pub skipped_without_image: usize,
    pub versions: Vec<VersionReport>,
    pub unify: Option<UnifyReport>,
}

/// Drives allocation and materialization for each configured version
pub struct VersionDriver {
    config: Config,
    pool: SourcePool,
}

impl VersionDriver {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = config.source_pool();
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &SourcePool {
        &self.pool
    }

    /// Convert raw annotations into the source label directory
    pub fn convert(&self) -> Result<ConvertStats> {
        let convert = self
            .config
            .convert
            .as_ref()
            .ok_or_else(|| DatasetError::config("missing [convert] section"))?;

        convert_annotations(
            &convert.raw_labels_dir,
            self.pool.images_dir(),
            self.pool.image_ext(),
            self.pool.labels_dir(),
        )
    }

    /// Gather a pre-split tree into the source pool
    pub fn flatten(&self) -> Result<FlattenStats> {
        let flatten = self
            .config
            .flatten
            .as_ref()
            .ok_or_else(|| DatasetError::config("missing [flatten] section"))?;

        let images = self.pool.images_dir();
        let labels = self.pool.labels_dir();
        if flatten.keep_source {
            flatten_dataset(&flatten.raw_dir, &flatten.splits, images, labels, &CopyFile)
        } else {
            flatten_dataset(&flatten.raw_dir, &flatten.splits, images, labels, &MoveFile)
        }
    }

    pub fn load_index(&self) -> Result<LoadedIndex> {
        IndexLoader::from_pool(&self.pool).load()
    }

    /// Allocate, materialize and add negatives for one version.
    ///
    /// The negatives shuffle continues the generator used for allocation.
    pub fn run_version(&self, version: &VersionConfig, index: &LabelIndex) -> Result<VersionRun> {
        let start_time = Instant::now();
        let mut rng = seeded_rng(version.seed);

        let allocation = version.allocator().allocate(index, &mut rng);
        let materializer = Materializer::new(&self.pool, self.config.layout_for(&version.name));
        materializer.write_allocation(&allocation)?;
        let negatives = self.add_negatives(&materializer, None, &mut rng)?;

        let report = VersionReport {
            name: version.name.clone(),
            seed: version.seed,
            train: allocation.train.len(),
            val: allocation.val.len(),
            test: allocation.test.len(),
            negatives,
            train_counts: allocation.train_counts.clone(),
            val_counts: allocation.val_counts.clone(),
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        };
        info!(
            "{}: {} train, {} val, {} test, {} negatives",
            report.name, report.train, report.val, report.test, report.negatives
        );

        Ok(VersionRun {
            name: version.name.clone(),
            allocation,
            report,
        })
    }

    /// Run all versions; each one finishes completely before this returns
    pub fn run_all(&self, index: &LabelIndex) -> Result<Vec<VersionRun>> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.config
                .versions
                .par_iter()
                .map(|version| self.run_version(version, index))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            self.config
                .versions
                .iter()
                .map(|version| self.run_version(version, index))
                .collect()
        }
    }

    /// Intersect the runs' test sets, prune the trees on disk and the
    /// in-memory allocations to match
    pub fn unify(&self, runs: &mut [VersionRun]) -> Result<UnifyReport> {
        let tests: Vec<(String, BTreeSet<ExampleId>)> = runs
            .iter()
            .map(|run| (run.name.clone(), run.allocation.test.clone()))
            .collect();
        let plan = UnifyPlan::compute(&tests)?;

        let layouts: Vec<(String, DatasetLayout)> = runs
            .iter()
            .map(|run| (run.name.clone(), self.config.layout_for(&run.name)))
            .collect();
        let report = apply_plan(&plan, &layouts, self.pool.image_ext())?;

        for run in runs.iter_mut() {
            plan.apply_to(&run.name, &mut run.allocation);
        }
        Ok(report)
    }

    /// Unify versions already on disk by scanning their test labels
    pub fn unify_existing(&self) -> Result<UnifyReport> {
        let layouts: Vec<(String, DatasetLayout)> = self
            .config
            .versions
            .iter()
            .map(|v| (v.name.clone(), self.config.layout_for(&v.name)))
            .collect();
        check_test_dirs(&layouts)?;

        let mut tests = Vec::with_capacity(layouts.len());
        for (name, layout) in &layouts {
            tests.push((name.clone(), scan_test_ids(layout)?));
        }
        let plan = UnifyPlan::compute(&tests)?;
        apply_plan(&plan, &layouts, self.pool.image_ext())
    }

    /// Index the pool, run every version, then unify if enabled
    pub fn run(&self) -> Result<RunReport> {
        if self.config.versions.is_empty() {
            return Err(DatasetError::config("no versions configured"));
        }

        let loaded = self.load_index()?;
        if loaded.index.is_empty() {
            warn!("No labeled examples found in {:?}", self.pool.labels_dir());
        }

        let mut runs = self.run_all(&loaded.index)?;
        let unify = if self.config.output.unify_test {
            Some(self.unify(&mut runs)?)
        } else {
            None
        };

        let report = RunReport {
            examples: loaded.index.len(),
            skipped_without_image: loaded.skipped.len(),
            versions: runs.into_iter().map(|run| run.report).collect(),
            unify,
        };
        if let Some(path) = &self.config.output.report {
            Self::export_json(&report, path)?;
        }
        Ok(report)
    }

    /// Single dataset split by ratios instead of caps
    pub fn run_ratio(&self) -> Result<VersionReport> {
        let ratio = self.config.ratio.clone().unwrap_or_default();
        let split = ratio.split()?;
        let start_time = Instant::now();

        let loaded = self.load_index()?;
        let mut rng = seeded_rng(ratio.seed);
        let allocation = split.split(&loaded.index, &mut rng);

        let materializer = Materializer::new(&self.pool, self.config.layout_for(&ratio.name));
        materializer.write_allocation(&allocation)?;
        let negatives = self.add_negatives(&materializer, ratio.negative_samples, &mut rng)?;

        let report = VersionReport {
            name: ratio.name.clone(),
            seed: ratio.seed,
            train: allocation.train.len(),
            val: allocation.val.len(),
            test: allocation.test.len(),
            negatives,
            train_counts: allocation.train_counts,
            val_counts: allocation.val_counts,
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        };
        info!(
            "{}: {} train, {} val, {} test, {} negatives",
            report.name, report.train, report.val, report.test, report.negatives
        );
        Ok(report)
    }

    fn add_negatives<R: Rng + ?Sized>(
        &self,
        materializer: &Materializer<'_>,
        count: Option<usize>,
        rng: &mut R,
    ) -> Result<usize> {
        let Some(negatives) = &self.config.negatives else {
            return Ok(0);
        };
        let count = count.unwrap_or(negatives.train_samples);
        materializer.inject_negatives(&negatives.dir, self.pool.image_ext(), count, rng)
    }

    /// Export a report as pretty JSON
    pub fn export_json<T: Serialize>(report: &T, output_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(output_path, json).map_err(|e| DatasetError::io(output_path, e))?;
        info!("Report written to {:?}", output_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::{OutputConfig, SourceConfig};

    fn config_for(root: &Path, versions: Vec<VersionConfig>) -> Config {
        Config {
            source: SourceConfig {
                images_dir: root.join("images"),
                labels_dir: root.join("labels"),
                image_ext: ".jpg".to_string(),
            },
            convert: None,
            flatten: None,
            output: OutputConfig {
                root: root.join("out"),
                unify_test: true,
                report: None,
            },
            negatives: None,
            ratio: None,
            versions,
        }
    }

    fn seed_pool(root: &Path, examples: &[(&str, &[u32])]) {
        std::fs::create_dir_all(root.join("images")).unwrap();
        std::fs::create_dir_all(root.join("labels")).unwrap();
        for (stem, classes) in examples {
            std::fs::write(root.join("images").join(format!("{stem}.jpg")), b"x").unwrap();
            let text: String = classes
                .iter()
                .map(|c| format!("{c} 0.5 0.5 0.1 0.1\n"))
                .collect();
            std::fs::write(root.join("labels").join(format!("{stem}.txt")), text).unwrap();
        }
    }

    #[test]
    fn test_run_requires_versions() {
        let dir = tempfile::tempdir().unwrap();
        let driver = VersionDriver::new(config_for(dir.path(), vec![])).unwrap();
        assert!(matches!(driver.run(), Err(DatasetError::Config(_))));
    }

    #[test]
    fn test_unify_prunes_in_memory_allocations() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let examples: Vec<(String, Vec<u32>)> =
            (0..30).map(|i| (format!("img{i:02}"), vec![i % 3])).collect();
        let borrowed: Vec<(&str, &[u32])> = examples
            .iter()
            .map(|(s, c)| (s.as_str(), c.as_slice()))
            .collect();
        seed_pool(dir.path(), &borrowed);

        let driver = VersionDriver::new(config_for(
            dir.path(),
            vec![
                VersionConfig::new("a", 2, 2, 1),
                VersionConfig::new("b", 3, 1, 2),
            ],
        ))?;
        let loaded = driver.load_index()?;
        let mut runs = driver.run_all(&loaded.index)?;
        let report = driver.unify(&mut runs)?;

        assert_eq!(runs[0].allocation.test, runs[1].allocation.test);
        assert_eq!(report.common, runs[0].allocation.test.len());
        for run in &runs {
            assert!(run.allocation.test.len() <= run.report.test);
        }
        Ok(())
    }
}
