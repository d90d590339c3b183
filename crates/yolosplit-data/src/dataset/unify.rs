//! Applies a [`UnifyPlan`] to materialized version trees

use super::{DatasetLayout, LABEL_SUFFIX, normalize_ext};
use crate::error::{DatasetError, Result};
use crate::utils::fs::{files_with_suffix, remove_if_exists, stem_before};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};
use yolosplit_core::{Bucket, ExampleId, UnifyPlan};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionUnify {
    pub version: String,
    pub evicted: usize,
    pub kept: usize,
    pub files_removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifyReport {
    /// Size of the shared test set
    pub common: usize,
    pub versions: Vec<VersionUnify>,
}

/// Fail unless every version has both test directories
pub fn check_test_dirs(layouts: &[(String, DatasetLayout)]) -> Result<()> {
    if layouts.is_empty() {
        return Err(DatasetError::config("no versions to unify"));
    }
    for (version, layout) in layouts {
        for dir in [layout.labels_dir(Bucket::Test), layout.images_dir(Bucket::Test)] {
            if !dir.is_dir() {
                return Err(DatasetError::MissingTestDir {
                    version: version.clone(),
                    path: dir,
                });
            }
        }
    }
    Ok(())
}

/// Example ids present in a version's `labels/test`
pub fn scan_test_ids(layout: &DatasetLayout) -> Result<BTreeSet<ExampleId>> {
    let files = files_with_suffix(&layout.labels_dir(Bucket::Test), LABEL_SUFFIX)?;
    Ok(files
        .iter()
        .filter_map(|path| stem_before(path, LABEL_SUFFIX))
        .map(ExampleId::new)
        .collect())
}

/// Leave only the shared examples in every version's test bucket. Files
/// whose stem is outside `plan.common` are deleted, whether the plan evicted
/// them or an earlier run left them behind.
///
/// All directories are checked before the first file is removed.
pub fn apply_plan(
    plan: &UnifyPlan,
    layouts: &[(String, DatasetLayout)],
    image_ext: &str,
) -> Result<UnifyReport> {
    check_test_dirs(layouts)?;
    let ext = normalize_ext(image_ext);

    let mut targets = Vec::with_capacity(plan.versions.len());
    for entry in &plan.versions {
        let layout = layouts
            .iter()
            .find(|(name, _)| *name == entry.version)
            .map(|(_, layout)| layout)
            .ok_or_else(|| {
                DatasetError::config(format!("no output tree for version `{}`", entry.version))
            })?;
        targets.push((entry, layout));
    }

    let mut report = UnifyReport {
        common: plan.common.len(),
        versions: Vec::with_capacity(targets.len()),
    };
    for (entry, layout) in targets {
        let labels_dir = layout.labels_dir(Bucket::Test);
        let images_dir = layout.images_dir(Bucket::Test);
        let files_removed = remove_outside(&labels_dir, LABEL_SUFFIX, &plan.common)?
            + remove_outside(&images_dir, &ext, &plan.common)?;
        debug!(
            "{}: evicted {} test examples ({} files)",
            entry.version,
            entry.evicted.len(),
            files_removed
        );

        report.versions.push(VersionUnify {
            version: entry.version.clone(),
            evicted: entry.evicted.len(),
            kept: entry.kept,
            files_removed,
        });
    }

    info!(
        "Unified test sets of {} versions on {} shared examples",
        report.versions.len(),
        report.common
    );
    Ok(report)
}

/// Delete files in `dir` ending in `suffix` whose stem is not in `keep`
fn remove_outside(dir: &Path, suffix: &str, keep: &BTreeSet<ExampleId>) -> Result<usize> {
    let mut removed = 0;
    for path in files_with_suffix(dir, suffix)? {
        let Some(stem) = stem_before(&path, suffix) else {
            continue;
        };
        if !keep.contains(&ExampleId::new(stem)) && remove_if_exists(&path)? {
            removed += 1;
        }
    }
    Ok(removed)
}
