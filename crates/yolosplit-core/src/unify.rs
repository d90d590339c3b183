//! Cross-version test-set unification
//!
//! All versions must be evaluated on the same held-out examples. The plan
//! intersects every version's test ids and lists what each version has to
//! drop. Applying it only ever removes examples from test.

use crate::error::SplitError;
use crate::labels::ExampleId;
use crate::split::Allocation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Test examples one version has to give up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEvictions {
    pub version: String,
    pub evicted: BTreeSet<ExampleId>,
    pub kept: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifyPlan {
    /// Test ids shared by every version
    pub common: BTreeSet<ExampleId>,
    /// One entry per version, in input order
    pub versions: Vec<VersionEvictions>,
}

impl UnifyPlan {
    /// Build the plan from each version's name and test ids.
    ///
    /// Fails when no version is given or a name repeats.
    pub fn compute<S: AsRef<str>>(tests: &[(S, BTreeSet<ExampleId>)]) -> crate::Result<Self> {
        let Some(((_, first), rest)) = tests.split_first() else {
            return Err(SplitError::NoVersions);
        };

        let mut seen = HashSet::new();
        for (name, _) in tests {
            if !seen.insert(name.as_ref()) {
                return Err(SplitError::DuplicateVersion(name.as_ref().to_string()));
            }
        }

        let mut common = first.clone();
        for (_, ids) in rest {
            common.retain(|id| ids.contains(id));
        }

        let versions = tests
            .iter()
            .map(|(name, ids)| VersionEvictions {
                version: name.as_ref().to_string(),
                evicted: ids.difference(&common).cloned().collect(),
                kept: common.len(),
            })
            .collect();

        Ok(Self { common, versions })
    }

    pub fn evictions_for(&self, version: &str) -> Option<&BTreeSet<ExampleId>> {
        self.versions
            .iter()
            .find(|v| v.version == version)
            .map(|v| &v.evicted)
    }

    pub fn total_evictions(&self) -> usize {
        self.versions.iter().map(|v| v.evicted.len()).sum()
    }

    /// Drop the evicted ids from an in-memory allocation's test bucket
    pub fn apply_to(&self, version: &str, allocation: &mut Allocation) {
        if let Some(evicted) = self.evictions_for(version) {
            allocation.test.retain(|id| !evicted.contains(id));
        }
    }
}
