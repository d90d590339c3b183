//! Bucket assignment: class-capped greedy allocation and ratio splits

pub mod allocator;
pub mod ratio;

pub use allocator::{Allocation, Allocator, AllocatorState};
pub use ratio::RatioSplit;

use crate::labels::{ClassId, ExampleId, LabelIndex};
use rand::Rng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One of the three disjoint partitions of a dataset version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Train,
    Val,
    Test,
}

impl Bucket {
    /// Buckets in admission priority order
    pub const ALL: [Bucket; 3] = [Bucket::Train, Bucket::Val, Bucket::Test];

    /// Directory name used for this bucket
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Train => "train",
            Bucket::Val => "val",
            Bucket::Test => "test",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-class upper bound on label occurrences inside one bucket.
///
/// Classes without an explicit entry fall back to `default`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cap {
    pub default: u32,
    #[serde(default)]
    pub per_class: BTreeMap<ClassId, u32>,
}

impl Cap {
    /// Same limit for every class
    pub fn uniform(limit: u32) -> Self {
        Self {
            default: limit,
            per_class: BTreeMap::new(),
        }
    }

    /// Override the limit for a single class
    pub fn with_class(mut self, class: impl Into<ClassId>, limit: u32) -> Self {
        self.per_class.insert(class.into(), limit);
        self
    }

    pub fn limit(&self, class: &ClassId) -> u32 {
        self.per_class.get(class).copied().unwrap_or(self.default)
    }
}

impl From<u32> for Cap {
    fn from(limit: u32) -> Self {
        Self::uniform(limit)
    }
}

/// Generator behind every seeded shuffle in this crate.
///
/// ChaCha8 output is stable across platforms and `rand` releases, so a
/// seed reproduces the same permutation wherever the tool runs.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Example ids in sorted order, then Fisher-Yates shuffled by `rng`
pub fn shuffled_ids<R: Rng + ?Sized>(index: &LabelIndex, rng: &mut R) -> Vec<ExampleId> {
    let mut ids: Vec<ExampleId> = index.ids().cloned().collect();
    ids.shuffle(rng);
    ids
}
