//! Yolosplit core
//!
//! Class-capped dataset splitting: label index, greedy bucket allocation
//! and cross-version test-set unification. Nothing in this crate touches
//! the filesystem.

pub mod error;
pub mod labels;
pub mod split;
pub mod unify;

pub use error::SplitError;
pub use labels::{ClassCounts, ClassId, ExampleId, LabelIndex};
pub use split::{
    Allocation, Allocator, AllocatorState, Bucket, Cap, RatioSplit, seeded_rng, shuffled_ids,
};
pub use unify::{UnifyPlan, VersionEvictions};

pub type Result<T> = std::result::Result<T, SplitError>;
