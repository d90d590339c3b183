//! Yolosplit dataset library
//!
//! File formats and filesystem work around the splitting core: raw
//! annotation conversion, dataset flattening, label indexing, per-version
//! materialization and test-set unification on disk.

pub mod bbox;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod prepare;
pub mod utils;

// Re-export commonly used types
pub use bbox::{AbsoluteBox, LabelFile, YoloLabel};
pub use dataset::{DatasetLayout, IndexLoader, LoadedIndex, Materializer, SourcePool};
pub use error::{DatasetError, Result};
pub use pipeline::{Config, RunReport, VersionConfig, VersionDriver, VersionReport};

/// Seams between the pipeline and the filesystem
pub mod traits {
    use crate::Result;
    use std::path::Path;

    /// How a file reaches its destination (copy or move)
    pub trait FileTransfer: Sync {
        fn transfer(&self, from: &Path, to: &Path) -> Result<()>;
    }
}
