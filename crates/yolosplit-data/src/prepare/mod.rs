//! One-off preparation of the source pool

pub mod convert;
pub mod flatten;

pub use convert::{ConvertStats, convert_annotations};
pub use flatten::{DEFAULT_SPLITS, FlattenStats, flatten_dataset};
