//! Version pipeline

pub mod config;
pub mod driver;

pub use config::{Config, EXAMPLE_CONFIG, VersionConfig};
pub use driver::{RunReport, VersionDriver, VersionReport, VersionRun};
