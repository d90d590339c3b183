//! Error types for dataset preparation

use crate::bbox::LabelFileError;
use std::path::PathBuf;
use thiserror::Error;
use yolosplit_core::SplitError;

pub type Result<T> = std::result::Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("label parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: LabelFileError,
    },

    #[error("image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("config parse error at {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("test directory of version `{version}` is missing: {path}")]
    MissingTestDir { version: String, path: PathBuf },

    #[error(transparent)]
    Split(#[from] SplitError),
}

impl DatasetError {
    /// Attach a path to an io error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
