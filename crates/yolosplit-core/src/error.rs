use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplitError {
    #[error("ratio `{name}` must be within [0, 1], got {value}")]
    InvalidRatio { name: &'static str, value: f64 },

    #[error("split ratios sum to {0:.3}, which exceeds 1")]
    RatioSum(f64),

    #[error("unification needs at least one version")]
    NoVersions,

    #[error("version `{0}` appears more than once")]
    DuplicateVersion(String),
}
