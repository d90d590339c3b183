//! Pipeline configuration, loaded from TOML

use crate::dataset::{DatasetLayout, SourcePool};
use crate::error::{DatasetError, Result};
use crate::prepare::DEFAULT_SPLITS;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use yolosplit_core::{Allocator, Cap, ClassId, RatioSplit};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Flat pool of images and detection labels every version draws from
    pub source: SourceConfig,

    /// Raw annotation conversion into `source.labels_dir`
    #[serde(default)]
    pub convert: Option<ConvertConfig>,

    /// Flattening of a pre-split tree into the source pool
    #[serde(default)]
    pub flatten: Option<FlattenConfig>,

    #[serde(default)]
    pub output: OutputConfig,

    /// Background images added to each version's train bucket
    #[serde(default)]
    pub negatives: Option<NegativeConfig>,

    /// Single ratio-based dataset
    #[serde(default)]
    pub ratio: Option<RatioConfig>,

    /// Class-capped dataset versions, in run order
    #[serde(default)]
    pub versions: Vec<VersionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    #[serde(default = "default_image_ext")]
    pub image_ext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Directory of `(x1,y1),(x2,y2),class` annotation files
    pub raw_labels_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenConfig {
    pub raw_dir: PathBuf,
    #[serde(default = "default_flatten_splits")]
    pub splits: Vec<String>,
    /// Copy instead of move
    #[serde(default)]
    pub keep_source: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Versions are written to `{root}/{name}`
    #[serde(default = "default_output_root")]
    pub root: PathBuf,
    /// Force every version onto the same test set
    #[serde(default = "default_true")]
    pub unify_test: bool,
    /// Write the run report as JSON here
    #[serde(default)]
    pub report: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
            unify_test: true,
            report: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegativeConfig {
    pub dir: PathBuf,
    #[serde(default = "default_negative_samples")]
    pub train_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioConfig {
    #[serde(default = "default_ratio_name")]
    pub name: String,
    #[serde(default = "default_train_ratio")]
    pub train: f64,
    #[serde(default = "default_val_ratio")]
    pub val: f64,
    #[serde(default = "default_test_ratio")]
    pub test: f64,
    #[serde(default = "default_ratio_seed")]
    pub seed: u64,
    /// Overrides `negatives.train_samples` for this dataset
    #[serde(default)]
    pub negative_samples: Option<usize>,
}

impl Default for RatioConfig {
    fn default() -> Self {
        Self {
            name: default_ratio_name(),
            train: default_train_ratio(),
            val: default_val_ratio(),
            test: default_test_ratio(),
            seed: default_ratio_seed(),
            negative_samples: None,
        }
    }
}

impl RatioConfig {
    pub fn split(&self) -> Result<RatioSplit> {
        Ok(RatioSplit::new(self.train, self.val, self.test)?)
    }
}

/// One dataset variant: caps per class for train and val plus its seed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionConfig {
    pub name: String,
    pub train_cap: u32,
    pub val_cap: u32,
    pub seed: u64,
    /// Per-class overrides of `train_cap`
    #[serde(default)]
    pub train_class_caps: BTreeMap<ClassId, u32>,
    /// Per-class overrides of `val_cap`
    #[serde(default)]
    pub val_class_caps: BTreeMap<ClassId, u32>,
}

impl VersionConfig {
    pub fn new(name: impl Into<String>, train_cap: u32, val_cap: u32, seed: u64) -> Self {
        Self {
            name: name.into(),
            train_cap,
            val_cap,
            seed,
            train_class_caps: BTreeMap::new(),
            val_class_caps: BTreeMap::new(),
        }
    }

    pub fn allocator(&self) -> Allocator {
        let train = Cap {
            default: self.train_cap,
            per_class: self.train_class_caps.clone(),
        };
        let val = Cap {
            default: self.val_cap,
            per_class: self.val_class_caps.clone(),
        };
        Allocator::new(train, val)
    }
}

fn default_image_ext() -> String {
    ".jpg".to_string()
}

fn default_flatten_splits() -> Vec<String> {
    DEFAULT_SPLITS.iter().map(|s| s.to_string()).collect()
}

fn default_output_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_negative_samples() -> usize {
    10
}

fn default_ratio_name() -> String {
    "original".to_string()
}

fn default_train_ratio() -> f64 {
    0.7
}

fn default_val_ratio() -> f64 {
    0.2
}

fn default_test_ratio() -> f64 {
    0.1
}

fn default_ratio_seed() -> u64 {
    10
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        Self::parse(&content, path)
    }

    /// Parse TOML text; `origin` only labels errors
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|source| DatasetError::Toml {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let ext = self.source.image_ext.trim_start_matches('.');
        if ext.is_empty() || ext.contains(['/', '\\']) {
            return Err(DatasetError::config(format!(
                "invalid image extension `{}`",
                self.source.image_ext
            )));
        }

        let mut names = HashSet::new();
        for version in &self.versions {
            validate_name(&version.name)?;
            if !names.insert(version.name.as_str()) {
                return Err(DatasetError::config(format!(
                    "version `{}` is defined more than once",
                    version.name
                )));
            }
        }

        if let Some(ratio) = &self.ratio {
            validate_name(&ratio.name)?;
            ratio.split()?;
        }
        Ok(())
    }

    pub fn source_pool(&self) -> SourcePool {
        SourcePool::new(
            &self.source.images_dir,
            &self.source.labels_dir,
            &self.source.image_ext,
        )
    }

    pub fn layout_for(&self, name: &str) -> DatasetLayout {
        DatasetLayout::for_version(&self.output.root, name)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DatasetError::config("dataset name must not be empty"));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(DatasetError::config(format!(
            "dataset name `{name}` must be a plain directory name"
        )));
    }
    Ok(())
}

/// Commented example printed by `yolosplit example`
pub const EXAMPLE_CONFIG: &str = r#"# yolosplit configuration

[source]
images_dir = "vhr10/positive_image_set"
labels_dir = "vhr10/yolo_gt"
image_ext = ".jpg"

# Raw "(x1,y1),(x2,y2),class" annotations, converted by `yolosplit convert`
[convert]
raw_labels_dir = "vhr10/gt"

# Pre-split trees can be gathered into the source pool by `yolosplit flatten`
# [flatten]
# raw_dir = "aquarium_dataset"
# splits = ["train", "val", "valid", "test"]
# keep_source = false

[output]
root = "."
unify_test = true
# report = "split_report.json"

[negatives]
dir = "vhr10/negative_image_set"
train_samples = 10

# Plain ratio split used by `yolosplit ratio`
[ratio]
name = "VHR10_original"
train = 0.7
val = 0.2
test = 0.1
seed = 10
negative_samples = 20

[[versions]]
name = "VHR10_10"
train_cap = 10
val_cap = 20
seed = 7521

[[versions]]
name = "VHR10_15"
train_cap = 15
val_cap = 30
seed = 61

[[versions]]
name = "VHR10_20"
train_cap = 20
val_cap = 40
seed = 10
# per-class overrides, keyed by class id
# train_class_caps = { "3" = 12 }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[source]
images_dir = "imgs"
labels_dir = "labels"

[[versions]]
name = "A_10"
train_cap = 10
val_cap = 20
seed = 2
train_class_caps = { "0" = 4 }
"#;

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(EXAMPLE_CONFIG, Path::new("example.toml")).unwrap();

        assert_eq!(config.versions.len(), 3);
        assert_eq!(config.versions[1], VersionConfig::new("VHR10_15", 15, 30, 61));
        assert_eq!(config.negatives.as_ref().unwrap().train_samples, 10);
        assert_eq!(config.ratio.as_ref().unwrap().negative_samples, Some(20));
        assert!(config.flatten.is_none());
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse(MINIMAL, Path::new("minimal.toml")).unwrap();

        assert_eq!(config.source.image_ext, ".jpg");
        assert_eq!(config.output.root, PathBuf::from("."));
        assert!(config.output.unify_test);
        assert!(config.negatives.is_none());
        assert_eq!(
            config.layout_for("A_10").root(),
            Path::new("./A_10")
        );
    }

    #[test]
    fn test_version_allocator_uses_overrides() {
        let config = Config::parse(MINIMAL, Path::new("minimal.toml")).unwrap();
        let allocator = config.versions[0].allocator();

        assert_eq!(allocator.train_cap().limit(&"0".into()), 4);
        assert_eq!(allocator.train_cap().limit(&"1".into()), 10);
        assert_eq!(allocator.val_cap().limit(&"0".into()), 20);
    }

    #[test]
    fn test_duplicate_version_names_rejected() {
        let text = format!(
            "{MINIMAL}\n[[versions]]\nname = \"A_10\"\ntrain_cap = 1\nval_cap = 1\nseed = 1\n"
        );
        let err = Config::parse(&text, Path::new("dup.toml")).unwrap_err();
        assert!(matches!(err, DatasetError::Config(_)));
    }

    #[test]
    fn test_negative_cap_is_a_parse_error() {
        let text = MINIMAL.replace("train_cap = 10", "train_cap = -1");
        let err = Config::parse(&text, Path::new("neg.toml")).unwrap_err();
        assert!(matches!(err, DatasetError::Toml { .. }));
    }

    #[test]
    fn test_bad_names_and_ratios_rejected() {
        let text = MINIMAL.replace("name = \"A_10\"", "name = \"../escape\"");
        assert!(Config::parse(&text, Path::new("x.toml")).is_err());

        let text = format!("{MINIMAL}\n[ratio]\ntrain = 0.9\nval = 0.2\n");
        let err = Config::parse(&text, Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, DatasetError::Split(_)));
    }
}
