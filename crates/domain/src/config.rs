use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TasteError};

/// One labeled group of tracks: a user's library and the parquet file
/// holding it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GroupConfig {
    pub name: String,
    pub data_path: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FeaturesConfig {
    /// Name of the target column carrying the group label.
    pub target: String,
    pub categorical_features: Vec<String>,
    pub numerical_features: Vec<String>,
    pub one_hot_encode_categorical: bool,
    pub normalize_numerical: bool,
    /// Permissible values per categorical column; the one-hot vocabulary
    /// is fixed from here, never learned from data.
    #[serde(default)]
    pub categorical_labels: HashMap<String, Vec<i64>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LayerConfig {
    pub name: String,
    pub units: usize,
    pub activation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Hidden layers in declaration order. The single-unit sigmoid
    /// output layer is always appended and is not listed here.
    pub layers: Vec<LayerConfig>,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrainingConfig {
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_patience")]
    pub patience: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_test_fraction() -> f64 {
    0.25
}

fn default_seed() -> u64 {
    12345
}

fn default_patience() -> usize {
    5
}

fn default_threshold() -> f64 {
    0.5
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            seed: default_seed(),
            patience: default_patience(),
            threshold: default_threshold(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub groups: Vec<GroupConfig>,
    pub features: FeaturesConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    /// Directory the fitted artifacts are written to.
    pub model_path: PathBuf,
}

impl AppConfig {
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: AppConfig = serde_yaml::from_reader(file)
            .map_err(|err| TasteError::Configuration(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Fail-fast validation, run once after deserialization.
    pub fn validate(&self) -> Result<()> {
        if self.groups.len() < 2 {
            return Err(TasteError::configuration(
                "at least two groups are required for a binary classifier",
            ));
        }
        let mut names = HashSet::new();
        for group in &self.groups {
            if !names.insert(group.name.as_str()) {
                return Err(TasteError::Configuration(format!(
                    "duplicate group name '{}'",
                    group.name
                )));
            }
        }
        let features = &self.features;
        if features.target.is_empty() {
            return Err(TasteError::configuration("target column name is empty"));
        }
        for column in features
            .categorical_features
            .iter()
            .chain(&features.numerical_features)
        {
            if *column == features.target {
                return Err(TasteError::Configuration(format!(
                    "target column '{}' cannot also be a feature",
                    column
                )));
            }
        }
        if features.one_hot_encode_categorical {
            for column in &features.categorical_features {
                match features.categorical_labels.get(column) {
                    Some(labels) if !labels.is_empty() => {}
                    _ => {
                        return Err(TasteError::Configuration(format!(
                            "categorical column '{}' has no permissible values configured",
                            column
                        )))
                    }
                }
            }
        }
        if self.model.learning_rate <= 0.0 {
            return Err(TasteError::configuration("learning rate must be positive"));
        }
        if self.model.epochs == 0 {
            return Err(TasteError::configuration("epochs must be positive"));
        }
        if self.model.batch_size == 0 {
            return Err(TasteError::configuration("batch size must be positive"));
        }
        if !(self.training.test_fraction > 0.0 && self.training.test_fraction < 1.0) {
            return Err(TasteError::configuration(
                "test fraction must be strictly between 0 and 1",
            ));
        }
        Ok(())
    }

    /// Group names in configuration order; this order fixes the label
    /// encoding.
    pub fn group_names(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.name.clone()).collect()
    }
}
