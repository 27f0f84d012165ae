//! Persistence for the fitted artifact bundle.
//!
//! Two files live under the configured model directory: the
//! transformers bundle (feature pipeline + label encoder) and the
//! trained network. The artifacts are only meaningful together at the
//! same fitted state, so they are written side by side and loaded
//! through one store.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use tastebud_domain::{Result, TasteError};
use tastebud_features::{FittedPipeline, LabelEncoder};
use tastebud_model::Network;

pub const TRANSFORMERS_FILE: &str = "transformers.json";
pub const MODEL_FILE: &str = "model.json";

/// The fitted feature pipeline and label encoder, persisted as one
/// artifact so inference-time transforms cannot drift from the class
/// mapping they were trained with.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransformerBundle {
    pub pipeline: FittedPipeline,
    pub labels: LabelEncoder,
}

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn transformers_path(&self) -> PathBuf {
        self.root.join(TRANSFORMERS_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.root.join(MODEL_FILE)
    }

    pub fn save_transformers(&self, bundle: &TransformerBundle) -> Result<PathBuf> {
        let path = self.transformers_path();
        self.write_json(&path, bundle)?;
        info!(path = %path.display(), "saved transformers bundle");
        Ok(path)
    }

    pub fn load_transformers(&self) -> Result<TransformerBundle> {
        self.read_json(&self.transformers_path())
    }

    pub fn save_model(&self, network: &Network) -> Result<PathBuf> {
        let path = self.model_path();
        self.write_json(&path, network)?;
        info!(path = %path.display(), "saved model");
        Ok(path)
    }

    pub fn load_model(&self) -> Result<Network> {
        self.read_json(&self.model_path())
    }

    /// Removes a previously written transformers file. Used to avoid
    /// leaving a half-written bundle behind when the model save fails.
    pub fn discard_transformers(&self) -> Result<()> {
        let path = self.transformers_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let file = File::create(path)?;
        serde_json::to_writer(file, value)
            .map_err(|err| TasteError::Serialization(err.to_string()))
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> Result<T> {
        if !path.exists() {
            return Err(TasteError::ArtifactNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(|err| TasteError::Serialization(err.to_string()))
    }
}
