use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TasteError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("unseen category {value} in column '{column}'")]
    UnseenCategory { column: String, value: i64 },
    #[error("unknown label '{0}'")]
    UnknownLabel(String),
    #[error("artifact not found at {}", .0.display())]
    ArtifactNotFound(PathBuf),
    #[error("training diverged: non-finite loss at epoch {epoch}")]
    TrainingDivergence { epoch: usize },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TasteError {
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    pub fn schema<T: Into<String>>(message: T) -> Self {
        Self::Schema(message.into())
    }
}

pub type Result<T> = std::result::Result<T, TasteError>;
