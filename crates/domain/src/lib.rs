pub mod config;
pub mod error;
pub mod frame;

pub use crate::config::{
    AppConfig, FeaturesConfig, GroupConfig, LayerConfig, ModelConfig, TrainingConfig,
};
pub use crate::error::{Result, TasteError};
pub use crate::frame::{Column, Frame};
