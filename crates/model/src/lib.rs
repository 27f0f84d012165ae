pub mod layer;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod train;

pub use crate::layer::{Activation, Dense, LayerSpec};
pub use crate::metrics::{
    classification_report, confusion_matrix, f1_score, roc_auc, ClassificationReport,
};
pub use crate::network::{GraphBuilder, Network};
pub use crate::optimizer::Adam;
pub use crate::train::{fit, EpochStats, TrainOptions, TrainingReport};
