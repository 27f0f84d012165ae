pub mod labels;
pub mod pipeline;

pub use crate::labels::LabelEncoder;
pub use crate::pipeline::{FeaturePipeline, FittedPipeline};
