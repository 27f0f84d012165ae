use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tastebud_domain::{Column, FeaturesConfig, Frame, Result, TasteError};

/// Unfitted column-wise transform, built once from configuration.
///
/// Two branches: one-hot encoding over the configured categorical
/// columns and standardization over the configured numeric columns.
/// Either branch can be switched off, in which case the raw values pass
/// through as single columns.
#[derive(Clone, Debug)]
pub struct FeaturePipeline {
    one_hot: bool,
    normalize: bool,
    categorical: Vec<(String, Vec<i64>)>,
    numerical: Vec<String>,
}

impl FeaturePipeline {
    pub fn from_config(config: &FeaturesConfig) -> Result<Self> {
        let mut categorical = Vec::with_capacity(config.categorical_features.len());
        for name in &config.categorical_features {
            let vocabulary = if config.one_hot_encode_categorical {
                match config.categorical_labels.get(name) {
                    Some(values) if !values.is_empty() => values.clone(),
                    _ => {
                        return Err(TasteError::Configuration(format!(
                            "categorical column '{}' has no permissible values configured",
                            name
                        )))
                    }
                }
            } else {
                Vec::new()
            };
            categorical.push((name.clone(), vocabulary));
        }
        Ok(Self {
            one_hot: config.one_hot_encode_categorical,
            normalize: config.normalize_numerical,
            categorical,
            numerical: config.numerical_features.clone(),
        })
    }

    /// Learns the frozen transform from the training frame: validates
    /// the categorical columns against their configured vocabularies and
    /// computes per-column mean and standard deviation for the numeric
    /// branch.
    pub fn fit(&self, frame: &Frame) -> Result<FittedPipeline> {
        let mut categorical = Vec::with_capacity(self.categorical.len());
        for (name, vocabulary) in &self.categorical {
            let values = int_values(frame, name)?;
            if self.one_hot {
                for &value in values {
                    if !vocabulary.contains(&value) {
                        return Err(TasteError::UnseenCategory {
                            column: name.clone(),
                            value,
                        });
                    }
                }
            }
            categorical.push(CategoricalColumn {
                name: name.clone(),
                categories: vocabulary.clone(),
            });
        }

        let mut numerical = Vec::with_capacity(self.numerical.len());
        for name in &self.numerical {
            let values = float_values(frame, name)?;
            let (mean, std) = if self.normalize {
                moments(&values)
            } else {
                (0.0, 1.0)
            };
            numerical.push(NumericColumn {
                name: name.clone(),
                mean,
                std,
            });
        }

        let fitted = FittedPipeline {
            one_hot: self.one_hot,
            normalize: self.normalize,
            categorical,
            numerical,
        };
        debug!(
            rows = frame.n_rows(),
            output_width = fitted.output_width(),
            "fitted feature pipeline"
        );
        Ok(fitted)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct CategoricalColumn {
    name: String,
    /// One-hot vocabulary in configured order; empty when encoding is
    /// disabled.
    categories: Vec<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct NumericColumn {
    name: String,
    mean: f64,
    std: f64,
}

impl NumericColumn {
    fn scale(&self, value: f64) -> f64 {
        // Constant columns keep std 1.0 so scaling stays finite.
        let std = if self.std > 0.0 { self.std } else { 1.0 };
        (value - self.mean) / std
    }
}

/// The fitted feature pipeline. Column order and vocabularies are frozen
/// at fit time; transforming new data never changes the output width.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FittedPipeline {
    one_hot: bool,
    normalize: bool,
    categorical: Vec<CategoricalColumn>,
    numerical: Vec<NumericColumn>,
}

impl FittedPipeline {
    /// Applies the frozen transform. Output columns are the one-hot
    /// block in configured category order followed by the numeric block
    /// in configured order. A categorical value outside the fitted
    /// vocabulary is an error, never a silent zero vector.
    pub fn transform(&self, frame: &Frame) -> Result<Array2<f64>> {
        let rows = frame.n_rows();
        let mut output = Array2::zeros((rows, self.output_width()));
        let mut offset = 0;

        for column in &self.categorical {
            let values = int_values(frame, &column.name)?;
            if self.one_hot {
                for (row, &value) in values.iter().enumerate() {
                    let position = column
                        .categories
                        .iter()
                        .position(|&category| category == value)
                        .ok_or_else(|| TasteError::UnseenCategory {
                            column: column.name.clone(),
                            value,
                        })?;
                    output[[row, offset + position]] = 1.0;
                }
                offset += column.categories.len();
            } else {
                for (row, &value) in values.iter().enumerate() {
                    output[[row, offset]] = value as f64;
                }
                offset += 1;
            }
        }

        for column in &self.numerical {
            let values = float_values(frame, &column.name)?;
            for (row, value) in values.into_iter().enumerate() {
                output[[row, offset]] = if self.normalize {
                    column.scale(value)
                } else {
                    value
                };
            }
            offset += 1;
        }

        Ok(output)
    }

    pub fn output_width(&self) -> usize {
        let categorical_width: usize = if self.one_hot {
            self.categorical.iter().map(|c| c.categories.len()).sum()
        } else {
            self.categorical.len()
        };
        categorical_width + self.numerical.len()
    }

    /// Names of the output columns, in output order. Makes the persisted
    /// artifact self-describing.
    pub fn output_columns(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.output_width());
        for column in &self.categorical {
            if self.one_hot {
                for category in &column.categories {
                    names.push(format!("{}_{}", column.name, category));
                }
            } else {
                names.push(column.name.clone());
            }
        }
        for column in &self.numerical {
            names.push(column.name.clone());
        }
        names
    }
}

fn int_values<'a>(frame: &'a Frame, name: &str) -> Result<&'a [i64]> {
    match frame.column(name) {
        Some(Column::Int(values)) => Ok(values),
        Some(_) => Err(TasteError::Schema(format!(
            "categorical column '{}' is not integer-typed",
            name
        ))),
        None => Err(TasteError::Configuration(format!(
            "declared column '{}' is absent from the input",
            name
        ))),
    }
}

fn float_values(frame: &Frame, name: &str) -> Result<Vec<f64>> {
    match frame.column(name) {
        Some(Column::Float(values)) => Ok(values.clone()),
        Some(Column::Int(values)) => Ok(values.iter().map(|&v| v as f64).collect()),
        Some(_) => Err(TasteError::Schema(format!(
            "numeric column '{}' is not numeric",
            name
        ))),
        None => Err(TasteError::Configuration(format!(
            "declared column '{}' is absent from the input",
            name
        ))),
    }
}

/// Mean and population standard deviation.
fn moments(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
