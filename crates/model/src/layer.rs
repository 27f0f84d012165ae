use std::str::FromStr;

use ndarray::{Array1, Array2};
use rand::distributions::{Distribution, Uniform};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use tastebud_domain::{LayerConfig, Result, TasteError};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    Linear,
}

impl FromStr for Activation {
    type Err = TasteError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "linear" => Ok(Activation::Linear),
            other => Err(TasteError::Configuration(format!(
                "unknown activation '{}'",
                other
            ))),
        }
    }
}

impl Activation {
    pub fn apply(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(sigmoid),
            Activation::Tanh => z.mapv(f64::tanh),
            Activation::Linear => z.clone(),
        }
    }

    /// Derivative expressed in terms of the activated output. All four
    /// activations admit this form, which saves caching pre-activations.
    pub fn derivative_from_output(&self, output: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => output.mapv(|a| if a > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => output.mapv(|a| a * (1.0 - a)),
            Activation::Tanh => output.mapv(|a| 1.0 - a * a),
            Activation::Linear => Array2::ones(output.raw_dim()),
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Validated hidden-layer descriptor, decoded from configuration before
/// any layer is constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerSpec {
    pub name: String,
    pub units: usize,
    pub activation: Activation,
}

impl LayerSpec {
    pub fn from_config(config: &LayerConfig) -> Result<Self> {
        if config.name.is_empty() {
            return Err(TasteError::configuration("layer name is empty"));
        }
        if config.units == 0 {
            return Err(TasteError::Configuration(format!(
                "layer '{}' has zero units",
                config.name
            )));
        }
        Ok(Self {
            name: config.name.clone(),
            units: config.units,
            activation: config.activation.parse()?,
        })
    }

    /// Decodes the full hidden-layer list. At least one hidden layer is
    /// required; the output layer alone would make the declared
    /// architecture meaningless.
    pub fn from_configs(configs: &[LayerConfig]) -> Result<Vec<Self>> {
        if configs.is_empty() {
            return Err(TasteError::configuration(
                "model requires at least one hidden layer",
            ));
        }
        let mut specs = Vec::with_capacity(configs.len());
        for config in configs {
            let spec = LayerSpec::from_config(config)?;
            if specs.iter().any(|s: &LayerSpec| s.name == spec.name) {
                return Err(TasteError::Configuration(format!(
                    "duplicate layer name '{}'",
                    spec.name
                )));
            }
            specs.push(spec);
        }
        Ok(specs)
    }
}

/// A fully connected layer: weights are (input x units).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Dense {
    pub name: String,
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
    pub activation: Activation,
}

impl Dense {
    /// Glorot-uniform initialization from the given seeded generator;
    /// biases start at zero.
    pub fn init(
        name: impl Into<String>,
        input_width: usize,
        units: usize,
        activation: Activation,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let limit = (6.0 / (input_width + units) as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        let weights = Array2::from_shape_fn((input_width, units), |_| dist.sample(rng));
        Self {
            name: name.into(),
            weights,
            bias: Array1::zeros(units),
            activation,
        }
    }

    pub fn input_width(&self) -> usize {
        self.weights.nrows()
    }

    pub fn units(&self) -> usize {
        self.weights.ncols()
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    pub fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        let z = input.dot(&self.weights) + &self.bias;
        self.activation.apply(&z)
    }
}
