use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use tastebud_domain::{Result, TasteError};

use crate::layer::{Activation, Dense, LayerSpec};

/// Feed-forward binary classifier. The final layer is always a single
/// sigmoid unit, appended on construction regardless of the configured
/// hidden layers; the output is the probability of the positive class.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Network {
    input_width: usize,
    layers: Vec<Dense>,
}

impl Network {
    /// Stacked construction: each hidden layer connects to the previous
    /// layer's output, then the sigmoid output layer is appended.
    pub fn sequential(input_width: usize, specs: &[LayerSpec], seed: u64) -> Result<Self> {
        if input_width == 0 {
            return Err(TasteError::configuration("network input width is zero"));
        }
        if specs.is_empty() {
            return Err(TasteError::configuration(
                "model requires at least one hidden layer",
            ));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut layers = Vec::with_capacity(specs.len() + 1);
        let mut width = input_width;
        for spec in specs {
            layers.push(Dense::init(
                spec.name.clone(),
                width,
                spec.units,
                spec.activation,
                &mut rng,
            ));
            width = spec.units;
        }
        layers.push(Dense::init("output", width, 1, Activation::Sigmoid, &mut rng));
        Ok(Self {
            input_width,
            layers,
        })
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [Dense] {
        &mut self.layers
    }

    pub fn trainable_parameters(&self) -> usize {
        self.layers.iter().map(Dense::parameter_count).sum()
    }

    pub fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        let mut activation = input.clone();
        for layer in &self.layers {
            activation = layer.forward(&activation);
        }
        activation
    }

    /// Forward pass keeping every layer's activated output, in order.
    pub(crate) fn forward_cached(&self, input: &Array2<f64>) -> Vec<Array2<f64>> {
        let mut activations = Vec::with_capacity(self.layers.len());
        let mut current = input.clone();
        for layer in &self.layers {
            current = layer.forward(&current);
            activations.push(current.clone());
        }
        activations
    }

    /// Positive-class probabilities, one per input row.
    pub fn predict_proba(&self, input: &Array2<f64>) -> Array1<f64> {
        self.forward(input).index_axis(Axis(1), 0).to_owned()
    }

    /// Hard class decisions at the given probability threshold.
    pub fn predict(&self, input: &Array2<f64>, threshold: f64) -> Vec<usize> {
        self.predict_proba(input)
            .iter()
            .map(|&p| usize::from(p >= threshold))
            .collect()
    }

    /// Activations of the last hidden layer, the embedding the
    /// visualization step projects with t-SNE.
    pub fn hidden_features(&self, input: &Array2<f64>) -> Array2<f64> {
        let mut activation = input.clone();
        for layer in &self.layers[..self.layers.len() - 1] {
            activation = layer.forward(&activation);
        }
        activation
    }
}

/// Explicit input/output graph construction. The current architectures
/// are all single chains, so this builds the same network as
/// [`Network::sequential`]; the form exists for architectures that later
/// need more than one input or output.
#[derive(Clone, Debug, Default)]
pub struct GraphBuilder {
    input_width: Option<usize>,
    specs: Vec<LayerSpec>,
}

impl GraphBuilder {
    pub fn input(width: usize) -> Self {
        Self {
            input_width: Some(width),
            specs: Vec::new(),
        }
    }

    pub fn layer(mut self, spec: LayerSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn build(self, seed: u64) -> Result<Network> {
        let input_width = self
            .input_width
            .ok_or_else(|| TasteError::configuration("graph has no input layer"))?;
        Network::sequential(input_width, &self.specs, seed)
    }
}
