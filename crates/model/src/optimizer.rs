use ndarray::{Array, Array1, Array2, Dimension, Zip};

use crate::network::Network;

/// Per-layer weight and bias gradients, aligned with the network's
/// layer order.
#[derive(Clone, Debug)]
pub struct LayerGradient {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

struct LayerState {
    m_weights: Array2<f64>,
    v_weights: Array2<f64>,
    m_bias: Array1<f64>,
    v_bias: Array1<f64>,
}

/// Adam optimizer with bias-corrected first and second moments.
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    step: usize,
    state: Vec<LayerState>,
}

impl Adam {
    pub fn new(learning_rate: f64, network: &Network) -> Self {
        let state = network
            .layers()
            .iter()
            .map(|layer| LayerState {
                m_weights: Array2::zeros(layer.weights.raw_dim()),
                v_weights: Array2::zeros(layer.weights.raw_dim()),
                m_bias: Array1::zeros(layer.bias.raw_dim()),
                v_bias: Array1::zeros(layer.bias.raw_dim()),
            })
            .collect();
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            step: 0,
            state,
        }
    }

    /// Applies one update across all layers. `gradients` must be in
    /// network layer order.
    pub fn apply(&mut self, network: &mut Network, gradients: &[LayerGradient]) {
        debug_assert_eq!(gradients.len(), self.state.len());
        self.step += 1;
        let correction1 = 1.0 - self.beta1.powi(self.step as i32);
        let correction2 = 1.0 - self.beta2.powi(self.step as i32);
        for ((layer, state), gradient) in network
            .layers_mut()
            .iter_mut()
            .zip(&mut self.state)
            .zip(gradients)
        {
            update(
                &mut layer.weights,
                &mut state.m_weights,
                &mut state.v_weights,
                &gradient.weights,
                self.learning_rate,
                self.beta1,
                self.beta2,
                self.epsilon,
                correction1,
                correction2,
            );
            update(
                &mut layer.bias,
                &mut state.m_bias,
                &mut state.v_bias,
                &gradient.bias,
                self.learning_rate,
                self.beta1,
                self.beta2,
                self.epsilon,
                correction1,
                correction2,
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn update<D: Dimension>(
    param: &mut Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    gradient: &Array<f64, D>,
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    correction1: f64,
    correction2: f64,
) {
    Zip::from(param)
        .and(m)
        .and(v)
        .and(gradient)
        .for_each(|p, m, v, &g| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *p -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
        });
}
