use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use tastebud_domain::{Result, TasteError};

use crate::network::Network;
use crate::optimizer::{Adam, LayerGradient};

#[derive(Clone, Debug)]
pub struct TrainOptions {
    pub epochs: usize,
    pub batch_size: usize,
    /// Epochs without validation-loss improvement before stopping.
    pub patience: usize,
    pub seed: u64,
}

#[derive(Clone, Debug)]
pub struct EpochStats {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
}

#[derive(Clone, Debug)]
pub struct TrainingReport {
    pub history: Vec<EpochStats>,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub stopped_early: bool,
    /// Epoch at which a loss went non-finite, if training had to stop
    /// for that reason. The restored weights are still the best finite
    /// ones observed before it.
    pub diverged_at: Option<usize>,
}

/// Mean binary cross-entropy; probabilities are clamped away from 0 and
/// 1 before the logarithm.
pub fn binary_cross_entropy(probabilities: &Array1<f64>, targets: &Array1<f64>) -> f64 {
    let n = probabilities.len() as f64;
    probabilities
        .iter()
        .zip(targets.iter())
        .map(|(&p, &y)| {
            let p = p.clamp(1e-12, 1.0 - 1e-12);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum::<f64>()
        / n
}

/// Trains the network with mini-batch Adam and validation-loss early
/// stopping. The best-observed weights are restored on return, not the
/// final-epoch weights, whether training stops early or exhausts the
/// epoch budget.
///
/// A non-finite loss ends training at that epoch. If at least one
/// finite epoch completed, the best weights are restored and the
/// divergence is recorded in the report; the run is only an error when
/// no usable weights were ever observed.
pub fn fit(
    network: &mut Network,
    optimizer: &mut Adam,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_val: &Array2<f64>,
    y_val: &Array1<f64>,
    options: &TrainOptions,
) -> Result<TrainingReport> {
    if x_train.nrows() != y_train.len() || x_val.nrows() != y_val.len() {
        return Err(TasteError::schema(
            "feature matrix and target vector lengths differ",
        ));
    }
    if x_train.nrows() == 0 {
        return Err(TasteError::schema("training set is empty"));
    }

    let mut history = Vec::with_capacity(options.epochs);
    let mut best_val_loss = f64::INFINITY;
    let mut best_epoch = 0usize;
    let mut best_weights: Option<Network> = None;
    let mut stale_epochs = 0usize;
    let mut stopped_early = false;
    let mut diverged_at = None;

    let mut indices: Vec<usize> = (0..x_train.nrows()).collect();

    for epoch in 0..options.epochs {
        let mut rng = ChaCha8Rng::seed_from_u64(options.seed.wrapping_add(epoch as u64));
        indices.shuffle(&mut rng);

        let mut epoch_loss = 0.0;
        let mut batches = 0usize;
        for chunk in indices.chunks(options.batch_size.max(1)) {
            let x_batch = x_train.select(Axis(0), chunk);
            let y_batch = y_train.select(Axis(0), chunk);
            epoch_loss += train_step(network, optimizer, &x_batch, &y_batch);
            batches += 1;
        }
        let train_loss = epoch_loss / batches as f64;
        let val_loss = binary_cross_entropy(&network.predict_proba(x_val), y_val);

        if !train_loss.is_finite() || !val_loss.is_finite() {
            if best_weights.is_none() {
                return Err(TasteError::TrainingDivergence { epoch });
            }
            warn!(epoch, "loss went non-finite, keeping best weights so far");
            diverged_at = Some(epoch);
            break;
        }

        let improved = val_loss < best_val_loss;
        if improved {
            best_val_loss = val_loss;
            best_epoch = epoch;
            best_weights = Some(network.clone());
            stale_epochs = 0;
        } else {
            stale_epochs += 1;
        }
        debug!(epoch, train_loss, val_loss, improved, "epoch finished");
        history.push(EpochStats {
            epoch,
            train_loss,
            val_loss,
        });

        if stale_epochs >= options.patience {
            stopped_early = true;
            break;
        }
    }

    if let Some(best) = best_weights {
        *network = best;
    }

    Ok(TrainingReport {
        history,
        best_epoch,
        best_val_loss,
        stopped_early,
        diverged_at,
    })
}

/// One mini-batch update; returns the batch loss before the step.
fn train_step(
    network: &mut Network,
    optimizer: &mut Adam,
    x_batch: &Array2<f64>,
    y_batch: &Array1<f64>,
) -> f64 {
    let activations = network.forward_cached(x_batch);
    let output = activations.last().expect("network has layers");
    let probabilities = output.index_axis(Axis(1), 0).to_owned();
    let loss = binary_cross_entropy(&probabilities, y_batch);

    let batch = x_batch.nrows() as f64;
    let targets = y_batch.view().insert_axis(Axis(1));
    // Sigmoid output with cross-entropy: dL/dz collapses to (p - y) / n.
    let mut delta = (output - &targets) / batch;

    let layer_count = network.layers().len();
    let mut gradients = Vec::with_capacity(layer_count);
    for index in (0..layer_count).rev() {
        let previous = if index == 0 {
            x_batch
        } else {
            &activations[index - 1]
        };
        gradients.push(LayerGradient {
            weights: previous.t().dot(&delta),
            bias: delta.sum_axis(Axis(0)),
        });
        if index > 0 {
            let layer = &network.layers()[index];
            let upstream = &network.layers()[index - 1];
            delta = delta.dot(&layer.weights.t())
                * upstream
                    .activation
                    .derivative_from_output(&activations[index - 1]);
        }
    }
    gradients.reverse();
    optimizer.apply(network, &gradients);
    loss
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{Activation, LayerSpec};
    use approx::assert_abs_diff_eq;

    fn hidden(units: usize) -> Vec<LayerSpec> {
        vec![LayerSpec {
            name: "h1".into(),
            units,
            activation: Activation::Tanh,
        }]
    }

    /// Linearly separable toy set: class 1 iff x0 > x1.
    fn toy_data(n: usize, offset: f64) -> (Array2<f64>, Array1<f64>) {
        let mut x = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let t = i as f64 / n as f64;
            if i % 2 == 0 {
                x[[i, 0]] = t + offset;
                x[[i, 1]] = t - 0.5;
                y[i] = 1.0;
            } else {
                x[[i, 0]] = t - 0.5;
                x[[i, 1]] = t + offset;
            }
        }
        (x, y)
    }

    #[test]
    fn learns_a_separable_problem() {
        let (x_train, y_train) = toy_data(60, 0.5);
        let (x_val, y_val) = toy_data(20, 0.45);
        let mut network = Network::sequential(2, &hidden(8), 42).unwrap();
        let mut optimizer = Adam::new(0.05, &network);
        let options = TrainOptions {
            epochs: 200,
            batch_size: 16,
            patience: 200,
            seed: 42,
        };
        let report = fit(
            &mut network,
            &mut optimizer,
            &x_train,
            &y_train,
            &x_val,
            &y_val,
            &options,
        )
        .unwrap();

        let first = report.history.first().unwrap().val_loss;
        assert!(report.best_val_loss < first);

        let predictions = network.predict(&x_val, 0.5);
        let correct = predictions
            .iter()
            .zip(y_val.iter())
            .filter(|(&p, &y)| p == y as usize)
            .count();
        assert!(correct as f64 / y_val.len() as f64 > 0.8);
    }

    #[test]
    fn restores_best_observed_weights() {
        let (x_train, y_train) = toy_data(40, 0.5);
        let (x_val, y_val) = toy_data(16, 0.45);
        let mut network = Network::sequential(2, &hidden(4), 7).unwrap();
        let mut optimizer = Adam::new(0.05, &network);
        let options = TrainOptions {
            epochs: 60,
            batch_size: 8,
            patience: 5,
            seed: 7,
        };
        let report = fit(
            &mut network,
            &mut optimizer,
            &x_train,
            &y_train,
            &x_val,
            &y_val,
            &options,
        )
        .unwrap();

        let minimum = report
            .history
            .iter()
            .map(|s| s.val_loss)
            .fold(f64::INFINITY, f64::min);
        assert_abs_diff_eq!(report.best_val_loss, minimum, epsilon = 1e-12);

        // The returned network scores exactly the best-observed loss.
        let restored_loss = binary_cross_entropy(&network.predict_proba(&x_val), &y_val);
        assert_abs_diff_eq!(restored_loss, report.best_val_loss, epsilon = 1e-9);
    }

    #[test]
    fn non_finite_loss_is_divergence() {
        let mut x_train = Array2::zeros((4, 2));
        x_train[[0, 0]] = f64::NAN;
        let y_train = Array1::zeros(4);
        let x_val = Array2::zeros((2, 2));
        let y_val = Array1::zeros(2);
        let mut network = Network::sequential(2, &hidden(3), 1).unwrap();
        let mut optimizer = Adam::new(0.01, &network);
        let options = TrainOptions {
            epochs: 3,
            batch_size: 4,
            patience: 3,
            seed: 1,
        };
        let result = fit(
            &mut network,
            &mut optimizer,
            &x_train,
            &y_train,
            &x_val,
            &y_val,
            &options,
        );
        assert!(matches!(
            result,
            Err(TasteError::TrainingDivergence { epoch: 0 })
        ));
    }

    #[test]
    fn divergence_after_progress_keeps_best_weights() {
        // Epoch 0 stays finite: saturated sigmoid outputs clamp the
        // loss. The oversized learning rate then blows the weights up,
        // so epoch 1 overflows and its validation loss goes NaN.
        let scale = 1e154;
        let mut x_train = Array2::zeros((8, 1));
        let mut y_train = Array1::zeros(8);
        for i in 0..8 {
            x_train[[i, 0]] = if i < 4 { scale } else { -scale };
            y_train[i] = (i % 2) as f64;
        }
        let x_val = Array2::from_shape_vec((2, 1), vec![1.0, -1.0]).unwrap();
        let y_val = Array1::from_vec(vec![1.0, 0.0]);
        let mut network = Network::sequential(
            1,
            &[LayerSpec {
                name: "h1".into(),
                units: 1,
                activation: Activation::Relu,
            }],
            3,
        )
        .unwrap();
        let mut optimizer = Adam::new(1e155, &network);
        let options = TrainOptions {
            epochs: 10,
            batch_size: 8,
            patience: 10,
            seed: 3,
        };
        let report = fit(
            &mut network,
            &mut optimizer,
            &x_train,
            &y_train,
            &x_val,
            &y_val,
            &options,
        )
        .unwrap();

        assert_eq!(report.diverged_at, Some(1));
        assert_eq!(report.best_epoch, 0);
        assert_eq!(report.history.len(), 1);
        assert!(report.best_val_loss.is_finite());
        // the restored network is the pre-divergence one and still
        // produces finite probabilities
        let probabilities = network.predict_proba(&x_val);
        assert!(probabilities.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let x_train = Array2::zeros((4, 2));
        let y_train = Array1::zeros(3);
        let x_val = Array2::zeros((2, 2));
        let y_val = Array1::zeros(2);
        let mut network = Network::sequential(2, &hidden(3), 1).unwrap();
        let mut optimizer = Adam::new(0.01, &network);
        let options = TrainOptions {
            epochs: 1,
            batch_size: 2,
            patience: 1,
            seed: 1,
        };
        assert!(fit(
            &mut network,
            &mut optimizer,
            &x_train,
            &y_train,
            &x_val,
            &y_val,
            &options,
        )
        .is_err());
    }
}
