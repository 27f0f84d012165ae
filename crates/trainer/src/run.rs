//! The training orchestrator: a single-shot, linear batch job.
//!
//! LOAD -> SPLIT -> FIT-TRANSFORM -> TRAIN -> EVALUATE -> PERSIST, no
//! retries. Any failure propagates out and the process exits non-zero.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use ndarray::Array1;
use tracing::{info, instrument, warn};

use tastebud_domain::AppConfig;
use tastebud_features::{FeaturePipeline, LabelEncoder};
use tastebud_model::{
    classification_report, confusion_matrix, f1_score, fit, roc_auc, Adam, ClassificationReport,
    LayerSpec, Network, TrainOptions, TrainingReport,
};
use tastebud_store::{ArtifactStore, TransformerBundle};

use crate::reader::load_dataset;
use crate::split::stratified_split;

#[derive(Debug)]
pub struct RunSummary {
    pub rows: usize,
    pub skipped: Vec<String>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub f1: f64,
    pub roc_auc: f64,
    pub confusion: [[usize; 2]; 2],
    pub report: ClassificationReport,
    pub training: TrainingReport,
}

/// Runs the full pipeline and persists the fitted artifacts under
/// `config.model_path`.
#[instrument(skip(config))]
pub fn run(config: &AppConfig) -> Result<RunSummary> {
    config.validate()?;
    if config.groups.len() != 2 {
        bail!(
            "binary classifier supports exactly two groups, got {}",
            config.groups.len()
        );
    }
    let seed = config.training.seed;

    // LOAD
    let (data, skipped) = load_dataset(&config.features, &config.groups)
        .context("loading group datasets")?;
    info!(rows = data.n_rows(), skipped = skipped.len(), "dataset loaded");
    if !skipped.is_empty() {
        warn!(
            dropped = skipped.len(),
            total = data.n_rows() + skipped.len(),
            "rows dropped for missing feature values"
        );
    }
    let labels = data.str_column(&config.features.target)?.to_vec();
    let distinct: HashSet<&str> = labels.iter().map(String::as_str).collect();
    if distinct.len() != config.groups.len() {
        bail!(
            "target column has {} distinct values, expected {}",
            distinct.len(),
            config.groups.len()
        );
    }

    // SPLIT
    let (train_indices, test_indices) =
        stratified_split(&labels, config.training.test_fraction, seed)?;
    let train_frame = data.take(&train_indices)?;
    let test_frame = data.take(&test_indices)?;
    info!(
        train_rows = train_frame.n_rows(),
        test_rows = test_frame.n_rows(),
        "stratified split"
    );

    // FIT-TRANSFORM: pipeline and encoder are fit on the training split
    // only, then applied frozen to both splits.
    let pipeline = FeaturePipeline::from_config(&config.features)?;
    let fitted = pipeline.fit(&train_frame)?;
    let x_train = fitted.transform(&train_frame)?;
    let x_test = fitted.transform(&test_frame)?;
    let encoder = LabelEncoder::fit(&config.group_names())?;
    let y_train = encode_targets(&encoder, train_frame.str_column(&config.features.target)?)?;
    let y_test = encode_targets(&encoder, test_frame.str_column(&config.features.target)?)?;
    info!(width = fitted.output_width(), "features transformed");

    // TRAIN
    let specs = LayerSpec::from_configs(&config.model.layers)?;
    let mut network = Network::sequential(fitted.output_width(), &specs, seed)?;
    let mut optimizer = Adam::new(config.model.learning_rate, &network);
    let options = TrainOptions {
        epochs: config.model.epochs,
        batch_size: config.model.batch_size,
        patience: config.training.patience,
        seed,
    };
    let training = fit(
        &mut network,
        &mut optimizer,
        &x_train,
        &y_train,
        &x_test,
        &y_test,
        &options,
    )
    .context("training classifier")?;
    if let Some(epoch) = training.diverged_at {
        warn!(
            epoch,
            best_epoch = training.best_epoch,
            "training went non-finite; evaluating the best weights observed before"
        );
    }
    info!(
        epochs = training.history.len(),
        best_epoch = training.best_epoch,
        best_val_loss = training.best_val_loss,
        stopped_early = training.stopped_early,
        "training finished"
    );

    // EVALUATE
    let probabilities = network.predict_proba(&x_test).to_vec();
    let predictions = network.predict(&x_test, config.training.threshold);
    let y_test_classes: Vec<usize> = y_test.iter().map(|&y| y as usize).collect();
    let f1 = f1_score(&y_test_classes, &predictions);
    let auc = roc_auc(&y_test_classes, &probabilities)?;
    let confusion = confusion_matrix(&y_test_classes, &predictions);
    let report = classification_report(&y_test_classes, &predictions, encoder.classes());

    println!("F1 score: {}", f1);
    println!("ROC AUC: {}", auc);
    println!(
        "Confusion matrix:\n[[{} {}]\n [{} {}]]",
        confusion[0][0], confusion[0][1], confusion[1][0], confusion[1][1]
    );
    println!("Classification report:\n{}", report);

    // PERSIST: both artifacts or neither.
    let store = ArtifactStore::new(&config.model_path);
    store
        .save_transformers(&TransformerBundle {
            pipeline: fitted,
            labels: encoder,
        })
        .context("saving transformers bundle")?;
    if let Err(err) = store.save_model(&network) {
        if let Err(cleanup) = store.discard_transformers() {
            warn!(error = %cleanup, "could not remove transformers bundle after failed model save");
        }
        return Err(err).context("saving model");
    }
    info!(path = %config.model_path.display(), "artifacts persisted");

    Ok(RunSummary {
        rows: data.n_rows(),
        skipped,
        train_rows: train_frame.n_rows(),
        test_rows: test_frame.n_rows(),
        f1,
        roc_auc: auc,
        confusion,
        report,
        training,
    })
}

fn encode_targets(encoder: &LabelEncoder, labels: &[String]) -> Result<Array1<f64>> {
    let encoded = encoder.transform(labels)?;
    Ok(Array1::from_iter(encoded.into_iter().map(|class| class as f64)))
}
