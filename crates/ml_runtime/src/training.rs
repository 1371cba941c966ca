//! Training loop for the dynamic model.

use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, GradientsParams, Optimizer, RmsPropConfig, SgdConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use tracing::info;

use crate::dataset::{TrainBatcher, TrainSample, TrainSet};
use crate::error::{RuntimeError, RuntimeResult};
use crate::hyperparameters::{Hyperparameters, LossKind, OptimizerKind};
use crate::model::DynamicModel;

/// Options for one training run.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_split: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 32,
            validation_split: 0.2,
        }
    }
}

/// Output from training.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    /// Number of epochs completed.
    pub epochs_completed: usize,
    /// Mean training loss per epoch.
    pub loss_history: Vec<f32>,
    /// Training accuracy per epoch.
    pub accuracy_history: Vec<f32>,
    /// Final training loss.
    pub final_loss: f32,
    /// Final training accuracy.
    pub final_accuracy: f32,
    /// Final validation loss, when a validation split was used.
    pub final_valid_loss: Option<f32>,
}

/// Trains the model on the provided set, returning the updated model and
/// the per-epoch history.
///
/// # Errors
///
/// Returns an error when the options are degenerate or the set shape does
/// not match the model.
pub fn train<B: AutodiffBackend>(
    model: DynamicModel<B>,
    set: &TrainSet,
    hyperparameters: &Hyperparameters,
    options: &TrainOptions,
) -> RuntimeResult<(DynamicModel<B>, TrainOutput)> {
    if options.epochs == 0 {
        return Err(RuntimeError::InvalidInput("epochs must be > 0".to_string()));
    }
    if options.batch_size == 0 {
        return Err(RuntimeError::InvalidInput("batch size must be > 0".to_string()));
    }
    if set.feature_dim() != model.input_dim() {
        return Err(RuntimeError::InvalidInput(format!(
            "samples have width {} but the model expects {}",
            set.feature_dim(),
            model.input_dim()
        )));
    }
    if set.target_dim() != model.output_dim() {
        return Err(RuntimeError::InvalidInput(format!(
            "labels have width {} but the model outputs {}",
            set.target_dim(),
            model.output_dim()
        )));
    }

    match hyperparameters.optimizer {
        OptimizerKind::Adam => fit(model, set, hyperparameters, options, AdamConfig::new().init()),
        OptimizerKind::Sgd => fit(model, set, hyperparameters, options, SgdConfig::new().init()),
        OptimizerKind::RmsProp => {
            fit(model, set, hyperparameters, options, RmsPropConfig::new().init())
        }
    }
}

fn fit<B, O>(
    mut model: DynamicModel<B>,
    set: &TrainSet,
    hyperparameters: &Hyperparameters,
    options: &TrainOptions,
    mut optimizer: O,
) -> RuntimeResult<(DynamicModel<B>, TrainOutput)>
where
    B: AutodiffBackend,
    O: Optimizer<DynamicModel<B>, B>,
{
    let device = model
        .linears
        .first()
        .map(|linear| linear.weight.device())
        .ok_or_else(|| {
            RuntimeError::InvalidArchitecture("model has no dense layers".to_string())
        })?;

    let (train_set, valid_set) = set.split(options.validation_split);
    if train_set.is_empty() {
        return Err(RuntimeError::InvalidInput(
            "no training samples remain after the validation split".to_string(),
        ));
    }

    let batcher = TrainBatcher::<B>::new(device.clone());
    let valid_batcher = TrainBatcher::<B::InnerBackend>::new(device);

    let mut loss_history = Vec::with_capacity(options.epochs);
    let mut accuracy_history = Vec::with_capacity(options.epochs);
    let mut final_valid_loss = None;

    let num_samples = train_set.len();
    let target_dim = train_set.target_dim();

    for epoch in 0..options.epochs {
        let mut epoch_loss = 0.0f64;
        let mut batch_count = 0usize;
        let mut correct = 0usize;

        let mut indices: Vec<usize> = (0..num_samples).collect();
        shuffle_indices(&mut indices, epoch as u64);

        for batch_start in (0..num_samples).step_by(options.batch_size) {
            let batch_end = (batch_start + options.batch_size).min(num_samples);
            let Some(batch_indices) = indices.get(batch_start..batch_end) else {
                continue;
            };

            let items: Vec<&TrainSample> = batch_indices
                .iter()
                .filter_map(|&i| train_set.get(i))
                .collect();

            if items.is_empty() {
                continue;
            }

            let batch = batcher.batch(&items, train_set.feature_dim(), target_dim);

            let predictions = model.forward(batch.inputs);

            let pred_values: Vec<f32> = predictions
                .clone()
                .into_data()
                .to_vec()
                .unwrap_or_else(|_| vec![0.0]);
            let target_values: Vec<f32> = batch
                .targets
                .clone()
                .into_data()
                .to_vec()
                .unwrap_or_else(|_| vec![0.0]);
            correct += correct_count(&pred_values, &target_values, target_dim);

            let loss = compute_loss(hyperparameters.loss, predictions, batch.targets);

            let loss_value: f32 = loss
                .clone()
                .into_data()
                .to_vec()
                .unwrap_or_else(|_| vec![0.0])
                .first()
                .copied()
                .unwrap_or(0.0);

            epoch_loss += f64::from(loss_value);
            batch_count += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(hyperparameters.learning_rate, model, grads);
        }

        let mean_loss = if batch_count > 0 {
            (epoch_loss / batch_count as f64) as f32
        } else {
            0.0
        };
        let accuracy = correct as f32 / num_samples as f32;

        loss_history.push(mean_loss);
        accuracy_history.push(accuracy);

        if !valid_set.is_empty() {
            let valid_loss =
                validation_loss(&model.valid(), &valid_set, &valid_batcher, hyperparameters.loss);
            final_valid_loss = Some(valid_loss);
            info!(
                epoch = epoch + 1,
                loss = mean_loss,
                accuracy,
                valid_loss,
                "epoch complete"
            );
        } else {
            info!(epoch = epoch + 1, loss = mean_loss, accuracy, "epoch complete");
        }
    }

    let final_loss = loss_history.last().copied().unwrap_or(0.0);
    let final_accuracy = accuracy_history.last().copied().unwrap_or(0.0);

    Ok((
        model,
        TrainOutput {
            epochs_completed: options.epochs,
            loss_history,
            accuracy_history,
            final_loss,
            final_accuracy,
            final_valid_loss,
        },
    ))
}

/// Computes the configured loss over a batch, reduced to a scalar tensor.
fn compute_loss<B: Backend>(
    kind: LossKind,
    predictions: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    match kind {
        LossKind::MeanSquaredError => {
            MseLoss::new().forward(predictions, targets, Reduction::Mean)
        }
        LossKind::BinaryCrossentropy => {
            let p = predictions.clamp(1e-7, 1.0 - 1e-7);
            let positive = targets.clone() * p.clone().log();
            let negative = (targets.ones_like() - targets) * (p.ones_like() - p).log();
            (positive + negative).mean().neg()
        }
        LossKind::CategoricalCrossentropy => {
            let p = predictions.clamp(1e-7, 1.0);
            (targets * p.log()).sum_dim(1).mean().neg()
        }
    }
}

/// Computes the loss over a held-out set without touching gradients.
fn validation_loss<B: Backend>(
    model: &DynamicModel<B>,
    set: &TrainSet,
    batcher: &TrainBatcher<B>,
    loss_kind: LossKind,
) -> f32 {
    const BATCH_SIZE: usize = 64;

    let num_samples = set.len();
    if num_samples == 0 {
        return 0.0;
    }

    let mut total_loss = 0.0f64;
    let mut batch_count = 0usize;

    for batch_start in (0..num_samples).step_by(BATCH_SIZE) {
        let batch_end = (batch_start + BATCH_SIZE).min(num_samples);

        let items: Vec<&TrainSample> = (batch_start..batch_end)
            .filter_map(|i| set.get(i))
            .collect();

        if items.is_empty() {
            continue;
        }

        let batch = batcher.batch(&items, set.feature_dim(), set.target_dim());
        let predictions = model.forward(batch.inputs);
        let loss = compute_loss(loss_kind, predictions, batch.targets);

        let loss_value: f32 = loss
            .into_data()
            .to_vec()
            .unwrap_or_else(|_| vec![0.0])
            .first()
            .copied()
            .unwrap_or(0.0);

        total_loss += f64::from(loss_value);
        batch_count += 1;
    }

    if batch_count > 0 {
        (total_loss / batch_count as f64) as f32
    } else {
        0.0
    }
}

/// Counts matching predictions: threshold agreement for single-output
/// models, argmax agreement otherwise.
fn correct_count(predictions: &[f32], targets: &[f32], width: usize) -> usize {
    if width == 0 {
        return 0;
    }

    predictions
        .chunks(width)
        .zip(targets.chunks(width))
        .filter(|(pred, target)| {
            if width == 1 {
                (pred[0] >= 0.5) == (target[0] >= 0.5)
            } else {
                argmax(pred) == argmax(target)
            }
        })
        .count()
}

fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    for (i, value) in row.iter().enumerate() {
        if *value > row[best] {
            best = i;
        }
    }
    best
}

/// Shuffles indices with a Fisher-Yates pass driven by an LCG, so runs are
/// reproducible for a given epoch.
fn shuffle_indices(indices: &mut [usize], seed: u64) {
    let mut rng_state = seed.wrapping_add(12345);

    for i in (1..indices.len()).rev() {
        rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let j = ((rng_state >> 33) as usize) % (i + 1);
        indices.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::{Autodiff, NdArray};

    use super::*;
    use crate::layers::{default_architecture, validate_architecture};
    use crate::model::build_model;

    type TestBackend = Autodiff<NdArray>;

    fn default_model(device: &NdArrayDevice) -> DynamicModel<TestBackend> {
        let layers = validate_architecture(&default_architecture()).expect("valid");
        build_model(device, &layers).expect("build")
    }

    #[test]
    fn test_single_epoch_training() {
        let device = NdArrayDevice::default();
        let model = default_model(&device);

        let data = vec![vec![0.1f32; 10]];
        let labels = vec![vec![1.0f32]];
        let set = TrainSet::from_raw(&data, &labels).expect("set");

        let options = TrainOptions {
            epochs: 1,
            batch_size: 1,
            validation_split: 0.0,
        };

        let (_, output) = train(model, &set, &Hyperparameters::default(), &options)
            .expect("training");

        assert_eq!(output.epochs_completed, 1);
        assert_eq!(output.loss_history.len(), 1);
        assert!(output.final_loss.is_finite());
    }

    #[test]
    fn test_loss_decreases_on_learnable_problem() {
        let device = NdArrayDevice::default();
        let model = default_model(&device);

        // Constant mapping: all-zeros -> 0, all-ones -> 1.
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for _ in 0..20 {
            data.push(vec![0.0f32; 10]);
            labels.push(vec![0.0f32]);
            data.push(vec![1.0f32; 10]);
            labels.push(vec![1.0f32]);
        }
        let set = TrainSet::from_raw(&data, &labels).expect("set");

        let options = TrainOptions {
            epochs: 20,
            batch_size: 8,
            validation_split: 0.0,
        };
        let hp = Hyperparameters {
            learning_rate: 0.01,
            ..Default::default()
        };

        let (_, output) = train(model, &set, &hp, &options).expect("training");

        let first = output.loss_history.first().copied().unwrap_or(0.0);
        let last = output.final_loss;
        assert!(last < first, "loss should fall: {first} -> {last}");
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let device = NdArrayDevice::default();
        let model = default_model(&device);

        let data = vec![vec![0.1f32; 3]];
        let labels = vec![vec![1.0f32]];
        let set = TrainSet::from_raw(&data, &labels).expect("set");

        let result = train(model, &set, &Hyperparameters::default(), &TrainOptions::default());
        assert!(matches!(result, Err(RuntimeError::InvalidInput(_))));
    }

    #[test]
    fn test_sgd_and_mse_path() {
        let device = NdArrayDevice::default();
        let model = default_model(&device);

        let data = vec![vec![0.5f32; 10], vec![0.2f32; 10]];
        let labels = vec![vec![1.0f32], vec![0.0f32]];
        let set = TrainSet::from_raw(&data, &labels).expect("set");

        let hp = Hyperparameters {
            optimizer: OptimizerKind::Sgd,
            loss: LossKind::MeanSquaredError,
            metrics: vec![],
            learning_rate: 0.01,
        };
        let options = TrainOptions {
            epochs: 2,
            batch_size: 2,
            validation_split: 0.0,
        };

        let (_, output) = train(model, &set, &hp, &options).expect("training");
        assert_eq!(output.epochs_completed, 2);
    }

    #[test]
    fn test_shuffle_preserves_elements() {
        let mut indices: Vec<usize> = (0..10).collect();
        let original = indices.clone();

        shuffle_indices(&mut indices, 42);
        assert_ne!(indices, original, "shuffle should change order");

        indices.sort_unstable();
        assert_eq!(indices, original, "shuffle should preserve elements");
    }

    #[test]
    fn test_correct_count_multi_output() {
        let predictions = [0.1, 0.8, 0.1, 0.7, 0.2, 0.1];
        let targets = [0.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        assert_eq!(correct_count(&predictions, &targets, 3), 1);
    }
}
