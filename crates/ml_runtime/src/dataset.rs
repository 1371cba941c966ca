//! Training set and batching for the dynamic model.

use burn::prelude::*;

use crate::error::{RuntimeError, RuntimeResult};

/// A single feature/target pair.
#[derive(Debug, Clone)]
pub struct TrainSample {
    pub features: Vec<f32>,
    pub targets: Vec<f32>,
}

/// In-memory training set with uniform feature and target widths.
#[derive(Debug, Clone)]
pub struct TrainSet {
    items: Vec<TrainSample>,
    feature_dim: usize,
    target_dim: usize,
}

impl TrainSet {
    /// Builds a training set from raw rows, validating shape uniformity.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidInput`] when the rows are empty,
    /// lengths differ, or widths are ragged.
    pub fn from_raw(data: &[Vec<f32>], labels: &[Vec<f32>]) -> RuntimeResult<Self> {
        if data.is_empty() {
            return Err(RuntimeError::InvalidInput(
                "training data must not be empty".to_string(),
            ));
        }
        if data.len() != labels.len() {
            return Err(RuntimeError::InvalidInput(format!(
                "got {} samples but {} labels",
                data.len(),
                labels.len()
            )));
        }

        let feature_dim = data[0].len();
        let target_dim = labels[0].len();
        if feature_dim == 0 || target_dim == 0 {
            return Err(RuntimeError::InvalidInput(
                "samples and labels must not be zero-width".to_string(),
            ));
        }

        let items = data
            .iter()
            .zip(labels.iter())
            .map(|(features, targets)| {
                if features.len() != feature_dim || targets.len() != target_dim {
                    return Err(RuntimeError::InvalidInput(
                        "ragged rows in training data".to_string(),
                    ));
                }
                Ok(TrainSample {
                    features: features.clone(),
                    targets: targets.clone(),
                })
            })
            .collect::<RuntimeResult<Vec<_>>>()?;

        Ok(Self {
            items,
            feature_dim,
            target_dim,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    #[must_use]
    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TrainSample> {
        self.items.get(index)
    }

    /// Splits off the trailing `fraction` of samples for validation.
    #[must_use]
    pub fn split(&self, fraction: f64) -> (Self, Self) {
        let fraction = fraction.clamp(0.0, 0.9);
        let valid_count = (self.items.len() as f64 * fraction).floor() as usize;
        let train_count = self.items.len() - valid_count;

        let train = Self {
            items: self.items[..train_count].to_vec(),
            feature_dim: self.feature_dim,
            target_dim: self.target_dim,
        };
        let valid = Self {
            items: self.items[train_count..].to_vec(),
            feature_dim: self.feature_dim,
            target_dim: self.target_dim,
        };
        (train, valid)
    }
}

/// A batch of training data as tensors.
#[derive(Debug, Clone)]
pub struct TrainBatch<B: Backend> {
    /// Inputs of shape `[batch_size, feature_dim]`.
    pub inputs: Tensor<B, 2>,
    /// Targets of shape `[batch_size, target_dim]`.
    pub targets: Tensor<B, 2>,
}

/// Batcher for creating training batches on a device.
#[derive(Debug, Clone)]
pub struct TrainBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> TrainBatcher<B> {
    #[must_use]
    pub const fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Creates a batch from a slice of samples.
    pub fn batch(&self, items: &[&TrainSample], feature_dim: usize, target_dim: usize) -> TrainBatch<B> {
        let batch_size = items.len();

        let mut features_data = Vec::with_capacity(batch_size * feature_dim);
        let mut targets_data = Vec::with_capacity(batch_size * target_dim);

        for item in items {
            features_data.extend_from_slice(&item.features);
            targets_data.extend_from_slice(&item.targets);
        }

        let inputs = Tensor::<B, 1>::from_floats(features_data.as_slice(), &self.device)
            .reshape([batch_size, feature_dim]);
        let targets = Tensor::<B, 1>::from_floats(targets_data.as_slice(), &self.device)
            .reshape([batch_size, target_dim]);

        TrainBatch { inputs, targets }
    }
}
