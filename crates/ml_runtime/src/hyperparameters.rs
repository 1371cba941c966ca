//! Training hyperparameters: optimizer, loss, metrics, learning rate.

use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};

/// Supported optimizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    Sgd,
    RmsProp,
}

impl OptimizerKind {
    /// Parses an optimizer name.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidHyperparameters`] for unknown names.
    pub fn parse(name: &str) -> RuntimeResult<Self> {
        match name.to_lowercase().as_str() {
            "adam" => Ok(Self::Adam),
            "sgd" => Ok(Self::Sgd),
            "rmsprop" | "rms_prop" => Ok(Self::RmsProp),
            other => Err(RuntimeError::InvalidHyperparameters(format!(
                "unknown optimizer: {other}"
            ))),
        }
    }
}

/// Supported loss functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    MeanSquaredError,
    BinaryCrossentropy,
    CategoricalCrossentropy,
}

impl LossKind {
    /// Parses a loss-function name.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidHyperparameters`] for unknown names.
    pub fn parse(name: &str) -> RuntimeResult<Self> {
        match name.to_lowercase().replace('-', "_").as_str() {
            "mse" | "mean_squared_error" | "meansquarederror" => Ok(Self::MeanSquaredError),
            "binary_crossentropy" | "binarycrossentropy" | "bce" => Ok(Self::BinaryCrossentropy),
            "categorical_crossentropy" | "categoricalcrossentropy" => {
                Ok(Self::CategoricalCrossentropy)
            }
            other => Err(RuntimeError::InvalidHyperparameters(format!(
                "unknown loss function: {other}"
            ))),
        }
    }
}

/// Training configuration distinct from learned parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub optimizer: OptimizerKind,
    pub loss: LossKind,
    #[serde(default)]
    pub metrics: Vec<String>,
    pub learning_rate: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            optimizer: OptimizerKind::Adam,
            loss: LossKind::BinaryCrossentropy,
            metrics: vec!["accuracy".to_string()],
            learning_rate: 1e-3,
        }
    }
}

impl Hyperparameters {
    /// Builds hyperparameters from string fields, validating each.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidHyperparameters`] when a name is
    /// unknown or the learning rate is not positive.
    pub fn from_strings(
        optimizer: &str,
        loss: &str,
        metrics: Vec<String>,
        learning_rate: f64,
    ) -> RuntimeResult<Self> {
        if learning_rate <= 0.0 || !learning_rate.is_finite() {
            return Err(RuntimeError::InvalidHyperparameters(format!(
                "learning rate {learning_rate} must be positive"
            )));
        }
        Ok(Self {
            optimizer: OptimizerKind::parse(optimizer)?,
            loss: LossKind::parse(loss)?,
            metrics,
            learning_rate,
        })
    }
}

/// Partial hyperparameter update. Present fields win on conflict.
#[derive(Debug, Clone, Default)]
pub struct HyperparameterPatch {
    pub optimizer: Option<String>,
    pub loss: Option<String>,
    pub metrics: Option<Vec<String>>,
    pub learning_rate: Option<f64>,
}

impl Hyperparameters {
    /// Shallow-merges a patch into these hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidHyperparameters`] when a patched
    /// field fails validation; nothing is merged in that case.
    pub fn merged(&self, patch: &HyperparameterPatch) -> RuntimeResult<Self> {
        let optimizer = match &patch.optimizer {
            Some(name) => OptimizerKind::parse(name)?,
            None => self.optimizer,
        };
        let loss = match &patch.loss {
            Some(name) => LossKind::parse(name)?,
            None => self.loss,
        };
        let learning_rate = patch.learning_rate.unwrap_or(self.learning_rate);
        if learning_rate <= 0.0 || !learning_rate.is_finite() {
            return Err(RuntimeError::InvalidHyperparameters(format!(
                "learning rate {learning_rate} must be positive"
            )));
        }

        Ok(Self {
            optimizer,
            loss,
            metrics: patch.metrics.clone().unwrap_or_else(|| self.metrics.clone()),
            learning_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(LossKind::parse("mse").expect("parse"), LossKind::MeanSquaredError);
        assert_eq!(
            LossKind::parse("binaryCrossentropy").expect("parse"),
            LossKind::BinaryCrossentropy
        );
        assert_eq!(OptimizerKind::parse("RMSProp").expect("parse"), OptimizerKind::RmsProp);
    }

    #[test]
    fn test_unknown_names_rejected() {
        assert!(OptimizerKind::parse("adagrad").is_err());
        assert!(LossKind::parse("hinge").is_err());
    }

    #[test]
    fn test_merged_patch_wins() {
        let base = Hyperparameters::default();
        let patch = HyperparameterPatch {
            optimizer: Some("sgd".to_string()),
            learning_rate: Some(0.05),
            ..Default::default()
        };

        let merged = base.merged(&patch).expect("merge");
        assert_eq!(merged.optimizer, OptimizerKind::Sgd);
        assert_eq!(merged.loss, LossKind::BinaryCrossentropy);
        assert!((merged.learning_rate - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn test_merged_rejects_bad_learning_rate() {
        let base = Hyperparameters::default();
        let patch = HyperparameterPatch {
            learning_rate: Some(-1.0),
            ..Default::default()
        };
        assert!(base.merged(&patch).is_err());
    }
}
