//! Declarative layer descriptors and their validated forms.
//!
//! Architectures arrive as an ordered list of `{type, config}` descriptors.
//! Validation turns them into a closed [`Layer`] enum; a descriptor whose
//! type is outside the supported set fails validation instead of being
//! skipped at construction time.

use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};

/// One declarative layer descriptor as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSpec {
    #[serde(rename = "type")]
    pub layer_type: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl LayerSpec {
    /// Builds a dense layer descriptor.
    #[must_use]
    pub fn dense(units: usize, activation: &str, input_dim: Option<usize>) -> Self {
        let mut config = serde_json::json!({
            "units": units,
            "activation": activation,
        });
        if let Some(dim) = input_dim {
            config["inputDim"] = serde_json::json!(dim);
        }
        Self {
            layer_type: "dense".to_string(),
            config,
        }
    }

    /// Builds a dropout layer descriptor.
    #[must_use]
    pub fn dropout(rate: f64) -> Self {
        Self {
            layer_type: "dropout".to_string(),
            config: serde_json::json!({ "rate": rate }),
        }
    }
}

/// Activation functions the runtime can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationFn {
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
    Linear,
}

impl ActivationFn {
    /// Parses an activation name.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidArchitecture`] for unknown names.
    pub fn parse(name: &str) -> RuntimeResult<Self> {
        match name.to_lowercase().as_str() {
            "relu" => Ok(Self::Relu),
            "sigmoid" => Ok(Self::Sigmoid),
            "tanh" => Ok(Self::Tanh),
            "softmax" => Ok(Self::Softmax),
            "linear" | "none" | "identity" => Ok(Self::Linear),
            other => Err(RuntimeError::InvalidArchitecture(format!(
                "unknown activation: {other}"
            ))),
        }
    }
}

/// A validated layer. The supported set is closed; everything else is
/// rejected by [`validate_architecture`].
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Dense {
        units: usize,
        activation: ActivationFn,
        input_dim: Option<usize>,
    },
    Dropout {
        rate: f64,
    },
    Activation {
        function: ActivationFn,
    },
}

/// Validates an ordered descriptor list into typed layers.
///
/// # Errors
///
/// Returns [`RuntimeError::UnsupportedLayer`] for layer types outside the
/// supported set and [`RuntimeError::InvalidArchitecture`] for malformed
/// configs or an empty list.
pub fn validate_architecture(specs: &[LayerSpec]) -> RuntimeResult<Vec<Layer>> {
    if specs.is_empty() {
        return Err(RuntimeError::InvalidArchitecture(
            "architecture must contain at least one layer".to_string(),
        ));
    }

    let layers = specs
        .iter()
        .map(validate_layer)
        .collect::<RuntimeResult<Vec<_>>>()?;

    // The first dense layer anchors the whole width chain.
    match layers.iter().find_map(|layer| match layer {
        Layer::Dense { input_dim, .. } => Some(input_dim),
        _ => None,
    }) {
        Some(Some(_)) => Ok(layers),
        Some(None) => Err(RuntimeError::InvalidArchitecture(
            "first dense layer must declare an input dimension".to_string(),
        )),
        None => Err(RuntimeError::InvalidArchitecture(
            "architecture must contain at least one dense layer".to_string(),
        )),
    }
}

fn validate_layer(spec: &LayerSpec) -> RuntimeResult<Layer> {
    match spec.layer_type.to_lowercase().as_str() {
        "dense" => {
            let units = spec
                .config
                .get("units")
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| {
                    RuntimeError::InvalidArchitecture(
                        "dense layer requires a positive integer `units`".to_string(),
                    )
                })?;
            if units == 0 {
                return Err(RuntimeError::InvalidArchitecture(
                    "dense layer requires `units` > 0".to_string(),
                ));
            }

            let activation = match spec.config.get("activation").and_then(|v| v.as_str()) {
                Some(name) => ActivationFn::parse(name)?,
                None => ActivationFn::Linear,
            };

            Ok(Layer::Dense {
                units: units as usize,
                activation,
                input_dim: input_dim_of(&spec.config),
            })
        }
        "dropout" => {
            let rate = spec
                .config
                .get("rate")
                .and_then(serde_json::Value::as_f64)
                .ok_or_else(|| {
                    RuntimeError::InvalidArchitecture(
                        "dropout layer requires a numeric `rate`".to_string(),
                    )
                })?;
            if !(0.0..1.0).contains(&rate) {
                return Err(RuntimeError::InvalidArchitecture(format!(
                    "dropout rate {rate} is outside [0, 1)"
                )));
            }
            Ok(Layer::Dropout { rate })
        }
        "activation" => {
            let name = spec
                .config
                .get("activation")
                .or_else(|| spec.config.get("function"))
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    RuntimeError::InvalidArchitecture(
                        "activation layer requires an `activation` name".to_string(),
                    )
                })?;
            Ok(Layer::Activation {
                function: ActivationFn::parse(name)?,
            })
        }
        other => Err(RuntimeError::UnsupportedLayer(other.to_string())),
    }
}

/// Accepts either `inputDim: n` or TF-style `inputShape: [n]`.
fn input_dim_of(config: &serde_json::Value) -> Option<usize> {
    if let Some(dim) = config.get("inputDim").and_then(serde_json::Value::as_u64) {
        return Some(dim as usize);
    }
    config
        .get("inputShape")
        .and_then(|v| v.as_array())
        .and_then(|shape| shape.first())
        .and_then(serde_json::Value::as_u64)
        .map(|dim| dim as usize)
}

/// The fixed fallback network used when no checkpoint, architecture, or
/// transfer-learning source is supplied: 10 -> 100 (relu) -> 50 (relu) ->
/// 1 (sigmoid).
#[must_use]
pub fn default_architecture() -> Vec<LayerSpec> {
    vec![
        LayerSpec::dense(100, "relu", Some(10)),
        LayerSpec::dense(50, "relu", None),
        LayerSpec::dense(1, "sigmoid", None),
    ]
}
