//! Dynamic feedforward model assembled from validated layer descriptors.

use burn::module::Ignored;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;

use crate::error::{RuntimeError, RuntimeResult};
use crate::layers::{ActivationFn, Layer};

/// One step of the forward pass. Parameterized layers index into the
/// model's module vectors; activations are applied in place.
#[derive(Debug, Clone)]
pub enum PlanOp {
    Linear { index: usize, activation: ActivationFn },
    Dropout { index: usize },
    Activation(ActivationFn),
}

/// Tensor-independent facts about the assembled network.
#[derive(Debug, Clone)]
pub struct ModelShape {
    pub input_dim: usize,
    pub output_dim: usize,
    pub dense_count: usize,
}

/// A feedforward network whose structure is decided at runtime.
///
/// Dense layers carry the parameters; the execution plan records the order
/// in which dense, dropout, and activation steps are applied.
#[derive(Module, Debug)]
pub struct DynamicModel<B: Backend> {
    pub(crate) linears: Vec<Linear<B>>,
    pub(crate) dropouts: Vec<Dropout>,
    pub(crate) plan: Ignored<Vec<PlanOp>>,
    pub(crate) shape: Ignored<ModelShape>,
}

impl<B: Backend> DynamicModel<B> {
    /// Forward pass over a `[batch_size, input_dim]` tensor.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for op in self.plan.iter() {
            x = match op {
                PlanOp::Linear { index, activation } => {
                    apply_activation(*activation, self.linears[*index].forward(x))
                }
                PlanOp::Dropout { index } => self.dropouts[*index].forward(x),
                PlanOp::Activation(function) => apply_activation(*function, x),
            };
        }
        x
    }

    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.shape.input_dim
    }

    #[must_use]
    pub fn output_dim(&self) -> usize {
        self.shape.output_dim
    }

    #[must_use]
    pub fn dense_count(&self) -> usize {
        self.shape.dense_count
    }
}

fn apply_activation<B: Backend>(function: ActivationFn, x: Tensor<B, 2>) -> Tensor<B, 2> {
    match function {
        ActivationFn::Relu => activation::relu(x),
        ActivationFn::Sigmoid => activation::sigmoid(x),
        ActivationFn::Tanh => x.tanh(),
        ActivationFn::Softmax => activation::softmax(x, 1),
        ActivationFn::Linear => x,
    }
}

/// Assembles a model from validated layers.
///
/// The first dense layer must declare its input dimension; later dense
/// layers chain off the previous layer's width.
///
/// # Errors
///
/// Returns [`RuntimeError::InvalidArchitecture`] when no dense layer is
/// present or the input dimension cannot be determined.
pub fn build_model<B: Backend>(
    device: &B::Device,
    layers: &[Layer],
) -> RuntimeResult<DynamicModel<B>> {
    let mut linears = Vec::new();
    let mut dropouts = Vec::new();
    let mut plan = Vec::new();

    let mut width: Option<usize> = None;
    let mut input_dim: Option<usize> = None;

    for layer in layers {
        match layer {
            Layer::Dense {
                units,
                activation,
                input_dim: declared,
            } => {
                if let Some(dim) = declared {
                    if width.is_none() {
                        width = Some(*dim);
                    }
                }
                let fan_in = width.ok_or_else(|| {
                    RuntimeError::InvalidArchitecture(
                        "first dense layer must declare an input dimension".to_string(),
                    )
                })?;

                linears.push(LinearConfig::new(fan_in, *units).init(device));
                plan.push(PlanOp::Linear {
                    index: linears.len() - 1,
                    activation: *activation,
                });

                input_dim.get_or_insert(fan_in);
                width = Some(*units);
            }
            Layer::Dropout { rate } => {
                dropouts.push(DropoutConfig::new(*rate).init());
                plan.push(PlanOp::Dropout {
                    index: dropouts.len() - 1,
                });
            }
            Layer::Activation { function } => plan.push(PlanOp::Activation(*function)),
        }
    }

    let (Some(input_dim), Some(output_dim)) = (input_dim, width) else {
        return Err(RuntimeError::InvalidArchitecture(
            "architecture must contain at least one dense layer".to_string(),
        ));
    };

    let shape = ModelShape {
        input_dim,
        output_dim,
        dense_count: linears.len(),
    };

    Ok(DynamicModel {
        linears,
        dropouts,
        plan: Ignored(plan),
        shape: Ignored(shape),
    })
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;

    use super::*;
    use crate::layers::{default_architecture, validate_architecture};

    type TestBackend = NdArray;

    #[test]
    fn test_default_model_shape() {
        let device = NdArrayDevice::default();
        let layers = validate_architecture(&default_architecture()).expect("valid");
        let model: DynamicModel<TestBackend> = build_model(&device, &layers).expect("build");

        assert_eq!(model.input_dim(), 10);
        assert_eq!(model.output_dim(), 1);
        assert_eq!(model.dense_count(), 3);
    }

    #[test]
    fn test_forward_output_dims() {
        let device = NdArrayDevice::default();
        let layers = vec![
            Layer::Dense {
                units: 8,
                activation: ActivationFn::Relu,
                input_dim: Some(4),
            },
            Layer::Dropout { rate: 0.25 },
            Layer::Dense {
                units: 3,
                activation: ActivationFn::Softmax,
                input_dim: None,
            },
        ];
        let model: DynamicModel<TestBackend> = build_model(&device, &layers).expect("build");

        let input = Tensor::<TestBackend, 1>::from_floats([0.0f32; 8].as_slice(), &device)
            .reshape([2, 4]);
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, 3]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = NdArrayDevice::default();
        let layers = vec![Layer::Dense {
            units: 3,
            activation: ActivationFn::Softmax,
            input_dim: Some(2),
        }];
        let model: DynamicModel<TestBackend> = build_model(&device, &layers).expect("build");

        let input =
            Tensor::<TestBackend, 1>::from_floats([0.5f32, -0.5].as_slice(), &device).reshape([1, 2]);
        let output: Vec<f32> = model
            .forward(input)
            .into_data()
            .to_vec()
            .expect("tensor data");

        let sum: f32 = output.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "softmax row sums to {sum}");
    }

    #[test]
    fn test_missing_input_dim_is_rejected() {
        let device = NdArrayDevice::default();
        let layers = vec![Layer::Dense {
            units: 8,
            activation: ActivationFn::Relu,
            input_dim: None,
        }];
        let result: RuntimeResult<DynamicModel<TestBackend>> = build_model(&device, &layers);
        assert!(matches!(result, Err(RuntimeError::InvalidArchitecture(_))));
    }

    #[test]
    fn test_activation_only_architecture_is_rejected() {
        let device = NdArrayDevice::default();
        let layers = vec![Layer::Activation {
            function: ActivationFn::Relu,
        }];
        let result: RuntimeResult<DynamicModel<TestBackend>> = build_model(&device, &layers);
        assert!(matches!(result, Err(RuntimeError::InvalidArchitecture(_))));
    }
}
