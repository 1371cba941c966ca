//! The model runtime: session-keyed live models and the operations on
//! them.
//!
//! Each live model is a session keyed by model id. Sessions for different
//! ids run independently; operations on one id are serialized by its
//! session lock. Re-initializing an id replaces only the in-memory state;
//! persisted registry records are untouched.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::prelude::*;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::checkpoint::{CheckpointMeta, load_checkpoint, save_checkpoint};
use crate::dataset::TrainSet;
use crate::error::{RuntimeError, RuntimeResult};
use crate::hyperparameters::{HyperparameterPatch, Hyperparameters};
use crate::layers::{Layer, LayerSpec, default_architecture, validate_architecture};
use crate::model::{DynamicModel, build_model};
use crate::training::{TrainOptions, TrainOutput, train};

type TrainingBackend = Autodiff<NdArray>;

/// Where a session's model comes from. The variants are mutually
/// exclusive; [`LoadSource::Default`] is the fallback when nothing else is
/// supplied.
#[derive(Debug, Clone)]
pub enum LoadSource {
    /// Load a previously saved checkpoint.
    Checkpoint(String),
    /// Construct a fresh model from an architecture descriptor.
    Architecture(Vec<LayerSpec>),
    /// Splice a saved base model with a fresh trainable head.
    Transfer(TransferSpec),
    /// The fixed default network.
    Default,
}

/// Transfer-learning setup parameters.
#[derive(Debug, Clone)]
pub struct TransferSpec {
    pub base_path: String,
    pub freeze_base_layers: bool,
    /// Architecture positions treated as the output head. Defaults to just
    /// the final layer.
    pub output_layer_indices: Option<Vec<usize>>,
}

/// Lifecycle of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Loaded,
    Compiled,
    Trained,
}

/// Snapshot of a session for API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub state: SessionState,
    pub layer_count: usize,
    pub input_dim: usize,
    pub output_dim: usize,
    pub transfer_learning: bool,
    pub frozen_layers: Vec<usize>,
}

/// Result of a save operation.
#[derive(Debug, Clone)]
pub struct SavedCheckpoint {
    pub path: PathBuf,
}

/// Predictions plus per-example confidence, in input order.
#[derive(Debug, Clone)]
pub struct PredictionOutput {
    pub predictions: Vec<Vec<f32>>,
    pub confidence: Vec<f32>,
}

struct ModelSession {
    model: DynamicModel<TrainingBackend>,
    architecture: Vec<LayerSpec>,
    hyperparameters: Hyperparameters,
    state: SessionState,
    transfer_learning: bool,
    frozen_layers: Vec<usize>,
}

impl ModelSession {
    fn info(&self) -> SessionInfo {
        SessionInfo {
            state: self.state,
            layer_count: self.architecture.len(),
            input_dim: self.model.input_dim(),
            output_dim: self.model.output_dim(),
            transfer_learning: self.transfer_learning,
            frozen_layers: self.frozen_layers.clone(),
        }
    }
}

/// Session registry for live models.
pub struct ModelRuntime {
    models_dir: PathBuf,
    device: NdArrayDevice,
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<ModelSession>>>>,
}

impl ModelRuntime {
    /// Creates a runtime whose relative checkpoint paths resolve under
    /// `models_dir`.
    #[must_use]
    pub fn new(models_dir: PathBuf) -> Self {
        Self {
            models_dir,
            device: NdArrayDevice::default(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Creates or replaces the session for `id` from the given source.
    ///
    /// # Errors
    ///
    /// Returns an error when the source cannot be turned into a live
    /// model; the previous session for `id`, if any, is kept in that case.
    pub fn initialize(
        &self,
        id: Uuid,
        source: LoadSource,
        hyperparameters: Option<Hyperparameters>,
    ) -> RuntimeResult<SessionInfo> {
        let session = match source {
            LoadSource::Default => {
                let architecture = default_architecture();
                let layers = validate_architecture(&architecture)?;
                let model = build_model(&self.device, &layers)?;
                ModelSession {
                    model,
                    architecture,
                    hyperparameters: hyperparameters.unwrap_or_default(),
                    state: SessionState::Loaded,
                    transfer_learning: false,
                    frozen_layers: Vec::new(),
                }
            }
            LoadSource::Architecture(architecture) => {
                let layers = validate_architecture(&architecture)?;
                let model = build_model(&self.device, &layers)?;
                ModelSession {
                    model,
                    architecture,
                    hyperparameters: hyperparameters.unwrap_or_default(),
                    state: SessionState::Loaded,
                    transfer_learning: false,
                    frozen_layers: Vec::new(),
                }
            }
            LoadSource::Checkpoint(path) => {
                let full = self.resolve_checkpoint_path(&path);
                let (model, meta) = load_checkpoint(&full, &self.device)?;
                ModelSession {
                    model,
                    architecture: meta.architecture,
                    hyperparameters: hyperparameters.unwrap_or(meta.hyperparameters),
                    state: SessionState::Loaded,
                    transfer_learning: meta.transfer_learning,
                    frozen_layers: meta.frozen_layers,
                }
            }
            LoadSource::Transfer(spec) => {
                let mut session = self.setup_transfer_learning(&spec)?;
                if let Some(hp) = hyperparameters {
                    session.hyperparameters = hp;
                }
                session
            }
        };

        let info = session.info();
        info!(
            model_id = %id,
            layers = info.layer_count,
            input_dim = info.input_dim,
            output_dim = info.output_dim,
            "model session initialized"
        );

        let mut sessions = lock(&self.sessions);
        sessions.insert(id, Arc::new(Mutex::new(session)));
        Ok(info)
    }

    /// Loads the base checkpoint and splices it with a fresh head: every
    /// layer outside the output positions keeps the base weights (made
    /// non-trainable when freezing); the output positions are
    /// re-initialized and stay trainable.
    fn setup_transfer_learning(&self, spec: &TransferSpec) -> RuntimeResult<ModelSession> {
        let base_path = self.resolve_checkpoint_path(&spec.base_path);
        let (base_model, base_meta) = load_checkpoint::<TrainingBackend>(&base_path, &self.device)?;

        let layers = validate_architecture(&base_meta.architecture)?;
        let output_positions = match &spec.output_layer_indices {
            Some(indices) => {
                for &index in indices {
                    if index >= layers.len() {
                        return Err(RuntimeError::InvalidArchitecture(format!(
                            "output layer index {index} is out of range for {} layers",
                            layers.len()
                        )));
                    }
                }
                indices.clone()
            }
            None => vec![layers.len() - 1],
        };

        let mut model = build_model::<TrainingBackend>(&self.device, &layers)?;
        let mut frozen_layers = Vec::new();

        let mut linear_index = 0usize;
        for (position, layer) in layers.iter().enumerate() {
            if let Layer::Dense { .. } = layer {
                if !output_positions.contains(&position) {
                    let mut copied = base_model.linears[linear_index].clone();
                    if spec.freeze_base_layers {
                        copied = copied.no_grad();
                        frozen_layers.push(position);
                    }
                    model.linears[linear_index] = copied;
                }
                linear_index += 1;
            }
        }

        debug!(
            base = %base_path.display(),
            frozen = frozen_layers.len(),
            "transfer learning set up"
        );

        Ok(ModelSession {
            model,
            architecture: base_meta.architecture,
            hyperparameters: base_meta.hyperparameters,
            state: SessionState::Loaded,
            transfer_learning: true,
            frozen_layers,
        })
    }

    /// Trains the session's model, compiling it first when needed.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NoModel`] without a session, or whatever
    /// the fit loop reports. The previous model is kept on failure.
    pub fn train(
        &self,
        id: Uuid,
        data: &[Vec<f32>],
        labels: &[Vec<f32>],
        options: &TrainOptions,
    ) -> RuntimeResult<TrainOutput> {
        let session = self.session(id)?;
        let mut session = lock(&session);

        let set = TrainSet::from_raw(data, labels)?;

        if session.state == SessionState::Loaded {
            // Auto-compile with the stored hyperparameters.
            session.state = SessionState::Compiled;
        }

        let (model, output) = train(
            session.model.clone(),
            &set,
            &session.hyperparameters,
            options,
        )?;

        session.model = model;
        session.state = SessionState::Trained;
        Ok(output)
    }

    /// Runs inference, returning predictions and per-example confidence.
    ///
    /// Confidence is `max(p, 1-p)` for single-output models and the
    /// maximum across classes otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NoModel`] without a session or
    /// [`RuntimeError::InvalidInput`] on shape mismatches.
    pub fn predict(&self, id: Uuid, inputs: &[Vec<f32>]) -> RuntimeResult<PredictionOutput> {
        let session = self.session(id)?;
        let session = lock(&session);

        if inputs.is_empty() {
            return Err(RuntimeError::InvalidInput(
                "input data must not be empty".to_string(),
            ));
        }
        let input_dim = session.model.input_dim();
        if inputs.iter().any(|row| row.len() != input_dim) {
            return Err(RuntimeError::InvalidInput(format!(
                "every input row must have width {input_dim}"
            )));
        }

        let flat: Vec<f32> = inputs.iter().flatten().copied().collect();
        let tensor = Tensor::<NdArray, 1>::from_floats(flat.as_slice(), &self.device)
            .reshape([inputs.len(), input_dim]);

        let inference = session.model.valid();
        let output = inference.forward(tensor);
        let [rows, width] = output.dims();

        let values: Vec<f32> = output
            .into_data()
            .to_vec()
            .map_err(|e| RuntimeError::InvalidInput(format!("tensor readback failed: {e:?}")))?;

        let mut predictions = Vec::with_capacity(rows);
        let mut confidence = Vec::with_capacity(rows);
        for row in values.chunks(width) {
            predictions.push(row.to_vec());
            confidence.push(confidence_of(row));
        }

        Ok(PredictionOutput {
            predictions,
            confidence,
        })
    }

    /// Saves the session's model under `path` (relative paths resolve
    /// against the runtime's models directory) with its metadata envelope.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NoModel`] without a session, or an error if
    /// persistence fails.
    pub fn save(&self, id: Uuid, path: Option<&str>) -> RuntimeResult<SavedCheckpoint> {
        let session = self.session(id)?;
        let session = lock(&session);

        let raw = path.map_or_else(|| format!("model_{id}"), ToString::to_string);
        let full = self.resolve_checkpoint_path(&raw);

        let meta = CheckpointMeta {
            architecture: session.architecture.clone(),
            hyperparameters: session.hyperparameters.clone(),
            transfer_learning: session.transfer_learning,
            frozen_layers: session.frozen_layers.clone(),
            saved_at: Utc::now(),
        };

        save_checkpoint(&session.model, &meta, &full)?;
        info!(model_id = %id, path = %full.display(), "model saved");

        Ok(SavedCheckpoint { path: full })
    }

    /// Shallow-merges a hyperparameter patch and recompiles the session.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NoModel`] without a session or
    /// [`RuntimeError::InvalidHyperparameters`] when the patch fails
    /// validation.
    pub fn update_hyperparameters(
        &self,
        id: Uuid,
        patch: &HyperparameterPatch,
    ) -> RuntimeResult<Hyperparameters> {
        let session = self.session(id)?;
        let mut session = lock(&session);

        let merged = session.hyperparameters.merged(patch)?;
        session.hyperparameters = merged.clone();
        session.state = SessionState::Compiled;
        Ok(merged)
    }

    /// Snapshot of a live session.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NoModel`] without a session.
    pub fn session_info(&self, id: Uuid) -> RuntimeResult<SessionInfo> {
        let session = self.session(id)?;
        let session = lock(&session);
        Ok(session.info())
    }

    /// Whether a live session exists for `id`.
    #[must_use]
    pub fn has_session(&self, id: Uuid) -> bool {
        lock(&self.sessions).contains_key(&id)
    }

    /// Discards the in-memory session for `id`, if any. Persisted
    /// registry records are unaffected.
    pub fn drop_session(&self, id: Uuid) {
        lock(&self.sessions).remove(&id);
    }

    fn session(&self, id: Uuid) -> RuntimeResult<Arc<Mutex<ModelSession>>> {
        lock(&self.sessions)
            .get(&id)
            .cloned()
            .ok_or(RuntimeError::NoModel(id))
    }

    /// Resolves a checkpoint path, joining relative paths onto the models
    /// directory. Forward slashes are accepted on every platform.
    fn resolve_checkpoint_path(&self, raw: &str) -> PathBuf {
        let sep = std::path::MAIN_SEPARATOR;
        let normalized = raw.replace('/', &sep.to_string());
        let candidate = PathBuf::from(normalized);
        if candidate.is_absolute() {
            candidate
        } else {
            self.models_dir.join(candidate)
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn confidence_of(row: &[f32]) -> f32 {
    match row {
        [single] => single.max(1.0 - single),
        _ => row.iter().copied().fold(f32::MIN, f32::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LayerSpec;

    fn runtime() -> (ModelRuntime, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        (ModelRuntime::new(dir.path().to_path_buf()), dir)
    }

    #[test]
    fn test_initialize_default_session() {
        let (runtime, _dir) = runtime();
        let id = Uuid::new_v4();

        let info = runtime.initialize(id, LoadSource::Default, None).expect("init");
        assert_eq!(info.state, SessionState::Loaded);
        assert_eq!(info.input_dim, 10);
        assert_eq!(info.output_dim, 1);
        assert!(runtime.has_session(id));
    }

    #[test]
    fn test_operations_without_session_report_no_model() {
        let (runtime, _dir) = runtime();
        let id = Uuid::new_v4();

        assert!(matches!(
            runtime.predict(id, &[vec![0.0; 10]]),
            Err(RuntimeError::NoModel(_))
        ));
        assert!(matches!(
            runtime.save(id, None),
            Err(RuntimeError::NoModel(_))
        ));
        assert!(matches!(
            runtime.update_hyperparameters(id, &HyperparameterPatch::default()),
            Err(RuntimeError::NoModel(_))
        ));
    }

    #[test]
    fn test_train_then_predict_confidence_bounds() {
        let (runtime, _dir) = runtime();
        let id = Uuid::new_v4();
        runtime.initialize(id, LoadSource::Default, None).expect("init");

        let data = vec![vec![0.1f32; 10]];
        let labels = vec![vec![1.0f32]];
        let options = TrainOptions {
            epochs: 1,
            batch_size: 1,
            validation_split: 0.0,
        };

        let output = runtime.train(id, &data, &labels, &options).expect("train");
        assert_eq!(output.epochs_completed, 1);
        assert_eq!(runtime.session_info(id).expect("info").state, SessionState::Trained);

        let prediction = runtime.predict(id, &data).expect("predict");
        assert_eq!(prediction.predictions.len(), 1);
        let confidence = prediction.confidence[0];
        assert!((0.5..=1.0).contains(&confidence), "confidence {confidence}");
    }

    #[test]
    fn test_multi_output_confidence_is_row_max() {
        let (runtime, _dir) = runtime();
        let id = Uuid::new_v4();

        let architecture = vec![LayerSpec::dense(3, "softmax", Some(4))];
        runtime
            .initialize(id, LoadSource::Architecture(architecture), None)
            .expect("init");

        let output = runtime.predict(id, &[vec![0.5, -0.5, 0.25, 0.0]]).expect("predict");
        let row = &output.predictions[0];
        let expected = row.iter().copied().fold(f32::MIN, f32::max);
        assert!((output.confidence[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_save_and_reload_checkpoint() {
        let (runtime, _dir) = runtime();
        let id = Uuid::new_v4();
        runtime.initialize(id, LoadSource::Default, None).expect("init");

        let saved = runtime.save(id, Some("nested/demo")).expect("save");
        let sidecar = PathBuf::from(format!("{}.meta.json", saved.path.display()));
        assert!(sidecar.exists(), "metadata envelope missing");

        let reloaded = Uuid::new_v4();
        let info = runtime
            .initialize(
                reloaded,
                LoadSource::Checkpoint("nested/demo".to_string()),
                None,
            )
            .expect("reload");
        assert_eq!(info.input_dim, 10);
    }

    #[test]
    fn test_transfer_learning_freezes_base_layers() {
        let (runtime, _dir) = runtime();
        let base_id = Uuid::new_v4();
        runtime.initialize(base_id, LoadSource::Default, None).expect("init");
        runtime.save(base_id, Some("base")).expect("save");

        let clone_id = Uuid::new_v4();
        let info = runtime
            .initialize(
                clone_id,
                LoadSource::Transfer(TransferSpec {
                    base_path: "base".to_string(),
                    freeze_base_layers: true,
                    output_layer_indices: None,
                }),
                None,
            )
            .expect("transfer");

        assert!(info.transfer_learning);
        // Default network has three dense layers; the last is the head.
        assert_eq!(info.frozen_layers, vec![0, 1]);

        // Training must leave the frozen layers untouched.
        let before = first_linear_weights(&runtime, clone_id);
        let data: Vec<Vec<f32>> = (0..8).map(|i| vec![i as f32 / 8.0; 10]).collect();
        let labels: Vec<Vec<f32>> = (0..8).map(|i| vec![f32::from(u8::from(i % 2 == 0))]).collect();
        runtime
            .train(
                clone_id,
                &data,
                &labels,
                &TrainOptions {
                    epochs: 3,
                    batch_size: 4,
                    validation_split: 0.0,
                },
            )
            .expect("train");
        let after = first_linear_weights(&runtime, clone_id);

        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert!((b - a).abs() < 1e-7, "frozen weight drifted: {b} -> {a}");
        }
    }

    #[test]
    fn test_unfrozen_transfer_keeps_layers_trainable() {
        let (runtime, _dir) = runtime();
        let base_id = Uuid::new_v4();
        runtime.initialize(base_id, LoadSource::Default, None).expect("init");
        runtime.save(base_id, Some("base2")).expect("save");

        let clone_id = Uuid::new_v4();
        let info = runtime
            .initialize(
                clone_id,
                LoadSource::Transfer(TransferSpec {
                    base_path: "base2".to_string(),
                    freeze_base_layers: false,
                    output_layer_indices: None,
                }),
                None,
            )
            .expect("transfer");

        assert!(info.transfer_learning);
        assert!(info.frozen_layers.is_empty());
    }

    #[test]
    fn test_update_hyperparameters_recompiles() {
        let (runtime, _dir) = runtime();
        let id = Uuid::new_v4();
        runtime.initialize(id, LoadSource::Default, None).expect("init");

        let patch = HyperparameterPatch {
            learning_rate: Some(0.01),
            ..Default::default()
        };
        let merged = runtime.update_hyperparameters(id, &patch).expect("update");
        assert!((merged.learning_rate - 0.01).abs() < f64::EPSILON);
        assert_eq!(
            runtime.session_info(id).expect("info").state,
            SessionState::Compiled
        );
    }

    #[test]
    fn test_reinitialize_replaces_session() {
        let (runtime, _dir) = runtime();
        let id = Uuid::new_v4();
        runtime.initialize(id, LoadSource::Default, None).expect("init");

        let architecture = vec![LayerSpec::dense(2, "softmax", Some(5))];
        let info = runtime
            .initialize(id, LoadSource::Architecture(architecture), None)
            .expect("reinit");
        assert_eq!(info.input_dim, 5);
        assert_eq!(info.output_dim, 2);
    }

    fn first_linear_weights(runtime: &ModelRuntime, id: Uuid) -> Vec<f32> {
        let session = runtime.session(id).expect("session");
        let session = lock(&session);
        session.model.linears[0]
            .weight
            .val()
            .into_data()
            .to_vec()
            .expect("weights")
    }
}
