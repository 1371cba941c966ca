//! Repository functions for AI model metadata.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::models::{
    AIModel, CloneOptions, CreateModel, LayerSpec, ModelStatus, ModelVersion, PredictionRecord,
    TrainingDataRecord, Visualization,
};
use crate::store::DocumentStore;

const COLLECTION: &str = "models";

/// Outcome of a training run, folded into the model record.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub sample_count: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub final_loss: f64,
    pub final_accuracy: f64,
}

/// Repository for AI model operations.
pub struct ModelRepository;

impl ModelRepository {
    /// Creates a new model record with status `initialized`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn create(store: &DocumentStore, input: CreateModel) -> RegistryResult<AIModel> {
        let now = Utc::now();
        let model = AIModel {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            owner: input.owner,
            model_type: input.model_type,
            status: ModelStatus::Initialized,
            architecture: input.architecture,
            hyperparameters: input.hyperparameters,
            training_history: Default::default(),
            training_data: Vec::new(),
            predictions: Vec::new(),
            versions: Vec::new(),
            current_version: 0,
            visualizations: Vec::new(),
            is_public: false,
            base_model: None,
            created_at: now,
            updated_at: now,
        };

        store.put(COLLECTION, &model.id.to_string(), &model).await?;
        Ok(model)
    }

    /// Finds a model by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn find_by_id(store: &DocumentStore, id: Uuid) -> RegistryResult<AIModel> {
        store
            .get(COLLECTION, &id.to_string())
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("model {id}")))
    }

    /// Lists every model record.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn list(store: &DocumentStore) -> RegistryResult<Vec<AIModel>> {
        store.list(COLLECTION).await
    }

    /// Lists models owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn list_by_owner(store: &DocumentStore, owner: Uuid) -> RegistryResult<Vec<AIModel>> {
        let models = Self::list(store).await?;
        Ok(models.into_iter().filter(|m| m.owner == owner).collect())
    }

    /// Lists publicly visible models.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn list_public(store: &DocumentStore) -> RegistryResult<Vec<AIModel>> {
        let models = Self::list(store).await?;
        Ok(models.into_iter().filter(|m| m.is_public).collect())
    }

    /// Replaces the architecture descriptor and resets status to
    /// `initialized` (the stored layers no longer describe any trained
    /// weights).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn update_architecture(
        store: &DocumentStore,
        id: Uuid,
        architecture: Vec<LayerSpec>,
    ) -> RegistryResult<AIModel> {
        store
            .update::<AIModel, _>(COLLECTION, &id.to_string(), |model| {
                model.architecture = architecture;
                model.status = ModelStatus::Initialized;
                model.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Shallow-merges a hyperparameter patch; patch fields win on conflict.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn merge_hyperparameters(
        store: &DocumentStore,
        id: Uuid,
        optimizer: Option<String>,
        loss: Option<String>,
        metrics: Option<Vec<String>>,
        learning_rate: Option<f64>,
    ) -> RegistryResult<AIModel> {
        store
            .update::<AIModel, _>(COLLECTION, &id.to_string(), |model| {
                let hp = &mut model.hyperparameters;
                if let Some(optimizer) = optimizer {
                    hp.optimizer = optimizer;
                }
                if let Some(loss) = loss {
                    hp.loss = loss;
                }
                if let Some(metrics) = metrics {
                    hp.metrics = metrics;
                }
                if let Some(learning_rate) = learning_rate {
                    hp.learning_rate = learning_rate;
                }
                model.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Sets the lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn set_status(
        store: &DocumentStore,
        id: Uuid,
        status: ModelStatus,
    ) -> RegistryResult<AIModel> {
        store
            .update::<AIModel, _>(COLLECTION, &id.to_string(), |model| {
                model.status = status;
                model.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Folds a completed training run into the record: history, embedded
    /// training-data entry, and status `trained`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn record_training(
        store: &DocumentStore,
        id: Uuid,
        outcome: TrainingOutcome,
    ) -> RegistryResult<AIModel> {
        store
            .update::<AIModel, _>(COLLECTION, &id.to_string(), |model| {
                let now = Utc::now();
                model.training_history.last_trained_at = Some(now);
                model.training_history.epochs = outcome.epochs;
                model.training_history.final_loss = Some(outcome.final_loss);
                model.training_history.final_accuracy = Some(outcome.final_accuracy);
                model.training_data.push(TrainingDataRecord {
                    sample_count: outcome.sample_count,
                    epochs: outcome.epochs,
                    batch_size: outcome.batch_size,
                    created_at: now,
                });
                model.status = ModelStatus::Trained;
                model.updated_at = now;
                Ok(())
            })
            .await
    }

    /// Appends a prediction record.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn record_prediction(
        store: &DocumentStore,
        id: Uuid,
        record: PredictionRecord,
    ) -> RegistryResult<AIModel> {
        store
            .update::<AIModel, _>(COLLECTION, &id.to_string(), |model| {
                model.predictions.push(record);
                model.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Appends a visualization blob.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn add_visualization(
        store: &DocumentStore,
        id: Uuid,
        viz_type: String,
        data: serde_json::Value,
    ) -> RegistryResult<AIModel> {
        store
            .update::<AIModel, _>(COLLECTION, &id.to_string(), |model| {
                model.visualizations.push(Visualization {
                    viz_type,
                    data,
                    created_at: Utc::now(),
                });
                model.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Sets public visibility.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn set_visibility(
        store: &DocumentStore,
        id: Uuid,
        is_public: bool,
    ) -> RegistryResult<AIModel> {
        store
            .update::<AIModel, _>(COLLECTION, &id.to_string(), |model| {
                model.is_public = is_public;
                model.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Appends a version record with `version_number = current_version + 1`
    /// and makes it current. Version numbers are never reused or
    /// renumbered.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn add_version(
        store: &DocumentStore,
        id: Uuid,
        storage_path: String,
        description: String,
        performance: serde_json::Value,
    ) -> RegistryResult<AIModel> {
        store
            .update::<AIModel, _>(COLLECTION, &id.to_string(), |model| {
                let version_number = model.current_version + 1;
                model.versions.push(ModelVersion {
                    version_number,
                    storage_path,
                    description,
                    performance,
                    created_at: Utc::now(),
                });
                model.current_version = version_number;
                model.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Clones a model for transfer learning.
    ///
    /// The requester must own the source or the source must be public. The
    /// clone copies the architecture and hyperparameters, points
    /// `base_model` at the source, and starts over as `initialized`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown source id and
    /// [`RegistryError::Permission`] when the requester may not read the
    /// source.
    pub async fn clone_model(
        store: &DocumentStore,
        source_id: Uuid,
        requester: Uuid,
        options: CloneOptions,
    ) -> RegistryResult<AIModel> {
        let source = Self::find_by_id(store, source_id).await?;

        if source.owner != requester && !source.is_public {
            return Err(RegistryError::Permission(format!(
                "model {source_id} is private"
            )));
        }

        let now = Utc::now();
        let clone = AIModel {
            id: Uuid::new_v4(),
            name: options
                .name
                .unwrap_or_else(|| format!("{} (clone)", source.name)),
            description: options.description.unwrap_or_else(|| source.description.clone()),
            owner: requester,
            model_type: source.model_type.clone(),
            status: ModelStatus::Initialized,
            architecture: source.architecture.clone(),
            hyperparameters: source.hyperparameters.clone(),
            training_history: Default::default(),
            training_data: Vec::new(),
            predictions: Vec::new(),
            versions: Vec::new(),
            current_version: 0,
            visualizations: Vec::new(),
            is_public: false,
            base_model: Some(source.id),
            created_at: now,
            updated_at: now,
        };

        store.put(COLLECTION, &clone.id.to_string(), &clone).await?;
        Ok(clone)
    }
}
