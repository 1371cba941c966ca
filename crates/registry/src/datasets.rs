//! Repository functions for dataset metadata.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::models::{
    AccessLevel, CreateDataset, Dataset, DatasetMetadata, DatasetStatistics, DatasetVersion,
    PreprocessingStep, SharedEntry, Visibility,
};
use crate::store::DocumentStore;

const COLLECTION: &str = "datasets";

/// Mutable dataset fields accepted by [`DatasetRepository::update`].
#[derive(Debug, Clone, Default)]
pub struct DatasetUpdate {
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub tags: Option<Vec<String>>,
}

/// Repository for dataset operations.
pub struct DatasetRepository;

impl DatasetRepository {
    /// Creates a new dataset record.
    ///
    /// Dataset names must be unique among *active* datasets owned by the
    /// same creator; soft-deleted datasets do not block reuse.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] on a name collision, or an
    /// error if the storage operation fails.
    pub async fn create(store: &DocumentStore, input: CreateDataset) -> RegistryResult<Dataset> {
        let _guard = store.write_guard().await;

        let existing: Vec<Dataset> = store.list(COLLECTION).await?;
        if existing
            .iter()
            .any(|d| d.is_active && d.creator == input.creator && d.name == input.name)
        {
            return Err(RegistryError::DuplicateName(input.name));
        }

        let now = Utc::now();
        let dataset = Dataset {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            format: input.format,
            visibility: input.visibility,
            tags: input.tags,
            creator: input.creator,
            storage_info: input.storage_info,
            shared_with: Vec::new(),
            preprocessing: Vec::new(),
            versions: Vec::new(),
            statistics: DatasetStatistics::default(),
            metadata: DatasetMetadata::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        store.put(COLLECTION, &dataset.id.to_string(), &dataset).await?;
        Ok(dataset)
    }

    /// Finds a dataset by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn find_by_id(store: &DocumentStore, id: Uuid) -> RegistryResult<Dataset> {
        store
            .get(COLLECTION, &id.to_string())
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("dataset {id}")))
    }

    /// Lists active datasets visible to `user`: their own, public ones, and
    /// ones shared with them.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn list_visible_to(store: &DocumentStore, user: Uuid) -> RegistryResult<Vec<Dataset>> {
        let datasets: Vec<Dataset> = store.list(COLLECTION).await?;
        Ok(datasets
            .into_iter()
            .filter(|d| d.is_active && d.visible_to(user))
            .collect())
    }

    /// Updates basic mutable fields.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn update(
        store: &DocumentStore,
        id: Uuid,
        changes: DatasetUpdate,
    ) -> RegistryResult<Dataset> {
        store
            .update::<Dataset, _>(COLLECTION, &id.to_string(), |dataset| {
                if let Some(description) = changes.description {
                    dataset.description = description;
                }
                if let Some(visibility) = changes.visibility {
                    dataset.visibility = visibility;
                }
                if let Some(tags) = changes.tags {
                    dataset.tags = tags;
                }
                dataset.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Soft-deletes a dataset by clearing `is_active`. The record remains
    /// and its name becomes reusable.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn soft_delete(store: &DocumentStore, id: Uuid) -> RegistryResult<Dataset> {
        store
            .update::<Dataset, _>(COLLECTION, &id.to_string(), |dataset| {
                dataset.is_active = false;
                dataset.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Upserts a sharing grant keyed by user id; the last write wins for
    /// the access level.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn share_with(
        store: &DocumentStore,
        id: Uuid,
        user: Uuid,
        access_level: AccessLevel,
    ) -> RegistryResult<Dataset> {
        store
            .update::<Dataset, _>(COLLECTION, &id.to_string(), |dataset| {
                match dataset.shared_with.iter_mut().find(|s| s.user == user) {
                    Some(entry) => entry.access_level = access_level,
                    None => dataset.shared_with.push(SharedEntry { user, access_level }),
                }
                if dataset.visibility == Visibility::Private {
                    dataset.visibility = Visibility::Shared;
                }
                dataset.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Appends a preprocessing step. Steps stay in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn add_preprocessing_step(
        store: &DocumentStore,
        id: Uuid,
        name: String,
        description: String,
        parameters: serde_json::Value,
    ) -> RegistryResult<Dataset> {
        store
            .update::<Dataset, _>(COLLECTION, &id.to_string(), |dataset| {
                dataset.preprocessing.push(PreprocessingStep {
                    name,
                    description,
                    parameters,
                    applied_at: Utc::now(),
                });
                dataset.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Appends a version whose filename derives from the stored base
    /// filename plus a `_v{n}` suffix with a monotonic counter.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn add_version(
        store: &DocumentStore,
        id: Uuid,
        description: String,
    ) -> RegistryResult<Dataset> {
        store
            .update::<Dataset, _>(COLLECTION, &id.to_string(), |dataset| {
                let version_number = dataset
                    .versions
                    .last()
                    .map_or(1, |v| v.version_number + 1);
                let filename = versioned_filename(
                    &dataset.storage_info.filename,
                    &dataset.name,
                    version_number,
                );
                dataset.versions.push(DatasetVersion {
                    version_number,
                    filename,
                    description,
                    created_at: Utc::now(),
                });
                dataset.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Replaces the statistics wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn replace_statistics(
        store: &DocumentStore,
        id: Uuid,
        statistics: DatasetStatistics,
    ) -> RegistryResult<Dataset> {
        store
            .update::<Dataset, _>(COLLECTION, &id.to_string(), |dataset| {
                dataset.statistics = statistics;
                dataset.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Updates structural metadata. Provided fields replace the stored
    /// ones; omitted fields are unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the id is unknown.
    pub async fn update_metadata(
        store: &DocumentStore,
        id: Uuid,
        metadata: DatasetMetadata,
    ) -> RegistryResult<Dataset> {
        store
            .update::<Dataset, _>(COLLECTION, &id.to_string(), |dataset| {
                if metadata.size_bytes.is_some() {
                    dataset.metadata.size_bytes = metadata.size_bytes;
                }
                if metadata.record_count.is_some() {
                    dataset.metadata.record_count = metadata.record_count;
                }
                if !metadata.features.is_empty() {
                    dataset.metadata.features = metadata.features;
                }
                if metadata.dimensions.is_some() {
                    dataset.metadata.dimensions = metadata.dimensions;
                }
                if !metadata.data_types.is_null() {
                    dataset.metadata.data_types = metadata.data_types;
                }
                dataset.updated_at = Utc::now();
                Ok(())
            })
            .await
    }
}

/// Derives a version filename: `sales.csv` -> `sales_v2.csv`. Falls back to
/// the dataset name when no base filename was recorded.
fn versioned_filename(base_filename: &str, dataset_name: &str, version: u32) -> String {
    let base = if base_filename.is_empty() {
        dataset_name
    } else {
        base_filename
    };

    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_v{version}.{ext}"),
        _ => format!("{base}_v{version}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StorageInfo;

    fn input(name: &str, creator: Uuid) -> CreateDataset {
        CreateDataset {
            name: name.to_string(),
            description: String::new(),
            format: Default::default(),
            visibility: Visibility::Private,
            tags: vec![],
            creator,
            storage_info: StorageInfo {
                location: "datasets".to_string(),
                filename: format!("{name}.csv"),
            },
        }
    }

    #[tokio::test]
    async fn test_duplicate_name_same_creator_rejected() {
        let store = DocumentStore::in_memory();
        let u2 = Uuid::new_v4();
        let u3 = Uuid::new_v4();

        DatasetRepository::create(&store, input("sales", u2)).await.expect("create");

        let dup = DatasetRepository::create(&store, input("sales", u2)).await;
        assert!(matches!(dup, Err(RegistryError::DuplicateName(_))));

        // A different creator may reuse the name.
        DatasetRepository::create(&store, input("sales", u3)).await.expect("create");
    }

    #[tokio::test]
    async fn test_soft_delete_frees_the_name() {
        let store = DocumentStore::in_memory();
        let creator = Uuid::new_v4();

        let first = DatasetRepository::create(&store, input("sales", creator))
            .await
            .expect("create");
        DatasetRepository::soft_delete(&store, first.id).await.expect("delete");

        DatasetRepository::create(&store, input("sales", creator)).await.expect("create");
    }

    #[tokio::test]
    async fn test_share_upsert_last_write_wins() {
        let store = DocumentStore::in_memory();
        let creator = Uuid::new_v4();
        let friend = Uuid::new_v4();

        let dataset = DatasetRepository::create(&store, input("sales", creator))
            .await
            .expect("create");

        DatasetRepository::share_with(&store, dataset.id, friend, AccessLevel::View)
            .await
            .expect("share");
        let updated = DatasetRepository::share_with(&store, dataset.id, friend, AccessLevel::Edit)
            .await
            .expect("share");

        assert_eq!(updated.shared_with.len(), 1);
        assert_eq!(updated.shared_with[0].access_level, AccessLevel::Edit);
        assert_eq!(updated.visibility, Visibility::Shared);
    }

    #[tokio::test]
    async fn test_version_filenames_use_monotonic_suffix() {
        let store = DocumentStore::in_memory();
        let dataset = DatasetRepository::create(&store, input("sales", Uuid::new_v4()))
            .await
            .expect("create");

        DatasetRepository::add_version(&store, dataset.id, String::new())
            .await
            .expect("version");
        let updated = DatasetRepository::add_version(&store, dataset.id, String::new())
            .await
            .expect("version");

        let filenames: Vec<&str> = updated.versions.iter().map(|v| v.filename.as_str()).collect();
        assert_eq!(filenames, vec!["sales_v1.csv", "sales_v2.csv"]);
    }

    #[tokio::test]
    async fn test_preprocessing_steps_keep_insertion_order() {
        let store = DocumentStore::in_memory();
        let dataset = DatasetRepository::create(&store, input("sales", Uuid::new_v4()))
            .await
            .expect("create");

        for name in ["normalize", "impute", "encode"] {
            DatasetRepository::add_preprocessing_step(
                &store,
                dataset.id,
                name.to_string(),
                String::new(),
                serde_json::Value::Null,
            )
            .await
            .expect("step");
        }

        let reloaded = DatasetRepository::find_by_id(&store, dataset.id).await.expect("find");
        let names: Vec<&str> = reloaded.preprocessing.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["normalize", "impute", "encode"]);
    }

    #[test]
    fn test_versioned_filename_without_extension() {
        assert_eq!(versioned_filename("dump", "d", 3), "dump_v3");
        assert_eq!(versioned_filename("", "sales", 1), "sales_v1");
    }
}
