//! JSON document store backed by `object_store`.
//!
//! Records are kept as one JSON object per document under a per-collection
//! prefix (`users/`, `models/`, `datasets/`, `tokens/`). Every mutator
//! persists before returning, so callers never observe partial writes.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::error::{RegistryError, RegistryResult};

/// Document store over an [`ObjectStore`] backend.
///
/// Read-modify-write cycles go through [`DocumentStore::update`], which
/// holds a store-wide write lock for the duration of the cycle. This stands
/// in for the per-document update semantics a real document database would
/// provide.
#[derive(Clone)]
pub struct DocumentStore {
    store: Arc<dyn ObjectStore>,
    write_lock: Arc<Mutex<()>>,
}

impl DocumentStore {
    /// Wraps an existing object store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates a store rooted at a local directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or opened.
    pub fn local(root: &Path) -> RegistryResult<Self> {
        std::fs::create_dir_all(root).map_err(|e| {
            RegistryError::Validation(format!("cannot create document root: {e}"))
        })?;
        let fs = LocalFileSystem::new_with_prefix(root)?;
        Ok(Self::new(Arc::new(fs)))
    }

    /// Creates an ephemeral in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    fn doc_path(collection: &str, id: &str) -> ObjectPath {
        ObjectPath::from(format!("{collection}/{id}.json"))
    }

    /// Fetches a document, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the document cannot be
    /// deserialized.
    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> RegistryResult<Option<T>> {
        let path = Self::doc_path(collection, id);
        let bytes = match self.store.get(&path).await {
            Ok(result) => result.bytes().await?,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Writes a document, replacing any previous contents.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend write fails.
    pub async fn put<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        doc: &T,
    ) -> RegistryResult<()> {
        let path = Self::doc_path(collection, id);
        let bytes = serde_json::to_vec(doc)?;
        self.store.put(&path, PutPayload::from(bytes)).await?;
        Ok(())
    }

    /// Deletes a document. Missing documents are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn delete(&self, collection: &str, id: &str) -> RegistryResult<()> {
        let path = Self::doc_path(collection, id);
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists every document in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or any document cannot be
    /// deserialized.
    pub async fn list<T: DeserializeOwned>(&self, collection: &str) -> RegistryResult<Vec<T>> {
        let prefix = ObjectPath::from(collection);
        let metas: Vec<_> = self.store.list(Some(&prefix)).try_collect().await?;

        let mut docs = Vec::with_capacity(metas.len());
        for meta in metas {
            let bytes: Bytes = self.store.get(&meta.location).await?.bytes().await?;
            docs.push(serde_json::from_slice(&bytes)?);
        }
        Ok(docs)
    }

    /// Atomically applies `mutate` to a document and persists the result.
    ///
    /// The closure receives the current document; returning an error aborts
    /// the update without writing.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the document does not exist,
    /// or whatever error the closure/backend produces.
    pub async fn update<T, F>(&self, collection: &str, id: &str, mutate: F) -> RegistryResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> RegistryResult<()>,
    {
        let _guard = self.write_lock.lock().await;

        let mut doc: T = self
            .get(collection, id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("{collection}/{id}")))?;

        mutate(&mut doc)?;
        self.put(collection, id, &doc).await?;
        Ok(doc)
    }

    /// Acquires the store-wide write lock for multi-step operations that
    /// need a consistent view (e.g. uniqueness checks before insert).
    pub async fn write_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}
