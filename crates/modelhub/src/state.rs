//! Shared application state for the HTTP server.

use std::sync::Arc;

use config::Config;
use ml_runtime::ModelRuntime;
use registry::DocumentStore;

/// Cloneable handle on the service's shared state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: DocumentStore,
    runtime: ModelRuntime,
}

impl AppState {
    /// Builds production state: a local document store plus a runtime
    /// whose checkpoints live under the configured models directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directories cannot be prepared.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store = DocumentStore::local(&config.documents_dir())?;
        let runtime = ModelRuntime::new(config.models_dir());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                runtime,
            }),
        })
    }

    /// Builds state from pre-constructed parts (used by tests to run on an
    /// in-memory store).
    #[must_use]
    pub fn from_parts(config: Config, store: DocumentStore, runtime: ModelRuntime) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                runtime,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &DocumentStore {
        &self.inner.store
    }

    #[must_use]
    pub fn runtime(&self) -> &ModelRuntime {
        &self.inner.runtime
    }
}
