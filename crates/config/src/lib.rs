//! Application configuration loaded from environment variables.

use std::path::PathBuf;

/// Returns the base path for on-disk storage (documents and model
/// checkpoints).
#[must_use]
pub fn get_storage_root() -> PathBuf {
    dotenvy::dotenv().ok();

    std::env::var("MODELHUB_STORAGE_ROOT")
        .map_or_else(|_| PathBuf::from("modelhub-data"), PathBuf::from)
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for all persistent state.
    pub storage_root: PathBuf,

    /// Address the HTTP server binds to.
    pub bind_addr: String,

    /// Lifetime of issued bearer tokens, in hours.
    pub token_ttl_hours: i64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `MODELHUB_STORAGE_ROOT`: base directory for documents and model
    ///   checkpoints (default: `modelhub-data`)
    /// - `MODELHUB_BIND_ADDR`: listen address (default: `127.0.0.1:8080`)
    /// - `MODELHUB_TOKEN_TTL_HOURS`: bearer token lifetime (default: 24)
    ///
    /// # Errors
    ///
    /// Returns an error if `MODELHUB_TOKEN_TTL_HOURS` is set but not a
    /// valid integer.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        let storage_root = get_storage_root();

        let bind_addr = std::env::var("MODELHUB_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let token_ttl_hours = match std::env::var("MODELHUB_TOKEN_TTL_HOURS") {
            Ok(raw) => raw
                .parse::<i64>()
                .map_err(|_| anyhow::anyhow!("MODELHUB_TOKEN_TTL_HOURS must be an integer"))?,
            Err(_) => 24,
        };

        Ok(Self {
            storage_root,
            bind_addr,
            token_ttl_hours,
        })
    }

    /// Directory where the document store keeps its collections.
    #[must_use]
    pub fn documents_dir(&self) -> PathBuf {
        self.storage_root.join("documents")
    }

    /// Directory where model checkpoints are written.
    #[must_use]
    pub fn models_dir(&self) -> PathBuf {
        self.storage_root.join("models")
    }
}
