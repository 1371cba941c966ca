//! Checkpoint persistence: model weights plus a metadata envelope.
//!
//! Weights go through burn's named-MessagePack file recorder (which owns
//! the `.mpk` extension); the envelope lives next to them as
//! `<path>.meta.json` and carries everything needed to rebuild the module
//! skeleton before the weights are loaded back.

use std::path::Path;

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};
use crate::hyperparameters::Hyperparameters;
use crate::layers::{LayerSpec, validate_architecture};
use crate::model::{DynamicModel, build_model};

/// Metadata saved alongside model weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointMeta {
    pub architecture: Vec<LayerSpec>,
    pub hyperparameters: Hyperparameters,
    pub transfer_learning: bool,
    pub frozen_layers: Vec<usize>,
    pub saved_at: DateTime<Utc>,
}

fn meta_path(path: &Path) -> std::path::PathBuf {
    std::path::PathBuf::from(format!("{}.meta.json", path.display()))
}

/// Saves weights and the metadata envelope.
///
/// `path` is extension-less; the recorder appends its own extension.
///
/// # Errors
///
/// Returns an error if directories cannot be created or either file fails
/// to write.
pub fn save_checkpoint<B: Backend>(
    model: &DynamicModel<B>,
    meta: &CheckpointMeta,
    path: &Path,
) -> RuntimeResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::default();
    model
        .clone()
        .save_file(path.to_path_buf(), &recorder)
        .map_err(|e| RuntimeError::Checkpoint(format!("saving weights failed: {e}")))?;

    let envelope = serde_json::to_vec_pretty(meta)?;
    std::fs::write(meta_path(path), envelope)?;

    Ok(())
}

/// Loads a checkpoint: reads the envelope, rebuilds the module skeleton
/// from its architecture, then restores the weights.
///
/// # Errors
///
/// Returns [`RuntimeError::Checkpoint`] when the envelope is missing or
/// the weights cannot be restored.
pub fn load_checkpoint<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> RuntimeResult<(DynamicModel<B>, CheckpointMeta)> {
    let envelope = std::fs::read(meta_path(path)).map_err(|e| {
        RuntimeError::Checkpoint(format!(
            "missing metadata envelope for {}: {e}",
            path.display()
        ))
    })?;
    let meta: CheckpointMeta = serde_json::from_slice(&envelope)?;

    let layers = validate_architecture(&meta.architecture)?;
    let skeleton = build_model::<B>(device, &layers)?;

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::default();
    let model = skeleton
        .load_file(path.to_path_buf(), &recorder, device)
        .map_err(|e| RuntimeError::Checkpoint(format!("loading weights failed: {e}")))?;

    Ok((model, meta))
}
