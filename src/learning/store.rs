// src/learning/store.rs
//! Model persistence
//!
//! Policies are stored as JSON files in a single directory. Callers name a
//! model by file name only; directory components are stripped so a request
//! can never write outside the models directory.

use crate::learning::Policy;
use crate::utils::errors::{LabError, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MODEL_EXTENSION: &str = "json";

/// Directory-backed model storage
#[derive(Debug, Clone)]
pub struct ModelStore {
    models_dir: PathBuf,
}

impl ModelStore {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Persist `policy`, returning the written path
    ///
    /// Without a filename the model is named
    /// `{YYYYmmdd-HHMMSS}_{algorithm}_{environment}.json`.
    pub fn save(&self, policy: &Policy, filename: Option<&str>) -> Result<PathBuf> {
        let name = match filename {
            Some(name) => Self::sanitize(name)?,
            None => format!(
                "{}_{}_{}.{}",
                Utc::now().format("%Y%m%d-%H%M%S"),
                policy.algorithm,
                policy.environment,
                MODEL_EXTENSION
            ),
        };

        fs::create_dir_all(&self.models_dir).map_err(|e| {
            LabError::InternalFailure(format!(
                "Failed to create models directory {}: {}",
                self.models_dir.display(),
                e
            ))
        })?;

        let path = self.models_dir.join(name);
        let encoded = serde_json::to_vec(policy)
            .map_err(|e| LabError::InternalFailure(format!("Failed to encode model: {}", e)))?;
        fs::write(&path, encoded).map_err(|e| {
            LabError::InternalFailure(format!("Failed to write model {}: {}", path.display(), e))
        })?;

        info!("Saved model to {}", path.display());
        Ok(path)
    }

    /// Load a previously saved model by file name
    pub fn load(&self, filename: &str) -> Result<Policy> {
        let path = self.models_dir.join(Self::sanitize(filename)?);
        debug!("Loading model from {}", path.display());

        let bytes = fs::read(&path).map_err(|e| {
            LabError::InternalFailure(format!("Failed to load model {}: {}", path.display(), e))
        })?;
        let policy: Policy = serde_json::from_slice(&bytes).map_err(|e| {
            LabError::InternalFailure(format!("Model file {} is corrupt: {}", path.display(), e))
        })?;

        if !policy.is_finite() {
            return Err(LabError::InternalFailure(format!(
                "Model file {} holds non-finite parameters",
                path.display()
            )));
        }
        Ok(policy)
    }

    /// Reduce a caller-supplied name to a bare file name with an extension
    pub fn sanitize(filename: &str) -> Result<String> {
        let base = Path::new(filename.trim())
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .ok_or_else(|| LabError::BadRequest(format!("Invalid model filename: {:?}", filename)))?;

        if Path::new(base).extension().is_some() {
            Ok(base.to_string())
        } else {
            Ok(format!("{}.{}", base, MODEL_EXTENSION))
        }
    }
}
