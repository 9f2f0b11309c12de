//! Run manifest and parameter hashing.
//!
//! The manifest records which parameters produced the artifacts in a working
//! directory. A restart reuses `dt.cc`/`dt.ct` only when the stored hash
//! matches the hash of the current parameters.

use crate::error::PersistenceResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

/// SHA-256 (hex) of the JSON serialization of `params`.
pub fn parameter_hash<T: Serialize>(params: &T) -> PersistenceResult<String> {
    let bytes = serde_json::to_vec(params)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCounts {
    pub events: usize,
    pub dt_cc: usize,
    pub dt_ct: usize,
    pub pairs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    pub parameter_hash: String,
    pub counts: ManifestCounts,
}

impl RunManifest {
    pub fn new(parameter_hash: String, counts: ManifestCounts) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            parameter_hash,
            counts,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> PersistenceResult<()> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn matches(&self, parameter_hash: &str) -> bool {
        self.parameter_hash == parameter_hash
    }
}
