//! Index manifest: which model built the persisted index

use crate::error::{RagError, Result};
use crate::index::persist;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub model: String,
    pub dimension: usize,
    pub units: usize,
    /// Last successful ingestion
    pub updated_at: DateTime<Utc>,
}

impl IndexManifest {
    pub fn new(model: &str, dimension: usize, units: usize) -> Self {
        Self {
            model: model.to_string(),
            dimension,
            units,
            updated_at: Utc::now(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| RagError::Json {
            source: e,
            context: "Failed to serialize index manifest".to_string(),
        })?;
        persist::write_atomic(path, &json).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to write index manifest: {:?}", path),
        })
    }

    /// Read the manifest, if one has been written
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to read index manifest: {:?}", path),
        })?;
        let manifest = serde_json::from_str(&content).map_err(|e| RagError::Json {
            source: e,
            context: format!("Invalid index manifest: {:?}", path),
        })?;
        Ok(Some(manifest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.json");
        assert!(IndexManifest::load(&path).unwrap().is_none());

        let manifest = IndexManifest::new("hashing-64", 64, 12);
        manifest.save(&path).unwrap();
        assert_eq!(IndexManifest::load(&path).unwrap(), Some(manifest));
    }

    #[test]
    fn test_invalid_manifest_is_json_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            IndexManifest::load(&path),
            Err(RagError::Json { .. })
        ));
    }
}
