//! Persona store — reads persona records from their JSON source.
//!
//! The source contract is a file with one top-level "personas" object mapping
//! cluster-id strings to persona records. Anything that does not parse into
//! that keyed structure is a persona-store error surfaced at load time; no
//! agents are constructed from a malformed source.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::types::{Persona, PersonaCollection};

/// Raw shape of the persona source file
#[derive(Debug, Deserialize)]
struct PersonaFile {
    personas: BTreeMap<String, Persona>,
}

// ─────────────────────────────────────────────────────────────────
// Persona Store
// ─────────────────────────────────────────────────────────────────

/// File-backed persona store
pub struct PersonaStore {
    path: PathBuf,
}

impl PersonaStore {
    /// Create a store reading from the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the source path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all persona records.
    ///
    /// Cluster ids are taken from the map keys; an explicit `cluster_id`
    /// field inside a record is overwritten by its key.
    pub fn load(&self) -> Result<PersonaCollection> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::PersonaSourceNotFound {
                path: self.path.clone(),
                source: e,
            }
        })?;

        let file: PersonaFile = serde_json::from_str(&content)
            .map_err(|e| Error::persona_source_malformed(&self.path, e.to_string()))?;

        let mut personas = BTreeMap::new();
        for (key, mut persona) in file.personas {
            let cluster_id: u32 = key.parse().map_err(|_| {
                Error::persona_invalid(&key, "cluster id key is not a non-negative integer")
            })?;

            if persona.persona_name.is_empty() {
                return Err(Error::persona_invalid(&key, "persona_name must not be empty"));
            }
            if persona.system_prompt.is_empty() {
                return Err(Error::persona_invalid(
                    &key,
                    "agent_system_prompt must not be empty",
                ));
            }

            persona.cluster_id = cluster_id;
            debug!(cluster_id, persona = %persona.persona_name, "Persona loaded");
            personas.insert(cluster_id, Arc::new(persona));
        }

        info!(
            path = %self.path.display(),
            count = personas.len(),
            "Persona source loaded"
        );

        Ok(PersonaCollection::new(personas))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_store(content: &str) -> (PersonaStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("personas.json");
        fs::write(&path, content).unwrap();
        (PersonaStore::new(path), tmp)
    }

    #[test]
    fn test_load_valid_source() {
        let (store, _tmp) = write_store(
            r#"{
                "personas": {
                    "0": {
                        "persona_name": "Cash Customer",
                        "agent_system_prompt": "You pay upfront.",
                        "size": 1200,
                        "percentage": 23.4
                    },
                    "1": {
                        "persona_name": "Bulk Buyer",
                        "agent_system_prompt": "You bundle purchases.",
                        "size": 800,
                        "percentage": 15.6
                    }
                }
            }"#,
        );

        let collection = store.load().unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(0).unwrap().persona_name, "Cash Customer");
        assert_eq!(collection.get(1).unwrap().cluster_id, 1);
    }

    #[test]
    fn test_load_orders_numerically_not_lexically() {
        // Keys "10" and "2" must sort as 2 < 10, not "10" < "2".
        let (store, _tmp) = write_store(
            r#"{
                "personas": {
                    "10": {"persona_name": "Ten", "agent_system_prompt": "p"},
                    "2": {"persona_name": "Two", "agent_system_prompt": "p"}
                }
            }"#,
        );

        let collection = store.load().unwrap();
        let ids: Vec<u32> = collection.iter().map(|p| p.cluster_id).collect();
        assert_eq!(ids, vec![2, 10]);
    }

    #[test]
    fn test_load_missing_file() {
        let store = PersonaStore::new("/nonexistent/personas.json");
        let result = store.load();
        assert!(matches!(result, Err(Error::PersonaSourceNotFound { .. })));
    }

    #[test]
    fn test_load_missing_personas_key() {
        let (store, _tmp) = write_store(r#"{"segments": {}}"#);
        let result = store.load();
        assert!(matches!(result, Err(Error::PersonaSourceMalformed { .. })));
    }

    #[test]
    fn test_load_invalid_json() {
        let (store, _tmp) = write_store("not json at all");
        let result = store.load();
        assert!(matches!(result, Err(Error::PersonaSourceMalformed { .. })));
    }

    #[test]
    fn test_load_non_integer_cluster_key() {
        let (store, _tmp) = write_store(
            r#"{"personas": {"alpha": {"persona_name": "A", "agent_system_prompt": "p"}}}"#,
        );
        let result = store.load();
        assert!(matches!(result, Err(Error::PersonaInvalid { .. })));
    }

    #[test]
    fn test_load_rejects_empty_prompt() {
        let (store, _tmp) = write_store(
            r#"{"personas": {"0": {"persona_name": "A", "agent_system_prompt": ""}}}"#,
        );
        let result = store.load();
        assert!(matches!(result, Err(Error::PersonaInvalid { .. })));
    }

    #[test]
    fn test_cluster_id_key_overrides_record_field() {
        let (store, _tmp) = write_store(
            r#"{"personas": {"7": {"cluster_id": 3, "persona_name": "A", "agent_system_prompt": "p"}}}"#,
        );
        let collection = store.load().unwrap();
        assert!(collection.get(7).is_some());
        assert!(collection.get(3).is_none());
    }
}
