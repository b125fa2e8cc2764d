//! Core types for the persona system.
//!
//! Personas are named behavioral profiles derived from customer clustering.
//! Each carries a natural-language instruction used to condition a model's
//! replies, plus descriptive statistics carried through for reporting.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Persona
// ─────────────────────────────────────────────────────────────────

/// One customer persona record. Immutable once loaded; agents hold a shared
/// reference rather than a copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Cluster this persona represents (unique key, injected from the source
    /// map key during load)
    #[serde(default)]
    pub cluster_id: u32,

    /// Human-readable persona name (not guaranteed unique)
    pub persona_name: String,

    /// Behavioral instruction used as the model's system prompt
    #[serde(rename = "agent_system_prompt")]
    pub system_prompt: String,

    /// Number of customers in the cluster (descriptive, not used by core logic)
    #[serde(default)]
    pub size: u64,

    /// Share of the customer base, in percent (descriptive)
    #[serde(default)]
    pub percentage: f64,

    /// Any other source fields, passed through opaquely
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ─────────────────────────────────────────────────────────────────
// Persona Collection
// ─────────────────────────────────────────────────────────────────

/// All personas of a session, keyed by cluster id.
///
/// Backed by a BTreeMap so iteration is always in ascending cluster-id order
/// regardless of the order in the underlying source file.
#[derive(Debug, Clone, Default)]
pub struct PersonaCollection {
    personas: BTreeMap<u32, Arc<Persona>>,
}

impl PersonaCollection {
    /// Build a collection from loaded persona records
    pub fn new(personas: BTreeMap<u32, Arc<Persona>>) -> Self {
        Self { personas }
    }

    /// Number of personas
    pub fn len(&self) -> usize {
        self.personas.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Get a persona by cluster id
    pub fn get(&self, cluster_id: u32) -> Option<&Arc<Persona>> {
        self.personas.get(&cluster_id)
    }

    /// Iterate personas in ascending cluster-id order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Persona>> {
        self.personas.values()
    }

    /// Read-only summary projection, sorted ascending by cluster id
    pub fn summaries(&self) -> Vec<PersonaSummary> {
        self.personas
            .values()
            .map(|p| PersonaSummary {
                cluster_id: p.cluster_id,
                persona_name: p.persona_name.clone(),
                size: p.size,
                percentage: format!("{:.1}%", p.percentage),
            })
            .collect()
    }
}

/// One row of the persona summary projection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonaSummary {
    pub cluster_id: u32,
    pub persona_name: String,
    pub size: u64,
    /// Formatted share of the customer base (e.g. "23.4%")
    pub percentage: String,
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn persona(cluster_id: u32, name: &str, percentage: f64) -> Arc<Persona> {
        Arc::new(Persona {
            cluster_id,
            persona_name: name.to_string(),
            system_prompt: format!("You are {}.", name),
            size: 100,
            percentage,
            extra: serde_json::Map::new(),
        })
    }

    #[test]
    fn test_persona_deserialization() {
        let json = r#"{
            "persona_name": "Cash Customer",
            "agent_system_prompt": "You pay upfront.",
            "size": 1200,
            "percentage": 23.44,
            "avg_ticket": 85.2
        }"#;

        let p: Persona = serde_json::from_str(json).unwrap();
        assert_eq!(p.persona_name, "Cash Customer");
        assert_eq!(p.system_prompt, "You pay upfront.");
        assert_eq!(p.size, 1200);
        assert!((p.percentage - 23.44).abs() < f64::EPSILON);
        // Unknown fields pass through opaquely
        assert!(p.extra.contains_key("avg_ticket"));
    }

    #[test]
    fn test_persona_optional_statistics() {
        let json = r#"{
            "persona_name": "Minimal",
            "agent_system_prompt": "prompt"
        }"#;

        let p: Persona = serde_json::from_str(json).unwrap();
        assert_eq!(p.size, 0);
        assert_eq!(p.percentage, 0.0);
    }

    #[test]
    fn test_collection_iterates_in_cluster_order() {
        let mut map = BTreeMap::new();
        map.insert(5, persona(5, "Five", 10.0));
        map.insert(0, persona(0, "Zero", 50.0));
        map.insert(2, persona(2, "Two", 40.0));

        let collection = PersonaCollection::new(map);
        let ids: Vec<u32> = collection.iter().map(|p| p.cluster_id).collect();
        assert_eq!(ids, vec![0, 2, 5]);
    }

    #[test]
    fn test_summaries_sorted_and_formatted() {
        let mut map = BTreeMap::new();
        map.insert(3, persona(3, "Three", 12.345));
        map.insert(1, persona(1, "One", 87.6));

        let collection = PersonaCollection::new(map);
        let summaries = collection.summaries();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].cluster_id, 1);
        assert_eq!(summaries[0].percentage, "87.6%");
        assert_eq!(summaries[1].cluster_id, 3);
        assert_eq!(summaries[1].percentage, "12.3%");
    }
}
