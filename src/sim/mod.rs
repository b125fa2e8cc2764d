//! Simulation orchestration
//!
//! The orchestrator owns a session: it loads personas once, builds one agent
//! per persona around a shared reply backend, and runs scenarios (single or
//! batched) across every agent, assembling results into a deterministic
//! tabular record set.
//!
//! Lifecycle: personas-loaded -> agents-ready -> (repeatable) run-complete.
//! Loading and agent construction are idempotent and lazily triggered: the
//! first run operation performs both exactly once, later runs reuse the
//! cached agent set.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{self, SharedBackend};
use crate::config::SimulatorConfig;
use crate::decision::Decision;
use crate::error::{Error, Result};
use crate::persona::{PersonaAgent, PersonaCollection, PersonaStore, PersonaSummary};

/// Name tag applied to scenarios submitted without one
pub const DEFAULT_SCENARIO_NAME: &str = "unnamed";

// ─────────────────────────────────────────────────────────────────
// Scenario
// ─────────────────────────────────────────────────────────────────

/// A purchase situation presented identically to every persona in a run.
/// Ephemeral; constructed per simulation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Optional name tag used to label result rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Scenario text shown to every persona
    pub text: String,
}

impl Scenario {
    /// Scenario without a name tag
    pub fn unnamed(text: impl Into<String>) -> Self {
        Self {
            name: None,
            text: text.into(),
        }
    }

    /// Scenario with a name tag
    pub fn named(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            text: text.into(),
        }
    }

    /// Row label for this scenario ("unnamed" when no tag was given)
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_SCENARIO_NAME)
    }

    /// Load a batch file: a JSON array of scenario objects
    pub fn load_batch(path: &Path) -> Result<Vec<Scenario>> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::scenario_invalid(format!("Failed to read batch file {}: {}", path.display(), e))
        })?;

        let scenarios: Vec<Scenario> = serde_json::from_str(&content).map_err(|e| {
            Error::scenario_invalid(format!("Failed to parse batch file {}: {}", path.display(), e))
        })?;

        if scenarios.is_empty() {
            return Err(Error::scenario_invalid(format!(
                "Batch file {} contains no scenarios",
                path.display()
            )));
        }

        Ok(scenarios)
    }
}

// ─────────────────────────────────────────────────────────────────
// Simulation Record
// ─────────────────────────────────────────────────────────────────

/// One result row per (scenario, persona) pair.
///
/// The column set and ordering are part of the output contract and do not
/// vary by execution mode. `decision` is present for structured runs and
/// absent for unstructured ones; an `Unclear` decision is a valid row, not an
/// error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub scenario_name: String,
    pub cluster_id: u32,
    pub persona_name: String,
    pub decision: Option<Decision>,
    pub raw_response: String,
}

// ─────────────────────────────────────────────────────────────────
// Simulation Orchestrator
// ─────────────────────────────────────────────────────────────────

/// Session-scoped coordinator for persona loading, agent construction, and
/// batch execution
pub struct SimulationOrchestrator {
    config: SimulatorConfig,
    store: PersonaStore,
    personas: Option<PersonaCollection>,
    backend: Option<SharedBackend>,
    agents: BTreeMap<u32, PersonaAgent>,
}

impl SimulationOrchestrator {
    /// Create an orchestrator from configuration. The backend is constructed
    /// lazily on first agent initialization.
    pub fn new(config: SimulatorConfig) -> Self {
        let store = PersonaStore::new(config.persona_source_path());
        Self {
            config,
            store,
            personas: None,
            backend: None,
            agents: BTreeMap::new(),
        }
    }

    /// Create an orchestrator with an explicitly injected backend handle.
    ///
    /// Bypasses credential resolution; useful for embedding and for
    /// deterministic tests.
    pub fn with_backend(config: SimulatorConfig, backend: SharedBackend) -> Self {
        let mut orchestrator = Self::new(config);
        orchestrator.backend = Some(backend);
        orchestrator
    }

    /// Load persona records once. Idempotent; a malformed source fails here
    /// and no agents are constructed.
    pub fn load_personas(&mut self) -> Result<&PersonaCollection> {
        if self.personas.is_none() {
            let collection = self.store.load()?;
            if collection.is_empty() {
                return Err(Error::NoPersonasLoaded {
                    path: self.store.path().to_path_buf(),
                });
            }
            self.personas = Some(collection);
        }
        Ok(self.personas.as_ref().unwrap())
    }

    /// Construct one agent per loaded persona, injecting the shared backend
    /// handle and propagating the model identifier uniformly. Idempotent.
    pub fn initialize_agents(&mut self) -> Result<&BTreeMap<u32, PersonaAgent>> {
        if self.agents.is_empty() {
            self.load_personas()?;

            let shared = match &self.backend {
                Some(backend) => backend.clone(),
                None => {
                    let backend =
                        backend::create_backend(self.config.simulation.mode, &self.config)?;
                    self.backend = Some(backend.clone());
                    backend
                }
            };

            let personas = self.personas.as_ref().unwrap();
            let model = &self.config.simulation.model;
            for persona in personas.iter() {
                let agent = PersonaAgent::new(persona.clone(), shared.clone(), model.clone());
                self.agents.insert(persona.cluster_id, agent);
            }

            info!(
                agents = self.agents.len(),
                mode = %self.config.simulation.mode,
                model = %self.config.simulation.model,
                "Agents initialized"
            );
        }
        Ok(&self.agents)
    }

    /// Run a single scenario across all personas, rows in ascending
    /// cluster-id order. Structured runs carry an extracted decision per row;
    /// unstructured runs leave it empty.
    pub async fn run_scenario(
        &mut self,
        text: &str,
        structured: bool,
    ) -> Result<Vec<SimulationRecord>> {
        self.run_labeled(DEFAULT_SCENARIO_NAME, text, structured).await
    }

    /// Run multiple scenarios in submission order, tagging every row with its
    /// scenario's label. Yields exactly scenarios x personas rows.
    pub async fn run_batch(
        &mut self,
        scenarios: &[Scenario],
        structured: bool,
    ) -> Result<Vec<SimulationRecord>> {
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            scenarios = scenarios.len(),
            structured,
            "Starting batch run"
        );

        let mut records = Vec::new();
        for scenario in scenarios {
            let rows = self
                .run_labeled(scenario.label(), &scenario.text, structured)
                .await?;
            records.extend(rows);
        }

        info!(%run_id, rows = records.len(), "Batch run complete");
        Ok(records)
    }

    /// Read-only projection of loaded personas, sorted ascending by cluster
    /// id. Triggers lazy load if personas are not yet loaded.
    pub fn get_persona_summary(&mut self) -> Result<Vec<PersonaSummary>> {
        let personas = self.load_personas()?;
        Ok(personas.summaries())
    }

    async fn run_labeled(
        &mut self,
        scenario_name: &str,
        text: &str,
        structured: bool,
    ) -> Result<Vec<SimulationRecord>> {
        self.initialize_agents()?;

        let max_tokens = self.config.simulation.max_tokens;
        let concurrency = self.config.simulation.max_concurrency.max(1);

        debug!(
            scenario = scenario_name,
            agents = self.agents.len(),
            concurrency,
            "Running scenario"
        );

        // Agents are dispatched in ascending cluster-id order. The buffered
        // stream yields results in dispatch order regardless of completion
        // order, and one failing call does not cancel its in-flight siblings;
        // the first failure aborts the run only after collection.
        let calls = self.agents.values().map(|agent| async move {
            if structured {
                let reply = agent.respond_with_decision(text, max_tokens).await?;
                Ok(SimulationRecord {
                    scenario_name: scenario_name.to_string(),
                    cluster_id: reply.cluster_id,
                    persona_name: reply.persona_name,
                    decision: Some(reply.decision),
                    raw_response: reply.raw_response,
                })
            } else {
                let raw_response = agent.respond(text, max_tokens).await?;
                Ok(SimulationRecord {
                    scenario_name: scenario_name.to_string(),
                    cluster_id: agent.cluster_id(),
                    persona_name: agent.persona_name().to_string(),
                    decision: None,
                    raw_response,
                })
            }
        });

        let results: Vec<Result<SimulationRecord>> =
            stream::iter(calls).buffered(concurrency).collect().await;

        let mut records = Vec::with_capacity(results.len());
        for result in results {
            records.push(result?);
        }
        Ok(records)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockConfig};
    use crate::config::ExecutionMode;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Personas with deliberately unordered keys
    const PERSONAS_JSON: &str = r#"{
        "personas": {
            "2": {
                "persona_name": "Critical Shopper",
                "agent_system_prompt": "You have high standards.",
                "size": 400,
                "percentage": 8.9
            },
            "0": {
                "persona_name": "Cash Customer",
                "agent_system_prompt": "You pay upfront with boleto.",
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
    }"#;

    fn mock_config(tmp: &TempDir, personas_json: &str) -> SimulatorConfig {
        let path = tmp.path().join("personas.json");
        std::fs::write(&path, personas_json).unwrap();

        let mut config = SimulatorConfig::default();
        config.simulation.mode = ExecutionMode::Mock;
        config.personas.path = Some(path.to_string_lossy().to_string());
        config
    }

    fn mock_orchestrator(tmp: &TempDir) -> SimulationOrchestrator {
        SimulationOrchestrator::new(mock_config(tmp, PERSONAS_JSON))
    }

    #[tokio::test]
    async fn test_run_scenario_rows_in_cluster_order() {
        let tmp = TempDir::new().unwrap();
        let mut orchestrator = mock_orchestrator(&tmp);

        let records = orchestrator
            .run_scenario("Buy now, pay in 10x", true)
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        let ids: Vec<u32> = records.iter().map(|r| r.cluster_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(records.iter().all(|r| r.scenario_name == "unnamed"));
        assert!(records.iter().all(|r| r.decision.is_some()));
    }

    #[tokio::test]
    async fn test_run_batch_counts_and_order() {
        let tmp = TempDir::new().unwrap();
        let mut orchestrator = mock_orchestrator(&tmp);

        let scenarios = vec![
            Scenario::named("promo", "Buy now, pay in 10x"),
            Scenario::unnamed("A premium product at full price"),
        ];

        let records = orchestrator.run_batch(&scenarios, true).await.unwrap();

        // N scenarios x P personas rows, scenarios in submission order,
        // personas ascending within each scenario
        assert_eq!(records.len(), 6);
        let labels: Vec<&str> = records.iter().map(|r| r.scenario_name.as_str()).collect();
        assert_eq!(
            labels,
            vec!["promo", "promo", "promo", "unnamed", "unnamed", "unnamed"]
        );
        let ids: Vec<u32> = records.iter().map(|r| r.cluster_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 1, 2]);
    }

    #[tokio::test]
    async fn test_unstructured_rows_have_no_decision() {
        let tmp = TempDir::new().unwrap();
        let mut orchestrator = mock_orchestrator(&tmp);

        let records = orchestrator
            .run_scenario("Buy now, pay in 10x", false)
            .await
            .unwrap();

        assert!(records.iter().all(|r| r.decision.is_none()));
        assert!(records.iter().all(|r| r.raw_response.contains("[MOCK MODE]")));
    }

    #[tokio::test]
    async fn test_lazy_initialization_and_reuse() {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::new());
        let mut orchestrator = SimulationOrchestrator::with_backend(
            mock_config(&tmp, PERSONAS_JSON),
            backend.clone(),
        );

        // No explicit load/init: the first run performs both
        let first = orchestrator.run_scenario("scenario", true).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(backend.generate_calls(), 3);

        // Subsequent runs reuse the cached agent set
        let second = orchestrator.run_scenario("scenario", true).await.unwrap();
        assert_eq!(second.len(), 3);
        assert_eq!(backend.generate_calls(), 6);
    }

    #[tokio::test]
    async fn test_initialize_agents_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut orchestrator = mock_orchestrator(&tmp);

        orchestrator.initialize_agents().unwrap();
        let count = orchestrator.agents.len();
        orchestrator.initialize_agents().unwrap();
        assert_eq!(orchestrator.agents.len(), count);
    }

    #[tokio::test]
    async fn test_mock_and_live_share_extraction_path() {
        // One Cash Customer persona, a named scenario, mock mode: the
        // decision is derived purely from the mock reply text by the same
        // rules applied to live replies.
        let tmp = TempDir::new().unwrap();
        let config = mock_config(
            &tmp,
            r#"{"personas": {"0": {
                "persona_name": "Cash Customer",
                "agent_system_prompt": "You pay upfront."
            }}}"#,
        );
        let mut orchestrator = SimulationOrchestrator::new(config);

        let scenarios = vec![Scenario::named("promo", "Buy now, pay in 10x")];
        let records = orchestrator.run_batch(&scenarios, true).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].scenario_name, "promo");
        assert_eq!(records[0].persona_name, "Cash Customer");
        // The mock echoes the opening of the structured request, so its
        // "DECISION: [Yes/No/Maybe]" label is visible to the extractor and
        // the first recognized token wins
        assert_eq!(records[0].decision, Some(Decision::Yes));
    }

    #[tokio::test]
    async fn test_structured_decision_from_fixed_backend_reply() {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::with_config(MockConfig {
            fixed_response: Some("**DECISION:** Yes\nREASONING: Good deal.".to_string()),
            ..Default::default()
        }));
        let mut orchestrator = SimulationOrchestrator::with_backend(
            mock_config(&tmp, PERSONAS_JSON),
            backend,
        );

        let records = orchestrator.run_scenario("scenario", true).await.unwrap();
        assert!(records.iter().all(|r| r.decision == Some(Decision::Yes)));
    }

    #[tokio::test]
    async fn test_malformed_source_constructs_no_agents() {
        let tmp = TempDir::new().unwrap();
        let config = mock_config(&tmp, r#"{"segments": {}}"#);
        let mut orchestrator = SimulationOrchestrator::new(config);

        let result = orchestrator.run_scenario("scenario", true).await;
        assert!(matches!(result, Err(Error::PersonaSourceMalformed { .. })));
        assert!(orchestrator.agents.is_empty());
    }

    #[tokio::test]
    async fn test_empty_persona_set_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let config = mock_config(&tmp, r#"{"personas": {}}"#);
        let mut orchestrator = SimulationOrchestrator::new(config);

        let result = orchestrator.load_personas();
        assert!(matches!(result, Err(Error::NoPersonasLoaded { .. })));
    }

    #[tokio::test]
    async fn test_backend_failure_aborts_run() {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::with_config(MockConfig {
            fail_generate: true,
            ..Default::default()
        }));
        let mut orchestrator = SimulationOrchestrator::with_backend(
            mock_config(&tmp, PERSONAS_JSON),
            backend,
        );

        let result = orchestrator.run_scenario("scenario", true).await;
        assert!(matches!(result, Err(Error::BackendCallFailed { .. })));
    }

    #[tokio::test]
    async fn test_sequential_concurrency_still_ordered() {
        let tmp = TempDir::new().unwrap();
        let mut config = mock_config(&tmp, PERSONAS_JSON);
        config.simulation.max_concurrency = 1;
        let mut orchestrator = SimulationOrchestrator::new(config);

        let records = orchestrator.run_scenario("scenario", true).await.unwrap();
        let ids: Vec<u32> = records.iter().map(|r| r.cluster_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_persona_summary_sorted() {
        let tmp = TempDir::new().unwrap();
        let mut orchestrator = mock_orchestrator(&tmp);

        let summary = orchestrator.get_persona_summary().unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].cluster_id, 0);
        assert_eq!(summary[0].persona_name, "Cash Customer");
        assert_eq!(summary[0].percentage, "23.4%");
        assert_eq!(summary[2].cluster_id, 2);
    }

    #[test]
    fn test_scenario_label() {
        assert_eq!(Scenario::named("promo", "text").label(), "promo");
        assert_eq!(Scenario::unnamed("text").label(), "unnamed");
    }

    #[test]
    fn test_load_batch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scenarios.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "promo", "text": "Buy now, pay in 10x"},
                {"text": "A premium product at full price"}
            ]"#,
        )
        .unwrap();

        let scenarios = Scenario::load_batch(&path).unwrap();
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].label(), "promo");
        assert_eq!(scenarios[1].label(), "unnamed");
    }

    #[test]
    fn test_load_batch_rejects_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scenarios.json");
        std::fs::write(&path, "[]").unwrap();

        let result = Scenario::load_batch(&path);
        assert!(matches!(result, Err(Error::ScenarioInvalid { .. })));
    }

    #[test]
    fn test_load_batch_rejects_malformed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scenarios.json");
        std::fs::write(&path, r#"[{"name": "missing text field"}]"#).unwrap();

        let result = Scenario::load_batch(&path);
        assert!(matches!(result, Err(Error::ScenarioInvalid { .. })));
    }
}
