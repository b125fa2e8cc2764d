//! Persona agent — binds one persona's prompt to the shared reply backend.
//!
//! An agent produces persona-consistent replies to arbitrary scenario text
//! and can reduce a reply into a structured decision. It holds a shared
//! reference to its persona and to the session's backend handle; responding
//! mutates no local state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{ReplyRequest, SharedBackend};
use crate::decision::{self, Decision};
use crate::error::Result;

use super::types::Persona;

/// Rewrite a scenario into the structured-request template.
///
/// The three labeled fields are what the decision extractor's pattern
/// matching relies on; the wording is fixed so live and mock replies are
/// parsed by the same rules.
fn structured_prompt(scenario: &str) -> String {
    format!(
        "{}\n\n\
         Please respond with:\n\
         1. DECISION: [Yes/No/Maybe] - Would you make this purchase?\n\
         2. REASONING: Brief explanation of your decision (2-3 sentences)\n\
         3. KEY FACTORS: What were the most important factors in your decision?",
        scenario
    )
}

// ─────────────────────────────────────────────────────────────────
// Persona Agent
// ─────────────────────────────────────────────────────────────────

/// One persona bound to the session's reply backend
pub struct PersonaAgent {
    persona: Arc<Persona>,
    backend: SharedBackend,
    model: String,
}

/// A structured reply: the extracted decision plus the raw text it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDecision {
    pub persona_name: String,
    pub cluster_id: u32,
    pub decision: Decision,
    pub raw_response: String,
}

impl PersonaAgent {
    /// Create an agent for a persona, injecting the shared backend handle
    pub fn new(persona: Arc<Persona>, backend: SharedBackend, model: impl Into<String>) -> Self {
        Self {
            persona,
            backend,
            model: model.into(),
        }
    }

    /// The persona this agent speaks for
    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Cluster id of the bound persona
    pub fn cluster_id(&self) -> u32 {
        self.persona.cluster_id
    }

    /// Name of the bound persona
    pub fn persona_name(&self) -> &str {
        &self.persona.persona_name
    }

    /// Generate a free-text reply to a scenario.
    ///
    /// One backend round trip in live mode; no network at all in mock mode.
    pub async fn respond(&self, scenario: &str, max_tokens: u32) -> Result<String> {
        debug!(
            cluster_id = self.persona.cluster_id,
            persona = %self.persona.persona_name,
            backend = self.backend.name(),
            "Generating reply"
        );

        let request = ReplyRequest {
            persona_name: self.persona.persona_name.clone(),
            system_prompt: self.persona.system_prompt.clone(),
            scenario: scenario.to_string(),
            model: self.model.clone(),
            max_tokens,
        };

        self.backend.generate(&request).await
    }

    /// Generate a reply through the structured-request template and reduce it
    /// to a decision.
    pub async fn respond_with_decision(
        &self,
        scenario: &str,
        max_tokens: u32,
    ) -> Result<AgentDecision> {
        let prompt = structured_prompt(scenario);
        let raw_response = self.respond(&prompt, max_tokens).await?;
        let decision = decision::extract(&raw_response);

        debug!(
            cluster_id = self.persona.cluster_id,
            persona = %self.persona.persona_name,
            decision = %decision,
            "Decision extracted"
        );

        Ok(AgentDecision {
            persona_name: self.persona.persona_name.clone(),
            cluster_id: self.persona.cluster_id,
            decision,
            raw_response,
        })
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
