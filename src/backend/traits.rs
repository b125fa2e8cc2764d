//! Backend trait definitions
//!
//! Defines the core ReplyBackend trait that all reply backends must implement.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────
// Reply Request
// ─────────────────────────────────────────────────────────────────

/// One reply-generation request: a persona's behavioral frame plus the
/// scenario presented to it.
///
/// `persona_name` rides along so the mock variant can key its canned
/// templates; the live variant uses only the prompt pair, model, and
/// `max_tokens`.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    /// Human-readable persona name
    pub persona_name: String,

    /// The persona's behavioral instruction (system prompt)
    pub system_prompt: String,

    /// Scenario text presented as the user message
    pub scenario: String,

    /// Model identifier (opaque string passed through to the backend)
    pub model: String,

    /// Maximum output length for this call
    pub max_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────
// ReplyBackend Trait
// ─────────────────────────────────────────────────────────────────

/// Core trait for reply backends.
///
/// Execution-mode branching (live vs. mock) is modeled as polymorphism over
/// this single capability: agents hold a shared handle and never branch on
/// mode themselves. Additional model providers plug in here without touching
/// extraction or orchestration logic.
#[async_trait]
pub trait ReplyBackend: Send + Sync {
    /// Get the backend name (e.g., "anthropic", "mock")
    fn name(&self) -> &'static str;

    /// Whether replies come from a remote model (true) or canned text (false)
    fn is_live(&self) -> bool;

    /// Generate a reply for one persona/scenario pair
    async fn generate(&self, request: &ReplyRequest) -> Result<String>;
}

/// Type alias for a shared backend reference.
///
/// One handle is shared read-only by every agent in a session; agents never
/// mutate it, so no locking is required around the handle itself.
pub type SharedBackend = Arc<dyn ReplyBackend>;

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
