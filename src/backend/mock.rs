//! Mock backend for testing and offline development
//!
//! Provides a deterministic implementation of ReplyBackend: no network calls,
//! persona-keyed canned responses, and a visible mode marker so mock output is
//! never confusable with a live reply. Repeated calls with the same persona
//! and scenario yield identical text.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};

use super::{ReplyBackend, ReplyRequest};

/// How many scenario characters are echoed back in a mock reply
const SCENARIO_ECHO_CHARS: usize = 100;

// ─────────────────────────────────────────────────────────────────
// Mock Backend Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for mock backend behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Fail every generate call (for error-path testing)
    pub fail_generate: bool,

    /// Fixed response text overriding the persona templates
    pub fixed_response: Option<String>,
}

// ─────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────

/// Mock implementation of ReplyBackend
pub struct MockBackend {
    config: MockConfig,
    generate_calls: RwLock<u64>,
}

impl MockBackend {
    /// Create a new mock backend with default configuration
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// Create a new mock backend with custom configuration
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            generate_calls: RwLock::new(0),
        }
    }

    /// Get the number of generate calls made so far
    pub fn generate_calls(&self) -> u64 {
        *self.generate_calls.read()
    }

    /// Canned base response for a persona, keyed by name.
    ///
    /// Unknown persona names get a generic placeholder so the backend never
    /// fails on personas added upstream.
    fn base_response(persona_name: &str) -> String {
        let template = match persona_name {
            "Mainstream Shopper" => {
                "As a typical weekday shopper, I'd consider this purchase carefully. \
                 I usually buy what I need and move on. Given this scenario, I'd likely \
                 proceed if it meets my specific need and the price is reasonable."
            }
            "Weekend Buyer" => {
                "I typically browse on weekends when I have time. This seems interesting, \
                 but I'd want to think it over during my weekend shopping time."
            }
            "Cash Customer" => {
                "I prefer to pay upfront with boleto. If this requires installments or \
                 credit, I'd hesitate. I don't like carrying debt for purchases."
            }
            "High-Value Financing Shopper" => {
                "I'm comfortable with larger purchases when I can spread payments. \
                 If 10x installments are available, the monthly cost matters more than total price."
            }
            "Bulk Buyer" => {
                "I prefer to bundle purchases together. If there's a deal for buying multiple, \
                 I'd be more interested. Single items feel less efficient to me."
            }
            "Loyal Explorer Customer" => {
                "I'm always open to trying new categories. As a repeat customer, I trust this \
                 marketplace and would consider exploring this option."
            }
            "Critical Shopper" => {
                "I have high standards. Before deciding, I'd want to see the reviews carefully. \
                 If there are quality concerns, I'd pass regardless of the price."
            }
            other => {
                return format!("[Mock response for {}] Considering the scenario...", other);
            }
        };
        template.to_string()
    }

    /// Assemble the full canned reply: mode marker, persona-keyed body, and a
    /// truncated echo of the scenario
    fn canned_reply(persona_name: &str, scenario: &str) -> String {
        let echo: String = scenario.chars().take(SCENARIO_ECHO_CHARS).collect();
        format!(
            "[MOCK MODE] {}\n\nScenario received: {}...",
            Self::base_response(persona_name),
            echo
        )
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplyBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_live(&self) -> bool {
        false
    }

    async fn generate(&self, request: &ReplyRequest) -> Result<String> {
        *self.generate_calls.write() += 1;

        if self.config.fail_generate {
            return Err(Error::backend_call_failed(
                &request.persona_name,
                "Mock generation failure",
            ));
        }

        if let Some(ref fixed) = self.config.fixed_response {
            return Ok(fixed.clone());
        }

        Ok(Self::canned_reply(&request.persona_name, &request.scenario))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
