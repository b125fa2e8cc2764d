//! Reply backend module
//!
//! Provides the core abstraction over reply generation and its two variants:
//! a live Anthropic Messages API backend and a deterministic mock. The mode
//! decision happens once, here, at construction; everything downstream works
//! against the trait.

mod anthropic;
mod mock;
mod traits;

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use mock::{MockBackend, MockConfig};
pub use traits::*;

use std::sync::Arc;

use tracing::info;

use crate::config::{ExecutionMode, SimulatorConfig};
use crate::error::Result;

/// Create the shared backend handle for a simulation session.
///
/// Mock mode never touches credentials or the network. Live mode resolves the
/// API credential first (absence is a configuration error, surfaced before
/// any agent is constructed) and then builds the HTTP client.
pub fn create_backend(mode: ExecutionMode, config: &SimulatorConfig) -> Result<SharedBackend> {
    match mode {
        ExecutionMode::Mock => {
            info!(backend = "mock", "Reply backend created");
            Ok(Arc::new(MockBackend::new()))
        }
        ExecutionMode::Live => {
            let api_key = config.resolve_api_key()?;
            let backend = AnthropicBackend::new(AnthropicConfig {
                base_url: config.backend.base_url.clone(),
                api_key,
                timeout_secs: config.backend.timeout_secs,
                max_retries: config.backend.max_retries,
            })?;
            Ok(Arc::new(backend))
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_backend() {
        let config = SimulatorConfig::default();
        let backend = create_backend(ExecutionMode::Mock, &config).unwrap();
        assert_eq!(backend.name(), "mock");
        assert!(!backend.is_live());
    }

    #[test]
    fn test_create_live_backend_with_config_key() {
        let mut config = SimulatorConfig::default();
        config.backend.api_key = Some("sk-test-123".to_string());

        let backend = create_backend(ExecutionMode::Live, &config).unwrap();
        assert_eq!(backend.name(), "anthropic");
        assert!(backend.is_live());
    }
}
