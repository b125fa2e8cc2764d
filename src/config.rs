//! Configuration system for persona-sim
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PERSONA_SIM_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable holding the live-mode API credential
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Default model identifier passed through to the backend
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

// ─────────────────────────────────────────────────────────────────
// Execution Mode
// ─────────────────────────────────────────────────────────────────

/// How persona replies are generated: a live model call or deterministic
/// canned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Real completion calls against the configured API endpoint.
    Live,
    /// Deterministic canned replies, no network. Used for testing and
    /// offline development.
    Mock,
}

impl ExecutionMode {
    /// Slug used in config files and CLI output.
    pub fn slug(&self) -> &'static str {
        match self {
            ExecutionMode::Live => "live",
            ExecutionMode::Mock => "mock",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "live" => Ok(ExecutionMode::Live),
            "mock" => Ok(ExecutionMode::Mock),
            _ => Err(Error::config_field_invalid(
                "simulation.mode",
                format!("Unknown execution mode '{}'. Valid: live, mock", s),
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────

/// Main simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Simulation run settings
    pub simulation: SimulationSettings,

    /// Persona source settings
    pub personas: PersonaSourceSettings,

    /// Reply backend settings
    pub backend: BackendSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Simulation run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Execution mode: live or mock
    pub mode: ExecutionMode,

    /// Model identifier (opaque string passed through to the backend)
    pub model: String,

    /// Maximum output length per backend call
    pub max_tokens: u32,

    /// Maximum concurrent backend calls per scenario (1 = strictly sequential)
    pub max_concurrency: usize,
}

/// Persona source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSourceSettings {
    /// Path to the personas JSON file (defaults to ~/.persona-sim/personas.json)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Reply backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// API base URL
    pub base_url: String,

    /// API key override (the environment variable takes precedence; leaving
    /// this unset and exporting the variable is the recommended setup)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-call request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient call failures
    pub max_retries: u32,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationSettings::default(),
            personas: PersonaSourceSettings::default(),
            backend: BackendSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Live,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 500,
            max_concurrency: 4,
        }
    }
}

impl Default for PersonaSourceSettings {
    fn default() -> Self {
        Self { path: None }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: None,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────

impl SimulatorConfig {
    /// Default configuration file location: ~/.persona-sim/config.toml
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".persona-sim")
            .join("config.toml")
    }

    /// Load configuration from an explicit path, the default location, or
    /// built-in defaults, then apply environment overrides.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// location silently falls back to defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let expanded = expand_path(p);
                Self::from_file(&expanded)?
            }
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    debug!("No configuration file found, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigNotFound {
            path: path.to_path_buf(),
            source: Some(e),
        })?;

        let config: SimulatorConfig = toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            source: Some(e),
        })?;

        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Apply PERSONA_SIM_* environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(mode) = env::var("PERSONA_SIM_MODE") {
            if let Ok(parsed) = mode.parse() {
                self.simulation.mode = parsed;
            }
        }
        if let Ok(model) = env::var("PERSONA_SIM_MODEL") {
            self.simulation.model = model;
        }
        if let Ok(max_tokens) = env::var("PERSONA_SIM_MAX_TOKENS") {
            if let Ok(parsed) = max_tokens.parse() {
                self.simulation.max_tokens = parsed;
            }
        }
        if let Ok(personas) = env::var("PERSONA_SIM_PERSONAS") {
            self.personas.path = Some(personas);
        }
        if let Ok(base_url) = env::var("PERSONA_SIM_BASE_URL") {
            self.backend.base_url = base_url;
        }
        if let Ok(level) = env::var("PERSONA_SIM_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.simulation.model.is_empty() {
            return Err(Error::config_field_invalid(
                "simulation.model",
                "Model identifier must not be empty",
            ));
        }
        if self.simulation.max_tokens == 0 {
            return Err(Error::config_field_invalid(
                "simulation.max_tokens",
                "max_tokens must be greater than zero",
            ));
        }
        if self.simulation.max_concurrency == 0 {
            return Err(Error::config_field_invalid(
                "simulation.max_concurrency",
                "max_concurrency must be at least 1",
            ));
        }
        if self.backend.base_url.is_empty() {
            return Err(Error::config_field_invalid(
                "backend.base_url",
                "base_url must not be empty",
            ));
        }
        if self.backend.timeout_secs == 0 {
            return Err(Error::config_field_invalid(
                "backend.timeout_secs",
                "timeout_secs must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Resolved persona source path (configured path with ~ expanded, or the
    /// default location under the user's home directory)
    pub fn persona_source_path(&self) -> PathBuf {
        match &self.personas.path {
            Some(p) => expand_path(p),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".persona-sim")
                .join("personas.json"),
        }
    }

    /// Resolve the live-mode API credential: config override first, then the
    /// environment variable. Absence is a configuration error, not a backend
    /// error.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = &self.backend.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }
        match env::var(API_KEY_ENV) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(Error::missing_credential(API_KEY_ENV)),
        }
    }

    /// Write a default configuration file to the given path
    pub fn init(path: &Path, force: bool) -> Result<PathBuf> {
        if path.exists() && !force {
            return Err(Error::config_validation(format!(
                "Configuration file already exists: {} (use --force to overwrite)",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(&SimulatorConfig::default())?;
        fs::write(path, content).map_err(|e| Error::IoWrite {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(path.to_path_buf())
    }
}

/// Expand ~ and environment variables in a path string
fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_validates() {
        let config = SimulatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.mode, ExecutionMode::Live);
        assert_eq!(config.simulation.model, DEFAULT_MODEL);
        assert_eq!(config.simulation.max_tokens, 500);
    }

    #[test]
    fn test_execution_mode_from_str() {
        assert_eq!("live".parse::<ExecutionMode>().unwrap(), ExecutionMode::Live);
        assert_eq!("MOCK".parse::<ExecutionMode>().unwrap(), ExecutionMode::Mock);
        assert!("dry-run".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[simulation]
mode = "mock"
model = "test-model"
max_tokens = 256

[backend]
timeout_secs = 30
"#,
        )
        .unwrap();

        let config = SimulatorConfig::from_file(&path).unwrap();
        assert_eq!(config.simulation.mode, ExecutionMode::Mock);
        assert_eq!(config.simulation.model, "test-model");
        assert_eq!(config.simulation.max_tokens, 256);
        assert_eq!(config.backend.timeout_secs, 30);
        // Unspecified sections fall back to defaults
        assert_eq!(config.simulation.max_concurrency, 4);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file_not_found() {
        let result = SimulatorConfig::from_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
    }

    #[test]
    fn test_from_file_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "not [ valid toml").unwrap();

        let result = SimulatorConfig::from_file(&path);
        assert!(matches!(result, Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_max_tokens() {
        let mut config = SimulatorConfig::default();
        config.simulation.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = SimulatorConfig::default();
        config.simulation.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_persona_source_path_configured() {
        let mut config = SimulatorConfig::default();
        config.personas.path = Some("/data/personas.json".to_string());
        assert_eq!(
            config.persona_source_path(),
            PathBuf::from("/data/personas.json")
        );
    }

    #[test]
    fn test_persona_source_path_default() {
        let config = SimulatorConfig::default();
        let path = config.persona_source_path();
        assert!(path.ends_with("personas.json"));
    }

    #[test]
    fn test_resolve_api_key_from_config() {
        let mut config = SimulatorConfig::default();
        config.backend.api_key = Some("sk-test-123".to_string());
        assert_eq!(config.resolve_api_key().unwrap(), "sk-test-123");
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        SimulatorConfig::init(&path, false).unwrap();
        assert!(path.exists());

        let result = SimulatorConfig::init(&path, false);
        assert!(result.is_err());

        // --force overwrites
        assert!(SimulatorConfig::init(&path, true).is_ok());
    }

    #[test]
    fn test_init_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        SimulatorConfig::init(&path, false).unwrap();
        let config = SimulatorConfig::from_file(&path).unwrap();
        assert!(config.validate().is_ok());
    }
}
