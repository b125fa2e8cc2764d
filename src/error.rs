//! Error types for persona-sim
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Error context and chaining
//! - Exit codes for CLI
//!
//! The taxonomy mirrors the failure stages of a simulation run: configuration
//! (missing credential, bad config file), persona store (missing or malformed
//! persona source), backend (capability unreachable, call failures), and
//! simulation (bad scenario input). Backend-call failures are the only class
//! eligible for retry; decision extraction never produces an error at all.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,
    MissingCredential = 110,

    // Persona store errors (2xx)
    PersonaSourceNotFound = 200,
    PersonaSourceMalformed = 201,
    PersonaInvalid = 202,

    // Backend errors (3xx)
    BackendUnavailable = 300,
    BackendCallFailed = 301,
    BackendTimeout = 302,
    BackendResponseMalformed = 303,

    // Simulation errors (4xx)
    ScenarioInvalid = 400,
    NoPersonasLoaded = 401,

    // IO errors (5xx)
    IoRead = 500,
    IoWrite = 501,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // Persona store errors
            300..=399 => 30, // Backend errors
            400..=499 => 40, // Simulation errors
            500..=599 => 50, // IO errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the simulator
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Live mode requested but no API credential could be resolved
    #[error("No API credential found: set {variable} or run with --mock")]
    MissingCredential { variable: String },

    // ─────────────────────────────────────────────────────────────
    // Persona Store Errors
    // ─────────────────────────────────────────────────────────────

    /// Persona source file not found
    #[error("Persona source not found: {path}")]
    PersonaSourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persona source could not be parsed into the expected keyed structure
    #[error("Malformed persona source {path}: {message}")]
    PersonaSourceMalformed { path: PathBuf, message: String },

    /// A single persona record is invalid
    #[error("Invalid persona '{cluster_id}': {reason}")]
    PersonaInvalid { cluster_id: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Backend Errors
    // ─────────────────────────────────────────────────────────────

    /// Backend capability cannot be reached at all
    #[error("Reply backend '{name}' unavailable: {message}")]
    BackendUnavailable { name: String, message: String },

    /// A backend call failed (transient failures are retried before this surfaces)
    #[error("Backend call failed for persona '{persona}': {message}")]
    BackendCallFailed { persona: String, message: String },

    /// A backend call timed out
    #[error("Backend call for persona '{persona}' timed out after {timeout_secs}s")]
    BackendTimeout { persona: String, timeout_secs: u64 },

    /// The backend returned a reply the client could not interpret
    #[error("Malformed backend response: {message}")]
    BackendResponseMalformed { message: String },

    // ─────────────────────────────────────────────────────────────
    // Simulation Errors
    // ─────────────────────────────────────────────────────────────

    /// Scenario input (inline or batch file) is invalid
    #[error("Invalid scenario input: {message}")]
    ScenarioInvalid { message: String },

    /// A run operation was attempted with an empty persona set
    #[error("No personas loaded from {path}")]
    NoPersonasLoaded { path: PathBuf },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File write error (record export, config init)
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::MissingCredential { .. } => ErrorCode::MissingCredential,

            Error::PersonaSourceNotFound { .. } => ErrorCode::PersonaSourceNotFound,
            Error::PersonaSourceMalformed { .. } => ErrorCode::PersonaSourceMalformed,
            Error::PersonaInvalid { .. } => ErrorCode::PersonaInvalid,

            Error::BackendUnavailable { .. } => ErrorCode::BackendUnavailable,
            Error::BackendCallFailed { .. } => ErrorCode::BackendCallFailed,
            Error::BackendTimeout { .. } => ErrorCode::BackendTimeout,
            Error::BackendResponseMalformed { .. } => ErrorCode::BackendResponseMalformed,

            Error::ScenarioInvalid { .. } => ErrorCode::ScenarioInvalid,
            Error::NoPersonasLoaded { .. } => ErrorCode::NoPersonasLoaded,

            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(_) => ErrorCode::IoRead,
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is retryable
    ///
    /// Only transient backend-call conditions qualify. Configuration and
    /// persona-store errors are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::BackendCallFailed { .. } | Error::BackendTimeout { .. }
        )
    }

    /// Check if the error is fatal (aborts the current run)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::MissingCredential { .. }
                | Error::PersonaSourceNotFound { .. }
                | Error::PersonaSourceMalformed { .. }
                | Error::BackendUnavailable { .. }
                | Error::Internal(_)
        )
    }

    /// The run stage this error belongs to (load / agent-init / call)
    pub fn stage(&self) -> &'static str {
        match self {
            Error::PersonaSourceNotFound { .. }
            | Error::PersonaSourceMalformed { .. }
            | Error::PersonaInvalid { .. }
            | Error::NoPersonasLoaded { .. } => "load",
            Error::ConfigNotFound { .. }
            | Error::ConfigParse { .. }
            | Error::ConfigValidation { .. }
            | Error::MissingCredential { .. }
            | Error::BackendUnavailable { .. } => "agent-init",
            Error::BackendCallFailed { .. }
            | Error::BackendTimeout { .. }
            | Error::BackendResponseMalformed { .. } => "call",
            _ => "other",
        }
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'persona-sim config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'persona-sim config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values. See documentation for valid options."
            ),
            Error::MissingCredential { .. } => Some(
                "Export your API key (e.g. ANTHROPIC_API_KEY) or pass --mock for an offline run."
            ),

            Error::PersonaSourceNotFound { .. } => Some(
                "Point --personas (or [personas] path in config) at a personas.json file."
            ),
            Error::PersonaSourceMalformed { .. } => Some(
                "The persona file must contain a top-level \"personas\" object keyed by cluster id."
            ),

            Error::BackendUnavailable { .. } => Some(
                "Check network access to the API endpoint, or use --mock to run offline."
            ),
            Error::BackendCallFailed { .. } => Some(
                "The call was retried and still failed. Check API status and rate limits."
            ),
            Error::BackendTimeout { .. } => Some(
                "Increase [backend] timeout_secs in config, or reduce max_tokens."
            ),

            Error::ScenarioInvalid { .. } => Some(
                "Batch files must be a JSON array of objects with a \"text\" field and optional \"name\"."
            ),
            Error::NoPersonasLoaded { .. } => Some(
                "The persona file parsed but contained no persona records."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            code.as_str(),
            self
        );

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        let code = self.code();
        format!("[{}] {}", code.as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a config parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config validation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a missing credential error
    pub fn missing_credential(variable: impl Into<String>) -> Self {
        Error::MissingCredential {
            variable: variable.into(),
        }
    }

    /// Create a malformed persona source error
    pub fn persona_source_malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::PersonaSourceMalformed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid persona error
    pub fn persona_invalid(cluster_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::PersonaInvalid {
            cluster_id: cluster_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a backend unavailable error
    pub fn backend_unavailable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::BackendUnavailable {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a backend call failed error
    pub fn backend_call_failed(persona: impl Into<String>, message: impl Into<String>) -> Self {
        Error::BackendCallFailed {
            persona: persona.into(),
            message: message.into(),
        }
    }

    /// Create an invalid scenario error
    pub fn scenario_invalid(message: impl Into<String>) -> Self {
        Error::ScenarioInvalid {
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
