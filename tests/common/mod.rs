//! Common test utilities and fixtures
//!
//! This module provides shared test infrastructure

use std::path::PathBuf;

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// Get the valid personas fixture path
pub fn personas_fixture() -> PathBuf {
    fixture_path("personas.json")
}

/// Get the malformed personas fixture path (missing "personas" key)
pub fn invalid_personas_fixture() -> PathBuf {
    fixture_path("personas_invalid.json")
}

/// Get the batch scenarios fixture path
pub fn scenarios_fixture() -> PathBuf {
    fixture_path("scenarios.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_exist() {
        assert!(fixtures_dir().exists(), "Fixtures directory should exist");
        assert!(personas_fixture().exists());
        assert!(invalid_personas_fixture().exists());
        assert!(scenarios_fixture().exists());
    }
}
