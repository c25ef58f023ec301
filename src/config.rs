//! Configuration loading and test-framework detection.
//!
//! Resolution order, highest precedence first: CLI flags (project root only)
//! → environment variables → workspace `tdd.properties` → built-in defaults.
//! The `tdd.properties` format is plain `key=value` lines with `#` comments;
//! it is part of the external contract and stays hand-parsed.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default model when `TDD_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default per-Bash-call wall-clock timeout in seconds.
pub const DEFAULT_BASH_TIMEOUT_SECS: u64 = 120;

/// Default per-LLM-call timeout in seconds.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 300;

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace root; everything the agents touch lives under it.
    pub project_root: PathBuf,
    /// LLM auth secret; absent for commands that never call the LLM.
    pub api_key: Option<String>,
    /// Opaque model identifier passed to the LLM capability.
    pub model: String,
    /// Maximum retries per phase before abort.
    pub max_retries: u32,
    /// Per-Bash-call wall-clock timeout.
    pub bash_timeout: Duration,
    /// Per-LLM-call timeout.
    pub llm_timeout: Duration,
    /// Command the agents run for the project's test suite; absent when no
    /// framework was detected and `test.command` is unset.
    pub test_command: Option<String>,
}

impl Config {
    /// Load configuration for the given workspace root (CLI flag wins over
    /// `TDD_PROJECT_ROOT`, which wins over the current directory).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unusable project root, malformed integer
    /// values, or when no test framework can be detected and `test.command`
    /// is unset.
    pub fn load(cli_root: Option<PathBuf>) -> Result<Self, ConfigError> {
        let project_root = cli_root
            .or_else(|| std::env::var_os("TDD_PROJECT_ROOT").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));
        if !project_root.is_dir() {
            return Err(ConfigError::BadProjectRoot(project_root));
        }
        let project_root = project_root
            .canonicalize()
            .map_err(|source| ConfigError::Io {
                path: project_root.clone(),
                source,
            })?;

        let properties = load_properties(&project_root.join("tdd.properties"))?;

        let max_retries = match std::env::var("TDD_MAX_RETRIES") {
            Ok(raw) => parse_u64("TDD_MAX_RETRIES", &raw)? as u32,
            Err(_) => crate::types::MAX_RETRIES_PER_PHASE,
        };

        let model =
            std::env::var("TDD_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let bash_timeout = match properties.get("bash.timeout") {
            Some(raw) => Duration::from_secs(parse_u64("bash.timeout", raw)?),
            None => Duration::from_secs(DEFAULT_BASH_TIMEOUT_SECS),
        };

        let llm_timeout = match properties.get("llm.timeout") {
            Some(raw) => Duration::from_secs(parse_u64("llm.timeout", raw)?),
            None => Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        };

        let test_command = match properties.get("test.command") {
            Some(cmd) if !cmd.trim().is_empty() => Some(cmd.trim().to_string()),
            _ => detect_test_command(&project_root),
        };
        debug!(test_command = ?test_command, root = %project_root.display(), "resolved configuration");

        Ok(Self {
            project_root,
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            model,
            max_retries,
            bash_timeout,
            llm_timeout,
            test_command,
        })
    }

    /// The API key, required for commands that invoke the LLM.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnv` when `ANTHROPIC_API_KEY` is unset.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingEnv("ANTHROPIC_API_KEY"))
    }

    /// The test command, required before the first phase can run.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoTestCommand` when no framework was detected
    /// and `test.command` is unset.
    pub fn require_test_command(&self) -> Result<&str, ConfigError> {
        self.test_command
            .as_deref()
            .ok_or(ConfigError::NoTestCommand)
    }
}

/// Parse a `key=value` properties file. Missing file is an empty map.
fn load_properties(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let mut map = HashMap::new();
    if !path.is_file() {
        return Ok(map);
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(map)
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Detect the project's test command from its build files, first match wins.
///
/// Returns `None` when no known framework marker is present.
#[must_use]
pub fn detect_test_command(root: &Path) -> Option<String> {
    if root.join("pom.xml").is_file() {
        return Some("mvn test".to_string());
    }
    if root.join("build.gradle").is_file() || root.join("build.gradle.kts").is_file() {
        return Some("./gradlew test".to_string());
    }
    if let Ok(raw) = std::fs::read_to_string(root.join("package.json"))
        && let Ok(pkg) = serde_json::from_str::<serde_json::Value>(&raw)
        && pkg
            .get("scripts")
            .and_then(|scripts| scripts.get("test"))
            .is_some()
    {
        return Some("npm test".to_string());
    }
    if root.join("pytest.ini").is_file()
        || root.join("pyproject.toml").is_file()
        || root.join("setup.py").is_file()
    {
        return Some("pytest".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_properties_parses_pairs_and_skips_comments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tdd.properties");
        fs::write(
            &path,
            "# comment\nbash.timeout = 30\ntest.command=make check\n\nbroken line\n",
        )
        .unwrap();
        let props = load_properties(&path).unwrap();
        assert_eq!(props.get("bash.timeout").map(String::as_str), Some("30"));
        assert_eq!(
            props.get("test.command").map(String::as_str),
            Some("make check")
        );
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn test_load_properties_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let props = load_properties(&dir.path().join("tdd.properties")).unwrap();
        assert!(props.is_empty());
    }

    #[test]
    fn test_parse_u64_rejects_garbage() {
        let err = parse_u64("bash.timeout", "soon").unwrap_err();
        assert!(err.to_string().contains("bash.timeout"));
    }

    #[test]
    fn test_detect_maven_first() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pom.xml"), "<project/>").unwrap();
        fs::write(dir.path().join("setup.py"), "").unwrap();
        assert_eq!(
            detect_test_command(dir.path()),
            Some("mvn test".to_string())
        );
    }

    #[test]
    fn test_detect_gradle_kts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("build.gradle.kts"), "").unwrap();
        assert_eq!(
            detect_test_command(dir.path()),
            Some("./gradlew test".to_string())
        );
    }

    #[test]
    fn test_detect_npm_requires_test_script() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name": "x"}"#).unwrap();
        assert_eq!(detect_test_command(dir.path()), None);

        fs::write(
            dir.path().join("package.json"),
            r#"{"scripts": {"test": "jest"}}"#,
        )
        .unwrap();
        assert_eq!(detect_test_command(dir.path()), Some("npm test".to_string()));
    }

    #[test]
    fn test_detect_pytest_markers() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pyproject.toml"), "").unwrap();
        assert_eq!(detect_test_command(dir.path()), Some("pytest".to_string()));
    }

    #[test]
    fn test_detect_nothing() {
        let dir = TempDir::new().unwrap();
        assert_eq!(detect_test_command(dir.path()), None);
    }
}
