//! Configuration file handling.
//!
//! This module provides loading and saving of repoaudit configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/repoaudit/config.toml`
//! - macOS: `~/Library/Application Support/repoaudit/config.toml`
//! - Windows: `%APPDATA%\repoaudit\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! dependency_limit = 10
//! default_branch = "main"
//! default_format = "text"
//! pause_ms = 200
//!
//! [manifest_retry]
//! max_retries = 2
//! delay_ms = 2000
//! timeout_secs = 15
//!
//! [narrator]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [ignore]
//! packages = ["@types/*"]
//! vulnerabilities = ["GHSA-xxxx-xxxx-xxxx"]
//! ```

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checker::{OsvChecker, OSV_QUERY_URL};
use crate::fetcher::{ManifestFetcher, RAW_CONTENT_BASE_URL};
use crate::model::DEFAULT_BRANCH;
use crate::retry::RetryPolicy;

/// Application configuration.
///
/// Every table is optional; missing keys fall back to their defaults.
///
/// # Example
///
/// ```no_run
/// use repoaudit::Config;
///
/// let config = Config::load().unwrap();
/// println!("Checking at most {} dependencies", config.dependency_limit);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How many dependencies are queried per scan, in declaration order.
    ///
    /// Default: 10
    pub dependency_limit: usize,

    /// Branch used when the repository URL does not name one.
    ///
    /// Default: "main"
    pub default_branch: String,

    /// Output format used when no `--format` flag is given.
    ///
    /// Valid values: "text", "json", "table"
    /// Default: "text"
    pub default_format: String,

    /// Pause between dependency queries, in milliseconds.
    ///
    /// Default: 200
    pub pause_ms: u64,

    pub endpoints: EndpointConfig,

    /// Retry settings for the manifest download (retried on HTTP 504).
    pub manifest_retry: RetryConfig,

    /// Retry settings for advisory queries (retried on HTTP 429).
    pub lookup_retry: RetryConfig,

    pub narrator: NarratorConfig,

    /// Ignore list configuration for suppressing known issues.
    pub ignore: IgnoreConfig,
}

/// Base URLs of the services the scan talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub manifest_base_url: String,
    pub osv_query_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            manifest_base_url: RAW_CONTENT_BASE_URL.to_string(),
            osv_query_url: OSV_QUERY_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub delay_ms: u64,
    pub timeout_secs: u64,
}

impl RetryConfig {
    fn manifest() -> Self {
        Self {
            max_retries: 2,
            delay_ms: 2000,
            timeout_secs: 15,
        }
    }

    fn lookup() -> Self {
        Self {
            max_retries: 2,
            delay_ms: 1000,
            timeout_secs: 10,
        }
    }

    pub fn policy(&self, retry_on: StatusCode) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.delay_ms),
            vec![retry_on],
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::manifest()
    }
}

/// Settings for the OpenAI-compatible narrator endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key. The key itself is never
    /// written to the config file.
    pub api_key_env: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: Some(0.2),
            max_tokens: None,
            timeout_secs: 120,
        }
    }
}

impl NarratorConfig {
    /// Reads the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Configuration for ignoring specific packages or vulnerabilities.
///
/// Use this to suppress known false positives or accepted risks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names to leave out of the scan.
    ///
    /// Supports glob patterns (e.g., "lodash*", "@types/*").
    pub packages: Vec<String>,

    /// Advisory IDs to drop from findings (e.g., "CVE-2021-12345", "GHSA-xxxx").
    pub vulnerabilities: Vec<String>,
}

impl IgnoreConfig {
    /// Check if a package should be ignored.
    pub fn should_ignore_package(&self, name: &str) -> bool {
        self.packages.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, name)
            } else {
                pattern == name
            }
        })
    }

    /// Check if a vulnerability should be ignored.
    pub fn should_ignore_vulnerability(&self, vuln_id: &str) -> bool {
        self.vulnerabilities.iter().any(|id| id == vuln_id)
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    if !parts[0].is_empty() {
        match remaining.strip_prefix(parts[0]) {
            Some(rest) => remaining = rest,
            None => return false,
        }
    }

    let last_part = parts[parts.len() - 1];
    if !last_part.is_empty() {
        match remaining.strip_suffix(last_part) {
            Some(rest) => remaining = rest,
            None => return false,
        }
    }

    for part in parts[1..parts.len() - 1].iter().filter(|p| !p.is_empty()) {
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dependency_limit: 10,
            default_branch: DEFAULT_BRANCH.to_string(),
            default_format: "text".to_string(),
            pause_ms: 200,
            endpoints: EndpointConfig::default(),
            manifest_retry: RetryConfig::manifest(),
            lookup_retry: RetryConfig::lookup(),
            narrator: NarratorConfig::default(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default config file.
    ///
    /// If the file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from `path`, falling back to defaults when the
    /// file is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to the default config file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("repoaudit")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Manifest fetcher wired to the configured endpoint and retry settings.
    pub fn manifest_fetcher(&self) -> ManifestFetcher {
        ManifestFetcher::new()
            .with_base_url(&self.endpoints.manifest_base_url)
            .with_timeout(self.manifest_retry.timeout())
            .with_retry(self.manifest_retry.policy(StatusCode::GATEWAY_TIMEOUT))
    }

    /// Advisory checker wired to the configured endpoint, cap and ignores.
    pub fn osv_checker(&self) -> OsvChecker {
        OsvChecker::new()
            .with_query_url(&self.endpoints.osv_query_url)
            .with_limit(self.dependency_limit)
            .with_pause(Duration::from_millis(self.pause_ms))
            .with_timeout(self.lookup_retry.timeout())
            .with_retry(self.lookup_retry.policy(StatusCode::TOO_MANY_REQUESTS))
            .with_ignore(self.ignore.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match_exact() {
        assert!(glob_match("lodash", "lodash"));
        assert!(!glob_match("lodash", "underscore"));
    }

    #[test]
    fn test_glob_match_prefix() {
        assert!(glob_match("lodash*", "lodash"));
        assert!(glob_match("lodash*", "lodash.debounce"));
        assert!(!glob_match("lodash*", "underscore"));
    }

    #[test]
    fn test_glob_match_suffix_and_contains() {
        assert!(glob_match("*-cli", "eslint-cli"));
        assert!(!glob_match("*-cli", "eslint"));
        assert!(glob_match("*lodash*", "my-lodash-plugin"));
        assert!(glob_match("a*b*c", "a-x-b-y-c"));
        assert!(!glob_match("a*b*c", "a-x-y-c"));
    }

    #[test]
    fn test_ignore_config_scoped_packages() {
        let config = IgnoreConfig {
            packages: vec!["left-pad".to_string(), "@types/*".to_string()],
            vulnerabilities: vec!["GHSA-xxxx".to_string()],
        };

        assert!(config.should_ignore_package("left-pad"));
        assert!(config.should_ignore_package("@types/node"));
        assert!(!config.should_ignore_package("@babel/core"));
        assert!(config.should_ignore_vulnerability("GHSA-xxxx"));
        assert!(!config.should_ignore_vulnerability("GHSA-yyyy"));
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.dependency_limit, 10);
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.default_format, "text");
        assert_eq!(config.pause_ms, 200);
        assert_eq!(config.manifest_retry.max_retries, 2);
        assert_eq!(config.manifest_retry.delay_ms, 2000);
        assert_eq!(config.lookup_retry.delay_ms, 1000);
        assert_eq!(config.lookup_retry.timeout_secs, 10);
        assert!(config.ignore.packages.is_empty());
    }

    #[test]
    fn test_default_policies_match_builtin() {
        let config = Config::default();
        assert_eq!(
            config.manifest_retry.policy(StatusCode::GATEWAY_TIMEOUT),
            RetryPolicy::gateway_timeout()
        );
        assert_eq!(
            config.lookup_retry.policy(StatusCode::TOO_MANY_REQUESTS),
            RetryPolicy::rate_limited()
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            dependency_limit = 25

            [narrator]
            model = "local-llama"
            "#,
        )
        .unwrap();

        assert_eq!(config.dependency_limit, 25);
        assert_eq!(config.narrator.model, "local-llama");
        assert_eq!(config.narrator.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.lookup_retry, RetryConfig::lookup());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.dependency_limit = 3;
        config.ignore.packages.push("@types/*".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, Config::default());
    }
}
