//! Configuration management for rsload.
//!
//! Loads the test definition from a YAML or TOML file (chosen by extension)
//! and the API credential from the environment or a `.env` file.

use crate::error::{Result, RsloadError};
use crate::query::{QueryDefinition, QuerySet};
use crate::report::history::{DEFAULT_DETAILS_NAME, DEFAULT_SUMMARY_NAME};
use crate::run::RunMode;
use crate::target::{Credential, Endpoint, ExecutionMode, Overrides, Target};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable holding the API credential.
pub const API_KEY_VAR: &str = "ROCKSET_APIKEY";

/// Config file used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "./resources/config.yaml";

/// Main configuration structure for rsload.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Name recorded with every result.
    #[serde(default = "default_test_name")]
    pub test_name: String,

    /// Number of cycles to run. Must be at least 1.
    #[serde(default = "default_iterations")]
    pub iterations: i64,

    /// Print result tables to stdout.
    #[serde(default)]
    pub verbose: bool,

    /// Append results to the CSV history files.
    #[serde(default)]
    pub log_output: bool,

    #[serde(default)]
    pub output: OutputConfig,

    pub target: TargetConfig,

    /// Queries of a single unnamed set.
    #[serde(default)]
    pub queries: Vec<QueryDefinition>,

    /// Named sets, dispatched in order after `queries`.
    #[serde(default)]
    pub query_sets: Vec<QuerySetConfig>,
}

fn default_test_name() -> String {
    "rsload".to_string()
}

fn default_iterations() -> i64 {
    1
}

/// Where CSV history goes.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_details_name")]
    pub details_name: String,

    #[serde(default = "default_summary_name")]
    pub summary_name: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./history")
}

fn default_details_name() -> String {
    DEFAULT_DETAILS_NAME.to_string()
}

fn default_summary_name() -> String {
    DEFAULT_SUMMARY_NAME.to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            details_name: default_details_name(),
            summary_name: default_summary_name(),
        }
    }
}

/// The endpoint section.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// API host, with or without an `http(s)://` prefix.
    pub api_server: String,

    #[serde(default)]
    pub execution_mode: ExecutionMode,

    /// Cap on in-flight queries in parallel mode.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Per-request HTTP timeout.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub overrides: Overrides,
}

/// A named query set.
#[derive(Debug, Clone, Deserialize)]
pub struct QuerySetConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub queries: Vec<QueryDefinition>,
}

impl Config {
    /// Loads configuration from a YAML (`.yaml`, `.yml`) or TOML (`.toml`) file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RsloadError::config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::parse_toml(&content, path),
            Some("yaml") | Some("yml") | None => Self::parse_yaml(&content, path),
            Some(other) => Err(RsloadError::config(format!(
                "Unsupported config format '.{other}' for {}. Expected .yaml, .yml or .toml",
                path.display()
            ))),
        }
    }

    fn parse_yaml(content: &str, path: &Path) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            RsloadError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            RsloadError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Builds the target, taking the credential from the caller.
    pub fn target(&self, credential: Credential) -> Result<Target> {
        let host = normalize_api_server(&self.target.api_server)?;
        let mut target = Target::new(Endpoint::https(host), credential)
            .with_mode(self.target.execution_mode)
            .with_overrides(self.target.overrides);

        if let Some(limit) = self.target.max_concurrency {
            let limit = NonZeroUsize::new(limit)
                .ok_or_else(|| RsloadError::config("max_concurrency must be at least 1"))?;
            target = target.with_max_concurrency(limit);
        }
        target.request_timeout_secs = self.target.request_timeout_secs;
        Ok(target)
    }

    /// The query sets to dispatch, numbered from 1.
    pub fn query_sets(&self) -> Result<Vec<QuerySet>> {
        let mut sets = Vec::with_capacity(self.query_sets.len() + 1);
        if !self.queries.is_empty() {
            sets.push((None, self.queries.clone()));
        }
        sets.extend(
            self.query_sets
                .iter()
                .map(|set| (set.name.clone(), set.queries.clone())),
        );

        if sets.is_empty() {
            return Err(RsloadError::config(
                "No queries defined. Add `queries` or `query_sets` to the config file",
            ));
        }

        Ok(sets
            .into_iter()
            .enumerate()
            .map(|(idx, (name, queries))| QuerySet::new(idx + 1, name, queries))
            .collect())
    }

    pub fn run_mode(&self) -> Result<RunMode> {
        RunMode::from_iterations(self.iterations)
    }
}

/// Reads the API credential from the environment, loading `.env` first if present.
pub fn credential_from_env() -> Result<Credential> {
    let _ = dotenvy::dotenv();
    credential_from(std::env::var(API_KEY_VAR).ok())
}

fn credential_from(value: Option<String>) -> Result<Credential> {
    match value {
        Some(secret) if !secret.trim().is_empty() => Ok(Credential::new(secret.trim())),
        _ => Err(RsloadError::config(format!(
            "Did not find {API_KEY_VAR} defined in .env or environment"
        ))),
    }
}

/// Strips any scheme and trailing slash from `api_server` and checks that
/// what remains is a bare host, optionally with a port.
pub fn normalize_api_server(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let without_scheme = ["https://", "http://"]
        .iter()
        .find(|scheme| lower.starts_with(*scheme))
        .map_or(trimmed, |scheme| &trimmed[scheme.len()..]);
    let host = without_scheme.trim_end_matches('/');

    if host.is_empty() {
        return Err(RsloadError::config("target.api_server is empty"));
    }

    let url = Url::parse(&format!("https://{host}"))
        .map_err(|e| RsloadError::config(format!("Invalid api_server '{raw}': {e}")))?;
    if url.host_str().is_none() || url.path() != "/" || url.query().is_some() {
        return Err(RsloadError::config(format!(
            "Invalid api_server '{raw}': expected a host name such as api.usw2a1.rockset.com"
        )));
    }

    Ok(host.to_string())
}
