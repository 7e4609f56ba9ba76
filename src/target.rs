//! The query-serving endpoint under test.
//!
//! A [`Target`] is built once by the configuration layer and shared read-only
//! by every query of a dispatch. Reporters never see it directly: the run
//! controller hands them a [`PublishedTarget`], whose credential is masked.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::Deserialize;

/// Prefix used in place of the hidden part of a masked credential.
const MASK_PREFIX: &str = "******";

/// Number of trailing credential characters kept visible after masking.
const VISIBLE_SUFFIX_LEN: usize = 4;

/// How the queries of a set are submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One query at a time, each completing before the next starts.
    #[default]
    Serial,
    /// All queries submitted concurrently.
    Parallel,
}

impl ExecutionMode {
    /// Returns the mode as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "parallel" => Ok(Self::Parallel),
            _ => Err(format!(
                "Unexpected query set execution mode: {s}. Expected: serial or parallel"
            )),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target-level behaviour overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Overrides {
    /// Ask the target to discard result rows for every SQL query.
    #[serde(default)]
    pub drop_results: bool,
}

/// Capacity settings reported by the target. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CapacityInfo {
    /// Virtual instance size (e.g. "LARGE").
    #[serde(default)]
    pub vi_size: Option<String>,
    #[serde(default)]
    pub aggregator_parallelism: Option<u64>,
    #[serde(default)]
    pub concurrent_queries_limit: Option<u64>,
    #[serde(default)]
    pub concurrent_query_execution_limit: Option<u64>,
}

/// Host and scheme of the query API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    tls: bool,
}

impl Endpoint {
    /// An HTTPS endpoint. This is the only form the configuration layer builds.
    pub fn https(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            tls: true,
        }
    }

    /// A plain HTTP endpoint, for local mock servers.
    pub fn insecure(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            tls: false,
        }
    }

    /// Host (and optional port) without scheme.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Full URL for an API path. `path` must start with `/`.
    pub fn url_for(&self, path: &str) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}{path}", self.host)
    }
}

/// API credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for building the authorization header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Irreversibly masks the credential, keeping only its last four characters.
    ///
    /// Secrets of four characters or fewer are masked entirely.
    pub fn mask(&self) -> MaskedCredential {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= VISIBLE_SUFFIX_LEN {
            return MaskedCredential(MASK_PREFIX.to_string());
        }
        let suffix: String = chars[chars.len() - VISIBLE_SUFFIX_LEN..].iter().collect();
        MaskedCredential(format!("{MASK_PREFIX}{suffix}"))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.mask())
    }
}

/// A credential after masking. Safe to print and persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedCredential(String);

impl MaskedCredential {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaskedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The endpoint under test plus everything needed to talk to it.
#[derive(Debug, Clone)]
pub struct Target {
    pub endpoint: Endpoint,
    pub credential: Credential,
    pub mode: ExecutionMode,
    /// Upper bound on in-flight queries in parallel mode. `None` means one worker per query.
    pub max_concurrency: Option<NonZeroUsize>,
    /// Per-request timeout for the HTTP client. `None` leaves the client default.
    pub request_timeout_secs: Option<u64>,
    pub overrides: Overrides,
    pub capacity: CapacityInfo,
}

impl Target {
    /// Creates a serial target with no overrides.
    pub fn new(endpoint: Endpoint, credential: Credential) -> Self {
        Self {
            endpoint,
            credential,
            mode: ExecutionMode::default(),
            max_concurrency: None,
            request_timeout_secs: None,
            overrides: Overrides::default(),
            capacity: CapacityInfo::default(),
        }
    }

    /// Sets the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Caps the number of in-flight queries in parallel mode.
    pub fn with_max_concurrency(mut self, limit: NonZeroUsize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    /// Sets the target-level overrides.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Produces the reporter-facing view with the credential masked.
    ///
    /// Must only be called once every dispatch that needs the live credential
    /// for the current handoff has completed.
    pub fn publish(&self) -> PublishedTarget {
        PublishedTarget {
            host: self.endpoint.host().to_string(),
            credential: self.credential.mask(),
            mode: self.mode,
            overrides: self.overrides,
            capacity: self.capacity.clone(),
        }
    }
}

/// A [`Target`] as seen by display and persistence collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedTarget {
    pub host: String,
    pub credential: MaskedCredential,
    pub mode: ExecutionMode,
    pub overrides: Overrides,
    pub capacity: CapacityInfo,
}
