//! Connectivity check and capacity discovery before a run.
//!
//! Reads the virtual instance size and the org's query limits. The values are
//! informational: they are attached to reports, never used for scheduling.

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, RsloadError};
use crate::target::{CapacityInfo, Target};
use crate::transport::{QueryTransport, TransportResponse};

pub const VIRTUAL_INSTANCES_PATH: &str = "/v1/orgs/self/virtualinstances";
pub const ORG_SETTINGS_PATH: &str = "/v1/orgs/self/settings";

#[derive(Debug, Deserialize)]
struct VirtualInstances {
    #[serde(default)]
    data: Vec<VirtualInstance>,
}

#[derive(Debug, Deserialize)]
struct VirtualInstance {
    current_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrgSettings {
    data: OrgLimits,
}

#[derive(Debug, Deserialize)]
struct OrgLimits {
    aggregator_parallelism: Option<u64>,
    concurrent_queries_limit: Option<u64>,
    concurrent_query_execution_limit: Option<u64>,
}

/// Verifies the target accepts the credential and reads its capacity settings.
pub async fn discover(transport: &dyn QueryTransport, target: &Target) -> Result<CapacityInfo> {
    debug!(host = %target.endpoint.host(), "running preflight");

    let response = transport
        .get(&target.endpoint, VIRTUAL_INSTANCES_PATH, &target.credential)
        .await?;
    if response.status == 401 {
        return Err(RsloadError::connection(
            "Authorization failure connecting to target",
        ));
    }
    let instances: VirtualInstances = parse_ok(&response, "Unable to connect to target server")?;
    let vi_size = instances
        .data
        .into_iter()
        .next()
        .and_then(|vi| vi.current_type);

    let response = transport
        .get(&target.endpoint, ORG_SETTINGS_PATH, &target.credential)
        .await?;
    let settings: OrgSettings = parse_ok(&response, "Unable to get org information from server")?;

    let capacity = CapacityInfo {
        vi_size,
        aggregator_parallelism: settings.data.aggregator_parallelism,
        concurrent_queries_limit: settings.data.concurrent_queries_limit,
        concurrent_query_execution_limit: settings.data.concurrent_query_execution_limit,
    };
    info!(
        vi_size = capacity.vi_size.as_deref().unwrap_or("unknown"),
        aggregator_parallelism = ?capacity.aggregator_parallelism,
        concurrent_queries_limit = ?capacity.concurrent_queries_limit,
        concurrent_query_execution_limit = ?capacity.concurrent_query_execution_limit,
        "target reachable"
    );
    Ok(capacity)
}

fn parse_ok<T: for<'de> Deserialize<'de>>(response: &TransportResponse, context: &str) -> Result<T> {
    if response.status != 200 {
        return Err(RsloadError::connection(format!(
            "{context}. {}. {}",
            response.reason, response.body
        )));
    }
    serde_json::from_str(&response.body)
        .map_err(|e| RsloadError::response(format!("{context}: unexpected body: {e}")))
}
