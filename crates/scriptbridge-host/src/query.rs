//! Native ledger queries.
//!
//! Queries are opaque to the bridge: the expression goes straight to the
//! ledger's own query engine and the raw result rows come back as decoded
//! JSON. Platforms without native query support surface that as an
//! ordinary callback error, not a crash.

use std::sync::Arc;

use scriptbridge_common::coordinator::ScanCoordinator;
use scriptbridge_common::error::ServiceError;
use scriptbridge_common::ledger::LedgerStub;
use scriptbridge_core::Args;
use tracing::debug;

use crate::registry::{ServiceObject, ServiceReply};

/// Runs one native query under the scan coordinator and decodes the rows.
///
/// Shared by the query service and the data service's `execute_query`.
pub(crate) fn run_native_query(
    stub: &Arc<dyn LedgerStub>,
    coordinator: &ScanCoordinator,
    query_string: &str,
) -> Result<ServiceReply, ServiceError> {
    debug!(query = %query_string, "Executing native query");
    let rows = coordinator.serialize_scan(|| stub.execute_query(query_string))?;

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        let object: serde_json::Value = serde_json::from_slice(&row)
            .map_err(|err| ServiceError::failed(format!("Failed to parse query result: {err}")))?;
        results.push(object);
    }
    Ok(ServiceReply::json(serde_json::Value::Array(results)))
}

pub struct QueryService {
    stub: Arc<dyn LedgerStub>,
    coordinator: ScanCoordinator,
}

impl QueryService {
    pub fn new(stub: Arc<dyn LedgerStub>, coordinator: ScanCoordinator) -> Self {
        Self { stub, coordinator }
    }
}

impl ServiceObject for QueryService {
    fn invoke(&self, method: &str, args: Args<'_>) -> Result<ServiceReply, ServiceError> {
        match method {
            "query_native" => run_native_query(
                &self.stub,
                &self.coordinator,
                args.text(0, "query_string")?,
            ),
            other => Err(ServiceError::violation(format!(
                "unknown query service method '{other}'"
            ))),
        }
    }
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService").finish_non_exhaustive()
    }
}
