use async_trait::async_trait;
use serde_json::Value;
use tracing::error;

use crate::{Error, Result};

pub const GRAPHQL_URL: &str = "https://leetcode.com/graphql/";
pub const BASE_URL: &str = "https://leetcode.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Posts GraphQL operations to the service.
///
/// Implementations live behind `Arc<dyn GraphqlTransport>` so the engine can
/// run against the live endpoint or a scripted stand-in.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    /// Executes one operation and returns the parsed response body.
    ///
    /// `Err` covers connection, status, and decode failures; a 2xx body is
    /// returned as-is, including any `errors` key the service put in it.
    async fn execute(&self, query: &str, variables: Value, operation_name: &str) -> Result<Value>;
}

/// Best-effort execution: failures are logged and collapse to `None`.
///
/// A 2xx body carrying an `errors` key counts as a failure too; the service
/// reports per-operation problems that way instead of via status codes.
/// Harvest call sites treat `None` as "no data" and degrade locally.
pub(crate) async fn execute_logged(
    transport: &dyn GraphqlTransport,
    query: &str,
    variables: Value,
    operation_name: &str,
) -> Option<Value> {
    match transport.execute(query, variables, operation_name).await {
        Ok(body) => {
            if let Some(errors) = body.get("errors") {
                error!(operation = operation_name, %errors, "graphql error in response");
                return None;
            }
            Some(body)
        }
        Err(e) => {
            error!(operation = operation_name, error = %e, "request failed");
            None
        }
    }
}

/// Live transport over reqwest.
#[derive(Debug, Clone)]
pub struct HttpGraphqlTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGraphqlTransport {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl GraphqlTransport for HttpGraphqlTransport {
    #[tracing::instrument(level = "debug", skip(self, query, variables))]
    async fn execute(&self, query: &str, variables: Value, operation_name: &str) -> Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "query": query,
                "variables": variables,
                "operationName": operation_name,
            }))
            .send()
            .await
            .map_err(|e| Error::transport(format!("post {operation_name}"), e))?;

        let response = response
            .error_for_status()
            .map_err(|e| Error::transport(format!("status for {operation_name}"), e))?;

        response
            .json()
            .await
            .map_err(|e| Error::transport(format!("decode {operation_name} body"), e))
    }
}
