use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use super::{Operation, Transport};
use crate::error::ApiError;

const GRAPHQL_URL: &str = "https://api.github.com/graphql";
const USER_AGENT: &str = concat!("gh-migrate/", env!("CARGO_PKG_VERSION"));

pub struct GitHubTransport {
    label: String,
    token: String,
    client: reqwest::Client,
}

impl GitHubTransport {
    pub fn new(label: impl Into<String>, token: String) -> Self {
        Self {
            label: label.into(),
            token,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct GqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GqlError>,
}

#[derive(Debug, Deserialize)]
struct GqlError {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Statuses GitHub uses for primary/secondary rate limits and gateway hiccups.
fn classify_status(status: StatusCode) -> Option<ApiError> {
    if status.is_success() {
        return None;
    }
    let retryable = matches!(
        status,
        StatusCode::FORBIDDEN
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );
    let msg = format!("HTTP {status}");
    Some(if retryable {
        ApiError::Transient(msg)
    } else {
        ApiError::Other(msg)
    })
}

fn classify_errors(errors: &[GqlError]) -> ApiError {
    if let Some(e) = errors
        .iter()
        .find(|e| e.kind.as_deref() == Some("INSUFFICIENT_SCOPES"))
    {
        return ApiError::Permission(e.message.clone());
    }
    if let Some(e) = errors.iter().find(|e| e.kind.as_deref() == Some("RATE_LIMITED")) {
        return ApiError::Transient(e.message.clone());
    }
    let msg = errors
        .first()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| "Unknown GraphQL error".into());
    ApiError::Other(msg)
}

/// Turn a decoded response into the payload the engine sees. Lookups of
/// absent objects come back as NOT_FOUND errors next to `null` data; those
/// are answers, not failures.
fn into_payload(gql: GqlResponse) -> Result<Value, ApiError> {
    let only_not_found = gql
        .errors
        .iter()
        .all(|e| e.kind.as_deref() == Some("NOT_FOUND"));
    match gql.data {
        Some(data) if gql.errors.is_empty() || only_not_found => Ok(data),
        _ if !gql.errors.is_empty() => Err(classify_errors(&gql.errors)),
        _ => Err(ApiError::Other("No data in GitHub response".into())),
    }
}

#[async_trait]
impl Transport for GitHubTransport {
    fn name(&self) -> &str {
        &self.label
    }

    async fn execute(&self, op: Operation, variables: Value) -> Result<Value, ApiError> {
        trace!(remote = %self.label, operation = op.name(), "executing");
        let body = serde_json::json!({ "query": op.document(), "variables": variables });
        let resp = self
            .client
            .post(GRAPHQL_URL)
            .header("Authorization", format!("bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ApiError::Transient(e.to_string())
                } else {
                    ApiError::Other(format!("GitHub API request failed: {e}"))
                }
            })?;

        if let Some(err) = classify_status(resp.status()) {
            return Err(err);
        }

        let gql: GqlResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Other(format!("Failed to parse GitHub response: {e}")))?;
        into_payload(gql)
    }
}
