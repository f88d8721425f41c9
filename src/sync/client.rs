use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

use super::paginate;
use super::retry::{execute_with_policy, RetryPolicy};
use crate::error::{SyncError, SyncResult};
use crate::model::repo::Connection;
use crate::remote::{Operation, Transport};

#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn name(&self) -> &str {
        self.transport.name()
    }

    /// `Ok(None)` when transient failures outlasted the retry budget.
    pub async fn call(&self, op: Operation, variables: Value) -> SyncResult<Option<Value>> {
        let transport = &self.transport;
        let result = execute_with_policy(&self.policy, op.name(), || {
            transport.execute(op, variables.clone())
        })
        .await?;
        Ok(result)
    }

    pub async fn require(&self, op: Operation, variables: Value) -> SyncResult<Value> {
        self.call(op, variables)
            .await?
            .ok_or(SyncError::Exhausted {
                operation: op.name(),
            })
    }

    /// A mutation whose failure only costs the item it belongs to: anything
    /// but a permission failure is logged and reported as `Ok(None)`.
    pub async fn mutate(&self, op: Operation, variables: Value, what: &str) -> SyncResult<Option<Value>> {
        match self.call(op, variables).await {
            Ok(Some(data)) => Ok(Some(data)),
            Ok(None) => {
                warn!("{what}: giving up after retries, skipping");
                Ok(None)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                error!("{what} failed: {e}");
                Ok(None)
            }
        }
    }

    /// Fetch every node of the connection found at `pointer` in the payload.
    /// A `null` along the pointer (an absent repository, say) reads as an
    /// empty connection.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        op: Operation,
        variables: Value,
        pointer: &str,
    ) -> SyncResult<Vec<T>> {
        paginate::fetch_all(|cursor| {
            let mut vars = variables.clone();
            vars["cursor"] = cursor.map_or(Value::Null, Value::String);
            async move {
                let data = self.require(op, vars).await?;
                match data.pointer(pointer) {
                    None | Some(Value::Null) => Ok(Connection::default()),
                    Some(conn) => decode(op, conn.clone()),
                }
            }
        })
        .await
    }
}

pub fn decode<T: DeserializeOwned>(op: Operation, value: Value) -> SyncResult<T> {
    serde_json::from_value(value).map_err(|source| SyncError::Decode {
        operation: op.name(),
        source,
    })
}

pub fn string_at(op: Operation, data: &Value, pointer: &str, what: &'static str) -> SyncResult<String> {
    data.pointer(pointer)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or(SyncError::MissingData {
            operation: op.name(),
            what,
        })
}

/// The id a create mutation answered with. GitHub can answer with data but
/// a null payload (`{"createIssue": null}`) when a referenced node did not
/// resolve; that is logged and costs only the item.
pub fn created_id(op: Operation, data: &Value, pointer: &str, what: &str) -> Option<String> {
    let id = data.pointer(pointer).and_then(Value::as_str).map(String::from);
    if id.is_none() {
        error!(operation = op.name(), "{what}: no id in the response, skipping");
    }
    id
}
