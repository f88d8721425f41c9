pub mod github;
pub mod operation;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiError;
pub use operation::Operation;

/// Executes one named operation against a remote and hands back the `data`
/// payload, or a classified failure.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self, op: Operation, variables: Value) -> Result<Value, ApiError>;
}
