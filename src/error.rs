use thiserror::Error;

/// Scopes a token needs for every action this tool performs.
pub const REQUIRED_SCOPES: &[&str] = &["repo", "workflow", "read:project", "write:project"];

/// A failure reported by a remote transport, already classified.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Rate limiting or brief server unavailability. Safe to retry.
    #[error("transient API failure: {0}")]
    Transient(String),

    /// The token lacks a scope. Retrying cannot fix this.
    #[error("token is missing required permissions: {0}")]
    Permission(String),

    #[error("API request failed: {0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{operation} gave no result after exhausting retries")]
    Exhausted { operation: &'static str },

    #[error("could not decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation} response is missing {what}")]
    MissingData {
        operation: &'static str,
        what: &'static str,
    },

    #[error("repository {owner}/{name} could not be found or created")]
    RepositoryUnavailable { owner: String, name: String },

    #[error("project '{name}' not found for owner {owner}")]
    ProjectNotFound { owner: String, name: String },
}

impl SyncError {
    /// Permission failures end the whole run; everything else is scoped to
    /// the item or action that hit it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Api(ApiError::Permission(_)))
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
