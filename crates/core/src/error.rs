#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing or malformed collaborator credentials. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The collaborator answered, and the answer was "no" (KYC declined,
    /// payment account refused). The step may be re-initiated.
    #[error("{provider} rejected the request: {message}")]
    Rejected {
        provider: &'static str,
        message: String,
    },

    /// Network failure or unexpected response from a collaborator.
    #[error("{provider} request failed: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing talent record.
    pub fn talent_not_found(talent_id: &str) -> Self {
        Self::NotFound {
            entity: "Talent",
            id: talent_id.to_string(),
        }
    }
}
