use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GraphQL error: {}", .0.join("; "))]
    Graphql(Vec<String>),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gh CLI failed: {0}")]
    Cli(String),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Conflicts the platform reports when the thing we tried to create is
    /// already there.
    pub fn is_already_exists(&self) -> bool {
        match self {
            ApiError::Status { status: 422, .. } => true,
            ApiError::Graphql(messages) => messages.iter().any(|m| {
                let m = m.to_lowercase();
                m.contains("already exists")
                    || m.contains("duplicate")
                    || m.contains("already been taken")
            }),
            _ => false,
        }
    }
}
