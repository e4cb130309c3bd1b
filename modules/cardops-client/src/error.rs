use thiserror::Error;

use crate::types::ApiFieldError;

pub type Result<T> = std::result::Result<T, CardOpsError>;

#[derive(Debug, Error)]
pub enum CardOpsError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    /// A 401 on a call that resets the session. Callers must drop local
    /// session state and send the user back to the login screen.
    #[error("Session expired. Redirecting to login.")]
    SessionExpired,

    /// The backend answered with `success: false`.
    #[error("{description}")]
    Rejected {
        title: Option<String>,
        description: String,
        code: Option<String>,
        errors: Vec<ApiFieldError>,
    },

    #[error("Malformed response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl CardOpsError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, CardOpsError::SessionExpired)
    }

    /// Network failures, non-2xx answers and unreadable bodies. These are
    /// the failures a polling loop is allowed to ride out.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            CardOpsError::Network(_)
                | CardOpsError::Http { .. }
                | CardOpsError::MalformedEnvelope(_)
                | CardOpsError::Parse(_)
        )
    }
}

impl From<reqwest::Error> for CardOpsError {
    fn from(err: reqwest::Error) -> Self {
        CardOpsError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for CardOpsError {
    fn from(err: serde_json::Error) -> Self {
        CardOpsError::Parse(err.to_string())
    }
}
