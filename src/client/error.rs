use reqwest::StatusCode;
use thiserror::Error;

/// Every way a client call can fail.
///
/// `Display` is the string shown to users: for server-reported failures it is
/// the server's `error` text, unchanged.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response.
    #[error("{message}")]
    HttpStatus {
        status: StatusCode,
        message: String,
        code: Option<String>,
    },

    /// 2xx response carrying `success: false`.
    #[error("{message}")]
    Application { code: Option<String>, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Not signed in")]
    SignedOut,
}

impl ApiError {
    /// Message used when a failed response has no readable `error` field.
    pub fn fallback_message(status: StatusCode) -> String {
        format!("API Error: {}", status.as_u16())
    }

    /// Machine-readable code from the server, when it sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::HttpStatus { code, .. } | ApiError::Application { code, .. } => {
                code.as_deref()
            }
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
