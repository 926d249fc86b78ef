use thiserror::Error;

/// Errors surfaced by the HTTP adapter and by every backend implementation.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{call} failed to reach the backend: {reason}")]
    Network { call: String, reason: String },
    #[error("{call} was rejected: {message}")]
    Backend {
        call: String,
        status: Option<u16>,
        message: String,
    },
    #[error("Session expired or invalid. Run `prism login` or `prism guest` to authenticate.")]
    Unauthorized,
    #[error("Failed to parse {call} response: {reason}")]
    Parse { call: String, reason: String },
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn backend(call: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            call: call.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn parse(call: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            call: call.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
