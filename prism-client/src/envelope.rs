use serde::Deserialize;

use crate::error::ApiError;

/// The `{success, data, message}` wrapper every JSON endpoint answers with.
///
/// The deployed backend reports the outcome as `status: "success" | "error"`
/// instead of a boolean, so both spellings are accepted.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    status: Option<String>,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool {
        match (self.success, self.status.as_deref()) {
            (Some(flag), _) => flag,
            (None, Some(status)) => status.eq_ignore_ascii_case("success"),
            // Neither marker present: the HTTP status already said 2xx.
            (None, None) => true,
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Unwrap the payload, turning a failed envelope into [`ApiError::Backend`].
    pub fn into_result(self, call: &str) -> Result<T, ApiError> {
        if !self.is_success() {
            return Err(ApiError::backend(
                call,
                self.message.unwrap_or_else(|| "request failed".to_string()),
            ));
        }

        self.data
            .ok_or_else(|| ApiError::parse(call, "envelope carried no data"))
    }

    /// Check the outcome of an envelope whose payload is not needed.
    pub fn into_unit(self, call: &str) -> Result<(), ApiError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(ApiError::backend(
                call,
                self.message.unwrap_or_else(|| "request failed".to_string()),
            ))
        }
    }
}
