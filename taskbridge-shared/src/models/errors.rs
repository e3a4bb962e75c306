use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error envelope returned by non-problem-details endpoints and consumed by
/// the CLI when rendering failures.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct ErrorResponse {
    /// The main error message
    pub message: String,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Creates a new error response with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new error response with message and details.
    pub fn with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Some(details.into()),
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {}", self.message, details),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ErrorResponse {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_details_when_present() {
        assert_eq!(format!("{}", ErrorResponse::new("boom")), "boom");
        assert_eq!(
            format!("{}", ErrorResponse::with_details("boom", "db down")),
            "boom: db down"
        );
    }

    #[test]
    fn round_trips_through_json() {
        let error = ErrorResponse::with_details("rejected", "missing recipient");
        let json = serde_json::to_string(&error).unwrap();
        let back: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, error);
    }
}
