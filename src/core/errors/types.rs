//! Core error types for the gateway.
//!
//! Every layer reports failures through [`GatewayError`]. The HTTP layer turns
//! the error into an envelope whose `resultcode` matches the status returned by
//! [`GatewayError::status_code`].

use thiserror::Error;

/// Errors that can occur while serving a recognition request.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request itself is malformed (missing file, bad base64, bad URL).
    #[error("{0}")]
    InvalidInput(String),

    /// The uploaded file does not have an accepted extension.
    #[error("{0}")]
    UnsupportedFormat(String),

    /// A remote resource could not be fetched.
    #[error("Failed to download: {0}")]
    Download(String),

    /// The bytes could not be decoded as an image.
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    /// The PDF could not be loaded or rendered.
    #[error("PDF processing failed: {0}")]
    Pdf(String),

    /// A required model file is missing.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The engine configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The engine failed while running inference.
    #[error("Recognition failed: {0}")]
    Recognition(String),

    /// The requested pipeline is not available in this deployment.
    #[error("{0}")]
    NotConfigured(String),
}

impl GatewayError {
    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat(message.into())
    }

    /// Creates a recognition error from any displayable engine failure.
    pub fn recognition(err: impl std::fmt::Display) -> Self {
        Self::Recognition(err.to_string())
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_)
            | Self::UnsupportedFormat(_)
            | Self::Download(_)
            | Self::ImageDecode(_) => 400,
            Self::NotConfigured(_) => 503,
            Self::Pdf(_)
            | Self::ModelNotFound(_)
            | Self::Config(_)
            | Self::Recognition(_) => 500,
        }
    }

    /// Returns true if the caller is at fault.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<image::ImageError> for GatewayError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageDecode(err.to_string())
    }
}

impl From<tokio::task::JoinError> for GatewayError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Recognition(format!("worker task aborted: {err}"))
    }
}

/// Result alias used throughout the crate.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::invalid_input("x").status_code(), 400);
        assert_eq!(GatewayError::unsupported_format("x").status_code(), 400);
        assert_eq!(GatewayError::Download("x".into()).status_code(), 400);
        assert_eq!(GatewayError::ImageDecode("x".into()).status_code(), 400);
        assert_eq!(GatewayError::Pdf("x".into()).status_code(), 500);
        assert_eq!(GatewayError::ModelNotFound("x".into()).status_code(), 500);
        assert_eq!(GatewayError::recognition("x").status_code(), 500);
        assert_eq!(GatewayError::NotConfigured("x".into()).status_code(), 503);
    }

    #[test]
    fn test_client_error_classification() {
        assert!(GatewayError::invalid_input("bad").is_client_error());
        assert!(!GatewayError::Pdf("broken".into()).is_client_error());
        assert!(!GatewayError::NotConfigured("off".into()).is_client_error());
    }

    #[test]
    fn test_display_messages() {
        let err = GatewayError::Download("HTTP error: 404 Not Found".into());
        assert_eq!(err.to_string(), "Failed to download: HTTP error: 404 Not Found");

        let err = GatewayError::unsupported_format("Please upload a PDF file");
        assert_eq!(err.to_string(), "Please upload a PDF file");
    }
}
