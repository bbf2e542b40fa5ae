// ABOUTME: Error types for sandbox providers and their backend API clients
// ABOUTME: Maps raw transport failures into operation-specific, descriptive errors

use thiserror::Error;

/// Errors surfaced to callers of a sandbox provider or the factory
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Unknown sandbox provider '{name}'. Supported providers: {supported}")]
    UnknownProvider { name: String, supported: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No active sandbox: call create_sandbox() before {operation}")]
    NoActiveSandbox { operation: &'static str },

    #[error("Failed to create sandbox: {0}")]
    Provision(String),

    #[error("Failed to write file {path}: {reason}")]
    WriteFile { path: String, reason: String },

    #[error("Failed to read file {path}: {reason}")]
    ReadFile { path: String, reason: String },

    #[error("Sandbox API error during {operation}: {reason}")]
    Api {
        operation: &'static str,
        reason: String,
    },
}

impl SandboxError {
    pub fn no_session(operation: &'static str) -> Self {
        Self::NoActiveSandbox { operation }
    }

    pub fn api(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Api {
            operation,
            reason: err.to_string(),
        }
    }

    /// True when the caller invoked an operation before provisioning
    pub fn is_no_session(&self) -> bool {
        matches!(self, SandboxError::NoActiveSandbox { .. })
    }

    /// Configuration problems are not retryable
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SandboxError::UnknownProvider { .. } | SandboxError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;

/// Errors produced by the backend HTTP clients
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Turn a non-success response into an `ApiError`, passing success through
pub(crate) async fn check_status(response: reqwest::Response) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| status.to_string());

    if status == reqwest::StatusCode::NOT_FOUND {
        Err(ApiError::NotFound(body))
    } else {
        Err(ApiError::Http {
            status: status.as_u16(),
            body,
        })
    }
}
