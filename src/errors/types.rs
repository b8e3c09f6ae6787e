//! Error type definitions
//!
//! `AppError` is the top-level type returned by services and mapped to HTTP
//! responses by the web layer. The pipeline-specific errors carry enough
//! context to be persisted (`ProviderUploadError::details`) or escalated to
//! an operator (`PersistenceError::orphaned`).

use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::models::{ErrorDetails, Provider};

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Source attachment could not be fetched
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// A single provider upload failed
    #[error("Upload error: {0}")]
    Upload(#[from] ProviderUploadError),

    /// Local write failed after a remote upload succeeded
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Messaging platform errors
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// A precondition on the current record state did not hold
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Automatic retry is no longer permitted for this failure
    #[error("Retry limit reached for failure {failure_id} after {attempt_count} attempts")]
    RetryExhausted { failure_id: String, attempt_count: i32 },

    /// Permission denied errors
    #[error("Permission denied: {action} on {resource}")]
    PermissionDenied { action: String, resource: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// SQL query execution failures
    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// JSON column (de)serialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// A stored value could not be mapped back onto the model
    #[error("Invalid data in {table}.{field}: {message}")]
    InvalidData {
        table: String,
        field: String,
        message: String,
    },

    /// Migration failures
    #[error("Migration failed: {version} - {message}")]
    MigrationFailed { version: String, message: String },
}

/// Why a source attachment could not be fetched
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The platform does not know the reference or it has expired
    #[error("Invalid or expired file reference {file_id}: {message}")]
    InvalidReference { file_id: String, message: String },

    /// File exceeds the configured download limit
    #[error("File too large: {size} bytes (max: {max_size})")]
    TooLarge { size: u64, max_size: u64 },

    /// Download answered with a non-success status
    #[error("Download failed with HTTP {status}")]
    Download { status: u16 },

    /// Network level failure (including timeouts)
    #[error("Download transport error: {message}")]
    Transport { message: String },
}

/// Failure of one provider adapter
#[derive(Error, Debug, Clone)]
pub enum ProviderUploadError {
    #[error("{provider} upload timed out after {}", format_timeout(.timeout))]
    Timeout { provider: Provider, timeout: Duration },

    #[error("{provider} answered HTTP {status}: {body}")]
    Http {
        provider: Provider,
        status: u16,
        body: String,
    },

    #[error("{provider} rejected the upload: {message}")]
    Rejected { provider: Provider, message: String },

    #[error("{provider} returned an unexpected response: {message}")]
    InvalidResponse { provider: Provider, message: String },

    #[error("{provider} transport error: {message}")]
    Transport { provider: Provider, message: String },
}

/// Remote state exists that the local store does not reflect
#[derive(Error, Debug, Clone)]
#[error("{operation} failed: {message}")]
pub struct PersistenceError {
    pub operation: String,
    pub message: String,
    /// Uploads that succeeded remotely but are not referenced locally
    pub orphaned: Vec<OrphanedUpload>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedUpload {
    pub provider: Provider,
    pub code: String,
}

fn format_timeout(timeout: &Duration) -> String {
    humantime::format_duration(*timeout).to_string()
}

/// Telegram Bot API failures
#[derive(Error, Debug)]
pub enum MessagingError {
    /// Bot API answered `ok: false`
    #[error("Bot API {method} failed: {description}")]
    Api { method: String, description: String },

    /// Network level failure
    #[error("Bot API transport error: {message}")]
    Transport { message: String },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error for a specific resource
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied<A: Into<String>, R: Into<String>>(action: A, resource: R) -> Self {
        Self::PermissionDenied {
            action: action.into(),
            resource: resource.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl RepositoryError {
    /// Create an invalid data error
    pub fn invalid_data<T: Into<String>, F: Into<String>, M: Into<String>>(
        table: T,
        field: F,
        message: M,
    ) -> Self {
        Self::InvalidData {
            table: table.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl RetrievalError {
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Short machine-readable kind, stored with retry failures
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidReference { .. } => "invalid_reference",
            Self::TooLarge { .. } => "too_large",
            Self::Download { .. } => "download",
            Self::Transport { .. } => "transport",
        }
    }

    /// Render as a persisted failure detail
    pub fn details(&self) -> ErrorDetails {
        ErrorDetails {
            message: format!("Source retrieval failed: {self}"),
            context: json!({ "stage": "retrieval", "kind": self.kind() }),
        }
    }
}

impl ProviderUploadError {
    pub fn provider(&self) -> Provider {
        match self {
            Self::Timeout { provider, .. }
            | Self::Http { provider, .. }
            | Self::Rejected { provider, .. }
            | Self::InvalidResponse { provider, .. }
            | Self::Transport { provider, .. } => *provider,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Http { .. } => "http",
            Self::Rejected { .. } => "rejected",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Transport { .. } => "transport",
        }
    }

    pub fn transport<S: Into<String>>(provider: Provider, message: S) -> Self {
        Self::Transport {
            provider,
            message: message.into(),
        }
    }

    pub fn invalid_response<S: Into<String>>(provider: Provider, message: S) -> Self {
        Self::InvalidResponse {
            provider,
            message: message.into(),
        }
    }

    /// Render as a persisted failure detail (message + raw context)
    pub fn details(&self) -> ErrorDetails {
        let mut context = json!({
            "stage": "upload",
            "provider": self.provider().as_str(),
            "kind": self.kind(),
        });
        match self {
            Self::Timeout { timeout, .. } => {
                context["timeout_secs"] = json!(timeout.as_secs());
            }
            Self::Http { status, body, .. } => {
                context["status"] = json!(status);
                context["body"] = json!(body);
            }
            _ => {}
        }
        ErrorDetails {
            message: self.to_string(),
            context,
        }
    }
}

impl PersistenceError {
    pub fn new<O: Into<String>, M: Into<String>>(
        operation: O,
        message: M,
        orphaned: Vec<OrphanedUpload>,
    ) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
            orphaned,
        }
    }
}

impl MessagingError {
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_error_details_carry_context() {
        let err = ProviderUploadError::Http {
            provider: Provider::ProviderB,
            status: 503,
            body: "maintenance".to_string(),
        };
        let details = err.details();
        assert_eq!(details.context["provider"], "provider_b");
        assert_eq!(details.context["status"], 503);
        assert!(details.message.contains("503"));
    }

    #[test]
    fn test_timeout_message_is_human_readable() {
        let err = ProviderUploadError::Timeout {
            provider: Provider::ProviderA,
            timeout: Duration::from_secs(90),
        };
        assert_eq!(err.to_string(), "provider_a upload timed out after 1m 30s");
        assert_eq!(err.details().context["timeout_secs"], 90);
    }

    #[test]
    fn test_retrieval_details_mark_stage() {
        let err = RetrievalError::Download { status: 404 };
        assert_eq!(err.details().context["stage"], "retrieval");
    }
}
