//! Centralized error handling
//!
//! # Error Categories
//!
//! - **Retrieval Errors**: the source attachment could not be fetched. Terminal
//!   for the ingestion attempt, never tracked as an upload failure.
//! - **Provider Upload Errors**: one hosting provider rejected or timed out.
//!   Recoverable and tracked as an upload failure record.
//! - **Persistence Errors**: a local write failed after a remote upload
//!   succeeded. Always routed to the operator channel.
//! - **Repository / Database Errors**: SQLite access failures.
//! - **Messaging Errors**: Telegram Bot API failures.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;
