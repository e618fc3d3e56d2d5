//! Centralized error handling for the aggregator
//!
//! Every layer returns [`AppResult`]. Nothing above the collaborator
//! boundary (platform client, extractor, validator) is allowed to panic;
//! failures are either converted into structured [`crate::models::OperationResult`]
//! values for the admin API or mapped onto HTTP responses by the web layer.
//!
//! # Error Categories
//!
//! - **Store errors**: corrupt or unwritable JSON documents
//! - **Refresh errors**: extraction returned nothing, validation failed
//! - **Upstream errors**: the primary platform is unavailable or timed out
//! - **Request errors**: authentication failures and unsupported methods

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;
