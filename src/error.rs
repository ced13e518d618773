//! Error types for the import framework.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ProviderError`] - AI mapping-provider errors
//! - [`StoreError`] - Record store errors
//! - [`ImportError`] - Import pipeline errors (analyze/validate/execute)
//! - [`ServerError`] - HTTP server errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! The taxonomy matters to callers: configuration faults and store failures
//! are hard errors, throttling is a retryable signal, and everything the
//! caller can act on per-row (conflicts, validation errors) is returned as
//! structured data by the pipeline, never as an error.

use thiserror::Error;

// =============================================================================
// AI Provider Errors
// =============================================================================

/// Errors from the AI mapping provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No provider configured or usable (missing API key, unknown name).
    #[error("Provider configuration error: {0}")]
    Configuration(String),

    /// HTTP transport failure talking to the provider.
    #[error("Provider request failed: {0}")]
    Transport(String),

    /// Provider answered but the response could not be parsed.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

// =============================================================================
// Record Store Errors
// =============================================================================

/// Errors from the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint was violated at insert time.
    ///
    /// Kept distinct from other failures so the import pipeline can report
    /// it as a caller-actionable duplicate instead of an opaque failure.
    #[error("Unique constraint violated on {0}")]
    UniqueViolation(String),

    /// Query failure.
    #[error("Store query failed: {0}")]
    Query(String),

    /// Insert failure other than a uniqueness violation.
    #[error("Store insert failed: {0}")]
    Insert(String),
}

// =============================================================================
// Import Pipeline Errors (top-level)
// =============================================================================

/// Top-level import pipeline errors.
///
/// This is the main error type returned by the analyze/validate/execute
/// operations on [`crate::import::ImportService`].
#[derive(Debug, Error)]
pub enum ImportError {
    /// AI provider error.
    #[error("AI provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Record store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Too many analyze calls for this tenant in the current window.
    #[error("Too many requests. Please wait before trying again.")]
    RateLimited,

    /// Execute was called with unresolved conflicts and `skip_conflicts = false`.
    #[error("Conflicts detected. Set skip_conflicts=true to import non-conflicting rows only.")]
    ConflictsPresent,

    /// A module option required by the requested mode is missing or invalid.
    #[error("Invalid import options: {0}")]
    InvalidOptions(String),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Import pipeline error.
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Unknown import module in the request path.
    #[error("Unknown import module: {0}")]
    UnknownModule(String),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for import pipeline operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
