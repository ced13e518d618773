//! # Shoploader - bulk CSV import for manufacturing ERP data
//!
//! Shoploader imports bulk CSV data (customers, parts, machine resources)
//! into a tenant-scoped record store, with hybrid rule/AI column mapping.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV rows   │────▶│  Classifier │────▶│  Validation │────▶│ Bulk insert │
//! │ (pre-parsed)│     │ (rules + AI)│     │ (two-pass)  │     │ (one call)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shoploader::{ImportService, MemoryStore, modules};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryStore::new());
//!     let config = modules::module_config("customers").unwrap();
//!     let service = ImportService::new(config, store);
//!     let outcome = service.analyze("tenant-1", &headers, &samples).await.unwrap();
//!     println!("{} mappings", outcome.mappings.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Per-module import configuration
//! - [`classifier`] - Rule-based column classification and pair detection
//! - [`ai`] - AI mapping providers (Anthropic, OpenAI)
//! - [`cache`] - Analyze-response caching
//! - [`limiter`] - Per-tenant rate limiting
//! - [`store`] - Record store abstraction
//! - [`import`] - The analyze/validate/execute pipeline
//! - [`modules`] - Built-in module configs (customers, parts, resources)
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;

// Column classification
pub mod classifier;

// AI delegation
pub mod ai;
pub mod cache;
pub mod limiter;

// Storage
pub mod store;

// Import pipeline
pub mod import;
pub mod modules;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ImportError, ProviderError, ServerError, StoreError};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{
    ColumnPairConfig, CustomerLinkConfig, FieldDefinition, FieldType, GroupConfig,
    ImportModuleConfig, TransformContext,
};

// =============================================================================
// Re-exports - Classifier
// =============================================================================

pub use classifier::{
    classify_columns, detect_column_pairs, prefilter_columns, ColumnClassification,
    MAX_COLUMNS_FOR_AI,
};

// =============================================================================
// Re-exports - AI
// =============================================================================

pub use ai::{available_providers, create_provider, MappingProvider, MappingSuggestion};

// =============================================================================
// Re-exports - Store
// =============================================================================

pub use store::{MemoryStore, RecordStore};

// =============================================================================
// Re-exports - Import pipeline
// =============================================================================

pub use import::{
    AnalyzeOutcome, ColumnMapping, ColumnPair, Conflict, CustomerMatchMode, ExecuteOutcome,
    ImportOptions, ImportService, Row, RowError, ValidateOutcome,
};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
