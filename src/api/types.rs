//! REST API request types and error mapping.
//!
//! Response bodies are the pipeline's own serializable outcome types
//! ([`crate::import::AnalyzeOutcome`] and friends); only the requests and
//! the error-to-status mapping live here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{ImportError, ProviderError, ServerError, StoreError};
use crate::import::{ImportOptions, Row};

/// Analyze request: headers plus up to a handful of sample rows.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub tenant_id: String,
    pub headers: Vec<String>,
    #[serde(default)]
    pub sample_rows: Vec<Vec<String>>,
}

/// Validate request: confirmed mappings plus the full row set.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRequest {
    pub tenant_id: String,
    /// csv_column -> db_field. Empty db_field means "do not import".
    pub mappings: HashMap<String, String>,
    pub rows: Vec<Row>,
    #[serde(flatten)]
    pub options: ImportOptions,
}

/// Execute request: validate's input plus the conflict skip policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub tenant_id: String,
    pub mappings: HashMap<String, String>,
    pub rows: Vec<Row>,
    #[serde(default)]
    pub skip_conflicts: bool,
    #[serde(flatten)]
    pub options: ImportOptions,
}

/// Standard error body.
pub fn error_response(message: &str) -> Value {
    json!({ "error": message })
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::UnknownModule(name) => (
                StatusCode::NOT_FOUND,
                format!("Unknown import module: {}", name),
            ),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Import(err) => import_status(err),
        };
        (status, Json(error_response(&message))).into_response()
    }
}

fn import_status(err: &ImportError) -> (StatusCode, String) {
    match err {
        ImportError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, err.to_string()),
        ImportError::ConflictsPresent | ImportError::InvalidOptions(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        ImportError::Provider(ProviderError::Configuration(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "AI mapping service is not configured".to_string(),
        ),
        ImportError::Provider(_) => (
            StatusCode::BAD_GATEWAY,
            "AI mapping service unavailable".to_string(),
        ),
        ImportError::Store(StoreError::UniqueViolation(_)) => (
            StatusCode::BAD_REQUEST,
            "A record with this identifier already exists".to_string(),
        ),
        // Raw store error text never reaches the caller
        ImportError::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error".to_string(),
        ),
    }
}
