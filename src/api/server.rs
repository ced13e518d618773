//! HTTP server for the import API.
//!
//! One service instance per registered module, shared across requests.
//!
//! # API Endpoints
//!
//! | Method | Path                           | Description                    |
//! |--------|--------------------------------|--------------------------------|
//! | GET    | `/health`                      | Health check                   |
//! | GET    | `/api/providers`               | Available AI providers         |
//! | POST   | `/api/{module}/import/analyze` | Column mapping analysis        |
//! | POST   | `/api/{module}/import/validate`| Pre-import validation          |
//! | POST   | `/api/{module}/import/execute` | Bulk insert                    |

use axum::{
    extract::{Path, State},
    http::{header, Method},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::types::{AnalyzeRequest, ExecuteRequest, ValidateRequest};
use crate::ai::available_providers;
use crate::error::{ServerError, ServerResult};
use crate::import::{AnalyzeOutcome, ExecuteOutcome, ImportService, ValidateOutcome};
use crate::modules;
use crate::store::RecordStore;

/// Shared server state: one import service per registered module.
#[derive(Clone)]
pub struct AppState {
    services: Arc<HashMap<String, Arc<ImportService>>>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let services = modules::module_names()
            .into_iter()
            .filter_map(|name| {
                let config = modules::module_config(name)?;
                Some((
                    name.to_string(),
                    Arc::new(ImportService::new(config, store.clone())),
                ))
            })
            .collect();
        Self {
            services: Arc::new(services),
        }
    }

    fn service(&self, module: &str) -> ServerResult<&ImportService> {
        self.services
            .get(module)
            .map(Arc::as_ref)
            .ok_or_else(|| ServerError::UnknownModule(module.to_string()))
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/providers", get(providers))
        .route("/api/{module}/import/analyze", post(analyze))
        .route("/api/{module}/import/validate", post(validate))
        .route("/api/{module}/import/execute", post(execute))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server.
pub async fn start_server(
    port: u16,
    store: Arc<dyn RecordStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(store);
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, modules = ?modules::module_names(), "import server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "shoploader",
        "version": env!("CARGO_PKG_VERSION"),
        "modules": modules::module_names(),
    }))
}

/// Available AI providers and their configuration status.
async fn providers() -> Json<Value> {
    Json(json!({ "providers": available_providers() }))
}

async fn analyze(
    State(state): State<AppState>,
    Path(module): Path<String>,
    Json(req): Json<AnalyzeRequest>,
) -> ServerResult<Json<AnalyzeOutcome>> {
    let outcome = state
        .service(&module)?
        .analyze(&req.tenant_id, &req.headers, &req.sample_rows)
        .await
        .map_err(ServerError::from)?;
    Ok(Json(outcome))
}

async fn validate(
    State(state): State<AppState>,
    Path(module): Path<String>,
    Json(req): Json<ValidateRequest>,
) -> ServerResult<Json<ValidateOutcome>> {
    let outcome = state
        .service(&module)?
        .validate(&req.tenant_id, &req.mappings, &req.rows, &req.options)
        .await
        .map_err(ServerError::from)?;
    Ok(Json(outcome))
}

async fn execute(
    State(state): State<AppState>,
    Path(module): Path<String>,
    Json(req): Json<ExecuteRequest>,
) -> ServerResult<Json<ExecuteOutcome>> {
    let outcome = state
        .service(&module)?
        .execute(
            &req.tenant_id,
            &req.mappings,
            &req.rows,
            req.skip_conflicts,
            &req.options,
        )
        .await
        .map_err(ServerError::from)?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_state_knows_registered_modules() {
        let state = AppState::new(Arc::new(MemoryStore::new()));
        assert!(state.service("customers").is_ok());
        assert!(state.service("parts").is_ok());
        assert!(matches!(
            state.service("orders"),
            Err(ServerError::UnknownModule(_))
        ));
    }
}
