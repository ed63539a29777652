//! Axum HTTP server: read-only endpoints over the analysis outputs.
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/strategy?state=<hex>` | Stored strategy for a state, or null |
//! | GET | `/progress` | Contents of `progress.json` |
//!
//! Lookups are soft: an unsolved state is a null strategy, not an error.
//! Only the analyzer writes; this process never mutates the stores.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use crate::query::StrategyReader;
use crate::state::from_hex;

/// Shared server state: a lazily-opened reader over the per-turn stores.
pub struct ServerState {
    pub reader: Mutex<StrategyReader>,
    pub progress_path: PathBuf,
}

pub type AppState = Arc<ServerState>;

pub fn create_router(out_dir: PathBuf) -> Router {
    let state = Arc::new(ServerState {
        reader: Mutex::new(StrategyReader::new(&out_dir)),
        progress_path: out_dir.join("progress.json"),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health_check))
        .route("/strategy", get(handle_get_strategy))
        .route("/progress", get(handle_get_progress))
        .layer(cors)
        .with_state(state)
}

#[derive(Deserialize)]
struct StrategyQuery {
    state: String,
}

fn error_response(status: StatusCode, msg: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": msg })))
}

async fn handle_health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK" }))
}

async fn handle_get_strategy(
    State(state): State<AppState>,
    Query(params): Query<StrategyQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let code = match from_hex(&params.state) {
        Some(code) => code,
        None => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "state must be a hex-encoded 32-bit value",
            ))
        }
    };

    let strategy = {
        let mut reader = state.reader.lock().expect("reader lock poisoned");
        reader.lookup(code)
    };
    match strategy {
        Ok(found) => Ok(Json(serde_json::json!({
            "state": params.state,
            "strategy": found,
        }))),
        Err(e) => {
            eprintln!("Strategy lookup failed for {}: {}", params.state, e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "strategy store unreadable",
            ))
        }
    }
}

async fn handle_get_progress(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let text = match std::fs::read_to_string(&state.progress_path) {
        Ok(t) => t,
        Err(_) => {
            return Err(error_response(
                StatusCode::NOT_FOUND,
                "progress record not initialized",
            ))
        }
    };
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => Ok(Json(value)),
        Err(e) => {
            eprintln!("Malformed progress record: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "progress record malformed",
            ))
        }
    }
}
