//! HTTP server exposing the retrieval-policy endpoint.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Run one query through the response policy |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses use the same JSON shape:
//!
//! ```json
//! { "error": { "code": "missing_input", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `missing_input` (400), `store_unavailable` (500),
//! `internal` (500). A failed external-model call is *not* an error at
//! this layer; the policy converts it into a `source = "error"` response
//! with HTTP 200.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based chat
//! frontends can call the endpoint directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::models::{ChatRequest, ChatResponse};
use crate::policy;

/// Shared application state passed to route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
}

/// Start the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("medkb server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Map policy failures onto the HTTP error contract. The policy signals
/// error kinds through message text, mirroring how its callers in the CLI
/// report them.
fn classify_policy_error(err: anyhow::Error) -> AppError {
    let msg = format!("{:#}", err);

    if msg.contains("must not be empty") {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "missing_input".to_string(),
            message: msg,
        }
    } else if msg.contains("store unavailable") {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "store_unavailable".to_string(),
            message: msg,
        }
    } else {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: msg,
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /chat ============

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let response = policy::respond(&state.config, &state.pool, &request)
        .await
        .map_err(classify_policy_error)?;

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_missing_input() {
        let e = classify_policy_error(anyhow::anyhow!("message must not be empty"));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, "missing_input");
    }

    #[test]
    fn test_classify_store_unavailable() {
        let e = classify_policy_error(
            anyhow::anyhow!("db is gone").context("knowledge store unavailable"),
        );
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.code, "store_unavailable");
    }

    #[test]
    fn test_classify_unknown_is_internal() {
        let e = classify_policy_error(anyhow::anyhow!("something odd"));
        assert_eq!(e.code, "internal");
    }
}
