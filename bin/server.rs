// Cost Manager - Web Server
// REST API with Axum over the shared SQLite store

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use cost_manager::{
    about_team, add_cost, monthly_report, open_database, user_summary, Error, NewCost,
    ReportParams,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Map a library error to its transport status and JSON body. This is the
/// only place error kinds meet status codes. Store failures stay opaque to
/// clients; the cause goes to the log.
fn error_response(err: Error) -> (StatusCode, Json<ErrorBody>) {
    let (status, message) = match err {
        Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        Error::Store { source } => {
            tracing::error!(%source, "store failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
        }
    };
    (status, Json(ErrorBody { error: message }))
}

// ============================================================================
// API Handlers
// ============================================================================

/// POST /api/add - record one expense
async fn add_cost_handler(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let new_cost = match NewCost::from_json(&body) {
        Ok(new_cost) => new_cost,
        Err(err) => return error_response(err).into_response(),
    };

    let conn = state.db.lock().unwrap();
    match add_cost(&conn, new_cost) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

#[derive(Deserialize)]
struct ReportQuery {
    id: Option<String>,
    year: Option<String>,
    month: Option<String>,
}

/// GET /api/report - monthly report grouped by category
async fn report_handler(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> impl IntoResponse {
    let params = match ReportParams::parse(
        query.id.as_deref(),
        query.year.as_deref(),
        query.month.as_deref(),
    ) {
        Ok(params) => params,
        Err(err) => return error_response(err).into_response(),
    };

    let conn = state.db.lock().unwrap();
    match monthly_report(&conn, &params) {
        Ok(report) => Json(report).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

/// GET /api/users/:id - user card plus running total
async fn user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();
    match user_summary(&conn, &id) {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

/// GET /api/about - project team roster
async fn about_handler() -> impl IntoResponse {
    Json(about_team())
}

/// GET / - static status page
async fn serve_index() -> impl IntoResponse {
    Html("<h1>Cost Manager API</h1>\n<p>Status: <strong>Running</strong></p>")
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let db_path =
        std::env::var("COST_MANAGER_DB").unwrap_or_else(|_| "cost-manager.db".to_string());
    let addr =
        std::env::var("COST_MANAGER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let conn = open_database(std::path::Path::new(&db_path))?;
    tracing::info!(path = %db_path, "database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let api_routes = Router::new()
        .route("/add", post(add_cost_handler))
        .route("/report", get(report_handler))
        .route("/users/:id", get(user_handler))
        .route("/about", get(about_handler))
        .with_state(state);

    let app = Router::new()
        .route("/", get(serve_index))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, version = cost_manager::VERSION, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
