use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::transport::jsonrpc::McpServer;

/// Builds the HTTP router.
///
/// # Routes
///
/// - `POST /mcp` - one JSON-RPC message in, one response out
///   (`202 Accepted` with no body for notifications)
/// - `GET /health` - liveness probe
pub fn create_router(server: McpServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/health", get(health_check))
        .with_state(server)
        .layer(cors)
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve_http(server: McpServer, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "MCP server listening on HTTP");
    axum::serve(listener, create_router(server)).await?;
    tracing::info!("HTTP server stopped");
    Ok(())
}

// The body is read as text so malformed JSON reaches the JSON-RPC layer and
// comes back as a -32700 response instead of an HTTP 4xx.
async fn handle_mcp(State(server): State<McpServer>, body: String) -> Response {
    match server.handle_message(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
