use axum::{response::IntoResponse, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::tools::catalog;
use crate::SERVICE_NAME;

/// `GET /health`
pub(crate) async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "tools": catalog().len(),
    }))
}

/// `GET /`
pub(crate) async fn info() -> impl IntoResponse {
    Json(json!({
        "name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "MCP server providing Gmail and Calendar integration",
        "endpoints": {
            "health": "/health",
            "mcp": "/mcp (GET or POST for SSE connection)",
        },
        "tools": catalog().len(),
        "capabilities": ["gmail", "calendar"],
    }))
}
