//! HTTP gateway.
//!
//! Serves:
//! - `GET /`: static service descriptor
//! - `GET /health`: liveness with tool count
//! - `GET|POST /mcp`: opens an SSE session; the first event names the
//!   per-session URL (`/mcp?sessionId=<uuid>`) that JSON-RPC messages are
//!   POSTed to.  Responses arrive as `message` events.

mod handlers;
mod sse;

use std::net::SocketAddr;

use axum::{routing::get, Router};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::mcp::McpServer;
use sse::SessionRegistry;

// ---------------------------------------------------------------------------
// Gateway handle
// ---------------------------------------------------------------------------

/// Handle returned by [`start_gateway`].
pub struct Gateway {
    /// Server task handle.
    pub handle: JoinHandle<()>,
    /// The address the server is actually listening on.
    pub addr: SocketAddr,
}

// ---------------------------------------------------------------------------
// Shared state injected into axum handlers
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) mcp: McpServer,
    pub(crate) sessions: SessionRegistry,
}

// ---------------------------------------------------------------------------
// Server startup
// ---------------------------------------------------------------------------

/// Build the gateway router around `mcp`.
pub fn router(mcp: McpServer) -> Router {
    let state = AppState {
        mcp,
        sessions: SessionRegistry::default(),
    };

    Router::new()
        .route("/", get(handlers::health::info))
        .route("/health", get(handlers::health::health))
        .route(
            "/mcp",
            get(handlers::mcp::open_channel).post(handlers::mcp::post_mcp),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the gateway on `addr`.  Binding to port 0 picks a free port;
/// the bound address is returned in the [`Gateway`].
pub async fn start_gateway(addr: SocketAddr, mcp: McpServer) -> std::io::Result<Gateway> {
    let app = router(mcp);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("gateway server error: {e}");
        }
    });

    info!(%bound_addr, "gateway started");

    Ok(Gateway {
        handle,
        addr: bound_addr,
    })
}
