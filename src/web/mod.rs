//! Web layer module
//!
//! The HTTP interface of the aggregator. Paths carry an optional access
//! password and per-request identity in their leading segments, so routing
//! is not expressible as a static route table: every request goes through
//! one fallback handler that runs the [`router`] state machine and dispatches
//! on its decision.
//!
//! - **router**: pure request classification
//! - **gate**: single-flight gate for requests that rewrite shared files
//! - **handlers**: playlist serving, channel redirects, admin API
//! - **responses**: JSON response shapes and error mapping

use anyhow::Result;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::Config;
use crate::ingestor::UpdateSender;
use crate::services::{CatalogService, ChannelResolver};
use crate::sources::SourceStore;

pub mod gate;
pub mod handlers;
pub mod responses;
pub mod router;

pub use gate::RequestGate;
pub use responses::{handle_error, ApiResponse};
pub use router::{route, AuthOutcome, PlaylistEndpoint, RequestContext, RouteDecision};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SourceStore>,
    pub catalog: Arc<CatalogService>,
    pub resolver: Arc<ChannelResolver>,
    pub update_tx: UpdateSender,
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", state.config.web.host, state.config.web.port).parse()?;
        let app = Self::create_router(state);
        Ok(Self { app, addr })
    }

    /// Create the router with the dispatching fallback and middleware
    pub fn create_router(state: AppState) -> Router {
        let gate = RequestGate::new(state.config.web.request_gate);

        Router::new()
            .fallback(handlers::dispatch)
            // Middleware (applied in reverse order)
            .layer(middleware::from_fn_with_state(gate, gate::gate_middleware))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the web server
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!("Listening on http://{}", self.addr);
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}
