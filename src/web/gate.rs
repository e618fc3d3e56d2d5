//! Single-flight request gate.
//!
//! A process-wide async mutex held from the moment a gated request enters
//! until its response has been produced. With [`GateScope::Mutations`] only
//! POST requests (the ones that rewrite shared files) are serialized and
//! playlist reads run freely; [`GateScope::All`] serializes every request.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::trace;

use crate::config::GateScope;

#[derive(Debug, Clone)]
pub struct RequestGate {
    lock: Arc<Mutex<()>>,
    scope: GateScope,
}

impl RequestGate {
    pub fn new(scope: GateScope) -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
            scope,
        }
    }

    pub fn applies_to(&self, method: &Method) -> bool {
        match self.scope {
            GateScope::All => true,
            GateScope::Mutations => method == Method::POST,
        }
    }
}

/// Middleware holding the gate for the whole handling of a gated request
pub async fn gate_middleware(State(gate): State<RequestGate>, request: Request, next: Next) -> Response {
    if !gate.applies_to(request.method()) {
        return next.run(request).await;
    }
    let _held = gate.lock.lock().await;
    trace!("Request gate acquired for {}", request.uri().path());
    next.run(request).await
}
