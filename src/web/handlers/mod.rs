//! HTTP handlers
//!
//! All traffic enters through [`dispatch`], which classifies the request
//! with [`super::router::route`] and hands it to the matching handler.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, warn};

use super::router::{route, RouteDecision};
use super::AppState;
use crate::assets::StaticAssets;
use crate::errors::AppError;

pub mod admin;
pub mod channel;
pub mod playlist;

pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (context, decision) = route(
        &method,
        uri.path(),
        state.config.access.password(),
        state.resolver.default_identity(),
    );
    debug!("{} {} -> {:?}", method, context.normalized_path, decision);

    match decision {
        RouteDecision::Favicon => StatusCode::NO_CONTENT.into_response(),
        RouteDecision::AuthFailed => rejected(&state, AppError::AuthFailure),
        RouteDecision::AdminPage => admin_page(),
        RouteDecision::AdminApi(path) => admin::handle(&state, &method, &path, body).await,
        RouteDecision::Preflight => preflight(),
        RouteDecision::UnsupportedMethod(method) => {
            rejected(&state, AppError::UnsupportedMethod { method })
        }
        RouteDecision::Playlist(endpoint) => {
            playlist::serve(&state, endpoint, &context, &headers).await
        }
        RouteDecision::Channel(id) => channel::resolve(&state, &id, &context, uri.query()).await,
    }
}

/// Requests refused before any handler ran. Players expect the legacy
/// shapes: plain text for a bad password, a `{data}` object for a bad method.
fn rejected(state: &AppState, error: AppError) -> Response {
    match &error {
        AppError::UnsupportedMethod { method } => {
            warn!("Rejected {} request", method);
            Json(json!({ "data": error.to_string() })).into_response()
        }
        _ => {
            warn!("Request rejected: {}", error);
            let status = StatusCode::from_u16(state.config.access.auth_failure_status)
                .unwrap_or(StatusCode::OK);
            (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                error.to_string(),
            )
                .into_response()
        }
    }
}

fn preflight() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, HEAD, OPTIONS")
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "*")
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::OK.into_response())
}

fn admin_page() -> Response {
    let path = "static/admin.html";
    match StaticAssets::get_asset(path) {
        Some(asset) => (
            [(header::CONTENT_TYPE, StaticAssets::get_content_type(path))],
            asset.data.into_owned(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Admin page not found").into_response(),
    }
}
