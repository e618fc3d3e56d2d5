//! Playlist document serving.
//!
//! Documents are read from the published files on every request and the
//! `${replace}` placeholder is substituted with the caller's base URL, so one
//! published file serves every host, password and identity combination.

use axum::{
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use tracing::warn;

use crate::models::REPLACE_PLACEHOLDER;
use crate::web::router::{PlaylistEndpoint, RequestContext};
use crate::web::AppState;

const UNAVAILABLE_BODY: &str = "获取失败";

fn document(state: &AppState, endpoint: PlaylistEndpoint) -> (PathBuf, &'static str) {
    let storage = &state.config.storage;
    match endpoint {
        PlaylistEndpoint::Interface => (storage.m3u_path(), "text/plain; charset=utf-8"),
        PlaylistEndpoint::M3u => (storage.m3u_path(), "audio/x-mpegurl; charset=utf-8"),
        PlaylistEndpoint::Txt => (storage.txt_path(), "text/plain; charset=utf-8"),
        PlaylistEndpoint::Guide => (storage.guide_path(), "text/xml; charset=utf-8"),
        PlaylistEndpoint::Custom => (storage.custom_m3u_path(), "audio/x-mpegurl; charset=utf-8"),
    }
}

/// `http://<host>[/<password>][/<userId>/<token>]`
pub fn base_url(
    public_host: Option<&str>,
    host_header: Option<&str>,
    password: Option<&str>,
    context: &RequestContext,
) -> String {
    let host = public_host
        .filter(|h| !h.trim().is_empty())
        .or(host_header)
        .unwrap_or("localhost")
        .trim_end_matches('/');
    let mut base = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    if let Some(pass) = password {
        base.push('/');
        base.push_str(pass);
    }
    if context.identity_override {
        base.push_str(&format!("/{}/{}", context.identity.user_id, context.identity.token));
    }
    base
}

pub async fn serve(
    state: &AppState,
    endpoint: PlaylistEndpoint,
    context: &RequestContext,
    headers: &HeaderMap,
) -> Response {
    let (path, content_type) = document(state, endpoint);
    let body = match tokio::fs::read_to_string(&path).await {
        Ok(content) => {
            let host_header = headers.get(header::HOST).and_then(|v| v.to_str().ok());
            let base = base_url(
                state.config.web.public_host.as_deref(),
                host_header,
                state.config.access.password(),
                context,
            );
            content.replace(REPLACE_PLACEHOLDER, &base)
        }
        Err(e) => {
            warn!("{} unavailable: {}", path.display(), e);
            UNAVAILABLE_BODY.to_string()
        }
    };

    if endpoint == PlaylistEndpoint::M3u {
        (
            [
                (header::CONTENT_TYPE, content_type),
                (header::CONTENT_DISPOSITION, "inline; filename=\"interface.m3u\""),
            ],
            body,
        )
            .into_response()
    } else {
        ([(header::CONTENT_TYPE, content_type)], body).into_response()
    }
}
