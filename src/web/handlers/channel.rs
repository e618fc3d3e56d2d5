//! Channel resolution: redirect the player to the upstream stream URL.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use crate::platform::PlaybackWindow;
use crate::web::responses::status_for;
use crate::web::router::RequestContext;
use crate::web::AppState;

/// Catch-up window from `playbackbegin` / `playbackend` query parameters
pub fn playback_window(query: Option<&str>) -> PlaybackWindow {
    let mut window = PlaybackWindow::default();
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        let value = Some(value.into_owned()).filter(|v| !v.is_empty());
        match key.as_ref() {
            "playbackbegin" => window.begin = value,
            "playbackend" => window.end = value,
            _ => {}
        }
    }
    window
}

pub async fn resolve(
    state: &AppState,
    channel_id: &str,
    context: &RequestContext,
    query: Option<&str>,
) -> Response {
    let window = playback_window(query);
    match state
        .resolver
        .resolve(channel_id, Some(&context.identity), &window)
        .await
    {
        Ok(url) => {
            info!("Redirecting {} to upstream", channel_id);
            (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
        }
        Err(e) => {
            warn!("Resolving {} failed: {}", channel_id, e);
            (
                status_for(&e),
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                e.to_string(),
            )
                .into_response()
        }
    }
}
