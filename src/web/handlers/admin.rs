//! Admin JSON API.
//!
//! POST bodies carry a discriminating `action` field. Edits that change the
//! catalog queue a regenerate-only update so the published playlists pick
//! them up without refetching the primary platform.

use axum::{
    body::Bytes,
    http::Method,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::SystemSettings;
use crate::errors::AppError;
use crate::ingestor::UpdateRequest;
use crate::models::{NewExternalSource, OperationResult, PlaylistConfig};
use crate::sources::schema::upgrade_external;
use crate::web::responses::{handle_error, ApiResponse};
use crate::web::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ExternalSourceAction {
    Save {
        #[serde(default)]
        sources: Vec<Value>,
    },
    Add {
        source: NewExternalSource,
    },
    Remove {
        index: i64,
    },
    Update {
        #[serde(default = "missing_index")]
        index: i64,
    },
    SetM3u8 {
        index: i64,
        #[serde(rename = "m3u8Url")]
        m3u8_url: String,
    },
    Toggle {
        enabled: bool,
    },
    SetUpdateOnStartup {
        enabled: bool,
    },
    SetIncludeInPlaylists {
        enabled: bool,
    },
}

fn missing_index() -> i64 {
    -1
}

impl ExternalSourceAction {
    fn name(&self) -> &'static str {
        match self {
            Self::Save { .. } => "save",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Update { .. } => "update",
            Self::SetM3u8 { .. } => "setM3u8",
            Self::Toggle { .. } => "toggle",
            Self::SetUpdateOnStartup { .. } => "setUpdateOnStartup",
            Self::SetIncludeInPlaylists { .. } => "setIncludeInPlaylists",
        }
    }

    /// Whether a successful run changes what gets published
    fn changes_catalog(&self) -> bool {
        !matches!(self, Self::SetUpdateOnStartup { .. })
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BuiltInSourceAction {
    Toggle { id: String, enabled: bool },
    Refresh { id: String },
}

pub async fn handle(state: &AppState, method: &Method, path: &str, body: Bytes) -> Response {
    let post = method == Method::POST;
    match (post, path) {
        (false, "/api/channels") => channels(state).await,
        (false, "/api/external-sources") => external_sources(state).await,
        (true, "/api/external-sources") => external_action(state, &body).await,
        (false, "/api/built-in-sources") => built_in_sources(state).await,
        (true, "/api/built-in-sources") => built_in_action(state, &body).await,
        (false, "/api/system-config") => system_config(state),
        (true, "/api/system-config") => save_system_config(state, &body).await,
        (false, "/api/playlist-config") => playlist_config(state).await,
        (true, "/api/playlist-config") => save_playlist_config(state, &body).await,
        (true, "/api/reset-groups") => reset_groups(state).await,
        (true, "/api/refresh") => request_update(state, UpdateRequest::Full),
        _ => handle_error(AppError::not_found("route", path)),
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected admin payload: {}", e);
        handle_error(AppError::validation(e.to_string()))
    })
}

fn queue_regeneration(state: &AppState) {
    if let Err(e) = state.update_tx.try_send(UpdateRequest::RegenerateOnly) {
        warn!("Could not queue playlist regeneration: {}", e);
    }
}

fn request_update(state: &AppState, request: UpdateRequest) -> Response {
    match state.update_tx.try_send(request) {
        Ok(()) => OperationResult::ok_with_message("Update queued").into_response(),
        Err(e) => OperationResult::failure(format!("Update not queued: {e}")).into_response(),
    }
}

async fn channels(state: &AppState) -> Response {
    ApiResponse::success(state.catalog.catalog().await).into_response()
}

async fn external_sources(state: &AppState) -> Response {
    ApiResponse::success(json!({
        "config": state.store.external().await,
        "summary": state.store.external_summary().await,
    }))
    .into_response()
}

async fn external_action(state: &AppState, body: &Bytes) -> Response {
    let action: ExternalSourceAction = match parse_body(body) {
        Ok(action) => action,
        Err(response) => return response,
    };
    let name = action.name();
    let changes_catalog = action.changes_catalog();

    let result = match action {
        ExternalSourceAction::Save { sources } => {
            let upgraded = upgrade_external(json!({ "sources": sources }));
            for note in &upgraded.notes {
                debug!("save: {}", note);
            }
            state
                .store
                .replace_external_sources(upgraded.document.sources)
                .await
        }
        ExternalSourceAction::Add { source } => state.store.add_external(source).await,
        ExternalSourceAction::Remove { index } => state.store.remove_external(index).await,
        ExternalSourceAction::Update { index } => {
            state.catalog.refresher().refresh_external(index).await
        }
        ExternalSourceAction::SetM3u8 { index, m3u8_url } => {
            state
                .store
                .set_external_m3u8(index, m3u8_url, Utc::now())
                .await
        }
        ExternalSourceAction::Toggle { enabled } => state.store.toggle_external(enabled).await,
        ExternalSourceAction::SetUpdateOnStartup { enabled } => {
            state.store.set_update_on_startup(enabled).await
        }
        ExternalSourceAction::SetIncludeInPlaylists { enabled } => {
            state.store.set_include_in_playlists(enabled).await
        }
    };

    info!("External source {} finished (success: {})", name, result.success);
    if result.success && changes_catalog {
        queue_regeneration(state);
    }
    result.into_response()
}

async fn built_in_sources(state: &AppState) -> Response {
    let (enabled, sources) = state.store.built_in_listing().await;
    ApiResponse::success(json!({
        "enabled": enabled,
        "sources": sources,
        "summary": state.store.built_in_summary().await,
    }))
    .into_response()
}

async fn built_in_action(state: &AppState, body: &Bytes) -> Response {
    let action: BuiltInSourceAction = match parse_body(body) {
        Ok(action) => action,
        Err(response) => return response,
    };
    let result = match action {
        BuiltInSourceAction::Toggle { id, enabled } => {
            state.store.set_built_in_enabled(&id, enabled).await
        }
        BuiltInSourceAction::Refresh { id } => state.catalog.refresher().refresh_built_in(&id).await,
    };
    if result.success {
        queue_regeneration(state);
    }
    result.into_response()
}

fn system_config(state: &AppState) -> Response {
    let path = state.config.storage.system_config_path();
    let settings = SystemSettings::load(&path).unwrap_or_else(|| SystemSettings::from_config(&state.config));
    ApiResponse::success(settings).into_response()
}

async fn save_system_config(state: &AppState, body: &Bytes) -> Response {
    let raw: Value = match parse_body(body) {
        Ok(raw) => raw,
        Err(response) => return response,
    };
    let settings = SystemSettings::normalize(&raw);
    match settings.save(&state.config.storage.system_config_path()).await {
        Ok(()) => {
            info!("System settings saved");
            OperationResult::ok_with_message("Settings saved, restart the service to apply them")
                .into_response()
        }
        Err(e) => OperationResult::from(e).into_response(),
    }
}

async fn playlist_config(state: &AppState) -> Response {
    let store = state.catalog.materializer().playlist_config();
    ApiResponse::success(json!({
        "config": store.load(),
        "groups": store.published_groups().await,
    }))
    .into_response()
}

async fn save_playlist_config(state: &AppState, body: &Bytes) -> Response {
    let config: PlaylistConfig = match parse_body(body) {
        Ok(config) => config,
        Err(response) => return response,
    };
    state
        .catalog
        .materializer()
        .playlist_config()
        .save(&config)
        .await
        .into_response()
}

async fn reset_groups(state: &AppState) -> Response {
    state
        .catalog
        .materializer()
        .playlist_config()
        .reset()
        .await
        .into_response()
}
