//! Request classification.
//!
//! A pure function from method and path to a [`RouteDecision`], run in a
//! fixed order: favicon, password check, admin surface, identity override,
//! method check, then playlist-or-channel classification. Handlers only act
//! on the decision; nothing here touches state.

use axum::http::Method;

use crate::platform::Identity;

/// Result of the password check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// No password configured
    Open,
    Passed,
    Failed,
}

/// Per-request routing context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Identity to resolve channels with
    pub identity: Identity,
    /// True when the identity came from the path rather than the defaults
    pub identity_override: bool,
    pub normalized_path: String,
    pub auth_outcome: AuthOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistEndpoint {
    /// `/` and `/interface.txt`
    Interface,
    /// `/m3u`, served as an inline `interface.m3u` attachment
    M3u,
    Txt,
    Guide,
    Custom,
}

impl PlaylistEndpoint {
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/" | "/interface.txt" => Some(Self::Interface),
            "/m3u" => Some(Self::M3u),
            "/txt" => Some(Self::Txt),
            "/playback.xml" => Some(Self::Guide),
            "/custom.m3u" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Favicon,
    AuthFailed,
    AdminPage,
    /// Admin JSON API; carries the path below the password prefix
    AdminApi(String),
    /// HEAD / OPTIONS: answered with CORS headers and no body
    Preflight,
    UnsupportedMethod(String),
    Playlist(PlaylistEndpoint),
    Channel(String),
}

/// Classify one request
pub fn route(
    method: &Method,
    path: &str,
    password: Option<&str>,
    defaults: &Identity,
) -> (RequestContext, RouteDecision) {
    let path = path.split('?').next().unwrap_or(path);
    let mut context = RequestContext {
        identity: defaults.clone(),
        identity_override: false,
        normalized_path: path.to_string(),
        auth_outcome: AuthOutcome::Open,
    };

    if path == "/favicon.ico" {
        return (context, RouteDecision::Favicon);
    }

    let mut url = match password {
        None => path.to_string(),
        Some(pass) => {
            let segments: Vec<&str> = path.split('/').collect();
            if segments.get(1) != Some(&pass) {
                context.auth_outcome = AuthOutcome::Failed;
                return (context, RouteDecision::AuthFailed);
            }
            context.auth_outcome = AuthOutcome::Passed;

            let rest = &path[pass.len() + 1..];
            if is_admin_surface(rest) {
                context.normalized_path = rest.to_string();
                return admin_decision(method, rest, context);
            }
            condense(rest, &segments)
        }
    };

    if password.is_none() && is_admin_surface(&url) {
        return admin_decision(method, &url, context);
    }

    let segments: Vec<&str> = url.split('/').collect();
    if segments.len() >= 3 && is_identity_segment(segments[1]) && is_identity_segment(segments[2]) {
        context.identity = Identity::new(segments[1], segments[2]);
        context.identity_override = true;
        url = if segments.len() == 3 {
            "/".to_string()
        } else {
            format!("/{}", segments[segments.len() - 1])
        };
    }
    context.normalized_path = url.clone();

    if let Some(decision) = method_decision(method) {
        return (context, decision);
    }

    let decision = match PlaylistEndpoint::from_path(&url) {
        Some(endpoint) => RouteDecision::Playlist(endpoint),
        None => RouteDecision::Channel(url.trim_start_matches('/').to_string()),
    };
    (context, decision)
}

/// Path below the password: kept whole when it still carries an identity,
/// otherwise reduced to its last segment
fn condense(rest: &str, segments: &[&str]) -> String {
    if segments.len() > 3 {
        rest.to_string()
    } else if segments.len() == 2 {
        "/".to_string()
    } else {
        format!("/{}", segments[segments.len() - 1])
    }
}

fn is_identity_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.chars().any(char::is_whitespace)
}

fn is_admin_surface(path: &str) -> bool {
    path == "/admin" || path.starts_with("/admin/") || path.starts_with("/api/")
}

fn admin_decision(method: &Method, path: &str, context: RequestContext) -> (RequestContext, RouteDecision) {
    if let Some(decision) = method_decision(method) {
        return (context, decision);
    }
    let decision = if path.starts_with("/api/") {
        RouteDecision::AdminApi(path.to_string())
    } else {
        RouteDecision::AdminPage
    };
    (context, decision)
}

fn method_decision(method: &Method) -> Option<RouteDecision> {
    if method == Method::GET || method == Method::POST {
        None
    } else if method == Method::HEAD || method == Method::OPTIONS {
        Some(RouteDecision::Preflight)
    } else {
        Some(RouteDecision::UnsupportedMethod(method.to_string()))
    }
}
