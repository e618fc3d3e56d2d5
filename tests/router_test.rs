use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use iptv_aggregator::{
    ingestor::UpdateRequest,
    services::UpdateMode,
    web::WebServer,
};

mod common;
use common::{build_app, default_app, test_config, FakePlatform};

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, axum::http::HeaderMap, String) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "tv.local:1905");
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8_lossy(&bytes).into_owned())
}

fn json_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn test_favicon_is_no_content() {
    let app = default_app().await;
    let router = WebServer::create_router(app.state.clone());

    let (status, _, body) = send(&router, Method::GET, "/favicon.ico", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_wrong_password_is_rejected_with_ok_status() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.access.password = "secret".to_string();
    let app = build_app(config, FakePlatform::new(), dir).await;
    let router = WebServer::create_router(app.state.clone());

    let (status, _, body) = send(&router, Method::GET, "/wrong/m3u", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "身份认证失败");

    let (status, _, body) = send(&router, Method::GET, "/secret/m3u", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "获取失败");
}

#[tokio::test]
async fn test_auth_failure_status_is_configurable() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.access.password = "secret".to_string();
    config.access.auth_failure_status = 401;
    let app = build_app(config, FakePlatform::new(), dir).await;
    let router = WebServer::create_router(app.state.clone());

    let (status, _, _) = send(&router, Method::GET, "/admin", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_channel_redirects_with_identity_override() {
    let app = default_app().await;
    let router = WebServer::create_router(app.state.clone());

    let (status, headers, _) = send(&router, Method::GET, "/608807420", None).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(
        headers.get(header::LOCATION).unwrap(),
        "http://cdn.example/608807420.m3u8?user=default-user"
    );

    let (status, headers, _) = send(
        &router,
        Method::GET,
        "/uid9/tok9/608807420?playbackbegin=20240301080000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(
        headers.get(header::LOCATION).unwrap(),
        "http://cdn.example/608807420.m3u8?user=uid9&begin=20240301080000"
    );
}

#[tokio::test]
async fn test_channel_resolution_failure_reports_status() {
    let app = default_app().await;
    let router = WebServer::create_router(app.state.clone());

    let (status, headers, body) = send(&router, Method::GET, "/missing", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(headers.get(header::LOCATION).is_none());
    assert!(body.contains("no stream for channel"));
}

#[tokio::test]
async fn test_playlist_placeholder_is_substituted() {
    let app = default_app().await;
    let report = app.state.catalog.update(0, UpdateMode::Startup).await;
    assert!(report.published);
    let router = WebServer::create_router(app.state.clone());

    let (status, headers, body) = send(&router, Method::GET, "/m3u", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CONTENT_DISPOSITION).unwrap(),
        "inline; filename=\"interface.m3u\""
    );
    assert!(body.starts_with("#EXTM3U"));
    assert!(body.contains("http://tv.local:1905/608807420"));
    assert!(!body.contains("${replace}"));

    let (_, _, body) = send(&router, Method::GET, "/uid9/tok9/txt", None).await;
    assert!(body.contains("CCTV1,http://tv.local:1905/uid9/tok9/608807420"));
}

#[tokio::test]
async fn test_unsupported_method_answers_with_json() {
    let app = default_app().await;
    let router = WebServer::create_router(app.state.clone());

    let (status, _, body) = send(&router, Method::DELETE, "/608807420", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({ "data": "请使用GET或POST请求" }));
}

#[tokio::test]
async fn test_admin_page_is_served() {
    let app = default_app().await;
    let router = WebServer::create_router(app.state.clone());

    let (status, headers, body) = send(&router, Method::GET, "/admin", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(body.contains("external-sources"));
}

#[tokio::test]
async fn test_admin_add_external_source_queues_regeneration() {
    let mut app = default_app().await;
    let router = WebServer::create_router(app.state.clone());

    let (status, _, body) = send(
        &router,
        Method::POST,
        "/api/external-sources",
        Some(json!({
            "action": "add",
            "source": { "name": "Harbour Cam", "webUrl": "http://page.example/cam" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["success"], json!(true));
    assert_eq!(app.update_rx.try_recv().unwrap(), UpdateRequest::RegenerateOnly);

    let (status, _, body) = send(&router, Method::GET, "/api/external-sources", None).await;
    assert_eq!(status, StatusCode::OK);
    let listing = json_body(&body);
    assert_eq!(listing["data"]["config"]["sources"][0]["name"], json!("Harbour Cam"));
    assert_eq!(listing["data"]["summary"]["sourcesCount"], json!(1));
}

#[tokio::test]
async fn test_admin_rejects_bad_index_and_unknown_action() {
    let mut app = default_app().await;
    let router = WebServer::create_router(app.state.clone());

    let (status, _, body) = send(
        &router,
        Method::POST,
        "/api/external-sources",
        Some(json!({ "action": "remove", "index": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&body)["success"], json!(false));
    assert!(app.update_rx.try_recv().is_err());

    let (status, _, _) = send(
        &router,
        Method::POST,
        "/api/external-sources",
        Some(json!({ "action": "explode" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_manual_refresh_queues_full_update() {
    let mut app = default_app().await;
    let router = WebServer::create_router(app.state.clone());

    let (status, _, body) = send(&router, Method::POST, "/api/refresh", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["success"], json!(true));
    assert_eq!(app.update_rx.try_recv().unwrap(), UpdateRequest::Full);
}

#[tokio::test]
async fn test_system_config_save_requires_restart() {
    let app = default_app().await;
    let router = WebServer::create_router(app.state.clone());

    let (status, _, body) = send(
        &router,
        Method::POST,
        "/api/system-config",
        Some(json!({ "userId": "u2", "token": "t2", "port": "2000", "updateInterval": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let result = json_body(&body);
    assert_eq!(result["success"], json!(true));
    assert!(result["message"].as_str().unwrap().contains("restart"));

    let (_, _, body) = send(&router, Method::GET, "/api/system-config", None).await;
    assert_eq!(json_body(&body)["data"]["userId"], json!("u2"));
}
