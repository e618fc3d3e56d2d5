//! Shared fixtures for the integration tests: in-memory collaborators and a
//! fully wired application state over a temporary data directory.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use iptv_aggregator::{
    config::Config,
    errors::{AppError, AppResult},
    ingestor::{create_update_channel, ExtractRequest, Extractor, RefreshScheduler, UpdateReceiver, Validator},
    models::{ChannelGroup, ChannelItem, SourceTag},
    platform::{Identity, PlaybackWindow, PrimaryPlatform, Programme, ScheduledEvents},
    proxy::Materializer,
    services::{CatalogService, ChannelResolver},
    sources::{SourceStore, StorePaths},
    web::AppState,
};

pub struct FakePlatform {
    pub groups: Vec<ChannelGroup>,
    pub fail_catalog: AtomicBool,
    pub catalog_calls: AtomicUsize,
    pub guide_calls: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            groups: vec![ChannelGroup::new("央视", SourceTag::Primary).with_items(vec![
                ChannelItem::upstream("CCTV1", "608807420", "http://logo/1.png"),
                ChannelItem::upstream("CCTV2", "631780532", "http://logo/2.png"),
            ])],
            fail_catalog: AtomicBool::new(false),
            catalog_calls: AtomicUsize::new(0),
            guide_calls: AtomicUsize::new(0),
        }
    }

    pub fn offline() -> Self {
        Self {
            fail_catalog: AtomicBool::new(true),
            ..Self::new()
        }
    }

    pub fn empty() -> Self {
        Self {
            groups: Vec::new(),
            ..Self::new()
        }
    }
}

#[async_trait]
impl PrimaryPlatform for FakePlatform {
    async fn channel_groups(&self) -> AppResult<Vec<ChannelGroup>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(AppError::upstream("catalog offline"));
        }
        Ok(self.groups.clone())
    }

    async fn resolve_play_url(
        &self,
        channel_id: &str,
        identity: &Identity,
        window: &PlaybackWindow,
    ) -> AppResult<String> {
        if channel_id == "missing" {
            return Err(AppError::upstream("no stream for channel"));
        }
        let mut url = format!("http://cdn.example/{channel_id}.m3u8?user={}", identity.user_id);
        if let Some(begin) = &window.begin {
            url.push_str(&format!("&begin={begin}"));
        }
        Ok(url)
    }

    async fn program_guide(&self, _channel_id: &str, now: DateTime<Utc>) -> AppResult<Vec<Programme>> {
        self.guide_calls.fetch_add(1, Ordering::SeqCst);
        let start = now.timestamp_millis();
        Ok(vec![Programme {
            title: "新闻联播".to_string(),
            start,
            stop: start + 30 * 60 * 1000,
        }])
    }

    async fn scheduled_events(&self, _now: DateTime<Utc>) -> AppResult<ScheduledEvents> {
        Ok(ScheduledEvents::default())
    }

    async fn refresh_token(&self, _identity: &Identity) -> AppResult<bool> {
        Ok(true)
    }
}

/// Returns a fixed candidate list for every page
pub struct FakeExtractor(pub Vec<String>);

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&self, _web_url: &str, _request: &ExtractRequest) -> Vec<String> {
        self.0.clone()
    }
}

/// Accepts every URL containing `good`
pub struct FakeValidator;

#[async_trait]
impl Validator for FakeValidator {
    async fn validate(&self, url: &str, _referer: Option<&str>) -> bool {
        url.contains("good")
    }
}

pub struct TestApp {
    pub state: AppState,
    pub platform: Arc<FakePlatform>,
    pub update_rx: UpdateReceiver,
    pub dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config.platform.user_id = "default-user".to_string();
    config.platform.token = "default-token".to_string();
    config.refresh.inter_source_delay = Duration::ZERO;
    config
}

pub async fn build_app(config: Config, platform: FakePlatform, dir: TempDir) -> TestApp {
    let platform = Arc::new(platform);
    let store = Arc::new(SourceStore::open(StorePaths::from(&config.storage)).await);
    let refresher = Arc::new(RefreshScheduler::new(
        store.clone(),
        Arc::new(FakeExtractor(vec!["http://cdn.example/good.m3u8".to_string()])),
        Arc::new(FakeValidator),
        Duration::ZERO,
    ));
    let identity = Identity::new(config.platform.user_id.clone(), config.platform.token.clone());
    let catalog = Arc::new(CatalogService::new(
        platform.clone(),
        store.clone(),
        refresher,
        Materializer::new(&config.storage),
        identity.clone(),
        config.refresh.token_refresh_hours,
    ));
    let resolver = Arc::new(ChannelResolver::new(
        platform.clone(),
        identity,
        config.refresh.resolution_cache_ttl,
    ));
    let (update_tx, update_rx) = create_update_channel();

    TestApp {
        state: AppState {
            config: Arc::new(config),
            store,
            catalog,
            resolver,
            update_tx,
        },
        platform,
        update_rx,
        dir,
    }
}

pub async fn default_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    build_app(config, FakePlatform::new(), dir).await
}
