//! Catalog update pipeline.
//!
//! One run refreshes due auxiliary sources, fetches the primary catalog and
//! scheduled events, merges and publishes. Runs are serialized; a failing
//! stage degrades to cached data and never tears down published artifacts.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::ingestor::{BatchReport, RefreshOptions, RefreshScheduler};
use crate::models::{channel_count, ChannelGroup};
use crate::platform::{Identity, PrimaryPlatform};
use crate::proxy::{build_guide, merge, MaterializeOutcome, Materializer};
use crate::sources::SourceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateMode {
    /// First run after process start
    Startup,
    /// Timer-driven or manually requested full run
    Scheduled,
    /// Re-merge with cached primary data, no source refresh, no guide rebuild
    RegenerateOnly,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReport {
    pub mode: UpdateMode,
    /// Startup run skipped because the envelope disables startup updates
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<BatchReport>,
    pub channels: usize,
    pub published: bool,
    pub warnings: Vec<String>,
}

impl UpdateReport {
    fn new(mode: UpdateMode) -> Self {
        Self {
            mode,
            skipped: false,
            refresh: None,
            channels: 0,
            published: false,
            warnings: Vec::new(),
        }
    }
}

enum PrimaryCatalog {
    Fresh(Vec<ChannelGroup>),
    Cached(Vec<ChannelGroup>),
}

impl PrimaryCatalog {
    fn groups(&self) -> &[ChannelGroup] {
        match self {
            PrimaryCatalog::Fresh(groups) | PrimaryCatalog::Cached(groups) => groups,
        }
    }
}

#[derive(Debug, Default)]
struct CatalogCache {
    primary: Option<Vec<ChannelGroup>>,
    events: Vec<ChannelGroup>,
    merged: Vec<ChannelGroup>,
}

pub struct CatalogService {
    platform: Arc<dyn PrimaryPlatform>,
    store: Arc<SourceStore>,
    refresher: Arc<RefreshScheduler>,
    materializer: Materializer,
    identity: Identity,
    token_refresh_hours: u64,
    cache: RwLock<CatalogCache>,
    run_lock: Mutex<()>,
}

impl CatalogService {
    pub fn new(
        platform: Arc<dyn PrimaryPlatform>,
        store: Arc<SourceStore>,
        refresher: Arc<RefreshScheduler>,
        materializer: Materializer,
        identity: Identity,
        token_refresh_hours: u64,
    ) -> Self {
        Self {
            platform,
            store,
            refresher,
            materializer,
            identity,
            token_refresh_hours,
            cache: RwLock::new(CatalogCache::default()),
            run_lock: Mutex::new(()),
        }
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    pub fn refresher(&self) -> &Arc<RefreshScheduler> {
        &self.refresher
    }

    /// Last merged catalog (without scheduled events)
    pub async fn catalog(&self) -> Vec<ChannelGroup> {
        self.cache.read().await.merged.clone()
    }

    /// Run one update. `hours` is the cumulative scheduler time, used for the
    /// token refresh cadence.
    pub async fn update(&self, hours: u64, mode: UpdateMode) -> UpdateReport {
        let _guard = self.run_lock.lock().await;
        let started = Instant::now();
        let mut report = UpdateReport::new(mode);
        let envelope = self.store.external().await;

        if mode == UpdateMode::Startup && !envelope.update_on_startup {
            info!("Startup update disabled, keeping existing playlists");
            report.skipped = true;
            return report;
        }
        info!("Catalog update started ({:?})", mode);

        if mode != UpdateMode::RegenerateOnly {
            let options = RefreshOptions {
                startup_mode: mode == UpdateMode::Startup,
                auto_only: mode == UpdateMode::Scheduled,
                force_all: false,
            };
            report.refresh = Some(self.refresher.refresh_all(options).await);
            self.refresh_token_if_due(hours).await;
        }

        let now = Utc::now();
        let Some(primary) = self.primary_groups(mode, &mut report).await else {
            warn!("No primary catalog available, keeping existing playlists");
            report
                .warnings
                .push("no primary catalog, playlists not replaced".to_string());
            return report;
        };
        let events = self.event_groups(mode, now, &mut report).await;

        let mut auxiliary = self.store.external_valid_groups().await;
        auxiliary.extend(self.store.built_in_valid_groups().await);
        let merged = merge(primary.groups().to_vec(), auxiliary);
        debug!(
            "Merged catalog: {} groups, {} channels",
            merged.len(),
            channel_count(&merged)
        );

        // cached groups leave the published guide in place
        let guide = match (&primary, mode) {
            (_, UpdateMode::RegenerateOnly) | (PrimaryCatalog::Cached(_), _) => None,
            (PrimaryCatalog::Fresh(groups), _) => {
                Some(build_guide(self.platform.as_ref(), groups, now).await)
            }
        };

        // re-read: the refresh above may have changed the envelope
        let include_external = self.store.external().await.include_in_playlists;
        match self
            .materializer
            .materialize(&merged, &events, include_external, guide)
            .await
        {
            Ok(MaterializeOutcome::Published { channels, .. }) => {
                report.published = true;
                report.channels = channels;
            }
            Ok(MaterializeOutcome::SkippedEmpty) => {
                report.warnings.push("catalog empty, playlists not replaced".to_string());
            }
            Err(e) => {
                error!("Publishing playlists failed: {}", e);
                report.warnings.push(format!("publish failed: {e}"));
            }
        }

        self.cache.write().await.merged = merged;
        info!(
            "Catalog update finished in {:.1}s ({} channels)",
            started.elapsed().as_secs_f64(),
            report.channels
        );
        report
    }

    async fn refresh_token_if_due(&self, hours: u64) {
        if self.token_refresh_hours == 0 || hours % self.token_refresh_hours != 0 {
            return;
        }
        if self.identity.is_anonymous() {
            return;
        }
        match self.platform.refresh_token(&self.identity).await {
            Ok(true) => info!("Token refreshed"),
            Ok(false) => warn!("Token refresh was not accepted"),
            Err(e) => warn!("Token refresh failed: {}", e),
        }
    }

    /// Fresh primary groups, or the cached ones when fetching is skipped or
    /// fails. `None` when the platform is down and nothing was ever cached.
    async fn primary_groups(
        &self,
        mode: UpdateMode,
        report: &mut UpdateReport,
    ) -> Option<PrimaryCatalog> {
        if mode == UpdateMode::RegenerateOnly {
            if let Some(cached) = self.cache.read().await.primary.clone() {
                debug!("Using cached primary catalog");
                return Some(PrimaryCatalog::Cached(cached));
            }
        }

        match self.platform.channel_groups().await {
            Ok(groups) => {
                self.cache.write().await.primary = Some(groups.clone());
                Some(PrimaryCatalog::Fresh(groups))
            }
            Err(e) => {
                warn!("Primary catalog unavailable: {}", e);
                report.warnings.push(format!("primary catalog unavailable: {e}"));
                self.cache.read().await.primary.clone().map(PrimaryCatalog::Cached)
            }
        }
    }

    async fn event_groups(
        &self,
        mode: UpdateMode,
        now: chrono::DateTime<Utc>,
        report: &mut UpdateReport,
    ) -> Vec<ChannelGroup> {
        if mode == UpdateMode::RegenerateOnly {
            return self.cache.read().await.events.clone();
        }

        match self.platform.scheduled_events(now).await {
            Ok(events) => {
                for warning in &events.warnings {
                    debug!("Scheduled event: {}", warning);
                }
                report.warnings.extend(events.warnings);
                self.cache.write().await.events = events.groups.clone();
                events.groups
            }
            Err(e) => {
                warn!("Scheduled events unavailable: {}", e);
                self.cache.read().await.events.clone()
            }
        }
    }
}
