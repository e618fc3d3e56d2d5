//! Request-time channel resolution with a short-lived cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::AppResult;
use crate::platform::{Identity, PlaybackWindow, PrimaryPlatform};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResolutionKey {
    channel_id: String,
    /// Full identity: URLs signed for one token must not leak to another
    identity: Identity,
    window: PlaybackWindow,
}

#[derive(Debug, Clone)]
struct CachedUrl {
    url: String,
    resolved_at: Instant,
}

pub struct ChannelResolver {
    platform: Arc<dyn PrimaryPlatform>,
    default_identity: Identity,
    ttl: Duration,
    cache: RwLock<HashMap<ResolutionKey, CachedUrl>>,
}

impl ChannelResolver {
    pub fn new(platform: Arc<dyn PrimaryPlatform>, default_identity: Identity, ttl: Duration) -> Self {
        Self {
            platform,
            default_identity,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_identity(&self) -> &Identity {
        &self.default_identity
    }

    /// Resolve a channel id to a stream URL, using the per-request identity
    /// override when given and the configured defaults otherwise
    pub async fn resolve(
        &self,
        channel_id: &str,
        identity: Option<&Identity>,
        window: &PlaybackWindow,
    ) -> AppResult<String> {
        let identity = identity.unwrap_or(&self.default_identity);
        let key = ResolutionKey {
            channel_id: channel_id.to_string(),
            identity: identity.clone(),
            window: window.clone(),
        };

        if let Some(url) = self.cached(&key).await {
            debug!("Resolution cache hit for {}", channel_id);
            return Ok(url);
        }

        let url = self
            .platform
            .resolve_play_url(channel_id, identity, window)
            .await?;
        info!(
            "Resolved {}{}",
            channel_id,
            if window.is_live() { "" } else { " (catch-up)" }
        );

        if !self.ttl.is_zero() {
            let mut cache = self.cache.write().await;
            cache.retain(|_, entry| entry.resolved_at.elapsed() < self.ttl);
            cache.insert(
                key,
                CachedUrl {
                    url: url.clone(),
                    resolved_at: Instant::now(),
                },
            );
        }
        Ok(url)
    }

    async fn cached(&self, key: &ResolutionKey) -> Option<String> {
        if self.ttl.is_zero() {
            return None;
        }
        self.cache
            .read()
            .await
            .get(key)
            .filter(|entry| entry.resolved_at.elapsed() < self.ttl)
            .map(|entry| entry.url.clone())
    }
}
