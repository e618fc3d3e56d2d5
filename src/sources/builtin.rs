//! Built-in sources: a shipped catalog users can only enable or disable.
//!
//! Resolved URLs for fetch-mode sources live in a separate cache document so
//! an upgraded catalog can be dropped in without losing resolutions.

use tracing::debug;

use super::external::group_in_order;
use super::SourceStore;
use crate::errors::AppError;
use crate::models::{
    BuiltInCache, BuiltInMode, BuiltInSource, BuiltInSourceView, BuiltInSummary, ChannelGroup,
    ChannelItem, OperationResult, RefreshCacheEntry, SourceTag,
};

/// The stream URL currently usable for a built-in source
pub fn resolved_url(source: &BuiltInSource, cache: &BuiltInCache) -> Option<String> {
    match source.mode {
        BuiltInMode::Direct => Some(source.m3u8_url.clone()).filter(|u| !u.is_empty()),
        BuiltInMode::Fetch => cache
            .get(&source.id)
            .map(|entry| entry.m3u8_url.clone())
            .filter(|u| !u.is_empty()),
    }
}

impl SourceStore {
    /// Admin listing with cached resolutions attached
    pub async fn built_in_listing(&self) -> (bool, Vec<BuiltInSourceView>) {
        let doc = self.built_in.read().await;
        let cache = self.cache.read().await;
        let views = doc
            .sources
            .iter()
            .map(|source| {
                let entry = cache.get(&source.id);
                BuiltInSourceView {
                    source: source.clone(),
                    built_in: true,
                    cached_m3u8_url: entry.map(|e| e.m3u8_url.clone()),
                    last_update: entry.map(|e| e.update_time.clone()),
                }
            })
            .collect();
        (doc.enabled, views)
    }

    pub async fn set_built_in_enabled(&self, id: &str, enabled: bool) -> OperationResult {
        self.mutate_built_in(|doc| {
            let source = doc
                .sources
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| AppError::not_found("built-in source", id))?;
            source.enabled = enabled;
            Ok(())
        })
        .await
        .map(|_| OperationResult::ok())
        .unwrap_or_else(OperationResult::from)
    }

    /// Record a fresh resolution for a fetch-mode source
    pub async fn put_cache_entry(&self, id: &str, entry: RefreshCacheEntry) -> OperationResult {
        let url = entry.m3u8_url.clone();
        self.mutate_cache(|cache| {
            cache.insert(id.to_string(), entry);
            Ok(())
        })
        .await
        .map(|_| OperationResult::ok().with_url(url))
        .unwrap_or_else(OperationResult::from)
    }

    pub async fn built_in_summary(&self) -> BuiltInSummary {
        let doc = self.built_in.read().await;
        let cache = self.cache.read().await;
        BuiltInSummary {
            enabled: doc.enabled,
            total_count: doc.sources.len(),
            enabled_count: doc.sources.iter().filter(|s| s.enabled).count(),
            fetch_count: doc
                .sources
                .iter()
                .filter(|s| s.mode == BuiltInMode::Fetch)
                .count(),
            cached_count: cache.len(),
        }
    }

    /// Enabled built-in channels with a usable URL, grouped in catalog order
    pub async fn built_in_valid_groups(&self) -> Vec<ChannelGroup> {
        let doc = self.built_in.read().await;
        if !doc.enabled {
            return Vec::new();
        }
        let cache = self.cache.read().await;
        let items = doc.sources.iter().filter(|s| s.enabled).filter_map(|source| {
            match resolved_url(source, &cache) {
                Some(url) => Some((
                    source.group.clone(),
                    ChannelItem::direct(&source.name, url, &source.logo, SourceTag::BuiltIn),
                )),
                None => {
                    debug!("Built-in source '{}' not resolved yet, skipping", source.name);
                    None
                }
            }
        });
        group_in_order(items, SourceTag::BuiltIn)
    }
}
