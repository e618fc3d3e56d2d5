//! External source operations that do not need the network.
//!
//! Refreshing a source (extraction + validation) lives in
//! [`crate::ingestor::refresh`]; everything here is plain document editing.

use chrono::{DateTime, Utc};
use tracing::info;

use super::SourceStore;
use crate::errors::{AppError, AppResult};
use crate::models::{
    ChannelGroup, ChannelItem, ExternalSource, ExternalSourcesDocument, ExternalSourcesSummary,
    NewExternalSource, OperationResult, SourceTag,
};

/// Resolve a possibly negative position against a list length
pub(crate) fn checked_index(index: i64, len: usize) -> AppResult<usize> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < len)
        .ok_or(AppError::InvalidIndex { index, len })
}

impl SourceStore {
    pub async fn add_external(&self, input: NewExternalSource) -> OperationResult {
        if input.name.trim().is_empty() {
            return OperationResult::failure("Source name is required");
        }
        let source = input.into_source();
        let name = source.name.clone();
        match self
            .mutate_external(move |doc| {
                doc.sources.push(source);
                Ok(())
            })
            .await
        {
            Ok(()) => {
                info!("Added external source '{}'", name);
                OperationResult::ok()
            }
            Err(e) => e.into(),
        }
    }

    pub async fn remove_external(&self, index: i64) -> OperationResult {
        match self
            .mutate_external(|doc| {
                let i = checked_index(index, doc.sources.len())?;
                Ok(doc.sources.remove(i))
            })
            .await
        {
            Ok(removed) => {
                info!("Removed external source '{}'", removed.name);
                OperationResult::ok()
            }
            Err(e) => e.into(),
        }
    }

    /// Manually set the resolved stream URL, stamping the update time
    pub async fn set_external_m3u8(&self, index: i64, url: String, now: DateTime<Utc>) -> OperationResult {
        match self
            .mutate_external(|doc| {
                let i = checked_index(index, doc.sources.len())?;
                let source = &mut doc.sources[i];
                source.m3u8_url = url.clone();
                source.last_updated = Some(now);
                Ok(source.name.clone())
            })
            .await
        {
            Ok(name) => {
                info!("Stream URL for '{}' set manually", name);
                OperationResult::ok().with_url(url)
            }
            Err(e) => e.into(),
        }
    }

    /// Replace the source list, keeping the envelope flags
    pub async fn replace_external_sources(&self, sources: Vec<ExternalSource>) -> OperationResult {
        let count = sources.len();
        match self
            .mutate_external(move |doc| {
                doc.sources = sources;
                Ok(())
            })
            .await
        {
            Ok(()) => OperationResult::ok_with_message(format!("Saved {count} external sources")),
            Err(e) => e.into(),
        }
    }

    pub async fn toggle_external(&self, enabled: bool) -> OperationResult {
        self.set_envelope_flag(move |doc| doc.enabled = enabled).await
    }

    pub async fn set_update_on_startup(&self, enabled: bool) -> OperationResult {
        self.set_envelope_flag(move |doc| doc.update_on_startup = enabled)
            .await
    }

    pub async fn set_include_in_playlists(&self, enabled: bool) -> OperationResult {
        self.set_envelope_flag(move |doc| doc.include_in_playlists = enabled)
            .await
    }

    async fn set_envelope_flag<F>(&self, apply: F) -> OperationResult
    where
        F: FnOnce(&mut ExternalSourcesDocument),
    {
        self.mutate_external(|doc| {
            apply(doc);
            Ok(())
        })
        .await
        .map(|_| OperationResult::ok())
        .unwrap_or_else(OperationResult::from)
    }

    pub async fn external_summary(&self) -> ExternalSourcesSummary {
        let doc = self.external.read().await;
        ExternalSourcesSummary {
            enabled: doc.enabled,
            include_in_playlists: doc.include_in_playlists,
            update_on_startup: doc.update_on_startup,
            sources_count: doc.sources.len(),
            valid_sources_count: doc
                .sources
                .iter()
                .filter(|s| s.enabled && !s.m3u8_url.is_empty())
                .count(),
            last_global_update: doc.last_global_update,
        }
    }

    /// Resolved external channels grouped by declared group, in declaration order
    pub async fn external_valid_groups(&self) -> Vec<ChannelGroup> {
        let doc = self.external.read().await;
        if !doc.enabled {
            return Vec::new();
        }
        group_in_order(
            doc.sources
                .iter()
                .filter(|s| s.enabled && !s.m3u8_url.is_empty())
                .map(|s| {
                    (
                        s.group.clone(),
                        ChannelItem::direct(&s.name, &s.m3u8_url, &s.logo, SourceTag::External),
                    )
                }),
            SourceTag::External,
        )
    }
}

/// Collect `(group, item)` pairs into groups keyed by first appearance
pub(crate) fn group_in_order<I>(items: I, tag: SourceTag) -> Vec<ChannelGroup>
where
    I: IntoIterator<Item = (String, ChannelItem)>,
{
    let mut groups: Vec<ChannelGroup> = Vec::new();
    for (group, item) in items {
        match groups.iter_mut().find(|g| g.name == group) {
            Some(existing) => existing.data_list.push(item),
            None => groups.push(ChannelGroup::new(group, tag).with_items(vec![item])),
        }
    }
    groups
}
