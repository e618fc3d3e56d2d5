//! Playlist materialization.
//!
//! Renders the merged catalog into the M3U document and the flat text table,
//! then publishes them (with the program guide when one was built) using
//! write-then-rename: every artifact is written in full to its `.tmp` sibling
//! first, and only once all writes succeeded is each one renamed over its
//! canonical path. A reader sees either the previous or the next complete
//! artifact.

use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::playlist_config::PlaylistConfigStore;
use crate::config::StorageConfig;
use crate::errors::AppResult;
use crate::models::{channel_count, ChannelGroup, ChannelItem};
use crate::utils::json_file::temp_path;

pub const M3U_HEADER: &str = "#EXTM3U x-tvg-url=\"${replace}/playback.xml\" catchup=\"append\" catchup-source=\"?playbackbegin=${(b)yyyyMMddHHmmss}&playbackend=${(e)yyyyMMddHHmmss}\"\n";

/// What a materialization run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Published { channels: usize, guide: bool },
    /// Nothing to publish; the previous artifacts stay in place
    SkippedEmpty,
}

/// Drop external-like items (and groups left empty) when they are excluded
pub fn playlist_groups(catalog: &[ChannelGroup], include_external: bool) -> Vec<ChannelGroup> {
    if include_external {
        return catalog.to_vec();
    }
    catalog
        .iter()
        .filter_map(|group| {
            let items: Vec<ChannelItem> = group
                .data_list
                .iter()
                .filter(|item| !item.is_external_like())
                .cloned()
                .collect();
            (!items.is_empty()).then(|| ChannelGroup {
                name: group.name.clone(),
                data_list: items,
                source_tag: group.source_tag,
            })
        })
        .collect()
}

pub fn render_m3u(groups: &[ChannelGroup]) -> String {
    let mut m3u = String::from(M3U_HEADER);
    for group in groups {
        for item in &group.data_list {
            m3u.push_str(&format!(
                "#EXTINF:-1 tvg-id=\"{name}\" tvg-name=\"{name}\" tvg-logo=\"{logo}\" group-title=\"{group}\",{name}\n{url}\n",
                name = item.name,
                logo = item.logo_url,
                group = group.name,
                url = item.play_reference.playlist_url(),
            ));
        }
    }
    m3u
}

pub fn render_txt(groups: &[ChannelGroup]) -> String {
    let mut txt = String::new();
    for group in groups.iter().filter(|g| !g.data_list.is_empty()) {
        txt.push_str(&format!("{},#genre#\n", group.name));
        for item in &group.data_list {
            txt.push_str(&format!("{},{}\n", item.name, item.play_reference.playlist_url()));
        }
    }
    txt
}

pub struct Materializer {
    m3u_path: PathBuf,
    txt_path: PathBuf,
    guide_path: PathBuf,
    playlist_config: PlaylistConfigStore,
}

impl Materializer {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            m3u_path: storage.m3u_path(),
            txt_path: storage.txt_path(),
            guide_path: storage.guide_path(),
            playlist_config: PlaylistConfigStore::new(storage),
        }
    }

    pub fn playlist_config(&self) -> &PlaylistConfigStore {
        &self.playlist_config
    }

    /// Render and publish the catalog followed by the scheduled-event groups.
    ///
    /// `guide` is `None` in regenerate-only runs, which leaves the
    /// published guide untouched.
    pub async fn materialize(
        &self,
        catalog: &[ChannelGroup],
        events: &[ChannelGroup],
        include_external: bool,
        guide: Option<String>,
    ) -> AppResult<MaterializeOutcome> {
        let mut groups = playlist_groups(catalog, include_external);
        if groups.is_empty() {
            warn!("Catalog is empty, keeping previously published playlists");
            return Ok(MaterializeOutcome::SkippedEmpty);
        }
        groups.extend(events.iter().cloned());
        let channels = channel_count(&groups);

        let mut artifacts = vec![
            (self.m3u_path.clone(), render_m3u(&groups)),
            (self.txt_path.clone(), render_txt(&groups)),
        ];
        let with_guide = guide.is_some();
        if let Some(guide) = guide {
            artifacts.push((self.guide_path.clone(), guide));
        }
        publish(&artifacts).await?;
        info!(
            "Playlists published: {} groups, {} channels{}",
            groups.len(),
            channels,
            if with_guide { ", guide refreshed" } else { "" }
        );

        if let Err(e) = self.playlist_config.publish_custom().await {
            warn!("Custom playlist not published: {}", e);
        }

        Ok(MaterializeOutcome::Published {
            channels,
            guide: with_guide,
        })
    }
}

/// Write every artifact to its temporary sibling, then rename them all
async fn publish(artifacts: &[(PathBuf, String)]) -> AppResult<()> {
    for (path, _) in artifacts {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    for (path, contents) in artifacts {
        let temp = temp_path(path);
        if let Err(e) = tokio::fs::write(&temp, contents).await {
            warn!("Writing {} failed: {}", temp.display(), e);
            discard_temps(artifacts).await;
            return Err(e.into());
        }
    }

    for (path, _) in artifacts {
        tokio::fs::rename(temp_path(path), path).await?;
        debug!("Published {}", path.display());
    }
    Ok(())
}

async fn discard_temps(artifacts: &[(PathBuf, String)]) {
    for (path, _) in artifacts {
        let _ = tokio::fs::remove_file(temp_path(path)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceTag;

    fn catalog() -> Vec<ChannelGroup> {
        vec![
            ChannelGroup::new("央视", SourceTag::Primary).with_items(vec![
                ChannelItem::upstream("CCTV1", "608807420", "http://l/1.png"),
                ChannelItem::direct("CCTV1 backup", "http://x/1.m3u8", "", SourceTag::External),
            ]),
            ChannelGroup::new("其他", SourceTag::External).with_items(vec![ChannelItem::direct(
                "Ext",
                "http://x/e.m3u8",
                "",
                SourceTag::External,
            )]),
        ]
    }

    fn storage(dir: &std::path::Path) -> StorageConfig {
        StorageConfig {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_m3u_entries() {
        let m3u = render_m3u(&catalog());
        assert!(m3u.starts_with("#EXTM3U x-tvg-url=\"${replace}/playback.xml\" catchup=\"append\""));
        assert!(m3u.contains(
            "#EXTINF:-1 tvg-id=\"CCTV1\" tvg-name=\"CCTV1\" tvg-logo=\"http://l/1.png\" group-title=\"央视\",CCTV1\n${replace}/608807420\n"
        ));
        assert!(m3u.contains("group-title=\"其他\",Ext\nhttp://x/e.m3u8\n"));
    }

    #[test]
    fn test_render_txt_table() {
        let txt = render_txt(&catalog());
        assert_eq!(
            txt,
            "央视,#genre#\nCCTV1,${replace}/608807420\nCCTV1 backup,http://x/1.m3u8\n其他,#genre#\nExt,http://x/e.m3u8\n"
        );
    }

    #[test]
    fn test_excluding_external_drops_direct_items_and_empty_groups() {
        let mut groups = catalog();
        // a direct URL counts as external even under a primary tag
        groups[0]
            .data_list
            .push(ChannelItem::direct("Odd", "http://x/o.m3u8", "", SourceTag::Primary));
        let filtered = playlist_groups(&groups, false);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].data_list.len(), 1);
        assert_eq!(filtered[0].data_list[0].name, "CCTV1");
    }

    #[tokio::test]
    async fn test_materialize_publishes_without_leftover_temps() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let materializer = Materializer::new(&storage);
        let events = vec![ChannelGroup::new("体育-今天", SourceTag::ScheduledEvent)
            .with_items(vec![ChannelItem {
                source_tag: SourceTag::ScheduledEvent,
                ..ChannelItem::upstream("Match", "777", "")
            }])];

        let outcome = materializer
            .materialize(&catalog(), &events, true, Some("<tv></tv>".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome, MaterializeOutcome::Published { channels: 4, guide: true });

        let m3u = std::fs::read_to_string(storage.m3u_path()).unwrap();
        assert!(m3u.trim_end().ends_with("${replace}/777"));
        assert_eq!(std::fs::read_to_string(storage.guide_path()).unwrap(), "<tv></tv>");
        assert!(storage.custom_m3u_path().exists());
        assert!(!temp_path(&storage.m3u_path()).exists());
        assert!(!temp_path(&storage.txt_path()).exists());
        assert!(!temp_path(&storage.guide_path()).exists());
    }

    #[tokio::test]
    async fn test_regenerate_without_guide_keeps_previous_guide() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        std::fs::write(storage.guide_path(), "old guide").unwrap();
        let materializer = Materializer::new(&storage);

        materializer.materialize(&catalog(), &[], true, None).await.unwrap();
        assert_eq!(std::fs::read_to_string(storage.guide_path()).unwrap(), "old guide");
    }

    #[tokio::test]
    async fn test_empty_catalog_keeps_previous_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        std::fs::write(storage.m3u_path(), "previous").unwrap();
        let materializer = Materializer::new(&storage);

        let outcome = materializer.materialize(&[], &[], true, None).await.unwrap();
        assert_eq!(outcome, MaterializeOutcome::SkippedEmpty);
        assert_eq!(std::fs::read_to_string(storage.m3u_path()).unwrap(), "previous");
    }
}
