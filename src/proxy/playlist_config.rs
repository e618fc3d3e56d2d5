//! User playlist customisation.
//!
//! The published M3U document is parsed back into groups, the user's
//! [`PlaylistConfig`] is applied (hidden channels, deleted groups, group
//! order) and the result is published as a separate custom playlist. The
//! live merge path never consults this configuration.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use super::generator::M3U_HEADER;
use crate::config::StorageConfig;
use crate::errors::AppResult;
use crate::models::{OperationResult, ParsedChannel, ParsedGroup, PlaylistConfig};
use crate::utils::json_file;
use crate::utils::last_path_segment;

fn attribute(line: &str, name: &str) -> Option<String> {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        ["tvg-id", "tvg-name", "tvg-logo", "group-title"]
            .into_iter()
            .filter_map(|attr| {
                Regex::new(&format!(r#"{attr}="([^"]*)""#))
                    .ok()
                    .map(|re| (attr, re))
            })
            .collect()
    });
    patterns
        .iter()
        .find(|(attr, _)| *attr == name)
        .and_then(|(_, re)| re.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse an M3U document into groups in order of first appearance
pub fn parse_m3u(content: &str) -> Vec<ParsedGroup> {
    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    let mut groups: Vec<ParsedGroup> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        i += 1;
        if !line.starts_with("#EXTINF:") {
            continue;
        }
        let Some(group_name) = attribute(line, "group-title") else {
            continue;
        };
        let Some((_, name)) = line.rsplit_once(',') else {
            continue;
        };
        let Some(url) = lines.get(i).filter(|next| !next.is_empty() && !next.starts_with('#')) else {
            continue;
        };
        i += 1;

        let channel = ParsedChannel {
            id: last_path_segment(url).to_string(),
            name: name.to_string(),
            tvg_id: attribute(line, "tvg-id").unwrap_or_default(),
            tvg_name: attribute(line, "tvg-name").unwrap_or_else(|| name.to_string()),
            logo: attribute(line, "tvg-logo").unwrap_or_default(),
            url: url.to_string(),
            original_group: group_name.clone(),
        };

        match groups.iter_mut().find(|g| g.name == group_name) {
            Some(group) => group.channels.push(channel),
            None => groups.push(ParsedGroup {
                name: group_name,
                channels: vec![channel],
            }),
        }
    }

    groups
}

/// Apply hidden channels, deleted groups and group order
pub fn apply(groups: Vec<ParsedGroup>, config: &PlaylistConfig) -> Vec<ParsedGroup> {
    let mut result: Vec<ParsedGroup> = groups
        .into_iter()
        .filter(|group| !config.deleted_group_names.contains(&group.name))
        .map(|mut group| {
            group
                .channels
                .retain(|channel| !config.hidden_channel_ids.contains(&channel.id));
            group
        })
        .filter(|group| !group.channels.is_empty())
        .collect();

    // listed groups first in list order, the rest keep their relative order
    result.sort_by_key(|group| {
        config
            .group_order
            .iter()
            .position(|name| *name == group.name)
            .unwrap_or(usize::MAX)
    });

    debug!(
        "Playlist config applied: {} groups, {} channels",
        result.len(),
        result.iter().map(|g| g.channels.len()).sum::<usize>()
    );
    result
}

pub fn generate_m3u(groups: &[ParsedGroup]) -> String {
    let mut content = String::from(M3U_HEADER);
    for group in groups {
        for channel in &group.channels {
            content.push_str(&format!(
                "#EXTINF:-1 tvg-id=\"{}\" tvg-name=\"{}\" tvg-logo=\"{}\" group-title=\"{}\",{}\n{}\n",
                channel.tvg_id, channel.tvg_name, channel.logo, group.name, channel.name, channel.url
            ));
        }
    }
    content
}

/// Owns `my-playlist-config.json` and the custom playlist derived from it
#[derive(Debug, Clone)]
pub struct PlaylistConfigStore {
    config_path: PathBuf,
    source_path: PathBuf,
    custom_path: PathBuf,
}

impl PlaylistConfigStore {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            config_path: storage.playlist_config_path(),
            source_path: storage.m3u_path(),
            custom_path: storage.custom_m3u_path(),
        }
    }

    pub fn custom_path(&self) -> &Path {
        &self.custom_path
    }

    pub fn load(&self) -> PlaylistConfig {
        json_file::read_or_default(&self.config_path)
    }

    pub async fn save(&self, config: &PlaylistConfig) -> OperationResult {
        if let Err(e) = json_file::write_atomic(&self.config_path, config).await {
            warn!("Failed to save playlist config: {}", e);
            return e.into();
        }
        info!("Playlist config saved");
        match self.publish_custom().await {
            Ok(_) => OperationResult::ok(),
            Err(e) => OperationResult::ok().with_warning(format!("Custom playlist not published: {e}")),
        }
    }

    pub async fn reset(&self) -> OperationResult {
        self.save(&PlaylistConfig::default()).await
    }

    /// Grouped view of the published playlist, before customisation
    pub async fn published_groups(&self) -> Vec<ParsedGroup> {
        match tokio::fs::read_to_string(&self.source_path).await {
            Ok(content) => parse_m3u(&content),
            Err(e) => {
                debug!("{} unreadable: {}", self.source_path.display(), e);
                Vec::new()
            }
        }
    }

    /// Re-publish the custom playlist from the current published playlist,
    /// returning the number of channels written
    pub async fn publish_custom(&self) -> AppResult<usize> {
        let groups = apply(self.published_groups().await, &self.load());
        let count = groups.iter().map(|g| g.channels.len()).sum();
        json_file::write_text_atomic(&self.custom_path, &generate_m3u(&groups)).await?;
        info!("Custom playlist published ({} channels)", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "#EXTM3U x-tvg-url=\"${replace}/playback.xml\"\n\
#EXTINF:-1 tvg-id=\"CCTV1\" tvg-name=\"CCTV1\" tvg-logo=\"http://l/1.png\" group-title=\"央视\",CCTV1\n\
${replace}/608807420\n\
#EXTINF:-1 tvg-id=\"CCTV2\" tvg-name=\"CCTV2\" tvg-logo=\"\" group-title=\"央视\",CCTV2\n\
${replace}/631780532\n\
#EXTINF:-1 tvg-id=\"Ext\" tvg-name=\"Ext\" tvg-logo=\"\" group-title=\"其他\",Ext\n\
http://example.com/live/stream.m3u8?token=1\n\
#EXTINF:-1 tvg-id=\"Sport\" tvg-name=\"Sport\" tvg-logo=\"\" group-title=\"体育\",Sport\n\
${replace}/1234\n";

    #[test]
    fn test_parse_groups_and_ids() {
        let groups = parse_m3u(SAMPLE);
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["央视", "其他", "体育"]);
        assert_eq!(groups[0].channels.len(), 2);
        assert_eq!(groups[0].channels[0].id, "608807420");
        assert_eq!(groups[0].channels[0].logo, "http://l/1.png");
        assert_eq!(groups[1].channels[0].id, "stream.m3u8");
        assert_eq!(groups[1].channels[0].url, "http://example.com/live/stream.m3u8?token=1");
    }

    #[test]
    fn test_apply_hides_deletes_and_orders() {
        let config = PlaylistConfig {
            hidden_channel_ids: vec!["631780532".into()],
            deleted_group_names: vec!["其他".into()],
            group_order: vec!["体育".into()],
            ..Default::default()
        };
        let groups = apply(parse_m3u(SAMPLE), &config);
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["体育", "央视"]);
        assert_eq!(groups[1].channels.len(), 1);
        assert_eq!(groups[1].channels[0].name, "CCTV1");
    }

    #[test]
    fn test_apply_drops_groups_emptied_by_hiding() {
        let config = PlaylistConfig {
            hidden_channel_ids: vec!["1234".into()],
            ..Default::default()
        };
        let groups = apply(parse_m3u(SAMPLE), &config);
        assert!(groups.iter().all(|g| g.name != "体育"));
    }

    #[test]
    fn test_generate_round_trips_entries() {
        let groups = parse_m3u(SAMPLE);
        let regenerated = generate_m3u(&groups);
        assert!(regenerated.starts_with("#EXTM3U"));
        assert_eq!(parse_m3u(&regenerated), groups);
    }

    #[tokio::test]
    async fn test_store_publishes_custom_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        tokio::fs::write(storage.m3u_path(), SAMPLE).await.unwrap();
        let store = PlaylistConfigStore::new(&storage);

        let config = PlaylistConfig {
            deleted_group_names: vec!["央视".into()],
            ..Default::default()
        };
        assert!(store.save(&config).await.success);
        assert_eq!(store.load(), config);

        let custom = tokio::fs::read_to_string(store.custom_path()).await.unwrap();
        assert!(!custom.contains("CCTV1"));
        assert!(custom.contains("Sport"));

        assert!(store.reset().await.success);
        assert_eq!(store.load(), PlaylistConfig::default());
        let custom = tokio::fs::read_to_string(store.custom_path()).await.unwrap();
        assert!(custom.contains("CCTV1"));
    }
}
