use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// User catalog-shaping preferences (`my-playlist-config.json`).
///
/// Only `hiddenChannels`, `groupOrder` and `deletedGroups` affect output;
/// the remaining fields belong to the admin page and are preserved as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistConfig {
    pub channel_group_map: BTreeMap<String, String>,
    #[serde(rename = "hiddenChannels")]
    pub hidden_channel_ids: Vec<String>,
    pub custom_groups: Vec<Value>,
    pub group_order: Vec<String>,
    #[serde(rename = "deletedGroups")]
    pub deleted_group_names: Vec<String>,
}

/// One entry read back from a published M3U document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedChannel {
    pub id: String,
    pub name: String,
    pub tvg_id: String,
    pub tvg_name: String,
    pub logo: String,
    pub url: String,
    pub original_group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedGroup {
    pub name: String,
    pub channels: Vec<ParsedChannel>,
}
