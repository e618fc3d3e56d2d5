//! Persisted source definitions.
//!
//! Field names follow the camelCase JSON documents that users edit by hand
//! and that older releases wrote, so existing files load unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::defaults::{
    DEFAULT_BUILT_IN_GROUP, DEFAULT_ENVELOPE_UPDATE_INTERVAL_MINUTES, DEFAULT_EXTERNAL_GROUP,
    DEFAULT_REFRESH_INTERVAL_MINUTES, DEFAULT_WAIT_TIME_MS,
};

/// Current external-sources document schema
pub const EXTERNAL_SOURCES_VERSION: u32 = 2;

fn yes() -> bool {
    true
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_MINUTES
}

fn default_external_group() -> String {
    DEFAULT_EXTERNAL_GROUP.to_string()
}

fn default_built_in_group() -> String {
    DEFAULT_BUILT_IN_GROUP.to_string()
}

fn default_wait_time() -> u64 {
    DEFAULT_WAIT_TIME_MS
}

fn default_envelope_interval() -> u64 {
    DEFAULT_ENVELOPE_UPDATE_INTERVAL_MINUTES
}

/// Hints handed to the extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOptions {
    #[serde(default = "default_wait_time")]
    pub wait_time: u64,
    #[serde(default = "yes")]
    pub headless: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            wait_time: DEFAULT_WAIT_TIME_MS,
            headless: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSource {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_external_group")]
    pub group: String,
    #[serde(default)]
    pub web_url: String,
    #[serde(
        default,
        rename = "playButtonSelector",
        skip_serializing_if = "Option::is_none"
    )]
    pub extraction_hint: Option<String>,
    #[serde(default)]
    pub m3u8_url: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default = "yes")]
    pub auto_refresh: bool,
    #[serde(default = "default_refresh_interval", rename = "refreshInterval")]
    pub refresh_interval_minutes: u64,
    #[serde(default = "yes")]
    pub update_on_startup: bool,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extract_options: ExtractOptions,
}

/// Fields accepted by the add operation; everything but `name` is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExternalSource {
    pub name: String,
    pub group: Option<String>,
    pub web_url: Option<String>,
    pub play_button_selector: Option<String>,
    pub m3u8_url: Option<String>,
    pub logo: Option<String>,
    pub enabled: Option<bool>,
    pub auto_refresh: Option<bool>,
    pub refresh_interval: Option<u64>,
    pub update_on_startup: Option<bool>,
    pub wait_time: Option<u64>,
    pub headless: Option<bool>,
    pub extract_options: Option<ExtractOptions>,
}

impl NewExternalSource {
    pub fn into_source(self) -> ExternalSource {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let extract_options = self.extract_options.unwrap_or(ExtractOptions {
            wait_time: self.wait_time.filter(|w| *w > 0).unwrap_or(DEFAULT_WAIT_TIME_MS),
            headless: self.headless.unwrap_or(true),
        });

        ExternalSource {
            id: new_id(),
            name: self.name,
            group: non_empty(self.group).unwrap_or_else(default_external_group),
            web_url: self.web_url.unwrap_or_default(),
            extraction_hint: non_empty(self.play_button_selector),
            m3u8_url: self.m3u8_url.unwrap_or_default(),
            logo: self.logo.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            auto_refresh: self.auto_refresh.unwrap_or(true),
            refresh_interval_minutes: self
                .refresh_interval
                .filter(|i| *i > 0)
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_MINUTES),
            update_on_startup: self.update_on_startup.unwrap_or(true),
            last_updated: None,
            extract_options,
        }
    }
}

/// Envelope persisted as `external-sources.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSourcesDocument {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "yes")]
    pub include_in_playlists: bool,
    /// Whether the startup run refreshes the primary catalog
    #[serde(default = "yes")]
    pub update_on_startup: bool,
    #[serde(default)]
    pub sources: Vec<ExternalSource>,
    #[serde(default = "default_envelope_interval")]
    pub update_interval: u64,
    #[serde(default)]
    pub last_global_update: Option<DateTime<Utc>>,
}

impl Default for ExternalSourcesDocument {
    fn default() -> Self {
        Self {
            version: EXTERNAL_SOURCES_VERSION,
            enabled: false,
            include_in_playlists: true,
            update_on_startup: true,
            sources: Vec::new(),
            update_interval: DEFAULT_ENVELOPE_UPDATE_INTERVAL_MINUTES,
            last_global_update: None,
        }
    }
}

/// Summary returned by the external-source config view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSourcesSummary {
    pub enabled: bool,
    pub include_in_playlists: bool,
    pub update_on_startup: bool,
    pub sources_count: usize,
    pub valid_sources_count: usize,
    pub last_global_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltInMode {
    /// Stream URL shipped in the definition
    #[default]
    Direct,
    /// Stream URL scraped from `webUrl` and cached
    Fetch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltInSource {
    pub id: String,
    pub name: String,
    #[serde(default = "default_built_in_group")]
    pub group: String,
    #[serde(default)]
    pub mode: BuiltInMode,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub m3u8_url: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default = "yes")]
    pub auto_refresh: bool,
    #[serde(default = "default_refresh_interval", rename = "refreshInterval")]
    pub refresh_interval_minutes: u64,
    #[serde(default)]
    pub update_on_startup: bool,
    #[serde(default)]
    pub extract_options: ExtractOptions,
    #[serde(default)]
    pub description: String,
}

/// Shipped catalog persisted as `built-in-sources.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltInSourcesDocument {
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default)]
    pub sources: Vec<BuiltInSource>,
}

impl Default for BuiltInSourcesDocument {
    fn default() -> Self {
        Self {
            enabled: true,
            sources: Vec::new(),
        }
    }
}

/// Cached resolution for a fetch-mode built-in source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshCacheEntry {
    pub m3u8_url: String,
    /// Epoch milliseconds
    pub last_update: i64,
    pub update_time: String,
}

impl RefreshCacheEntry {
    pub fn now(m3u8_url: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            m3u8_url: m3u8_url.into(),
            last_update: now.timestamp_millis(),
            update_time: now.to_rfc3339(),
        }
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.last_update)
    }
}

/// `built-in-sources-cache.json`, keyed by source id
pub type BuiltInCache = BTreeMap<String, RefreshCacheEntry>;

/// Admin listing row for a built-in source
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltInSourceView {
    #[serde(flatten)]
    pub source: BuiltInSource,
    pub built_in: bool,
    pub cached_m3u8_url: Option<String>,
    pub last_update: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltInSummary {
    pub enabled: bool,
    pub total_count: usize,
    pub enabled_count: usize,
    pub fetch_count: usize,
    pub cached_count: usize,
}
