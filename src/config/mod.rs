use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub mod defaults;
pub mod duration_serde;
pub mod system;

use defaults::*;
use duration_serde::duration;

pub use system::SystemSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web: WebConfig,
    pub access: AccessConfig,
    pub platform: PlatformConfig,
    pub storage: StorageConfig,
    pub refresh: RefreshConfig,
    pub extractor: ExtractorConfig,
}

/// Which requests pass through the single-flight gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateScope {
    /// Only state-changing (POST) requests are serialized
    #[default]
    Mutations,
    /// Every request is serialized end to end
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Host (optionally with port) advertised in served playlists instead of the request `Host`
    pub public_host: Option<String>,
    pub request_gate: GateScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Path password; empty disables authentication
    pub password: String,
    pub auth_failure_status: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub user_id: String,
    pub token: String,
    pub rate_type: u8,
    pub enable_hdr: bool,
    pub enable_h265: bool,
    #[serde(with = "duration")]
    pub request_timeout: Duration,
    pub category_index_url: String,
    pub category_url_base: String,
    pub program_url_base: String,
    pub play_url_endpoint: String,
    /// Endpoint used for the periodic token refresh; unset disables the call
    pub token_refresh_url: Option<String>,
    pub match_list_url: String,
    pub match_detail_url_base: String,
    pub match_replay_url_base: String,
    pub excluded_categories: Vec<String>,
    pub scheduled_events: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub m3u_file: String,
    pub txt_file: String,
    pub guide_file: String,
    pub custom_m3u_file: String,
    pub external_sources_file: String,
    pub built_in_sources_file: String,
    pub built_in_cache_file: String,
    pub playlist_config_file: String,
    pub system_config_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub update_interval_hours: u64,
    #[serde(with = "duration")]
    pub inter_source_delay: Duration,
    #[serde(with = "duration")]
    pub resolution_cache_ttl: Duration,
    pub token_refresh_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    #[serde(with = "duration")]
    pub page_timeout: Duration,
    #[serde(with = "duration")]
    pub validation_timeout: Duration,
    pub user_agent: String,
}

fn default_duration(value: &str) -> Duration {
    duration_serde::parse(value).unwrap_or_default()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_host: None,
            request_gate: GateScope::default(),
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            password: String::new(),
            auth_failure_status: DEFAULT_AUTH_FAILURE_STATUS,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            token: String::new(),
            rate_type: DEFAULT_RATE_TYPE,
            enable_hdr: true,
            enable_h265: true,
            request_timeout: default_duration(DEFAULT_REQUEST_TIMEOUT),
            category_index_url: DEFAULT_CATEGORY_INDEX_URL.to_string(),
            category_url_base: DEFAULT_CATEGORY_URL_BASE.to_string(),
            program_url_base: DEFAULT_PROGRAM_URL_BASE.to_string(),
            play_url_endpoint: DEFAULT_PLAY_URL_ENDPOINT.to_string(),
            token_refresh_url: None,
            match_list_url: DEFAULT_MATCH_LIST_URL.to_string(),
            match_detail_url_base: DEFAULT_MATCH_DETAIL_URL_BASE.to_string(),
            match_replay_url_base: DEFAULT_MATCH_REPLAY_URL_BASE.to_string(),
            excluded_categories: vec![DEFAULT_EXCLUDED_CATEGORY.to_string()],
            scheduled_events: DEFAULT_SCHEDULED_EVENTS,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            m3u_file: DEFAULT_M3U_FILE.to_string(),
            txt_file: DEFAULT_TXT_FILE.to_string(),
            guide_file: DEFAULT_GUIDE_FILE.to_string(),
            custom_m3u_file: DEFAULT_CUSTOM_M3U_FILE.to_string(),
            external_sources_file: DEFAULT_EXTERNAL_SOURCES_FILE.to_string(),
            built_in_sources_file: DEFAULT_BUILT_IN_SOURCES_FILE.to_string(),
            built_in_cache_file: DEFAULT_BUILT_IN_CACHE_FILE.to_string(),
            playlist_config_file: DEFAULT_PLAYLIST_CONFIG_FILE.to_string(),
            system_config_file: DEFAULT_SYSTEM_CONFIG_FILE.to_string(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            update_interval_hours: DEFAULT_UPDATE_INTERVAL_HOURS,
            inter_source_delay: default_duration(DEFAULT_INTER_SOURCE_DELAY),
            resolution_cache_ttl: default_duration(DEFAULT_RESOLUTION_CACHE_TTL),
            token_refresh_hours: DEFAULT_TOKEN_REFRESH_HOURS,
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            page_timeout: default_duration(DEFAULT_PAGE_TIMEOUT),
            validation_timeout: default_duration(DEFAULT_VALIDATION_TIMEOUT),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AccessConfig {
    /// The configured password, if authentication is enabled
    pub fn password(&self) -> Option<&str> {
        let trimmed = self.password.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

impl StorageConfig {
    fn resolve(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn m3u_path(&self) -> PathBuf {
        self.resolve(&self.m3u_file)
    }

    pub fn txt_path(&self) -> PathBuf {
        self.resolve(&self.txt_file)
    }

    pub fn guide_path(&self) -> PathBuf {
        self.resolve(&self.guide_file)
    }

    pub fn custom_m3u_path(&self) -> PathBuf {
        self.resolve(&self.custom_m3u_file)
    }

    pub fn external_sources_path(&self) -> PathBuf {
        self.resolve(&self.external_sources_file)
    }

    pub fn built_in_sources_path(&self) -> PathBuf {
        self.resolve(&self.built_in_sources_file)
    }

    pub fn built_in_cache_path(&self) -> PathBuf {
        self.resolve(&self.built_in_cache_file)
    }

    pub fn playlist_config_path(&self) -> PathBuf {
        self.resolve(&self.playlist_config_file)
    }

    pub fn system_config_path(&self) -> PathBuf {
        self.resolve(&self.system_config_file)
    }
}

impl Config {
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }

    /// Apply the legacy `m*` environment variables on top of the file values
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("muserId") {
            self.platform.user_id = v;
        }
        if let Some(v) = get("mtoken") {
            self.platform.token = v;
        }
        if let Some(v) = get("mhost") {
            self.web.public_host = Some(v);
        }
        if let Some(v) = get("mpass") {
            self.access.password = v;
        }
        if let Some(v) = get("mport") {
            match v.parse() {
                Ok(port) => self.web.port = port,
                Err(_) => warn!("Ignoring invalid mport value: {}", v),
            }
        }
        if let Some(v) = get("mrateType") {
            match v.parse() {
                Ok(rate) => self.platform.rate_type = rate,
                Err(_) => warn!("Ignoring invalid mrateType value: {}", v),
            }
        }
        if let Some(v) = get("mupdateInterval") {
            match v.parse() {
                Ok(hours) => self.refresh.update_interval_hours = hours,
                Err(_) => warn!("Ignoring invalid mupdateInterval value: {}", v),
            }
        }
        if let Some(v) = get("menableHDR") {
            self.platform.enable_hdr = parse_flag(&v);
        }
        if let Some(v) = get("menableH265") {
            self.platform.enable_h265 = parse_flag(&v);
        }
    }

    /// Overlay `system-config.json` if one exists in the data directory
    pub fn apply_system_settings(&mut self) {
        let path = self.storage.system_config_path();
        if let Some(settings) = SystemSettings::load(&path) {
            settings.apply_to(self);
            info!("Applied system settings from {}", path.display());
        }
    }

    /// Interval between scheduled full updates
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.update_interval_hours.max(1).saturating_mul(60 * 60))
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no" | "off")
}
