//! User-editable system settings persisted as `system-config.json`.
//!
//! These values are edited through the admin API and override the TOML file
//! and environment variables at the next start.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::warn;

use super::defaults::{DEFAULT_PORT, DEFAULT_RATE_TYPE, DEFAULT_UPDATE_INTERVAL_HOURS};
use super::Config;
use crate::errors::AppResult;
use crate::utils::json_file;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettings {
    pub user_id: String,
    pub token: String,
    pub port: u16,
    pub host: String,
    pub rate_type: u8,
    pub pass: String,
    #[serde(rename = "enableHDR")]
    pub enable_hdr: bool,
    #[serde(rename = "enableH265")]
    pub enable_h265: bool,
    pub program_info_update_interval: String,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            token: String::new(),
            port: DEFAULT_PORT,
            host: String::new(),
            rate_type: DEFAULT_RATE_TYPE,
            pass: String::new(),
            enable_hdr: true,
            enable_h265: true,
            program_info_update_interval: DEFAULT_UPDATE_INTERVAL_HOURS.to_string(),
        }
    }
}

impl SystemSettings {
    /// Snapshot of the settings currently in effect
    pub fn from_config(config: &Config) -> Self {
        Self {
            user_id: config.platform.user_id.clone(),
            token: config.platform.token.clone(),
            port: config.web.port,
            host: config.web.public_host.clone().unwrap_or_default(),
            rate_type: config.platform.rate_type,
            pass: config.access.password.clone(),
            enable_hdr: config.platform.enable_hdr,
            enable_h265: config.platform.enable_h265,
            program_info_update_interval: config.refresh.update_interval_hours.to_string(),
        }
    }

    /// Build validated settings from an arbitrary admin payload.
    ///
    /// Unparseable or missing numbers fall back to their defaults and the
    /// boolean flags are only disabled by an explicit `false`.
    pub fn normalize(raw: &Value) -> Self {
        let text = |key: &str| match raw.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let number = |key: &str| -> Option<u64> {
            match raw.get(key) {
                Some(Value::Number(n)) => n.as_u64(),
                Some(Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            }
        };
        let flag = |key: &str| !matches!(raw.get(key), Some(Value::Bool(false)));

        let interval = text("programInfoUpdateInterval");
        Self {
            user_id: text("userId"),
            token: text("token"),
            port: number("port")
                .and_then(|p| u16::try_from(p).ok())
                .filter(|p| *p != 0)
                .unwrap_or(DEFAULT_PORT),
            host: text("host"),
            rate_type: number("rateType")
                .and_then(|r| u8::try_from(r).ok())
                .filter(|r| *r != 0)
                .unwrap_or(DEFAULT_RATE_TYPE),
            pass: text("pass"),
            enable_hdr: flag("enableHDR"),
            enable_h265: flag("enableH265"),
            program_info_update_interval: if interval.trim().is_empty() {
                DEFAULT_UPDATE_INTERVAL_HOURS.to_string()
            } else {
                interval
            },
        }
    }

    /// Read the settings file; a missing or corrupt file yields `None`
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let raw: Value = json_file::read_or_default(path);
        if raw.is_null() {
            return None;
        }
        Some(Self::normalize(&raw))
    }

    pub async fn save(&self, path: &Path) -> AppResult<()> {
        json_file::write_atomic(path, self).await
    }

    /// Overlay the non-empty values onto a process configuration
    pub fn apply_to(&self, config: &mut Config) {
        if !self.user_id.is_empty() {
            config.platform.user_id = self.user_id.clone();
        }
        if !self.token.is_empty() {
            config.platform.token = self.token.clone();
        }
        if !self.host.is_empty() {
            config.web.public_host = Some(self.host.clone());
        }
        if !self.pass.is_empty() {
            config.access.password = self.pass.clone();
        }
        config.web.port = self.port;
        config.platform.rate_type = self.rate_type;
        config.platform.enable_hdr = self.enable_hdr;
        config.platform.enable_h265 = self.enable_h265;
        match self.program_info_update_interval.trim().parse() {
            Ok(hours) => config.refresh.update_interval_hours = hours,
            Err(_) => warn!(
                "Ignoring invalid programInfoUpdateInterval: {}",
                self.program_info_update_interval
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_applies_defaults() {
        let settings = SystemSettings::normalize(&json!({
            "userId": "u",
            "port": "abc",
            "rateType": 0,
            "enableHDR": false
        }));
        assert_eq!(settings.user_id, "u");
        assert_eq!(settings.port, 1905);
        assert_eq!(settings.rate_type, 3);
        assert!(!settings.enable_hdr);
        assert!(settings.enable_h265);
        assert_eq!(settings.program_info_update_interval, "8");
    }

    #[test]
    fn test_apply_overrides_config() {
        let mut config = Config::default();
        config.platform.user_id = "from-env".to_string();
        let settings = SystemSettings::normalize(&json!({
            "userId": "from-file",
            "port": 3000,
            "pass": "pw",
            "programInfoUpdateInterval": "12"
        }));
        settings.apply_to(&mut config);
        assert_eq!(config.platform.user_id, "from-file");
        assert_eq!(config.web.port, 3000);
        assert_eq!(config.access.password(), Some("pw"));
        assert_eq!(config.refresh.update_interval_hours, 12);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system-config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(SystemSettings::load(&path).is_none());

        SystemSettings::default().save(&path).await.unwrap();
        assert_eq!(SystemSettings::load(&path), Some(SystemSettings::default()));
    }
}
