/// Configuration default values
///
/// Every tunable lives here so the TOML defaults, the `system-config.json`
/// normalisation and the tests agree on one set of numbers.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 1905;

// Access defaults
pub const DEFAULT_AUTH_FAILURE_STATUS: u16 = 200;

// Platform defaults
pub const DEFAULT_RATE_TYPE: u8 = 3;
pub const DEFAULT_REQUEST_TIMEOUT: &str = "6s";
pub const DEFAULT_CATEGORY_INDEX_URL: &str =
    "https://program-sc.miguvideo.com/live/v2/tv-data/1ff892f2b5ab4a79be6e25b69d2f5d05";
pub const DEFAULT_CATEGORY_URL_BASE: &str = "https://program-sc.miguvideo.com/live/v2/tv-data";
pub const DEFAULT_PROGRAM_URL_BASE: &str =
    "https://program-sc.miguvideo.com/live/v2/tv-programs-data";
pub const DEFAULT_PLAY_URL_ENDPOINT: &str =
    "https://play.miguvideo.com/playurl/v1/play/playurl";
pub const DEFAULT_MATCH_LIST_URL: &str = "http://v0-sc.miguvideo.com/vms-match/v6/staticcache/basic/match-list/normal-match-list/0/all/default/1/miguvideo";
pub const DEFAULT_MATCH_DETAIL_URL_BASE: &str =
    "https://vms-sc.miguvideo.com/vms-match/v6/staticcache/basic/basic-data";
pub const DEFAULT_MATCH_REPLAY_URL_BASE: &str =
    "http://app-sc.miguvideo.com/vms-match/v5/staticcache/basic/all-view-list";
pub const DEFAULT_EXCLUDED_CATEGORY: &str = "热门";
pub const DEFAULT_SCHEDULED_EVENTS: bool = true;

// Storage defaults
pub const DEFAULT_DATA_DIR: &str = ".";
pub const DEFAULT_M3U_FILE: &str = "interface.txt";
pub const DEFAULT_TXT_FILE: &str = "interfaceTXT.txt";
pub const DEFAULT_GUIDE_FILE: &str = "playback.xml";
pub const DEFAULT_CUSTOM_M3U_FILE: &str = "interface-custom.txt";
pub const DEFAULT_EXTERNAL_SOURCES_FILE: &str = "external-sources.json";
pub const DEFAULT_BUILT_IN_SOURCES_FILE: &str = "built-in-sources.json";
pub const DEFAULT_BUILT_IN_CACHE_FILE: &str = "built-in-sources-cache.json";
pub const DEFAULT_PLAYLIST_CONFIG_FILE: &str = "my-playlist-config.json";
pub const DEFAULT_SYSTEM_CONFIG_FILE: &str = "system-config.json";

// Refresh defaults
pub const DEFAULT_UPDATE_INTERVAL_HOURS: u64 = 8;
pub const DEFAULT_INTER_SOURCE_DELAY: &str = "2s";
pub const DEFAULT_RESOLUTION_CACHE_TTL: &str = "30s";
pub const DEFAULT_TOKEN_REFRESH_HOURS: u64 = 720;

// Source defaults
pub const DEFAULT_REFRESH_INTERVAL_MINUTES: u64 = 240;
pub const DEFAULT_EXTERNAL_GROUP: &str = "其他";
pub const DEFAULT_BUILT_IN_GROUP: &str = "未分组";
pub const DEFAULT_ENVELOPE_UPDATE_INTERVAL_MINUTES: u64 = 60;

// Extractor defaults
pub const DEFAULT_WAIT_TIME_MS: u64 = 5000;
pub const DEFAULT_PAGE_TIMEOUT: &str = "30s";
pub const DEFAULT_VALIDATION_TIMEOUT: &str = "10s";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
