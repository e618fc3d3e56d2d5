//! Utility functions shared across the aggregator
//!
//! - [`json_file`]: tolerant JSON document loading and atomic replacement
//! - [`time`]: platform-local date formatting

pub mod json_file;
pub mod time;

/// Mask a credential for logging, keeping the first four characters
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}***")
}

/// Last non-empty path segment of a URL, ignoring any query string
pub fn last_path_segment(url: &str) -> &str {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(without_query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("abcdefgh"), "abcd***");
        assert_eq!(mask_secret("ab"), "ab***");
    }

    #[test]
    fn test_last_path_segment() {
        assert_eq!(last_path_segment("${replace}/608807420"), "608807420");
        assert_eq!(last_path_segment("http://h/live/a.m3u8?k=v"), "a.m3u8");
        assert_eq!(last_path_segment("plain"), "plain");
    }
}
