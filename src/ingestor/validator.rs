use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, ORIGIN, RANGE, REFERER};
use reqwest::Client;
use tracing::debug;

use super::Validator;
use crate::config::ExtractorConfig;
use crate::errors::AppResult;

const PLAYLIST_ACCEPT: &str =
    "application/vnd.apple.mpegurl, application/x-mpegURL, application/octet-stream, */*";

/// Partial-range request against a candidate stream URL
pub struct HttpValidator {
    client: Client,
}

impl HttpValidator {
    pub fn new(config: &ExtractorConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.validation_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

/// Content types that players accept as a playlist
pub fn is_playlist_content_type(content_type: &str) -> bool {
    let normalized = content_type.to_ascii_lowercase();
    ["mpegurl", "application", "octet-stream", "text/plain"]
        .iter()
        .any(|marker| normalized.contains(marker))
}

#[async_trait]
impl Validator for HttpValidator {
    async fn validate(&self, url: &str, referer: Option<&str>) -> bool {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, PLAYLIST_ACCEPT)
            .header(RANGE, "bytes=0-2048");

        if let Some(referer) = referer.filter(|r| !r.is_empty()) {
            request = request.header(REFERER, referer);
            if let Ok(parsed) = url::Url::parse(referer) {
                request = request.header(ORIGIN, parsed.origin().ascii_serialization());
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Validation request for {} failed: {}", url, e);
                return false;
            }
        };
        if !response.status().is_success() {
            debug!("Validation of {} returned {}", url, response.status());
            return false;
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if is_playlist_content_type(&content_type) {
            return true;
        }

        response
            .text()
            .await
            .map(|body| body.contains("#EXTM3U"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_content_types() {
        assert!(is_playlist_content_type("application/vnd.apple.mpegURL"));
        assert!(is_playlist_content_type("audio/x-mpegurl"));
        assert!(is_playlist_content_type("text/plain; charset=utf-8"));
        assert!(!is_playlist_content_type("text/html"));
        assert!(!is_playlist_content_type(""));
    }
}
