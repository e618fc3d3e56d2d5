//! Page-scanning extractor.
//!
//! Fetches the page and collects every `.m3u8` URL that appears in the
//! markup or in inline scripts, including JSON-escaped (`\/`) forms.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info, warn};

use super::Extractor;
use crate::config::ExtractorConfig;
use crate::errors::AppResult;

/// Hints carried from the source definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractRequest {
    pub extraction_hint: Option<String>,
    pub wait_time_ms: u64,
    pub headless: bool,
}

pub struct PageScanExtractor {
    client: Client,
    pattern: Regex,
}

impl PageScanExtractor {
    pub fn new(config: &ExtractorConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.page_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        let pattern = Regex::new(r#"https?://[^\s"'<>\\]+?\.m3u8[^\s"'<>\\]*"#)
            .map_err(|e| crate::errors::AppError::internal(e.to_string()))?;
        Ok(Self { client, pattern })
    }

    /// Distinct candidate URLs in order of first appearance
    pub fn scan(&self, page: &str) -> Vec<String> {
        let unescaped = page.replace("\\/", "/").replace("&amp;", "&");
        let mut found: Vec<String> = Vec::new();
        for m in self.pattern.find_iter(&unescaped) {
            let url = m.as_str().to_string();
            if !found.contains(&url) {
                found.push(url);
            }
        }
        found
    }
}

#[async_trait]
impl Extractor for PageScanExtractor {
    async fn extract(&self, web_url: &str, request: &ExtractRequest) -> Vec<String> {
        if let Some(hint) = &request.extraction_hint {
            debug!("Extraction hint for {}: {}", web_url, hint);
        }

        let response = match self.client.get(web_url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("Page {} returned {}", web_url, response.status());
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to fetch page {}: {}", web_url, e);
                return Vec::new();
            }
        };

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read page {}: {}", web_url, e);
                return Vec::new();
            }
        };

        let candidates = self.scan(&body);
        if candidates.is_empty() {
            info!("No stream URLs found on {}", web_url);
        } else {
            info!("Found {} candidate stream URLs on {}", candidates.len(), web_url);
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_dedups_in_order() {
        let extractor = PageScanExtractor::new(&ExtractorConfig::default()).unwrap();
        let page = r#"
            <video src="https://cdn.example.com/live/a.m3u8?token=1"></video>
            <script>var cfg = {"url":"https:\/\/cdn.example.com\/live\/b.m3u8"};</script>
            <a href="https://cdn.example.com/live/a.m3u8?token=1">again</a>
            <img src="https://cdn.example.com/poster.jpg">
        "#;
        assert_eq!(
            extractor.scan(page),
            vec![
                "https://cdn.example.com/live/a.m3u8?token=1".to_string(),
                "https://cdn.example.com/live/b.m3u8".to_string(),
            ]
        );
    }

    #[test]
    fn test_scan_empty_page() {
        let extractor = PageScanExtractor::new(&ExtractorConfig::default()).unwrap();
        assert!(extractor.scan("<html></html>").is_empty());
    }
}
