//! Refresh scheduling for external and built-in sources.
//!
//! A source is due when auto-refresh is on, it needs extraction at all, and
//! either it was never resolved or its interval has elapsed. Batches walk
//! sources strictly in declaration order (external first, then built-in)
//! with a fixed pause between extraction attempts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ExtractRequest, Extractor, Validator};
use crate::errors::AppError;
use crate::models::{
    BuiltInMode, BuiltInSource, ExternalSource, OperationResult, RefreshCacheEntry,
};
use crate::sources::external::checked_index;
use crate::sources::SourceStore;

#[derive(Debug, Clone)]
pub enum RefreshableSource {
    External(ExternalSource),
    BuiltIn(BuiltInSource, Option<RefreshCacheEntry>),
}

impl RefreshableSource {
    pub fn id(&self) -> &str {
        match self {
            RefreshableSource::External(s) => &s.id,
            RefreshableSource::BuiltIn(s, _) => &s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RefreshableSource::External(s) => &s.name,
            RefreshableSource::BuiltIn(s, _) => &s.name,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            RefreshableSource::External(s) => s.enabled,
            RefreshableSource::BuiltIn(s, _) => s.enabled,
        }
    }

    pub fn auto_refresh(&self) -> bool {
        match self {
            RefreshableSource::External(s) => s.auto_refresh,
            RefreshableSource::BuiltIn(s, _) => s.auto_refresh,
        }
    }

    pub fn update_on_startup(&self) -> bool {
        match self {
            RefreshableSource::External(s) => s.update_on_startup,
            RefreshableSource::BuiltIn(s, _) => s.update_on_startup,
        }
    }

    /// Direct built-ins ship their URL and never need extraction
    pub fn always_resolved(&self) -> bool {
        matches!(self, RefreshableSource::BuiltIn(s, _) if s.mode == BuiltInMode::Direct)
    }

    pub fn refresh_interval(&self) -> chrono::Duration {
        let minutes = match self {
            RefreshableSource::External(s) => s.refresh_interval_minutes,
            RefreshableSource::BuiltIn(s, _) => s.refresh_interval_minutes,
        };
        // intervals beyond the representable range mean "never due by age"
        i64::try_from(minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        match self {
            RefreshableSource::External(s) => s.last_updated,
            RefreshableSource::BuiltIn(_, cache) => cache.as_ref().and_then(|c| c.updated_at()),
        }
    }

    pub fn web_url(&self) -> &str {
        match self {
            RefreshableSource::External(s) => &s.web_url,
            RefreshableSource::BuiltIn(s, _) => &s.web_url,
        }
    }

    /// Stream URL already known for the source
    pub fn current_url(&self) -> Option<&str> {
        let url = match self {
            RefreshableSource::External(s) => s.m3u8_url.as_str(),
            RefreshableSource::BuiltIn(s, cache) => match s.mode {
                BuiltInMode::Direct => s.m3u8_url.as_str(),
                BuiltInMode::Fetch => cache.as_ref().map(|c| c.m3u8_url.as_str()).unwrap_or(""),
            },
        };
        (!url.is_empty()).then_some(url)
    }

    pub fn extract_request(&self) -> ExtractRequest {
        match self {
            RefreshableSource::External(s) => ExtractRequest {
                extraction_hint: s.extraction_hint.clone(),
                wait_time_ms: s.extract_options.wait_time,
                headless: s.extract_options.headless,
            },
            RefreshableSource::BuiltIn(s, _) => ExtractRequest {
                extraction_hint: None,
                wait_time_ms: s.extract_options.wait_time,
                headless: s.extract_options.headless,
            },
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            RefreshableSource::External(_) => "external",
            RefreshableSource::BuiltIn(..) => "built-in",
        }
    }
}

/// Whether a source's cached resolution is stale
pub fn needs_refresh(source: &RefreshableSource, now: DateTime<Utc>) -> bool {
    if !source.auto_refresh() || source.always_resolved() {
        return false;
    }
    match source.last_updated() {
        None => true,
        Some(last) => now.signed_duration_since(last) >= source.refresh_interval(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Only sources flagged `updateOnStartup`, ignoring their interval
    pub startup_mode: bool,
    /// Apply the due-ness check
    pub auto_only: bool,
    /// Bypass the due-ness check
    pub force_all: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRefreshResult {
    pub id: String,
    pub name: String,
    pub kind: &'static str,
    #[serde(flatten)]
    pub result: OperationResult,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub results: Vec<SourceRefreshResult>,
    pub skipped_disabled: usize,
    pub skipped_not_due: usize,
    pub skipped_startup: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.result.success).count()
    }

    pub fn skipped(&self) -> usize {
        self.skipped_disabled + self.skipped_not_due + self.skipped_startup
    }
}

pub struct RefreshScheduler {
    store: Arc<SourceStore>,
    extractor: Arc<dyn Extractor>,
    validator: Arc<dyn Validator>,
    inter_source_delay: Duration,
}

impl RefreshScheduler {
    pub fn new(
        store: Arc<SourceStore>,
        extractor: Arc<dyn Extractor>,
        validator: Arc<dyn Validator>,
        inter_source_delay: Duration,
    ) -> Self {
        Self {
            store,
            extractor,
            validator,
            inter_source_delay,
        }
    }

    /// Every refreshable source in batch order
    async fn candidates(&self) -> Vec<RefreshableSource> {
        let mut sources = Vec::new();

        let external = self.store.external().await;
        if external.enabled {
            sources.extend(external.sources.into_iter().map(RefreshableSource::External));
        } else {
            debug!("External sources disabled, skipping their refresh");
        }

        let built_in = self.store.built_in().await;
        if built_in.enabled {
            let cache = self.store.built_in_cache().await;
            sources.extend(
                built_in
                    .sources
                    .into_iter()
                    .filter(|s| s.mode == BuiltInMode::Fetch)
                    .map(|s| {
                        let entry = cache.get(&s.id).cloned();
                        RefreshableSource::BuiltIn(s, entry)
                    }),
            );
        }

        sources
    }

    pub async fn refresh_all(&self, options: RefreshOptions) -> BatchReport {
        let mut report = BatchReport::default();
        let now = Utc::now();
        let candidates = self.candidates().await;
        let has_external = candidates
            .iter()
            .any(|s| matches!(s, RefreshableSource::External(_)));

        for source in candidates {
            if !source.enabled() {
                report.skipped_disabled += 1;
                continue;
            }
            if options.startup_mode && !source.update_on_startup() {
                debug!("{} skipped at startup", source.name());
                report.skipped_startup += 1;
                continue;
            }
            if options.auto_only
                && !options.force_all
                && !options.startup_mode
                && !needs_refresh(&source, now)
            {
                debug!(
                    "{} not due (last update: {:?}, interval: {} min)",
                    source.name(),
                    source.last_updated(),
                    source.refresh_interval().num_minutes()
                );
                report.skipped_not_due += 1;
                continue;
            }

            if !report.results.is_empty() && !self.inter_source_delay.is_zero() {
                tokio::time::sleep(self.inter_source_delay).await;
            }

            let result = self.refresh_source(&source).await;
            report.results.push(SourceRefreshResult {
                id: source.id().to_string(),
                name: source.name().to_string(),
                kind: source.kind(),
                result,
            });
        }

        if has_external {
            let stamp = Utc::now();
            if let Err(e) = self
                .store
                .mutate_external(|doc| {
                    doc.last_global_update = Some(stamp);
                    Ok(())
                })
                .await
            {
                warn!("Failed to stamp last global update: {}", e);
            }
        }

        info!(
            "Source refresh complete: {}/{} succeeded, {} skipped",
            report.succeeded(),
            report.results.len(),
            report.skipped()
        );
        report
    }

    /// Refresh one external source by position
    pub async fn refresh_external(&self, index: i64) -> OperationResult {
        let doc = self.store.external().await;
        let i = match checked_index(index, doc.sources.len()) {
            Ok(i) => i,
            Err(e) => return e.into(),
        };
        let source = RefreshableSource::External(doc.sources[i].clone());
        if !source.enabled() {
            return OperationResult::failure("Source is disabled");
        }
        self.refresh_source(&source).await
    }

    /// Refresh one built-in fetch source by id
    pub async fn refresh_built_in(&self, id: &str) -> OperationResult {
        let doc = self.store.built_in().await;
        let Some(source) = doc.sources.into_iter().find(|s| s.id == id) else {
            return AppError::not_found("built-in source", id).into();
        };
        if source.mode == BuiltInMode::Direct {
            return OperationResult::ok_with_message("Direct source needs no refresh")
                .with_url(source.m3u8_url);
        }
        let entry = self.store.built_in_cache().await.get(id).cloned();
        self.refresh_source(&RefreshableSource::BuiltIn(source, entry))
            .await
    }

    /// Extract, validate and persist a fresh stream URL for one source
    pub async fn refresh_source(&self, source: &RefreshableSource) -> OperationResult {
        if source.web_url().is_empty() {
            return match source.current_url() {
                Some(url) => {
                    let url = url.to_string();
                    info!("{} has a manual stream URL, extraction skipped", source.name());
                    self.persist(source, &url)
                        .await
                        .with_message("Manual stream URL kept, extraction skipped")
                }
                None => OperationResult::failure("No web URL or stream URL configured"),
            };
        }

        info!("Refreshing {} source '{}'", source.kind(), source.name());
        let candidates = self
            .extractor
            .extract(source.web_url(), &source.extract_request())
            .await;

        if candidates.is_empty() {
            let err = AppError::ExtractionEmpty {
                web_url: source.web_url().to_string(),
            };
            warn!("{}: {}", source.name(), err);
            return err.into();
        }

        for candidate in &candidates {
            if self
                .validator
                .validate(candidate, Some(source.web_url()))
                .await
            {
                info!("{} resolved to {}", source.name(), candidate);
                return self.persist(source, candidate).await;
            }
        }

        // longer URLs usually carry the required query parameters
        let mut fallback = &candidates[0];
        for candidate in &candidates[1..] {
            if candidate.len() > fallback.len() {
                fallback = candidate;
            }
        }
        let warning = format!(
            "{}; saved the longest candidate",
            AppError::ValidationFailed {
                candidates: candidates.len()
            }
        );
        warn!("{}: {}", source.name(), warning);
        let result = self.persist(source, fallback).await;
        if result.success {
            result.with_warning(warning)
        } else {
            result
        }
    }

    async fn persist(&self, source: &RefreshableSource, url: &str) -> OperationResult {
        let now = Utc::now();
        match source {
            RefreshableSource::External(s) => {
                let id = s.id.clone();
                let url_owned = url.to_string();
                self.store
                    .mutate_external(move |doc| {
                        let target = doc
                            .sources
                            .iter_mut()
                            .find(|candidate| candidate.id == id)
                            .ok_or_else(|| AppError::not_found("external source", id.as_str()))?;
                        target.m3u8_url = url_owned;
                        target.last_updated = Some(now);
                        Ok(())
                    })
                    .await
                    .map(|_| OperationResult::ok().with_url(url))
                    .unwrap_or_else(OperationResult::from)
            }
            RefreshableSource::BuiltIn(s, _) => {
                self.store
                    .put_cache_entry(&s.id, RefreshCacheEntry::now(url, now))
                    .await
            }
        }
    }
}

trait WithMessage {
    fn with_message(self, message: &str) -> Self;
}

impl WithMessage for OperationResult {
    fn with_message(mut self, message: &str) -> Self {
        if self.success {
            self.message = Some(message.to_string());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExternalSourcesDocument, NewExternalSource};
    use crate::sources::StorePaths;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FixedExtractor {
        candidates: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Extractor for FixedExtractor {
        async fn extract(&self, web_url: &str, _request: &ExtractRequest) -> Vec<String> {
            self.calls.lock().unwrap().push(web_url.to_string());
            self.candidates.clone()
        }
    }

    struct AllowList(HashSet<String>);

    #[async_trait]
    impl Validator for AllowList {
        async fn validate(&self, url: &str, _referer: Option<&str>) -> bool {
            self.0.contains(url)
        }
    }

    fn external(last_updated: Option<DateTime<Utc>>) -> ExternalSource {
        let mut source = NewExternalSource {
            name: "A".to_string(),
            web_url: Some("http://page".to_string()),
            ..Default::default()
        }
        .into_source();
        source.last_updated = last_updated;
        source
    }

    async fn scheduler_with(
        sources: Vec<ExternalSource>,
        candidates: Vec<&str>,
        valid: Vec<&str>,
    ) -> (tempfile::TempDir, Arc<SourceStore>, Arc<FixedExtractor>, RefreshScheduler) {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths {
            external_sources: dir.path().join("external-sources.json"),
            built_in_sources: dir.path().join("built-in-sources.json"),
            built_in_cache: dir.path().join("built-in-sources-cache.json"),
        };
        let store = Arc::new(SourceStore::open(paths).await);
        store
            .save_external(ExternalSourcesDocument {
                enabled: true,
                sources,
                ..Default::default()
            })
            .await;

        let extractor = Arc::new(FixedExtractor {
            candidates: candidates.into_iter().map(String::from).collect(),
            calls: Mutex::new(Vec::new()),
        });
        let validator = Arc::new(AllowList(valid.into_iter().map(String::from).collect()));
        let scheduler = RefreshScheduler::new(
            store.clone(),
            extractor.clone(),
            validator,
            Duration::ZERO,
        );
        (dir, store, extractor, scheduler)
    }

    #[test]
    fn test_needs_refresh_is_monotonic() {
        let now = Utc::now();
        let fresh = RefreshableSource::External(external(Some(now)));
        assert!(!needs_refresh(&fresh, now));
        assert!(!needs_refresh(&fresh, now + chrono::Duration::minutes(239)));
        assert!(needs_refresh(&fresh, now + chrono::Duration::minutes(240)));
        assert!(needs_refresh(&fresh, now + chrono::Duration::days(3)));

        let never = RefreshableSource::External(external(None));
        assert!(needs_refresh(&never, now));

        let mut manual = external(None);
        manual.auto_refresh = false;
        assert!(!needs_refresh(&RefreshableSource::External(manual), now));
    }

    #[test]
    fn test_extract_request_forwards_source_hints() {
        let defaulted = RefreshableSource::External(external(None)).extract_request();
        assert_eq!(defaulted.wait_time_ms, 5000);
        assert!(defaulted.headless);
        assert_eq!(defaulted.extraction_hint, None);

        let tuned = NewExternalSource {
            name: "B".to_string(),
            web_url: Some("http://page".to_string()),
            play_button_selector: Some(".play".to_string()),
            wait_time: Some(9000),
            headless: Some(false),
            ..Default::default()
        }
        .into_source();
        let request = RefreshableSource::External(tuned).extract_request();
        assert_eq!(request.wait_time_ms, 9000);
        assert!(!request.headless);
        assert_eq!(request.extraction_hint.as_deref(), Some(".play"));
    }

    #[test]
    fn test_huge_refresh_interval_is_never_due_by_age() {
        let now = Utc::now();
        for minutes in [200_000_000_000_000, u64::MAX] {
            let mut source = external(Some(now));
            source.refresh_interval_minutes = minutes;
            let source = RefreshableSource::External(source);
            assert_eq!(source.refresh_interval(), chrono::Duration::MAX);
            assert!(!needs_refresh(&source, now + chrono::Duration::days(36_500)));
        }
    }

    #[test]
    fn test_direct_built_in_is_never_due() {
        let source: BuiltInSource = serde_json::from_value(serde_json::json!({
            "id": "d", "name": "D", "mode": "direct", "m3u8Url": "http://d.m3u8"
        }))
        .unwrap();
        assert!(!needs_refresh(
            &RefreshableSource::BuiltIn(source, None),
            Utc::now()
        ));
    }

    fn url_of_len(len: usize) -> String {
        let base = "http://a/";
        format!("{base}{}", "x".repeat(len - base.len()))
    }

    #[tokio::test]
    async fn test_longest_candidate_fallback() {
        let candidates: Vec<String> = [10, 50, 30].into_iter().map(url_of_len).collect();
        let refs: Vec<&str> = candidates.iter().map(String::as_str).collect();

        let (_dir, store, _extractor, scheduler) =
            scheduler_with(vec![external(None)], refs, vec![]).await;

        let result = scheduler.refresh_external(0).await;
        assert!(result.success);
        assert_eq!(result.m3u8_url.as_deref(), Some(candidates[1].as_str()));
        assert_eq!(candidates[1].len(), 50);
        assert!(result.warning.unwrap().contains("3 candidate"));

        let source = &store.external().await.sources[0];
        assert_eq!(source.m3u8_url, candidates[1]);
        assert!(source.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_first_valid_candidate_wins() {
        let (_dir, store, _extractor, scheduler) = scheduler_with(
            vec![external(None)],
            vec!["http://a/1.m3u8", "http://a/second-longer.m3u8"],
            vec!["http://a/1.m3u8"],
        )
        .await;

        let result = scheduler.refresh_external(0).await;
        assert!(result.success);
        assert!(result.warning.is_none());
        assert_eq!(store.external().await.sources[0].m3u8_url, "http://a/1.m3u8");
    }

    #[tokio::test]
    async fn test_empty_extraction_leaves_source_unresolved() {
        let (_dir, store, _extractor, scheduler) =
            scheduler_with(vec![external(None)], vec![], vec![]).await;

        let result = scheduler.refresh_external(0).await;
        assert!(!result.success);
        let source = &store.external().await.sources[0];
        assert!(source.m3u8_url.is_empty());
        assert!(source.last_updated.is_none());
    }

    #[tokio::test]
    async fn test_manual_url_skips_extraction() {
        let mut source = external(None);
        source.web_url.clear();
        source.m3u8_url = "http://manual.m3u8".to_string();
        let (_dir, store, extractor, scheduler) =
            scheduler_with(vec![source], vec!["http://x.m3u8"], vec![]).await;

        let result = scheduler.refresh_external(0).await;
        assert!(result.success);
        assert!(extractor.calls.lock().unwrap().is_empty());
        assert!(store.external().await.sources[0].last_updated.is_some());
    }

    #[tokio::test]
    async fn test_startup_mode_ignores_interval_but_honours_flag() {
        let now = Utc::now();
        let mut due_but_opted_out = external(Some(now - chrono::Duration::days(2)));
        due_but_opted_out.name = "opted-out".to_string();
        due_but_opted_out.web_url = "http://opted-out".to_string();
        due_but_opted_out.update_on_startup = false;

        let mut fresh_but_opted_in = external(Some(now));
        fresh_but_opted_in.name = "opted-in".to_string();
        fresh_but_opted_in.web_url = "http://opted-in".to_string();

        let (_dir, _store, extractor, scheduler) = scheduler_with(
            vec![due_but_opted_out, fresh_but_opted_in],
            vec!["http://x.m3u8"],
            vec!["http://x.m3u8"],
        )
        .await;

        let report = scheduler
            .refresh_all(RefreshOptions {
                startup_mode: true,
                ..Default::default()
            })
            .await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].name, "opted-in");
        assert_eq!(report.skipped_startup, 1);
        assert_eq!(*extractor.calls.lock().unwrap(), vec!["http://opted-in".to_string()]);
    }

    #[tokio::test]
    async fn test_auto_only_counts_skips_separately() {
        let now = Utc::now();
        let mut disabled = external(None);
        disabled.enabled = false;
        let fresh = external(Some(now));
        let stale = external(Some(now - chrono::Duration::hours(5)));

        let (_dir, store, _extractor, scheduler) = scheduler_with(
            vec![disabled, fresh, stale],
            vec!["http://x.m3u8"],
            vec!["http://x.m3u8"],
        )
        .await;

        let report = scheduler
            .refresh_all(RefreshOptions {
                auto_only: true,
                ..Default::default()
            })
            .await;

        assert_eq!(report.skipped_disabled, 1);
        assert_eq!(report.skipped_not_due, 1);
        assert_eq!(report.results.len(), 1);
        assert!(report.results[0].result.success);
        assert!(store.external().await.last_global_update.is_some());

        // the refreshed source is no longer due
        let report = scheduler
            .refresh_all(RefreshOptions {
                auto_only: true,
                ..Default::default()
            })
            .await;
        assert!(report.results.is_empty());
        assert_eq!(report.skipped_not_due, 2);
    }
}
