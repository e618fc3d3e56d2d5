//! Source persistence
//!
//! [`SourceStore`] is the only writer of the external-sources document, the
//! built-in catalog and the built-in resolution cache. It is constructed
//! once at startup and shared by reference; every mutation goes through a
//! write lock so a document is never written by two tasks at once.
//!
//! Loading never fails. Missing files yield the documented default shape and
//! corrupt files are logged and replaced by that default.

use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::errors::AppResult;
use crate::models::{
    BuiltInCache, BuiltInSourcesDocument, ExternalSourcesDocument, OperationResult,
};
use crate::utils::json_file::{self, Loaded};

pub mod builtin;
pub mod external;
pub mod schema;

pub use schema::{upgrade_external, SchemaUpgrade};

/// File locations owned by the store
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub external_sources: PathBuf,
    pub built_in_sources: PathBuf,
    pub built_in_cache: PathBuf,
}

impl From<&StorageConfig> for StorePaths {
    fn from(storage: &StorageConfig) -> Self {
        Self {
            external_sources: storage.external_sources_path(),
            built_in_sources: storage.built_in_sources_path(),
            built_in_cache: storage.built_in_cache_path(),
        }
    }
}

pub struct SourceStore {
    paths: StorePaths,
    external: RwLock<ExternalSourcesDocument>,
    built_in: RwLock<BuiltInSourcesDocument>,
    cache: RwLock<BuiltInCache>,
}

impl SourceStore {
    /// Load every document, persisting the upgraded external document when
    /// the on-disk shape was missing or outdated
    pub async fn open(paths: StorePaths) -> Self {
        let (external, persist) = Self::load_external(&paths);
        let built_in: BuiltInSourcesDocument = json_file::read_or_default(&paths.built_in_sources);
        let cache: BuiltInCache = json_file::read_or_default(&paths.built_in_cache);

        if built_in.enabled {
            let enabled = built_in.sources.iter().filter(|s| s.enabled).count();
            info!(
                "Loaded {} built-in sources ({} enabled, {} cached resolutions)",
                built_in.sources.len(),
                enabled,
                cache.len()
            );
        } else {
            info!("Built-in sources are disabled");
        }

        let store = Self {
            paths,
            external: RwLock::new(external),
            built_in: RwLock::new(built_in),
            cache: RwLock::new(cache),
        };

        if persist {
            let doc = store.external.read().await.clone();
            if let Err(e) = json_file::write_atomic(&store.paths.external_sources, &doc).await {
                warn!("Failed to persist external sources document: {}", e);
            }
        }

        store
    }

    /// Load and upgrade the external document; the flag says whether to rewrite it
    pub fn load_external(paths: &StorePaths) -> (ExternalSourcesDocument, bool) {
        match json_file::read::<serde_json::Value>(&paths.external_sources) {
            Loaded::Parsed(raw) => {
                let upgrade = schema::upgrade_external(raw);
                for note in &upgrade.notes {
                    warn!("External sources: {}", note);
                }
                if upgrade.changed {
                    info!(
                        "Upgraded external sources document to version {}",
                        upgrade.document.version
                    );
                }
                (upgrade.document, upgrade.changed)
            }
            Loaded::Missing => {
                info!(
                    "No external sources document at {}, creating default",
                    paths.external_sources.display()
                );
                (ExternalSourcesDocument::default(), true)
            }
            Loaded::Corrupt(e) => {
                warn!("{}; using default external sources", e);
                (ExternalSourcesDocument::default(), false)
            }
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Snapshot of the external-sources document
    pub async fn external(&self) -> ExternalSourcesDocument {
        self.external.read().await.clone()
    }

    /// Snapshot of the built-in catalog
    pub async fn built_in(&self) -> BuiltInSourcesDocument {
        self.built_in.read().await.clone()
    }

    /// Snapshot of the built-in resolution cache
    pub async fn built_in_cache(&self) -> BuiltInCache {
        self.cache.read().await.clone()
    }

    /// Replace the whole external document
    pub async fn save_external(&self, doc: ExternalSourcesDocument) -> OperationResult {
        self.mutate_external(move |current| {
            *current = doc;
            Ok(())
        })
        .await
        .map(|_| OperationResult::ok())
        .unwrap_or_else(OperationResult::from)
    }

    /// Apply a change to a copy of the external document, persist it, then
    /// publish it in memory. A failed closure or write leaves both untouched.
    pub async fn mutate_external<F, R>(&self, change: F) -> AppResult<R>
    where
        F: FnOnce(&mut ExternalSourcesDocument) -> AppResult<R>,
    {
        let mut guard = self.external.write().await;
        let mut next = guard.clone();
        let result = change(&mut next)?;
        if let Err(e) = json_file::write_atomic(&self.paths.external_sources, &next).await {
            warn!("Failed to save external sources: {}", e);
            return Err(e);
        }
        *guard = next;
        Ok(result)
    }

    pub async fn mutate_built_in<F, R>(&self, change: F) -> AppResult<R>
    where
        F: FnOnce(&mut BuiltInSourcesDocument) -> AppResult<R>,
    {
        let mut guard = self.built_in.write().await;
        let mut next = guard.clone();
        let result = change(&mut next)?;
        if let Err(e) = json_file::write_atomic(&self.paths.built_in_sources, &next).await {
            warn!("Failed to save built-in sources: {}", e);
            return Err(e);
        }
        *guard = next;
        Ok(result)
    }

    pub async fn mutate_cache<F, R>(&self, change: F) -> AppResult<R>
    where
        F: FnOnce(&mut BuiltInCache) -> AppResult<R>,
    {
        let mut guard = self.cache.write().await;
        let mut next = guard.clone();
        let result = change(&mut next)?;
        if let Err(e) = json_file::write_atomic(&self.paths.built_in_cache, &next).await {
            warn!("Failed to save built-in cache: {}", e);
            return Err(e);
        }
        *guard = next;
        Ok(result)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::paths_in;
    use super::*;
    use crate::errors::AppError;

    #[tokio::test]
    async fn test_missing_documents_create_default() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        let store = SourceStore::open(paths.clone()).await;

        let doc = store.external().await;
        assert!(!doc.enabled);
        assert!(doc.sources.is_empty());
        assert!(paths.external_sources.exists());
        assert!(store.built_in().await.enabled);
        assert!(store.built_in_cache().await.is_empty());
    }

    #[tokio::test]
    async fn test_generated_source_id_is_stable_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        let document = serde_json::json!({
            "version": crate::models::EXTERNAL_SOURCES_VERSION,
            "enabled": true,
            "includeInPlaylists": true,
            "updateOnStartup": true,
            "lastGlobalUpdate": null,
            "sources": [{"name": "A", "webUrl": "http://a"}]
        });
        std::fs::write(&paths.external_sources, document.to_string()).unwrap();

        let first = SourceStore::open(paths.clone()).await.external().await;
        let second = SourceStore::open(paths.clone()).await.external().await;
        assert_eq!(first.sources.len(), 1);
        assert_eq!(first.sources[0].id, second.sources[0].id);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        std::fs::write(&paths.external_sources, "[{broken").unwrap();

        let store = SourceStore::open(paths.clone()).await;
        assert_eq!(store.external().await, ExternalSourcesDocument::default());
        // the corrupt file is left for the user to inspect
        assert_eq!(
            std::fs::read_to_string(&paths.external_sources).unwrap(),
            "[{broken"
        );
    }

    #[tokio::test]
    async fn test_legacy_document_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        std::fs::write(&paths.external_sources, r#"[{"name":"A","m3u8Url":"http://a/x.m3u8"}]"#)
            .unwrap();

        let store = SourceStore::open(paths.clone()).await;
        let doc = store.external().await;
        assert!(doc.enabled);

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.external_sources).unwrap())
                .unwrap();
        assert!(on_disk.is_object());
        assert_eq!(on_disk["sources"][0]["id"], doc.sources[0].id.as_str());
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_document_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = SourceStore::open(paths_in(dir.path())).await;

        let result: AppResult<()> = store
            .mutate_external(|doc| {
                doc.enabled = true;
                Err(AppError::InvalidIndex { index: 3, len: 0 })
            })
            .await;
        assert!(result.is_err());
        assert!(!store.external().await.enabled);
    }
}
