//! Versioned upgrade of the external-sources document.
//!
//! Applied once when the document is loaded. Older releases wrote either a
//! bare array of sources or an envelope with loosely typed flags; both are
//! normalised into the current [`ExternalSourcesDocument`] shape here so
//! nothing downstream has to tolerate legacy data.

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::models::{ExternalSource, ExternalSourcesDocument, EXTERNAL_SOURCES_VERSION};

/// Result of upgrading a raw document
#[derive(Debug)]
pub struct SchemaUpgrade {
    pub document: ExternalSourcesDocument,
    /// True when the in-memory document differs from what was on disk
    pub changed: bool,
    /// Human-readable notes about dropped or repaired entries
    pub notes: Vec<String>,
}

const SOURCE_FLAGS: [&str; 3] = ["enabled", "autoRefresh", "updateOnStartup"];

/// Upgrade a parsed JSON value into the current document shape
pub fn upgrade_external(raw: Value) -> SchemaUpgrade {
    let mut notes = Vec::new();

    let mut envelope = match raw {
        Value::Array(sources) => {
            notes.push("legacy source list wrapped in envelope".to_string());
            let mut envelope = Map::new();
            envelope.insert("enabled".into(), Value::Bool(true));
            envelope.insert("sources".into(), Value::Array(sources));
            envelope
        }
        Value::Object(map) => map,
        _ => {
            notes.push("unrecognised document replaced with defaults".to_string());
            return SchemaUpgrade {
                document: ExternalSourcesDocument::default(),
                changed: true,
                notes,
            };
        }
    };

    let version = envelope
        .get("version")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    if !envelope.get("enabled").is_some_and(Value::is_boolean) {
        envelope.insert("enabled".into(), Value::Bool(false));
    }
    for flag in ["includeInPlaylists", "updateOnStartup"] {
        if !envelope.get(flag).is_some_and(Value::is_boolean) {
            envelope.insert(flag.into(), Value::Bool(true));
        }
    }
    if !envelope.get("updateInterval").is_some_and(is_positive) {
        envelope.remove("updateInterval");
    }
    if !envelope.get("lastGlobalUpdate").is_some_and(is_timestamp) {
        envelope.insert("lastGlobalUpdate".into(), Value::Null);
    }

    let raw_sources = match envelope.remove("sources") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    let mut sources = Vec::with_capacity(raw_sources.len());
    for (index, item) in raw_sources.into_iter().enumerate() {
        match upgrade_source(item) {
            Ok((source, assigned_id)) => {
                if assigned_id {
                    notes.push(format!("source #{index} assigned id {}", source.id));
                }
                sources.push(source);
            }
            Err(reason) => notes.push(format!("source #{index} dropped: {reason}")),
        }
    }

    envelope.insert("version".into(), Value::from(EXTERNAL_SOURCES_VERSION));
    envelope.insert("sources".into(), Value::Array(Vec::new()));

    let mut document: ExternalSourcesDocument =
        serde_json::from_value(Value::Object(envelope)).unwrap_or_default();
    document.sources = sources;
    document.version = EXTERNAL_SOURCES_VERSION;

    SchemaUpgrade {
        document,
        changed: version < u64::from(EXTERNAL_SOURCES_VERSION) || !notes.is_empty(),
        notes,
    }
}

/// Upgrade one source entry; the flag is set when a fresh id was generated,
/// which must be persisted so the id survives the next load
fn upgrade_source(item: Value) -> Result<(ExternalSource, bool), String> {
    let Value::Object(mut map) = item else {
        return Err("not an object".to_string());
    };

    if !map.get("name").is_some_and(Value::is_string) {
        return Err("missing name".to_string());
    }
    let assigned_id = !map.get("id").and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    if assigned_id {
        map.remove("id");
    }
    for flag in SOURCE_FLAGS {
        // only an explicit `false` disables a flag
        let value = !matches!(map.get(flag), Some(Value::Bool(false)));
        map.insert(flag.into(), Value::Bool(value));
    }
    if !map.get("refreshInterval").is_some_and(is_positive) {
        map.remove("refreshInterval");
    }
    if !map.get("lastUpdated").is_some_and(is_timestamp) {
        map.insert("lastUpdated".into(), Value::Null);
    }
    for text in ["group", "webUrl", "m3u8Url", "logo", "playButtonSelector"] {
        match map.get(text) {
            Some(Value::String(s)) if text == "group" && s.trim().is_empty() => {
                map.remove(text);
            }
            Some(Value::String(_)) => {}
            Some(_) => {
                map.remove(text);
            }
            None => {}
        }
    }
    if !map.get("extractOptions").is_some_and(Value::is_object) {
        map.remove("extractOptions");
    }

    let source = serde_json::from_value(Value::Object(map)).map_err(|e| e.to_string())?;
    Ok((source, assigned_id))
}

fn is_positive(value: &Value) -> bool {
    value.as_u64().is_some_and(|n| n > 0)
}

fn is_timestamp(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok())
}
