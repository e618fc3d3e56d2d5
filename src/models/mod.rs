use serde::{Deserialize, Serialize};

pub mod playlist;
pub mod sources;

pub use playlist::*;
pub use sources::*;

/// Placeholder written into artifacts in front of upstream channel ids;
/// substituted with the caller's base URL when a playlist is served
pub const REPLACE_PLACEHOLDER: &str = "${replace}";

/// Where a channel group or item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Primary,
    External,
    #[serde(rename = "builtin")]
    BuiltIn,
    #[serde(rename = "scheduled-event")]
    ScheduledEvent,
}

/// How a player reaches a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PlayReference {
    /// Platform channel id, resolved through the router at play time
    Upstream(String),
    /// Fully qualified stream URL
    Direct(String),
}

impl PlayReference {
    /// The URL written into playlist artifacts
    pub fn playlist_url(&self) -> String {
        match self {
            PlayReference::Upstream(id) => format!("{REPLACE_PLACEHOLDER}/{id}"),
            PlayReference::Direct(url) => url.clone(),
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, PlayReference::Direct(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
    pub name: String,
    pub play_reference: PlayReference,
    pub logo_url: String,
    pub source_tag: SourceTag,
}

impl ChannelItem {
    pub fn upstream(name: impl Into<String>, id: impl Into<String>, logo_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            play_reference: PlayReference::Upstream(id.into()),
            logo_url: logo_url.into(),
            source_tag: SourceTag::Primary,
        }
    }

    pub fn direct(
        name: impl Into<String>,
        url: impl Into<String>,
        logo_url: impl Into<String>,
        source_tag: SourceTag,
    ) -> Self {
        Self {
            name: name.into(),
            play_reference: PlayReference::Direct(url.into()),
            logo_url: logo_url.into(),
            source_tag,
        }
    }

    /// Items with a fully qualified URL count as external regardless of tag
    pub fn is_external_like(&self) -> bool {
        matches!(self.source_tag, SourceTag::External | SourceTag::BuiltIn)
            || self.play_reference.is_direct()
    }

    /// Platform channel id for items that have program guide data
    pub fn upstream_id(&self) -> Option<&str> {
        match &self.play_reference {
            PlayReference::Upstream(id) if self.source_tag == SourceTag::Primary => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelGroup {
    pub name: String,
    pub data_list: Vec<ChannelItem>,
    pub source_tag: SourceTag,
}

impl ChannelGroup {
    pub fn new(name: impl Into<String>, source_tag: SourceTag) -> Self {
        Self {
            name: name.into(),
            data_list: Vec::new(),
            source_tag,
        }
    }

    pub fn with_items(mut self, items: Vec<ChannelItem>) -> Self {
        self.data_list = items;
        self
    }
}

/// Total number of items across groups
pub fn channel_count(groups: &[ChannelGroup]) -> usize {
    groups.iter().map(|g| g.data_list.len()).sum()
}

/// Result object returned by store and refresh operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub m3u8_url: Option<String>,
}

impl OperationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.m3u8_url = Some(url.into());
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

impl From<crate::errors::AppError> for OperationResult {
    fn from(err: crate::errors::AppError) -> Self {
        Self::failure(err.to_string())
    }
}
