//! Primary platform boundary
//!
//! Everything the aggregator needs from the remote video platform goes
//! through [`PrimaryPlatform`]. The HTTP implementation lives in
//! [`client`]; tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::AppResult;
use crate::models::ChannelGroup;
use crate::utils::mask_secret;

pub mod client;
pub mod events;

pub use client::HttpPlatform;

/// Credentials used for one platform call
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub token: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_empty() || self.token.is_empty()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("token", &mask_secret(&self.token))
            .finish()
    }
}

/// Catch-up window forwarded from the player (`yyyyMMddHHmmss` strings)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PlaybackWindow {
    pub begin: Option<String>,
    pub end: Option<String>,
}

impl PlaybackWindow {
    pub fn is_live(&self) -> bool {
        self.begin.is_none() && self.end.is_none()
    }
}

/// One program guide entry
#[derive(Debug, Clone, PartialEq)]
pub struct Programme {
    pub title: String,
    /// Epoch milliseconds
    pub start: i64,
    pub stop: i64,
}

/// Scheduled-event catalog plus the per-event problems encountered
#[derive(Debug, Clone, Default)]
pub struct ScheduledEvents {
    pub groups: Vec<ChannelGroup>,
    pub warnings: Vec<String>,
}

#[async_trait]
pub trait PrimaryPlatform: Send + Sync {
    /// Channel groups in platform order, deduplicated by channel name
    async fn channel_groups(&self) -> AppResult<Vec<ChannelGroup>>;

    /// Ask the platform for a playable stream URL
    async fn resolve_play_url(
        &self,
        channel_id: &str,
        identity: &Identity,
        window: &PlaybackWindow,
    ) -> AppResult<String>;

    /// Guide entries for one channel on the platform-local day of `now`
    async fn program_guide(&self, channel_id: &str, now: DateTime<Utc>) -> AppResult<Vec<Programme>>;

    /// Live and replay sport events around `now`
    async fn scheduled_events(&self, now: DateTime<Utc>) -> AppResult<ScheduledEvents>;

    /// Extend the lifetime of a token; `Ok(false)` when the platform declined
    async fn refresh_token(&self, identity: &Identity) -> AppResult<bool>;
}
