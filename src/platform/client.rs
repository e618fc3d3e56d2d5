//! HTTP implementation of the primary platform boundary.
//!
//! Every call carries the configured request timeout (6s by default). Non-2xx
//! responses and timeouts surface as [`AppError::UpstreamUnavailable`] /
//! [`SourceError::Timeout`] so callers can degrade instead of failing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::events::{self, MatchDetail, MatchListBody, PlayEntry};
use super::{Identity, PlaybackWindow, PrimaryPlatform, Programme, ScheduledEvents};
use crate::config::PlatformConfig;
use crate::errors::{AppError, AppResult, SourceError};
use crate::models::{ChannelGroup, ChannelItem, SourceTag};
use crate::utils::{mask_secret, time};

/// Generic `{ "body": ... }` envelope used by the platform
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    body: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CategoryIndex {
    live_list: Vec<CategoryRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CategoryRef {
    name: String,
    #[serde(rename = "vomsID")]
    voms_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CategoryChannels {
    data_list: Vec<PlatformChannel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlatformChannel {
    name: String,
    #[serde(rename = "pID")]
    p_id: String,
    pics: Pics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Pics {
    high_resolution_h: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProgramDay {
    program: Vec<ProgramBlock>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProgramBlock {
    content: Vec<ProgramContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProgramContent {
    cont_name: String,
    start_time: i64,
    end_time: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PlayUrlBody {
    url_info: Option<UrlInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UrlInfo {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ReplayBody {
    replay_list: Option<Vec<PlayEntry>>,
}

pub struct HttpPlatform {
    client: Client,
    config: PlatformConfig,
}

impl HttpPlatform {
    pub fn new(config: PlatformConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(crate::config::defaults::DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self { client, config })
    }

    async fn get_body<T: DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        self.send_for_body(self.client.get(url), url).await
    }

    async fn send_for_body<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> AppResult<T> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Source(SourceError::Timeout {
                    url: url.to_string(),
                })
            } else {
                AppError::upstream(format!("{url}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Source(SourceError::Http {
                status: status.as_u16(),
                message: url.to_string(),
            }));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| AppError::Source(SourceError::parse("platform", format!("{url}: {e}"))))?;
        envelope
            .body
            .ok_or_else(|| AppError::Source(SourceError::parse("platform", format!("{url}: missing body"))))
    }

    async fn category_channels(&self, category: &CategoryRef) -> AppResult<Vec<PlatformChannel>> {
        let url = format!(
            "{}/{}",
            self.config.category_url_base,
            urlencoding::encode(&category.voms_id)
        );
        let body: CategoryChannels = self.get_body(&url).await?;
        Ok(body.data_list)
    }

    async fn match_events(
        &self,
        summary: &events::MatchSummary,
        now_millis: i64,
    ) -> AppResult<Vec<ChannelItem>> {
        let detail_url = format!(
            "{}/{}/miguvideo",
            self.config.match_detail_url_base, summary.mgdb_id
        );
        let detail: MatchDetail = self.get_body(&detail_url).await?;

        if !events::is_finished(&detail, now_millis) {
            return Ok(events::live_items(summary, &detail));
        }

        let replay_url = format!(
            "{}/{}/2/miguvideo",
            self.config.match_replay_url_base, summary.mgdb_id
        );
        let replays = match self.get_body::<ReplayBody>(&replay_url).await {
            Ok(body) => body.replay_list,
            Err(e) => {
                debug!("Replay list for {} unavailable: {}", summary.mgdb_id, e);
                None
            }
        }
        .or_else(|| detail.multi_play_list.replay_list.clone());

        match replays {
            Some(list) => Ok(events::replay_items(summary, &detail, &list)),
            None => {
                debug!("{} {} has no replays", summary.mgdb_id, events::match_title(summary));
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl PrimaryPlatform for HttpPlatform {
    async fn channel_groups(&self) -> AppResult<Vec<ChannelGroup>> {
        let index: CategoryIndex = self.get_body(&self.config.category_index_url).await?;
        let mut seen: HashSet<String> = HashSet::new();
        let mut groups = Vec::new();

        for category in index
            .live_list
            .iter()
            .filter(|c| !self.config.excluded_categories.contains(&c.name))
        {
            let channels = match self.category_channels(category).await {
                Ok(channels) => channels,
                Err(e) => {
                    warn!("Category '{}' unavailable: {}", category.name, e);
                    continue;
                }
            };

            let items: Vec<ChannelItem> = channels
                .into_iter()
                .filter(|c| !c.p_id.is_empty())
                .filter(|c| seen.insert(c.name.clone()))
                .map(|c| ChannelItem::upstream(c.name, c.p_id, c.pics.high_resolution_h))
                .collect();

            if items.is_empty() {
                debug!("Category '{}' has no new channels", category.name);
                continue;
            }
            groups.push(ChannelGroup::new(&category.name, SourceTag::Primary).with_items(items));
        }

        info!(
            "Fetched {} primary groups ({} channels)",
            groups.len(),
            seen.len()
        );
        Ok(groups)
    }

    async fn resolve_play_url(
        &self,
        channel_id: &str,
        identity: &Identity,
        window: &PlaybackWindow,
    ) -> AppResult<String> {
        // the higher tiers need a signed-in account
        let rate_type = if identity.is_anonymous() {
            self.config.rate_type.min(3)
        } else {
            self.config.rate_type
        };

        let mut query: Vec<(&str, String)> = vec![
            ("contId", channel_id.to_string()),
            ("rateType", rate_type.to_string()),
            ("startPlay", "true".to_string()),
            ("xh265", self.config.enable_h265.to_string()),
            ("hdr", self.config.enable_hdr.to_string()),
        ];
        if let Some(begin) = &window.begin {
            query.push(("playbackbegin", begin.clone()));
        }
        if let Some(end) = &window.end {
            query.push(("playbackend", end.clone()));
        }

        let mut request = self.client.get(&self.config.play_url_endpoint).query(&query);
        if !identity.is_anonymous() {
            request = request
                .header("userId", &identity.user_id)
                .header("userToken", &identity.token);
        }

        debug!(
            "Resolving {} for user '{}' (token {})",
            channel_id,
            identity.user_id,
            mask_secret(&identity.token)
        );
        let body: PlayUrlBody = self
            .send_for_body(request, &self.config.play_url_endpoint)
            .await?;
        body.url_info
            .map(|info| info.url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::upstream(format!("no play URL for channel {channel_id}")))
    }

    async fn program_guide(&self, channel_id: &str, now: DateTime<Utc>) -> AppResult<Vec<Programme>> {
        let url = format!(
            "{}/{}/{}",
            self.config.program_url_base,
            urlencoding::encode(channel_id),
            time::date_string(now)
        );
        let day: ProgramDay = self.get_body(&url).await?;
        Ok(day
            .program
            .into_iter()
            .next()
            .map(|block| {
                block
                    .content
                    .into_iter()
                    .map(|c| Programme {
                        title: c.cont_name,
                        start: c.start_time,
                        stop: c.end_time,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn scheduled_events(&self, now: DateTime<Utc>) -> AppResult<ScheduledEvents> {
        let mut result = ScheduledEvents::default();
        if !self.config.scheduled_events {
            return Ok(result);
        }

        let list: MatchListBody = self.get_body(&self.config.match_list_url).await?;
        let today = time::date_string(now);
        let now_millis = now.timestamp_millis();

        // days[0] is two days back; yesterday, today and tomorrow follow
        for date in list.days.iter().skip(1).take(3) {
            let group_name = events::day_group_name(date, &today);
            let matches = list.match_list.get(date).map(Vec::as_slice).unwrap_or(&[]);
            let mut items = Vec::new();

            for summary in matches {
                match self.match_events(summary, now_millis).await {
                    Ok(found) => items.extend(found),
                    Err(e) => result.warnings.push(format!(
                        "{} {} skipped: {}",
                        summary.mgdb_id,
                        events::match_title(summary),
                        e
                    )),
                }
            }
            events::push_items(&mut result.groups, &group_name, items);
            debug!("Scheduled events for {} collected", date);
        }

        Ok(result)
    }

    async fn refresh_token(&self, identity: &Identity) -> AppResult<bool> {
        let Some(url) = &self.config.token_refresh_url else {
            debug!("No token refresh endpoint configured");
            return Ok(false);
        };
        if identity.is_anonymous() {
            return Ok(false);
        }

        let response = self
            .client
            .post(url)
            .header("userId", &identity.user_id)
            .header("userToken", &identity.token)
            .json(&json!({ "userId": identity.user_id, "token": identity.token }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        Ok(body
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true))
    }
}
