//! Scheduled sport events.
//!
//! The platform publishes a match list per day plus a detail document per
//! match. Matches still running contribute their live feeds, finished
//! matches contribute full replays. Highlight reels and training sessions
//! are never listed.

use serde::Deserialize;

use crate::models::{ChannelGroup, ChannelItem, PlayReference, SourceTag};
use crate::utils::time::clock_of;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchListBody {
    pub days: Vec<String>,
    pub match_list: std::collections::HashMap<String, Vec<MatchSummary>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub mgdb_id: String,
    pub pk_info_title: String,
    pub confront_teams: Option<Vec<Team>>,
    pub competition_name: String,
    pub competition_logo: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Team {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchDetail {
    pub end_time: Option<i64>,
    pub keyword: String,
    pub multi_play_list: PlayLists,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayLists {
    pub live_list: Vec<PlayEntry>,
    pub replay_list: Option<Vec<PlayEntry>>,
    pub pre_list: Vec<PlayEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayEntry {
    pub name: String,
    #[serde(rename = "pID", deserialize_with = "string_or_number")]
    pub p_id: String,
    pub start_time_str: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Group label for a match day relative to today (both `yyyyMMdd`)
pub fn day_group_name(date: &str, today: &str) -> String {
    let label = if date == today {
        "今天"
    } else if date.parse::<u64>().ok() > today.parse::<u64>().ok() {
        "明天"
    } else {
        "昨天"
    };
    format!("体育-{label}")
}

/// `HomeVSAway` when both teams are known, otherwise the listed title
pub fn match_title(summary: &MatchSummary) -> String {
    match summary.confront_teams.as_deref() {
        Some([home, away, ..]) => format!("{}VS{}", home.name, away.name),
        _ => summary.pk_info_title.clone(),
    }
}

pub fn is_finished(detail: &MatchDetail, now_millis: i64) -> bool {
    detail.end_time.is_some_and(|end| end < now_millis)
}

fn event_item(summary: &MatchSummary, entry: &PlayEntry, clock: &str) -> ChannelItem {
    let title = match_title(summary);
    ChannelItem {
        name: format!(
            "{} {} {} {}",
            summary.competition_name, title, entry.name, clock
        ),
        play_reference: PlayReference::Upstream(entry.p_id.clone()),
        logo_url: summary.competition_logo.clone(),
        source_tag: SourceTag::ScheduledEvent,
    }
}

/// Live feeds of a match that has not finished
pub fn live_items(summary: &MatchSummary, detail: &MatchDetail) -> Vec<ChannelItem> {
    detail
        .multi_play_list
        .live_list
        .iter()
        .filter(|live| !live.name.contains("集锦") && !live.p_id.is_empty())
        .filter_map(|live| {
            let clock = clock_of(live.start_time_str.as_deref()?)?;
            Some(event_item(summary, live, clock))
        })
        .collect()
}

/// Full replays of a finished match
pub fn replay_items(
    summary: &MatchSummary,
    detail: &MatchDetail,
    replays: &[PlayEntry],
) -> Vec<ChannelItem> {
    let clock = detail
        .multi_play_list
        .pre_list
        .last()
        .and_then(|pre| pre.start_time_str.as_deref())
        .and_then(clock_of)
        .map(str::to_string)
        .unwrap_or_else(|| detail.keyword.chars().skip(7).collect());

    replays
        .iter()
        .filter(|r| !r.name.contains("集锦") && !r.name.contains("训练"))
        .filter(|r| r.name.contains("回放") || r.name.contains("赛"))
        .filter(|r| !r.p_id.is_empty())
        .map(|r| event_item(summary, r, &clock))
        .collect()
}

/// Append items to the named event group, creating it on first use
pub fn push_items(groups: &mut Vec<ChannelGroup>, group_name: &str, items: Vec<ChannelItem>) {
    match groups.iter_mut().find(|g| g.name == group_name) {
        Some(group) => group.data_list.extend(items),
        None => groups.push(ChannelGroup::new(group_name, SourceTag::ScheduledEvent).with_items(items)),
    }
}
