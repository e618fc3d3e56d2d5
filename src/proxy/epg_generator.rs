//! Program guide (XMLTV) generation.
//!
//! Built incrementally: one platform call per primary channel. Auxiliary and
//! scheduled-event items carry no guide data and are left out.

use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use tracing::{debug, info, warn};

use crate::models::{ChannelGroup, ChannelItem};
use crate::platform::{PrimaryPlatform, Programme};
use crate::utils::time::guide_timestamp;

const GENERATOR_NAME: &str = "iptv-aggregator";

/// Accumulates channels and programmes, emitting channels first
pub struct GuideBuilder {
    channels: String,
    programmes: String,
    channel_count: usize,
    programme_count: usize,
}

impl Default for GuideBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GuideBuilder {
    pub fn new() -> Self {
        Self {
            channels: String::new(),
            programmes: String::new(),
            channel_count: 0,
            programme_count: 0,
        }
    }

    pub fn add_channel(&mut self, item: &ChannelItem, programmes: &[Programme]) {
        let id = escape(item.name.as_str());
        self.channels.push_str(&format!("  <channel id=\"{id}\">\n"));
        self.channels
            .push_str(&format!("    <display-name lang=\"zh\">{id}</display-name>\n"));
        if !item.logo_url.is_empty() {
            self.channels.push_str(&format!(
                "    <icon src=\"{}\" />\n",
                escape(item.logo_url.as_str())
            ));
        }
        self.channels.push_str("  </channel>\n");
        self.channel_count += 1;

        for programme in programmes {
            let (Some(start), Some(stop)) =
                (guide_timestamp(programme.start), guide_timestamp(programme.stop))
            else {
                continue;
            };
            self.programmes.push_str(&format!(
                "  <programme channel=\"{id}\" start=\"{start}\" stop=\"{stop}\">\n"
            ));
            self.programmes.push_str(&format!(
                "    <title lang=\"zh\">{}</title>\n",
                escape(programme.title.as_str())
            ));
            self.programmes.push_str("  </programme>\n");
            self.programme_count += 1;
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn programme_count(&self) -> usize {
        self.programme_count
    }

    pub fn finish(self) -> String {
        let mut xmltv = String::with_capacity(self.channels.len() + self.programmes.len() + 160);
        xmltv.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xmltv.push_str("<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n");
        xmltv.push_str(&format!("<tv generator-info-name=\"{GENERATOR_NAME}\">\n"));
        xmltv.push_str(&self.channels);
        xmltv.push_str(&self.programmes);
        xmltv.push_str("</tv>\n");
        xmltv
    }
}

/// Build the guide for every primary item in the catalog
pub async fn build_guide(
    platform: &dyn PrimaryPlatform,
    groups: &[ChannelGroup],
    now: DateTime<Utc>,
) -> String {
    let mut builder = GuideBuilder::new();

    for item in groups.iter().flat_map(|g| g.data_list.iter()) {
        let Some(channel_id) = item.upstream_id() else {
            continue;
        };
        let programmes = match platform.program_guide(channel_id, now).await {
            Ok(programmes) => programmes,
            Err(e) => {
                warn!("Guide for '{}' unavailable: {}", item.name, e);
                Vec::new()
            }
        };
        debug!("{}: {} programmes", item.name, programmes.len());
        builder.add_channel(item, &programmes);
    }

    info!(
        "Program guide built: {} channels, {} programmes",
        builder.channel_count(),
        builder.programme_count()
    );
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceTag;

    #[test]
    fn test_guide_escapes_and_orders_channels_first() {
        let mut builder = GuideBuilder::new();
        builder.add_channel(
            &ChannelItem::upstream("A&B", "1", "http://logo?a=1&b=2"),
            &[Programme {
                title: "News <Live>".to_string(),
                start: 1_709_251_200_000,
                stop: 1_709_254_800_000,
            }],
        );
        builder.add_channel(&ChannelItem::upstream("C", "2", ""), &[]);
        let xml = builder.finish();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE tv"));
        assert!(xml.contains("<channel id=\"A&amp;B\">"));
        assert!(xml.contains("<icon src=\"http://logo?a=1&amp;b=2\" />"));
        assert!(xml.contains("start=\"20240301080000 +0800\" stop=\"20240301090000 +0800\""));
        assert!(xml.contains("<title lang=\"zh\">News &lt;Live&gt;</title>"));
        let last_channel = xml.rfind("<channel ").unwrap();
        let first_programme = xml.find("<programme ").unwrap();
        assert!(last_channel < first_programme);
        assert!(xml.ends_with("</tv>\n"));
    }

    #[test]
    fn test_non_primary_items_have_no_guide_id() {
        let item = ChannelItem::direct("X", "http://x.m3u8", "", SourceTag::External);
        assert!(item.upstream_id().is_none());
    }
}
