//! Catalog merge.
//!
//! A pure function of its inputs: primary groups keep their order and
//! position, auxiliary groups either extend the primary group with the same
//! name or are appended after all primary groups in declaration order.
//! Items are never deduplicated, so two sources offering the same channel
//! name both survive.

use tracing::debug;

use crate::models::{ChannelGroup, ChannelItem, SourceTag};

/// Merge auxiliary (external and built-in) groups into the primary catalog
pub fn merge(primary: Vec<ChannelGroup>, auxiliary: Vec<ChannelGroup>) -> Vec<ChannelGroup> {
    let mut merged = primary;

    for group in auxiliary {
        let tag = auxiliary_tag(group.source_tag);
        let items: Vec<ChannelItem> = group
            .data_list
            .into_iter()
            .map(|mut item| {
                item.source_tag = auxiliary_tag(item.source_tag);
                item
            })
            .collect();

        match merged.iter_mut().find(|existing| existing.name == group.name) {
            Some(existing) => {
                debug!(
                    "Appending {} items to existing group '{}'",
                    items.len(),
                    existing.name
                );
                existing.data_list.extend(items);
            }
            None => {
                debug!("Adding group '{}' with {} items", group.name, items.len());
                merged.push(ChannelGroup::new(group.name, tag).with_items(items));
            }
        }
    }

    merged
}

/// Auxiliary content keeps a built-in tag, everything else becomes external
fn auxiliary_tag(tag: SourceTag) -> SourceTag {
    match tag {
        SourceTag::BuiltIn => SourceTag::BuiltIn,
        _ => SourceTag::External,
    }
}
