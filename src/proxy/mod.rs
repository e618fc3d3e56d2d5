//! Catalog shaping and publication
//!
//! - [`merger`]: pure merge of primary and auxiliary groups
//! - [`generator`]: M3U / text rendering and atomic publication
//! - [`epg_generator`]: XMLTV program guide
//! - [`playlist_config`]: user customisation of the published playlist

pub mod epg_generator;
pub mod generator;
pub mod merger;
pub mod playlist_config;

pub use epg_generator::{build_guide, GuideBuilder};
pub use generator::{MaterializeOutcome, Materializer, M3U_HEADER};
pub use merger::merge;
pub use playlist_config::PlaylistConfigStore;
