//! Service layer for business logic
//!
//! Services orchestrate the lower layers for the web handlers and the
//! background scheduler:
//!
//! - [`catalog::CatalogService`]: source refresh, primary fetch, merge and
//!   publication as one serialized update run
//! - [`resolution::ChannelResolver`]: request-time play URL resolution with a
//!   short-lived cache
//!
//! Both receive their collaborators at construction; nothing here is a
//! module-level singleton.

pub mod catalog;
pub mod resolution;

pub use catalog::{CatalogService, UpdateMode, UpdateReport};
pub use resolution::ChannelResolver;
