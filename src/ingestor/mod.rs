//! Source refresh pipeline
//!
//! [`extractor`] and [`validator`] are the outbound collaborators,
//! [`refresh`] decides which sources are due and drives them, and
//! [`scheduler`] runs catalog updates on a timer and on demand.

use async_trait::async_trait;

pub mod extractor;
pub mod refresh;
pub mod scheduler;
pub mod validator;

pub use extractor::{ExtractRequest, PageScanExtractor};
pub use refresh::{needs_refresh, BatchReport, RefreshOptions, RefreshScheduler, RefreshableSource};
pub use scheduler::{create_update_channel, SchedulerService, UpdateReceiver, UpdateRequest, UpdateSender};
pub use validator::HttpValidator;

/// Pulls candidate stream URLs out of a web page.
///
/// Implementations never fail: any problem resolves to an empty list.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, web_url: &str, request: &ExtractRequest) -> Vec<String>;
}

/// Checks that a candidate stream URL serves a playlist
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, url: &str, referer: Option<&str>) -> bool;
}
