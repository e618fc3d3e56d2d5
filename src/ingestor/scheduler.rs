use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::services::{CatalogService, UpdateMode};

/// On-demand work for the scheduler, sent by the admin API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRequest {
    /// Full update: refresh due sources, refetch, rebuild the guide
    Full,
    /// Re-merge and republish playlists from cached primary data
    RegenerateOnly,
}

pub type UpdateSender = mpsc::Sender<UpdateRequest>;
pub type UpdateReceiver = mpsc::Receiver<UpdateRequest>;

/// Longest tick period; keeps the first deadline representable as an `Instant`
const MAX_PERIOD: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

fn tick_period(period: Duration) -> Duration {
    period.clamp(Duration::from_secs(1), MAX_PERIOD)
}

pub fn create_update_channel() -> (UpdateSender, UpdateReceiver) {
    mpsc::channel(16)
}

/// Runs the startup update, then a full update every interval and any
/// requested update in between. Updates never overlap.
pub struct SchedulerService {
    catalog: Arc<CatalogService>,
    period: Duration,
    hours_per_tick: u64,
    hours: u64,
    update_rx: Option<UpdateReceiver>,
}

impl SchedulerService {
    pub fn new(
        catalog: Arc<CatalogService>,
        period: Duration,
        hours_per_tick: u64,
        update_rx: UpdateReceiver,
    ) -> Self {
        Self {
            catalog,
            period: tick_period(period),
            hours_per_tick,
            hours: 0,
            update_rx: Some(update_rx),
        }
    }

    pub async fn start(mut self) -> Result<()> {
        info!(
            "Starting scheduler service (full update every {})",
            humantime::format_duration(self.period)
        );

        let report = self.catalog.update(self.hours, UpdateMode::Startup).await;
        debug!("Startup update: {:?}", report.mode);

        let mut update_rx = self
            .update_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("Scheduler already started"))?;
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.hours = self.hours.saturating_add(self.hours_per_tick);
                    trace!("Scheduled update at {}h", self.hours);
                    self.catalog.update(self.hours, UpdateMode::Scheduled).await;
                }

                Some(request) = update_rx.recv() => {
                    let request = coalesce(request, &mut update_rx);
                    info!("Running requested update: {:?}", request);
                    let mode = match request {
                        UpdateRequest::Full => UpdateMode::Scheduled,
                        UpdateRequest::RegenerateOnly => UpdateMode::RegenerateOnly,
                    };
                    self.catalog.update(self.hours, mode).await;
                }
            }
        }
    }
}

/// Fold queued requests into one; any full request wins
fn coalesce(first: UpdateRequest, rx: &mut UpdateReceiver) -> UpdateRequest {
    let mut request = first;
    while let Ok(next) = rx.try_recv() {
        if next == UpdateRequest::Full {
            request = UpdateRequest::Full;
        }
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_coalesce_prefers_full() {
        let (tx, mut rx) = create_update_channel();
        tx.send(UpdateRequest::RegenerateOnly).await.unwrap();
        tx.send(UpdateRequest::Full).await.unwrap();
        tx.send(UpdateRequest::RegenerateOnly).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(coalesce(first, &mut rx), UpdateRequest::Full);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_huge_period_is_clamped() {
        assert_eq!(tick_period(Duration::from_secs(u64::MAX)), MAX_PERIOD);
        assert_eq!(tick_period(Duration::ZERO), Duration::from_secs(1));
        let eight_hours = Duration::from_secs(8 * 60 * 60);
        assert_eq!(tick_period(eight_hours), eight_hours);
        assert!(Instant::now().checked_add(MAX_PERIOD).is_some());
    }

    #[tokio::test]
    async fn test_coalesce_keeps_regenerate_only() {
        let (tx, mut rx) = create_update_channel();
        tx.send(UpdateRequest::RegenerateOnly).await.unwrap();
        tx.send(UpdateRequest::RegenerateOnly).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(coalesce(first, &mut rx), UpdateRequest::RegenerateOnly);
    }
}
