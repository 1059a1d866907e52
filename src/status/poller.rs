//! Poll scheduler: one task per status resource.
//!
//! Each resource is polled by its own loop, so same-resource polls are
//! naturally serialized and a slow response can never race an earlier one
//! into the renderer. Resources share nothing and may be in flight
//! concurrently with each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::client::DashboardClient;
use crate::config::Config;
use crate::status::view::{self, PanelView, RenderContext};
use crate::status::StatusResource;

/// Lifecycle of one panel. Re-entered on every poll; a request that times
/// out lands in `Error`, never in an indefinite loading state.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelState {
    Loading,
    Ready,
    Error { message: String },
}

/// One renderer-bound event: the panel's new state and, when the poll
/// succeeded, the freshly rebuilt view.
#[derive(Debug, Clone)]
pub struct PanelUpdate {
    pub resource: StatusResource,
    pub state: PanelState,
    pub view: Option<PanelView>,
}

/// Handle for waking a resource's poll loop ahead of schedule (manual
/// retry of an errored panel).
#[derive(Clone)]
pub struct RefreshHandle {
    senders: HashMap<StatusResource, mpsc::Sender<()>>,
}

impl RefreshHandle {
    pub fn refresh(&self, resource: StatusResource) {
        if let Some(tx) = self.senders.get(&resource) {
            let _ = tx.try_send(());
        }
    }
}

pub struct PollScheduler {
    client: Arc<DashboardClient>,
    config: Config,
}

impl PollScheduler {
    pub fn new(client: Arc<DashboardClient>, config: Config) -> Self {
        Self { client, config }
    }

    /// Spawn one poll loop per resource. Returns the update stream, the
    /// manual-refresh handle and a shutdown trigger.
    pub fn spawn(
        self,
        resources: &[StatusResource],
    ) -> (
        mpsc::Receiver<PanelUpdate>,
        RefreshHandle,
        watch::Sender<bool>,
    ) {
        let (update_tx, update_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut senders = HashMap::new();

        for &resource in resources {
            let (refresh_tx, refresh_rx) = mpsc::channel(1);
            senders.insert(resource, refresh_tx);

            tokio::spawn(poll_loop(
                resource,
                Arc::clone(&self.client),
                self.config.clone(),
                update_tx.clone(),
                refresh_rx,
                shutdown_rx.clone(),
            ));
        }

        (update_rx, RefreshHandle { senders }, shutdown_tx)
    }
}

async fn poll_loop(
    resource: StatusResource,
    client: Arc<DashboardClient>,
    config: Config,
    updates: mpsc::Sender<PanelUpdate>,
    mut refresh: mpsc::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures: u32 = 0;

    loop {
        // Failed polls retry on an exponential backoff instead of the
        // regular cadence, capped by config.
        if consecutive_failures > 0 {
            let backoff = backoff_delay(
                config.poll_interval,
                config.max_backoff,
                consecutive_failures,
            );
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                Some(()) = refresh.recv() => {
                    debug!(%resource, "manual refresh during backoff");
                }
                _ = shutdown.changed() => return,
            }
            ticker.reset();
        } else {
            tokio::select! {
                _ = ticker.tick() => {}
                Some(()) = refresh.recv() => {
                    debug!(%resource, "manual refresh");
                    ticker.reset();
                }
                _ = shutdown.changed() => return,
            }
        }

        if updates
            .send(PanelUpdate {
                resource,
                state: PanelState::Loading,
                view: None,
            })
            .await
            .is_err()
        {
            return;
        }

        let ctx = RenderContext {
            now: Utc::now(),
            primary_process: config.primary_process.clone(),
        };

        // The request timeout lives in the reqwest client, so a hung
        // backend surfaces here as a Network error.
        let update = match client.fetch(resource).await {
            Ok(payload) => {
                consecutive_failures = 0;
                PanelUpdate {
                    resource,
                    state: PanelState::Ready,
                    view: Some(view::render(&payload, &ctx)),
                }
            }
            Err(err) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                warn!(%resource, error = %err, consecutive_failures, "poll failed");
                PanelUpdate {
                    resource,
                    state: PanelState::Error {
                        message: err.to_string(),
                    },
                    view: None,
                }
            }
        };

        if updates.send(update).await.is_err() {
            return;
        }
    }
}

fn backoff_delay(base: Duration, cap: Duration, failures: u32) -> Duration {
    let exp = failures.saturating_sub(1).min(8);
    base.saturating_mul(2u32.saturating_pow(exp)).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_secs(30);
        let cap = Duration::from_secs(300);
        assert_eq!(backoff_delay(base, cap, 1), Duration::from_secs(30));
        assert_eq!(backoff_delay(base, cap, 2), Duration::from_secs(60));
        assert_eq!(backoff_delay(base, cap, 3), Duration::from_secs(120));
        assert_eq!(backoff_delay(base, cap, 4), Duration::from_secs(240));
        assert_eq!(backoff_delay(base, cap, 5), Duration::from_secs(300));
        assert_eq!(backoff_delay(base, cap, 40), Duration::from_secs(300));
    }
}
