//! Periodic eviction of expired pending requests.
//!
//! The reaper sweeps once on start and then once per `sweep_interval`. A
//! request is removed by the first sweep that runs strictly more than
//! `request_ttl` after its creation, so it lives for at least the TTL and
//! at most TTL + interval.

use std::sync::Arc;

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tradematch_store::{Clock, RequestLedger};
use tradematch_types::{MessageId, ReaperConfig, Result};

pub struct ExpiryReaper {
    ledger: Arc<RequestLedger>,
    clock: Arc<dyn Clock>,
    config: ReaperConfig,
}

impl ExpiryReaper {
    /// # Errors
    /// `Configuration` if the sweep interval is zero.
    pub fn new(
        ledger: Arc<RequestLedger>,
        clock: Arc<dyn Clock>,
        config: ReaperConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ledger,
            clock,
            config,
        })
    }

    /// Run a single sweep now.
    pub async fn run_once(&self) -> Vec<MessageId> {
        let expired = self
            .ledger
            .sweep_expired(self.clock.now(), self.config.request_ttl)
            .await;
        if expired.is_empty() {
            tracing::debug!("Reaper sweep found nothing to expire");
        } else {
            tracing::info!(expired = expired.len(), "Reaper removed expired requests");
        }
        expired
    }

    /// Start the periodic loop on the current runtime.
    #[must_use]
    pub fn spawn(self) -> ReaperHandle {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                ttl_secs = self.config.request_ttl.as_secs(),
                interval_secs = self.config.sweep_interval.as_secs(),
                "Expiry reaper started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Expiry reaper stopped");
        });

        ReaperHandle { shutdown, task }
    }
}

/// Handle to a running reaper. Dropping it also stops the loop.
pub struct ReaperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.task.await {
            tracing::warn!(error = %error, "Expiry reaper task ended abnormally");
        }
    }
}
