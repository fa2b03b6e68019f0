// Snapshot Station - Poller
// Drives the fetch → classify → persist cycle on a fixed cadence

use chrono::Utc;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::classifier::{classify, Classification};
use crate::model::{DiscardReason, RawSnapshot};
use crate::store::{SnapshotStore, StoreError};

/// Upstream fetches are bounded so a hung sensor cannot stall the loop.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure of a single tick. Logged and dropped at the tick boundary; the
/// cadence itself never stops.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("fetch error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status code: {0}")]
    UnexpectedStatus(StatusCode),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one successful tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A valid snapshot was persisted.
    Accepted,
    /// A discarded snapshot was persisted with the given reason.
    Discarded(DiscardReason),
    /// Upstream had no data yet (404); nothing persisted.
    NoData,
}

/// Polls the sensor endpoint and persists each classified reading.
pub struct Poller {
    client: Client,
    endpoint: String,
    store: SnapshotStore,
}

impl Poller {
    pub fn new(endpoint: impl Into<String>, store: SnapshotStore) -> Result<Self, PollError> {
        let client = Client::builder().timeout(FETCH_TIMEOUT).build()?;

        Ok(Poller {
            client,
            endpoint: endpoint.into(),
            store,
        })
    }

    /// Run one fetch → classify → persist cycle. Failures are logged with
    /// their cause and the tick ends early; the caller's schedule is
    /// unaffected.
    pub async fn tick(&self) -> Option<TickOutcome> {
        match self.poll_once().await {
            Ok(outcome) => {
                match outcome {
                    TickOutcome::Accepted => {}
                    TickOutcome::Discarded(reason) => {
                        info!(reason = %reason, "snapshot discarded");
                    }
                    TickOutcome::NoData => debug!("no data currently available"),
                }
                Some(outcome)
            }
            Err(err) => {
                error!(endpoint = %self.endpoint, error = %err, "tick skipped");
                None
            }
        }
    }

    async fn poll_once(&self) -> Result<TickOutcome, PollError> {
        let response = self.client.get(&self.endpoint).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(TickOutcome::NoData),
            StatusCode::OK => {}
            other => return Err(PollError::UnexpectedStatus(other)),
        }

        let raw: RawSnapshot = response.json().await?;

        match classify(&raw, Utc::now()) {
            Classification::Valid(snapshot) => {
                self.store.append_valid(&snapshot)?;
                info!(
                    value = snapshot.value,
                    time = %snapshot.time,
                    "valid snapshot stored"
                );
                Ok(TickOutcome::Accepted)
            }
            Classification::Discarded(snapshot) => {
                let reason = snapshot.reason;
                self.store.append_discarded(&snapshot)?;
                Ok(TickOutcome::Discarded(reason))
            }
        }
    }

    /// Repeat `tick` on a fixed cadence until `shutdown` flips.
    ///
    /// Ticks run sequentially in this task, so a slow cycle delays the next
    /// one instead of overlapping it.
    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(endpoint = %self.endpoint, period_ms = period.as_millis() as u64, "poller started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as a stop signal too
                    if changed.is_err() || *shutdown.borrow() {
                        info!("poller stopping");
                        break;
                    }
                }
            }
        }
    }
}
