//! Mock telemetry generator.
//!
//! Cycles two fixed snapshot sequences (vision observations and system
//! status) on two independent periodic tasks. Current state is published on
//! `watch` channels; every observation replacement is additionally queued as
//! an [`ObservationChange`] so downstream consumers see each transition
//! exactly once, in order.

pub mod dataset;

pub use dataset::TelemetryDataset;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::types::{ObservationSnapshot, StatusSnapshot};

/// A cursor over a fixed, non-empty sequence that wraps around.
#[derive(Debug, Clone)]
pub struct CyclicFeed<T> {
    items: Vec<Arc<T>>,
    index: usize,
}

impl<T> CyclicFeed<T> {
    /// Create a feed positioned at the first item.
    pub fn new(items: Vec<T>, feed: &str) -> Result<Self, TelemetryError> {
        if items.is_empty() {
            return Err(TelemetryError::EmptySequence { feed: feed.into() });
        }
        Ok(Self {
            items: items.into_iter().map(Arc::new).collect(),
            index: 0,
        })
    }

    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.items[self.index])
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Step to the next item modulo length. Returns `(previous, current)`.
    pub fn advance(&mut self) -> (Arc<T>, Arc<T>) {
        let previous = self.current();
        self.index = (self.index + 1) % self.items.len();
        (previous, self.current())
    }
}

/// One observation snapshot replacement.
#[derive(Debug, Clone)]
pub struct ObservationChange {
    /// The snapshot being replaced; `None` for the initial publication.
    pub previous: Option<Arc<ObservationSnapshot>>,
    pub current: Arc<ObservationSnapshot>,
}

/// Running telemetry feeds. Both tasks stop together on [`TelemetryFeed::stop`] or drop.
pub struct TelemetryFeed {
    observation_rx: watch::Receiver<Arc<ObservationSnapshot>>,
    status_rx: watch::Receiver<Arc<StatusSnapshot>>,
    cancellation: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl TelemetryFeed {
    /// Publish the first snapshot of each sequence and start both timers.
    ///
    /// The returned receiver yields the initial observation (with no
    /// previous snapshot) immediately, then one change per observation tick.
    pub fn start(
        config: &TelemetryConfig,
        dataset: TelemetryDataset,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ObservationChange>), TelemetryError> {
        let observations = CyclicFeed::new(dataset.observations, "observations")?;
        let statuses = CyclicFeed::new(dataset.statuses, "statuses")?;

        let (observation_tx, observation_rx) = watch::channel(observations.current());
        let (status_tx, status_rx) = watch::channel(statuses.current());
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        // Receiver is held locally, so this send cannot fail.
        let _ = change_tx.send(ObservationChange {
            previous: None,
            current: observations.current(),
        });

        let cancellation = CancellationToken::new();
        let observation_period = Duration::from_secs(config.observation_interval_secs.max(1));
        let status_period = Duration::from_secs(config.status_interval_secs.max(1));

        let observation_task = tokio::spawn(run_feed(
            "observations",
            observations,
            observation_period,
            cancellation.clone(),
            move |previous, current| {
                observation_tx.send_replace(Arc::clone(&current));
                let _ = change_tx.send(ObservationChange {
                    previous: Some(previous),
                    current,
                });
            },
        ));
        let status_task = tokio::spawn(run_feed(
            "statuses",
            statuses,
            status_period,
            cancellation.clone(),
            move |_previous, current| {
                status_tx.send_replace(current);
            },
        ));

        info!(
            observation_secs = observation_period.as_secs(),
            status_secs = status_period.as_secs(),
            "Telemetry feeds started"
        );

        Ok((
            Self {
                observation_rx,
                status_rx,
                cancellation,
                handles: vec![observation_task, status_task],
            },
            change_rx,
        ))
    }

    /// The current observation snapshot.
    pub fn observation(&self) -> Arc<ObservationSnapshot> {
        Arc::clone(&self.observation_rx.borrow())
    }

    /// The current system status snapshot.
    pub fn status(&self) -> Arc<StatusSnapshot> {
        Arc::clone(&self.status_rx.borrow())
    }

    /// Watch the current observation snapshot.
    pub fn subscribe_observation(&self) -> watch::Receiver<Arc<ObservationSnapshot>> {
        self.observation_rx.clone()
    }

    /// Watch the current system status snapshot.
    pub fn subscribe_status(&self) -> watch::Receiver<Arc<StatusSnapshot>> {
        self.status_rx.clone()
    }

    /// Cancel both timers and wait for the tasks to exit.
    pub async fn stop(mut self) {
        self.cancellation.cancel();
        let handles = std::mem::take(&mut self.handles);
        futures::future::join_all(handles).await;
        info!("Telemetry feeds stopped");
    }
}

impl Drop for TelemetryFeed {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

async fn run_feed<T, F>(
    name: &'static str,
    mut feed: CyclicFeed<T>,
    period: Duration,
    cancellation: CancellationToken,
    mut publish: F,
) where
    T: Send + Sync + 'static,
    F: FnMut(Arc<T>, Arc<T>) + Send + 'static,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                debug!(feed = name, "Telemetry feed cancelled");
                break;
            }
            _ = ticker.tick() => {
                let (previous, current) = feed.advance();
                debug!(feed = name, index = feed.index(), "Telemetry tick");
                publish(previous, current);
            }
        }
    }
}
