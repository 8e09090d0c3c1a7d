//! A running assistant session.
//!
//! Starts the telemetry feeds and forwards every observation change to the
//! conversation controller on a background task. User input is submitted
//! against whatever snapshots are current at that moment.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::TelemetryConfig;
use crate::controller::{ConversationCallback, ConversationController, SubmitOutcome};
use crate::error::Result;
use crate::providers::InferenceClient;
use crate::telemetry::{ObservationChange, TelemetryDataset, TelemetryFeed};
use crate::types::{ObservationSnapshot, StatusSnapshot};
use crate::voice::Announcer;

/// Telemetry feeds plus the controller they drive.
pub struct Session {
    controller: Arc<ConversationController>,
    telemetry: TelemetryFeed,
    forwarder: JoinHandle<()>,
}

impl Session {
    /// Start the feeds and the change forwarder.
    ///
    /// The initial observation is evaluated with no previous snapshot, so a
    /// dataset that opens on a workspace arrival greets immediately.
    pub fn start(
        config: &TelemetryConfig,
        dataset: TelemetryDataset,
        client: Arc<dyn InferenceClient>,
        announcer: Arc<dyn Announcer>,
        callback: Arc<dyn ConversationCallback>,
    ) -> Result<Self> {
        let controller = Arc::new(ConversationController::new(client, announcer, callback));
        let (telemetry, changes) = TelemetryFeed::start(config, dataset)?;
        let forwarder = tokio::spawn(forward_changes(changes, Arc::clone(&controller)));

        info!("Session started");
        Ok(Self {
            controller,
            telemetry,
            forwarder,
        })
    }

    pub fn controller(&self) -> &Arc<ConversationController> {
        &self.controller
    }

    /// The current observation snapshot.
    pub fn observation(&self) -> Arc<ObservationSnapshot> {
        self.telemetry.observation()
    }

    /// The current system status snapshot.
    pub fn status(&self) -> Arc<StatusSnapshot> {
        self.telemetry.status()
    }

    pub fn subscribe_observation(&self) -> watch::Receiver<Arc<ObservationSnapshot>> {
        self.telemetry.subscribe_observation()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Arc<StatusSnapshot>> {
        self.telemetry.subscribe_status()
    }

    /// Submit user input against the current snapshots.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let observation = self.observation();
        let status = self.status();
        self.controller.submit(text, &observation, &status).await
    }

    /// Stop the feeds and wait for the forwarder to drain.
    pub async fn shutdown(self) {
        self.telemetry.stop().await;
        let _ = self.forwarder.await;
        info!("Session stopped");
    }
}

async fn forward_changes(
    mut changes: mpsc::UnboundedReceiver<ObservationChange>,
    controller: Arc<ConversationController>,
) {
    while let Some(change) = changes.recv().await {
        debug!(
            timestamp = change.current.timestamp.as_str(),
            events = change.current.events().len(),
            "Observation changed"
        );
        controller.on_telemetry_changed(change.previous.as_deref(), &change.current);
    }
    debug!("Observation change stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{GREETING, RecordingCallback};
    use crate::error::TelemetryError;
    use crate::providers::MockInferenceClient;
    use crate::trigger::WORKSPACE_GREETING;
    use crate::voice::RecordingAnnouncer;
    use std::time::Duration;

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn start(
        dataset: TelemetryDataset,
    ) -> (Session, Arc<RecordingAnnouncer>, Arc<MockInferenceClient>) {
        let client = Arc::new(MockInferenceClient::with_reply("Understood."));
        let announcer = Arc::new(RecordingAnnouncer::new());
        let session = Session::start(
            &TelemetryConfig::default(),
            dataset,
            client.clone(),
            announcer.clone(),
            Arc::new(RecordingCallback::new()),
        )
        .unwrap();
        (session, announcer, client)
    }

    #[tokio::test(start_paused = true)]
    async fn test_builtin_scenario_greets_on_desk_arrival() {
        let (session, announcer, _client) = start(TelemetryDataset::builtin());
        settle().await;
        assert_eq!(announcer.spoken(), vec![GREETING]);

        // Six observation ticks reach the desk-chair snapshot.
        tokio::time::sleep(Duration::from_millis(6 * 7_000 + 100)).await;
        settle().await;
        assert_eq!(announcer.spoken(), vec![GREETING, WORKSPACE_GREETING]);

        // Wrapping around and reaching it again re-fires.
        tokio::time::sleep(Duration::from_secs(7 * 7)).await;
        settle().await;
        assert_eq!(
            announcer.spoken(),
            vec![GREETING, WORKSPACE_GREETING, WORKSPACE_GREETING]
        );

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_rejects_empty_dataset() {
        let mut dataset = TelemetryDataset::builtin();
        dataset.statuses.clear();
        let result = Session::start(
            &TelemetryConfig::default(),
            dataset,
            Arc::new(MockInferenceClient::new()),
            Arc::new(RecordingAnnouncer::new()),
            Arc::new(RecordingCallback::new()),
        );
        assert!(matches!(
            result,
            Err(crate::error::VjaError::Telemetry(TelemetryError::EmptySequence { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_snapshot_evaluated_without_previous() {
        let mut dataset = TelemetryDataset::builtin();
        dataset.observations.rotate_right(1);
        let (session, announcer, _client) = start(dataset);
        settle().await;

        assert_eq!(announcer.spoken(), vec![GREETING, WORKSPACE_GREETING]);
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_uses_current_snapshots() {
        let (session, announcer, client) = start(TelemetryDataset::builtin());

        tokio::time::sleep(Duration::from_millis(10_100)).await;
        settle().await;
        let outcome = session.submit("Is the house secure?").await;
        assert!(matches!(outcome, SubmitOutcome::Replied { .. }));

        let prompt = &client.requests()[0].prompt;
        // Observation index 1 and status index 1 are current after 10.1s.
        assert!(prompt.contains("2025-11-01T20:57:10Z"));
        assert!(prompt.contains("[SYSTEM_STATUS]: security: Disarmed"));
        assert_eq!(announcer.spoken().last().map(String::as_str), Some("Understood."));

        session.shutdown().await;
    }
}
