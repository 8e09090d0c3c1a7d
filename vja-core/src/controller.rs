//! Conversation controller.
//!
//! Owns the conversation history and the in-flight flag, and is the only
//! place turns are appended. Two entry points mutate state:
//!
//! - [`ConversationController::submit`]: user input, followed by one
//!   inference round trip. At most one is in flight; extra submits are
//!   rejected, not queued.
//! - [`ConversationController::on_telemetry_changed`]: proactive turns from
//!   the trigger detector. These bypass the in-flight flag.
//!
//! After every append the speech watermark is checked, so each assistant
//! turn is announced exactly once regardless of which path produced it.
//!
//! State lives behind a `std::sync::Mutex` that is released before any
//! `.await` and before any callback runs.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::context::{SYSTEM_INSTRUCTION, format_context};
use crate::providers::{InferenceClient, ReplyRequest};
use crate::trigger;
use crate::types::{ConversationState, ConversationTurn, ObservationSnapshot, StatusSnapshot};
use crate::voice::Announcer;

/// The assistant's first turn.
pub const GREETING: &str = "VJA-Core online. All systems nominal. How may I assist you?";

/// Substituted for the reply when inference fails.
pub const FALLBACK_REPLY: &str =
    "Apologies, I am experiencing a communication issue with my core logic.";

/// Why a submit produced no turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The input was empty after trimming whitespace.
    EmptyInput,
    /// A previous submit is still waiting on inference.
    Busy,
}

/// Result of [`ConversationController::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ignored(IgnoreReason),
    /// The model replied; its text was appended.
    Replied { reply: String },
    /// Inference failed; the fallback text was appended.
    Fallback { error: String },
}

/// Receives conversation updates for presentation.
///
/// Called after the internal lock is released, from whichever task made the
/// change.
pub trait ConversationCallback: Send + Sync {
    /// A turn was appended at `index`.
    fn on_turn(&self, index: usize, turn: &ConversationTurn);

    /// The in-flight flag changed.
    fn on_pending_change(&self, _pending: bool) {}
}

/// A callback that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCallback;

impl ConversationCallback for NoOpCallback {
    fn on_turn(&self, _index: usize, _turn: &ConversationTurn) {}
}

/// Records every notification. Useful for tests.
#[derive(Debug, Default)]
pub struct RecordingCallback {
    turns: Mutex<Vec<(usize, ConversationTurn)>>,
    pending_changes: Mutex<Vec<bool>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> Vec<(usize, ConversationTurn)> {
        lock(&self.turns).clone()
    }

    pub fn pending_changes(&self) -> Vec<bool> {
        lock(&self.pending_changes).clone()
    }
}

impl ConversationCallback for RecordingCallback {
    fn on_turn(&self, index: usize, turn: &ConversationTurn) {
        lock(&self.turns).push((index, turn.clone()));
    }

    fn on_pending_change(&self, pending: bool) {
        lock(&self.pending_changes).push(pending);
    }
}

/// Highest turn index already handed to speech playback.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpeechWatermark {
    spoken: Option<usize>,
}

impl SpeechWatermark {
    /// If the newest turn is an assistant turn past the watermark, advance
    /// to it and return its text.
    pub fn advance(&mut self, turns: &[ConversationTurn]) -> Option<String> {
        let index = turns.len().checked_sub(1)?;
        let newest = &turns[index];
        let past = self.spoken.is_none_or(|spoken| index > spoken);
        if newest.is_assistant() && past {
            self.spoken = Some(index);
            return Some(newest.text.clone());
        }
        None
    }

    pub fn spoken(&self) -> Option<usize> {
        self.spoken
    }
}

struct Inner {
    state: ConversationState,
    watermark: SpeechWatermark,
}

/// One append, captured under the lock and published after it is released.
struct Appended {
    index: usize,
    turn: ConversationTurn,
    announce: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Serializes all conversation mutations.
pub struct ConversationController {
    client: Arc<dyn InferenceClient>,
    announcer: Arc<dyn Announcer>,
    callback: Arc<dyn ConversationCallback>,
    inner: Mutex<Inner>,
}

impl ConversationController {
    /// Create a controller seeded with the greeting, which is announced immediately.
    pub fn new(
        client: Arc<dyn InferenceClient>,
        announcer: Arc<dyn Announcer>,
        callback: Arc<dyn ConversationCallback>,
    ) -> Self {
        let state = ConversationState::seeded(GREETING);
        let mut watermark = SpeechWatermark::default();
        let announce = watermark.advance(&state.turns);

        let controller = Self {
            client,
            announcer,
            callback,
            inner: Mutex::new(Inner { state, watermark }),
        };
        controller.publish(Appended {
            index: 0,
            turn: ConversationTurn::assistant(GREETING),
            announce,
        });
        controller
    }

    /// Submit user input and wait for the assistant's reply.
    ///
    /// Empty input and input arriving while a reply is pending are ignored
    /// without touching history or the pending flag.
    pub async fn submit(
        &self,
        text: &str,
        observation: &ObservationSnapshot,
        status: &StatusSnapshot,
    ) -> SubmitOutcome {
        if text.trim().is_empty() {
            debug!("Ignoring empty input");
            return SubmitOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        let (appended, history) = {
            let mut inner = lock(&self.inner);
            if inner.state.pending {
                debug!("Ignoring input while a reply is pending");
                return SubmitOutcome::Ignored(IgnoreReason::Busy);
            }
            let appended = Self::append_locked(&mut inner, ConversationTurn::user(text));
            inner.state.pending = true;
            (appended, inner.state.turns.clone())
        };
        self.publish(appended);
        self.callback.on_pending_change(true);

        let prompt = format_context(observation, status, &history, text);
        let request = ReplyRequest::new(SYSTEM_INSTRUCTION, prompt);

        let (reply, outcome) = match self.client.generate_reply(&request).await {
            Ok(reply) => {
                info!(
                    provider = self.client.name(),
                    reply_len = reply.len(),
                    "Received reply"
                );
                let outcome = SubmitOutcome::Replied {
                    reply: reply.clone(),
                };
                (reply, outcome)
            }
            Err(e) => {
                warn!(provider = self.client.name(), error = %e, "Inference failed; using fallback reply");
                let outcome = SubmitOutcome::Fallback {
                    error: e.to_string(),
                };
                (FALLBACK_REPLY.to_string(), outcome)
            }
        };

        let appended = {
            let mut inner = lock(&self.inner);
            let appended = Self::append_locked(&mut inner, ConversationTurn::assistant(reply));
            inner.state.pending = false;
            appended
        };
        self.publish(appended);
        self.callback.on_pending_change(false);

        outcome
    }

    /// Evaluate the trigger for an observation transition and append any
    /// proactive turn. Returns the new turn's index.
    pub fn on_telemetry_changed(
        &self,
        previous: Option<&ObservationSnapshot>,
        current: &ObservationSnapshot,
    ) -> Option<usize> {
        let turn = trigger::detect(previous, current)?;
        info!(timestamp = current.timestamp.as_str(), "Workspace arrival detected");

        let appended = {
            let mut inner = lock(&self.inner);
            Self::append_locked(&mut inner, turn)
        };
        let index = appended.index;
        self.publish(appended);
        Some(index)
    }

    /// A copy of every turn so far.
    pub fn turns(&self) -> Vec<ConversationTurn> {
        lock(&self.inner).state.turns.clone()
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.inner).state.pending
    }

    /// A copy of the full conversation state.
    pub fn state(&self) -> ConversationState {
        lock(&self.inner).state.clone()
    }

    /// Index of the last turn handed to speech playback.
    pub fn last_spoken(&self) -> Option<usize> {
        lock(&self.inner).watermark.spoken()
    }

    fn append_locked(inner: &mut Inner, turn: ConversationTurn) -> Appended {
        let index = inner.state.push(turn.clone());
        let announce = inner.watermark.advance(&inner.state.turns);
        Appended {
            index,
            turn,
            announce,
        }
    }

    fn publish(&self, appended: Appended) {
        self.callback.on_turn(appended.index, &appended.turn);
        if let Some(text) = appended.announce {
            self.announcer.announce(text);
        }
    }
}
