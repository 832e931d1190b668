//! Voice input session.
//!
//! Owns the recognition engine and runs one listen attempt at a time:
//! `Idle -> Listening -> (Finalizing) -> Idle`. A final transcript can be
//! reached from two independent engine callbacks (a final result, or the end
//! of recognition with only interim text); a per-attempt completion latch
//! makes sure only the first one is evaluated.

use crate::{error::RecognitionFailure, language::Locale};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Identifies one listen attempt. Engine callbacks carry it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(pub u64);

/// A recognition result, interim or final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
}

/// The device speech recognizer.
pub trait RecognitionEngine: Send {
    fn start(&mut self, attempt: AttemptId, locale: &Locale) -> Result<(), RecognitionFailure>;
    /// Asks the engine to finish; it still reports `End` when it does.
    fn stop(&mut self, attempt: AttemptId);
    /// Drops the attempt without waiting for any further callbacks.
    fn abort(&mut self, attempt: AttemptId);
}

/// A raw callback from the recognition engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Result(TranscriptEvent),
    Error(RecognitionFailure),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenState {
    Idle,
    Listening,
    Finalizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Pending,
    Completed,
}

/// What the session tells the controller after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    Listening { attempt: AttemptId, seconds: u32 },
    Interim(String),
    /// Exactly once per attempt; the controller must call
    /// [`VoiceInputSession::finish_evaluation`] when it is done with it.
    Final(String),
    Countdown(u32),
    Idle,
    Failed(RecognitionFailure),
}

pub struct VoiceInputSession {
    engine: Option<Box<dyn RecognitionEngine>>,
    state: ListenState,
    attempt: Option<AttemptId>,
    next_attempt: u64,
    completion: Completion,
    transcript: String,
    stop_requested: bool,
    evaluation_pending: bool,
    window_secs: u32,
    remaining_secs: u32,
}

impl VoiceInputSession {
    /// Creates the session. Without an engine every start reports
    /// `Unsupported` and the session stays idle.
    pub fn new(engine: Option<Box<dyn RecognitionEngine>>, window_secs: u32) -> Self {
        Self {
            engine,
            state: ListenState::Idle,
            attempt: None,
            next_attempt: 0,
            completion: Completion::Completed,
            transcript: String::new(),
            stop_requested: false,
            evaluation_pending: false,
            window_secs: window_secs.max(1),
            remaining_secs: 0,
        }
    }

    pub fn state(&self) -> ListenState {
        self.state
    }

    pub fn attempt(&self) -> Option<AttemptId> {
        self.attempt
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    /// False while an attempt is running or its transcript is still being
    /// evaluated.
    pub fn can_start(&self) -> bool {
        self.state == ListenState::Idle && !self.evaluation_pending
    }

    /// Begins a listen attempt. A no-op unless [`Self::can_start`].
    pub fn start(&mut self, locale: &Locale) -> Vec<VoiceEvent> {
        if !self.can_start() {
            debug!(state = ?self.state, evaluation_pending = self.evaluation_pending, "Ignoring start while busy");
            return Vec::new();
        }
        let Some(engine) = self.engine.as_mut() else {
            return vec![VoiceEvent::Failed(RecognitionFailure::Unsupported)];
        };

        self.next_attempt += 1;
        let attempt = AttemptId(self.next_attempt);
        if let Err(failure) = engine.start(attempt, locale) {
            warn!(attempt = attempt.0, %failure, "Recognition engine refused to start");
            return vec![VoiceEvent::Failed(failure)];
        }

        info!(attempt = attempt.0, %locale, "Listening");
        self.attempt = Some(attempt);
        self.state = ListenState::Listening;
        self.completion = Completion::Pending;
        self.transcript.clear();
        self.stop_requested = false;
        self.remaining_secs = self.window_secs;
        vec![VoiceEvent::Listening {
            attempt,
            seconds: self.window_secs,
        }]
    }

    /// Requests the engine to stop. The transition to idle only happens when
    /// the engine reports `End`.
    pub fn stop(&mut self) {
        if self.state != ListenState::Listening || self.stop_requested {
            return;
        }
        if let (Some(engine), Some(attempt)) = (self.engine.as_mut(), self.attempt) {
            self.stop_requested = true;
            engine.stop(attempt);
        }
    }

    /// Drops the current attempt immediately. Any callback still in flight for
    /// it is ignored, so no evaluation can follow.
    pub fn abort(&mut self) -> bool {
        let Some(attempt) = self.attempt.take() else {
            return false;
        };
        if let Some(engine) = self.engine.as_mut() {
            engine.abort(attempt);
        }
        debug!(attempt = attempt.0, "Listen attempt aborted");
        self.state = ListenState::Idle;
        self.completion = Completion::Completed;
        self.transcript.clear();
        self.stop_requested = false;
        self.evaluation_pending = false;
        true
    }

    /// Marks the last final transcript as handled, allowing the next start.
    pub fn finish_evaluation(&mut self) {
        self.evaluation_pending = false;
    }

    /// Advances the one-second countdown. Reaching zero stops the engine; the
    /// transcript, if any, still arrives through the engine's own callbacks.
    pub fn tick(&mut self, attempt: AttemptId) -> Vec<VoiceEvent> {
        if self.attempt != Some(attempt)
            || self.state != ListenState::Listening
            || self.remaining_secs == 0
        {
            return Vec::new();
        }
        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            debug!(attempt = attempt.0, "Listen window elapsed");
            self.stop();
        }
        vec![VoiceEvent::Countdown(self.remaining_secs)]
    }

    /// Applies an engine callback for `attempt`.
    pub fn handle(&mut self, attempt: AttemptId, event: RecognitionEvent) -> Vec<VoiceEvent> {
        if self.attempt != Some(attempt) {
            debug!(attempt = attempt.0, ?event, "Ignoring callback for stale listen attempt");
            return Vec::new();
        }

        match event {
            RecognitionEvent::Result(result) => {
                if self.completion == Completion::Completed {
                    return Vec::new();
                }
                self.transcript = result.text;
                let text = self.transcript.trim().to_string();
                if result.is_final && !text.is_empty() {
                    self.stop();
                    self.state = ListenState::Finalizing;
                    vec![self.complete(text)]
                } else {
                    vec![VoiceEvent::Interim(self.transcript.clone())]
                }
            }
            RecognitionEvent::Error(failure) if self.completion == Completion::Completed => {
                debug!(attempt = attempt.0, %failure, "Engine error after final result");
                self.reset_to_idle();
                vec![VoiceEvent::Idle]
            }
            RecognitionEvent::Error(failure) => {
                warn!(attempt = attempt.0, %failure, "Recognition failed");
                self.completion = Completion::Completed;
                self.reset_to_idle();
                vec![VoiceEvent::Failed(failure), VoiceEvent::Idle]
            }
            RecognitionEvent::End => {
                let mut events = Vec::new();
                if self.completion == Completion::Pending {
                    let text = self.transcript.trim().to_string();
                    events.push(self.complete(text));
                }
                self.reset_to_idle();
                events.push(VoiceEvent::Idle);
                events
            }
        }
    }

    fn complete(&mut self, text: String) -> VoiceEvent {
        self.completion = Completion::Completed;
        self.evaluation_pending = true;
        VoiceEvent::Final(text)
    }

    fn reset_to_idle(&mut self) {
        self.state = ListenState::Idle;
        self.attempt = None;
        self.stop_requested = false;
        self.remaining_secs = 0;
    }
}
