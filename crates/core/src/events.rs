//! Inputs, timers and reports exchanged between the turn controller and the
//! runtime that drives it.

use crate::{
    content::{Generated, Stage},
    drill::Verdict,
    error::{GenerationFailure, RecognitionFailure},
    speech::{SynthesisEvent, UtteranceId, Voice},
    story::SceneState,
    vocab::{StoryTone, VocabItem, Word},
    voice_input::{AttemptId, ListenState, RecognitionEvent},
};
use serde::{Deserialize, Serialize};

/// Tags every asynchronous request so results arriving after the session has
/// moved on can be recognised and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GenerationToken(u64);

impl GenerationToken {
    pub(crate) fn bump(&mut self) -> Self {
        self.0 += 1;
        *self
    }
}

/// Something the child did on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserAction {
    Listen,
    StopListening,
    /// Replays the current word or scene, or stops it if it is playing.
    Replay,
    /// "Use a different word".
    SkipWord,
    BeginStory { tone: StoryTone },
    Choose { choice: String },
    PreviewChoice { index: usize },
    GoHome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// Moves past the item at `position` once the affirmation has settled.
    AdvanceDrill { position: usize },
    /// One second of the listen window elapsed.
    ListenTick { attempt: AttemptId },
}

/// Everything that can happen to a session.
#[derive(Debug, Clone)]
pub enum SessionInput {
    StartDrill {
        items: Vec<VocabItem>,
        pool: Vec<Word>,
    },
    Action(UserAction),
    Speech {
        utterance: UtteranceId,
        event: SynthesisEvent,
    },
    VoicesChanged(Vec<Voice>),
    Recognition {
        attempt: AttemptId,
        event: RecognitionEvent,
    },
    Generated {
        token: GenerationToken,
        outcome: Result<Generated, GenerationFailure>,
    },
    Illustrated {
        token: GenerationToken,
        target_form: String,
        illustration: String,
    },
    TimerFired {
        token: GenerationToken,
        timer: Timer,
    },
}

/// Observable session progress, sent to whoever renders the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionReport {
    SpeakingChanged {
        speaking: bool,
    },
    ListeningChanged {
        state: ListenState,
    },
    Transcript {
        text: String,
        is_final: bool,
    },
    Countdown {
        seconds: u32,
    },
    DrillItem {
        position: usize,
        round_size: usize,
        item: VocabItem,
        attempt_count: u32,
        can_skip: bool,
    },
    Verdict {
        verdict: Verdict,
        attempt_count: u32,
        can_skip: bool,
    },
    RoundComplete {
        items: Vec<VocabItem>,
    },
    Generating {
        stage: Stage,
    },
    SceneAppended {
        scene: SceneState,
    },
    StoryFinished {
        title: String,
        scenes: Vec<SceneState>,
    },
    /// A short prompt that was also spoken, e.g. "try again".
    Notice {
        text: String,
    },
    RecognitionFailed {
        failure: RecognitionFailure,
    },
    Disposed,
}
