//! Defines the WebSocket message protocol between the browser client and the API server.
//!
//! The browser owns the speech devices (Web Speech synthesis and recognition).
//! The server tells it what to speak and when to listen, and the browser
//! reports device callbacks and the child's actions back.

use imagitale_core::{
    error::RecognitionFailure,
    events::{SessionInput, SessionReport, UserAction},
    language::{Language, Locale},
    speech::{SynthesisEvent, Utterance, UtteranceId, Voice},
    voice_input::{AttemptId, RecognitionEvent, TranscriptEvent},
};
use serde::{Deserialize, Serialize};

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts a session on a word category. This must be the first message.
    Init {
        /// Category id, e.g. `animals_nature`.
        category: String,
        /// Story language override (`th`, `en`).
        language: Option<String>,
    },
    /// Something the child did on screen.
    Action {
        #[serde(flatten)]
        action: UserAction,
    },
    /// The voices the browser's synthesizer offers. May arrive at any time.
    Voices { voices: Vec<Voice> },
    SpeechStarted { utterance: UtteranceId },
    SpeechEnded { utterance: UtteranceId },
    SpeechError {
        utterance: UtteranceId,
        error: String,
    },
    RecognitionResult {
        attempt: AttemptId,
        text: String,
        is_final: bool,
    },
    /// `error` is the recognizer's error code, e.g. `no-speech`.
    RecognitionError { attempt: AttemptId, error: String },
    RecognitionEnd { attempt: AttemptId },
}

impl ClientMessage {
    /// Converts a post-init message into a session input. `None` for `init`.
    pub fn into_input(self) -> Option<SessionInput> {
        let input = match self {
            ClientMessage::Init { .. } => return None,
            ClientMessage::Action { action } => SessionInput::Action(action),
            ClientMessage::Voices { voices } => SessionInput::VoicesChanged(voices),
            ClientMessage::SpeechStarted { utterance } => SessionInput::Speech {
                utterance,
                event: SynthesisEvent::Started,
            },
            ClientMessage::SpeechEnded { utterance } => SessionInput::Speech {
                utterance,
                event: SynthesisEvent::Ended,
            },
            ClientMessage::SpeechError { utterance, error } => SessionInput::Speech {
                utterance,
                event: SynthesisEvent::Failed(error),
            },
            ClientMessage::RecognitionResult {
                attempt,
                text,
                is_final,
            } => SessionInput::Recognition {
                attempt,
                event: RecognitionEvent::Result(TranscriptEvent { text, is_final }),
            },
            ClientMessage::RecognitionError { attempt, error } => SessionInput::Recognition {
                attempt,
                event: RecognitionEvent::Error(RecognitionFailure::from_code(&error)),
            },
            ClientMessage::RecognitionEnd { attempt } => SessionInput::Recognition {
                attempt,
                event: RecognitionEvent::End,
            },
        };
        Some(input)
    }
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session is set up; the first drill item follows.
    Initialized {
        category: String,
        round_size: usize,
        story_language: Language,
    },
    /// Speak this utterance, cancelling anything already playing.
    Speak { utterance: Utterance },
    CancelSpeech,
    StartRecognition { attempt: AttemptId, locale: Locale },
    StopRecognition { attempt: AttemptId },
    AbortRecognition { attempt: AttemptId },
    /// Session progress for the screen.
    Report { report: SessionReport },
    /// Reports a fatal error to the client.
    Error { message: String },
}
