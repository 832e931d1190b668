//! Speech devices that live in the browser.
//!
//! The controller drives these like local devices; every call becomes a
//! protocol message, and the browser's callbacks come back over the socket
//! as `ClientMessage`s.

use super::protocol::ServerMessage;
use imagitale_core::{
    error::RecognitionFailure,
    language::Locale,
    speech::{SpeechSynthesizer, Utterance},
    voice_input::{AttemptId, RecognitionEngine},
};
use tokio::sync::mpsc;
use tracing::warn;

pub struct BrowserSynthesizer {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl BrowserSynthesizer {
    pub fn new(tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { tx }
    }
}

impl SpeechSynthesizer for BrowserSynthesizer {
    fn speak(&mut self, utterance: &Utterance) {
        let message = ServerMessage::Speak {
            utterance: utterance.clone(),
        };
        if self.tx.send(message).is_err() {
            warn!(utterance = utterance.id.0, "Client gone, utterance dropped");
        }
    }

    fn cancel(&mut self) {
        let _ = self.tx.send(ServerMessage::CancelSpeech);
    }
}

pub struct BrowserRecognizer {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl BrowserRecognizer {
    pub fn new(tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { tx }
    }
}

impl RecognitionEngine for BrowserRecognizer {
    fn start(&mut self, attempt: AttemptId, locale: &Locale) -> Result<(), RecognitionFailure> {
        self.tx
            .send(ServerMessage::StartRecognition {
                attempt,
                locale: locale.clone(),
            })
            .map_err(|_| RecognitionFailure::Engine("client disconnected".to_string()))
    }

    fn stop(&mut self, attempt: AttemptId) {
        let _ = self.tx.send(ServerMessage::StopRecognition { attempt });
    }

    fn abort(&mut self, attempt: AttemptId) {
        let _ = self.tx.send(ServerMessage::AbortRecognition { attempt });
    }
}
