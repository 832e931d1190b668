//! Speech output port.
//!
//! Wraps the single device synthesizer and is the only source of truth for
//! whether anything is currently being spoken. At most one utterance is ever
//! active: a new `speak` cancels the previous one, and device callbacks that
//! belong to a cancelled utterance are dropped.

use crate::language::Locale;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifies one `speak` call, so device callbacks can be matched to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtteranceId(pub u64);

/// A voice enumerated by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    pub locale: Locale,
}

/// One request to the synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub locale: Locale,
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
}

/// The device text-to-speech engine.
///
/// Implementations report progress back through [`SpeechOutputPort::handle`]
/// with the id of the utterance they were given.
pub trait SpeechSynthesizer: Send {
    fn speak(&mut self, utterance: &Utterance);
    fn cancel(&mut self);
}

/// A raw callback from the device synthesizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "detail", rename_all = "snake_case")]
pub enum SynthesisEvent {
    Started,
    Ended,
    Failed(String),
}

/// A synthesizer callback that was accepted for the active utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started(UtteranceId),
    Finished(UtteranceId),
    Failed(UtteranceId, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    Idle,
    Requested(UtteranceId),
    Playing(UtteranceId),
}

/// Name fragments tried in order when picking a voice for a language.
const PREFERRED_VOICES: &[(&str, &[&str])] = &[
    ("th", &["kanya", "narisa", "premwadee", "google ไทย", "female"]),
    (
        "en",
        &["samantha", "google us english", "zira", "aria", "female"],
    ),
];

/// Picks the voice for `locale` from the enumerated device voices.
///
/// Tries the preference list for the locale's language first, then the first
/// voice of that locale. `None` leaves the choice to the device default.
pub fn select_voice(locale: &Locale, voices: &[Voice]) -> Option<Voice> {
    let candidates: Vec<&Voice> = voices
        .iter()
        .filter(|voice| locale.matches(voice.locale.as_str()))
        .collect();
    let language = locale
        .as_str()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    let preferred = PREFERRED_VOICES
        .iter()
        .find(|(lang, _)| *lang == language)
        .map(|(_, names)| *names)
        .unwrap_or_default();

    preferred
        .iter()
        .find_map(|fragment| {
            candidates
                .iter()
                .find(|voice| voice.name.to_lowercase().contains(fragment))
        })
        .or_else(|| candidates.first())
        .map(|voice| (*voice).clone())
}

pub struct SpeechOutputPort {
    synthesizer: Option<Box<dyn SpeechSynthesizer>>,
    voices: Option<Vec<Voice>>,
    playback: Playback,
    next_id: u64,
    rate: f32,
    pitch: f32,
}

impl SpeechOutputPort {
    /// Creates the port. Without a synthesizer the session runs text-only.
    pub fn new(synthesizer: Option<Box<dyn SpeechSynthesizer>>, rate: f32, pitch: f32) -> Self {
        Self {
            synthesizer,
            voices: None,
            playback: Playback::Idle,
            next_id: 0,
            rate,
            pitch,
        }
    }

    pub fn is_available(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// True while an utterance has been requested and has not terminated.
    pub fn is_speaking(&self) -> bool {
        self.playback != Playback::Idle
    }

    pub fn active(&self) -> Option<UtteranceId> {
        match self.playback {
            Playback::Idle => None,
            Playback::Requested(id) | Playback::Playing(id) => Some(id),
        }
    }

    /// Records the device voice list. Voices may arrive after the first
    /// utterance; later calls pick them up, earlier ones are not replayed.
    pub fn set_voices(&mut self, voices: Vec<Voice>) {
        debug!(count = voices.len(), "Device voices enumerated");
        self.voices = Some(voices);
    }

    /// Cancels whatever is playing and speaks `text`.
    ///
    /// Returns `None` when nothing will be played (text-only mode or blank text).
    pub fn speak(&mut self, text: &str, locale: &Locale) -> Option<UtteranceId> {
        self.stop();
        if text.trim().is_empty() {
            return None;
        }
        let Some(synthesizer) = self.synthesizer.as_mut() else {
            debug!("No synthesizer available, skipping speech");
            return None;
        };

        self.next_id += 1;
        let id = UtteranceId(self.next_id);
        let voice = self
            .voices
            .as_deref()
            .and_then(|voices| select_voice(locale, voices));
        let utterance = Utterance {
            id,
            text: text.to_string(),
            locale: locale.clone(),
            voice,
            rate: self.rate,
            pitch: self.pitch,
        };
        synthesizer.speak(&utterance);
        self.playback = Playback::Requested(id);
        Some(id)
    }

    /// Cancels the active utterance, if any. Always leaves the port idle.
    pub fn stop(&mut self) {
        if self.playback == Playback::Idle {
            return;
        }
        if let Some(synthesizer) = self.synthesizer.as_mut() {
            synthesizer.cancel();
        }
        self.playback = Playback::Idle;
    }

    /// Applies a device callback. Callbacks for anything but the active
    /// utterance are stale and ignored.
    pub fn handle(&mut self, id: UtteranceId, event: SynthesisEvent) -> Option<SpeechEvent> {
        if self.active() != Some(id) {
            debug!(utterance = id.0, ?event, "Ignoring callback for inactive utterance");
            return None;
        }
        match event {
            SynthesisEvent::Started => {
                if self.playback == Playback::Requested(id) {
                    self.playback = Playback::Playing(id);
                    Some(SpeechEvent::Started(id))
                } else {
                    None
                }
            }
            SynthesisEvent::Ended => {
                self.playback = Playback::Idle;
                Some(SpeechEvent::Finished(id))
            }
            SynthesisEvent::Failed(reason) => {
                self.playback = Playback::Idle;
                Some(SpeechEvent::Failed(id, reason))
            }
        }
    }
}
