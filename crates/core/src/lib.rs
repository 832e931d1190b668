pub mod config;
pub mod content;
pub mod controller;
pub mod drill;
pub mod error;
pub mod events;
pub mod images;
pub mod language;
pub mod llm_client;
pub mod speech;
pub mod story;
pub mod supervisor;
pub mod vocab;
pub mod voice_input;

use crate::{
    content::GenerationRequest,
    events::{GenerationToken, SessionReport, Timer},
};
use std::time::Duration;

/// Represents commands that the turn controller issues to an external runtime.
///
/// This enum is the primary API for decoupling the session's decision-making
/// from the runtime's execution of side effects (calling the generator,
/// fetching illustrations, waiting, and telling the screen what happened).
/// Device speech and recognition are driven directly through the injected
/// synthesizer and engine.
#[derive(Debug, Clone)]
pub enum Command {
    /// Run a generation request and feed its outcome back with `token`.
    Generate {
        token: GenerationToken,
        request: GenerationRequest,
    },
    /// Fetch a flashcard illustration for the drill word with `target_form`.
    Illustrate {
        token: GenerationToken,
        target_form: String,
    },
    /// Fire `timer` after `delay`.
    Schedule {
        token: GenerationToken,
        delay: Duration,
        timer: Timer,
    },
    /// Forward a report to the session's observer.
    Report(SessionReport),
}
