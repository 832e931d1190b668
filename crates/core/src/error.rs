//! Failure taxonomy for the session.
//!
//! None of these are fatal: generation failures are replaced by fallback
//! content and recognition failures return the listener to idle with a short
//! retry prompt. Stale results are not errors at all and are dropped where
//! they arrive.

use serde::{Deserialize, Serialize};

/// A remote content-generation call that did not produce usable content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationFailure {
    #[error("content generation request failed: {0}")]
    Remote(String),
    #[error("generated content was malformed: {0}")]
    Malformed(String),
    #[error("missing prompt template: '{0}'")]
    MissingPrompt(String),
}

impl From<anyhow::Error> for GenerationFailure {
    fn from(err: anyhow::Error) -> Self {
        GenerationFailure::Remote(format!("{err:#}"))
    }
}

/// Why a listen attempt ended without a transcript.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RecognitionFailure {
    #[error("no speech was detected")]
    NoSpeech,
    #[error("microphone permission was denied")]
    PermissionDenied,
    #[error("speech recognition is not available")]
    Unsupported,
    #[error("recognition engine error: {0}")]
    Engine(String),
}

impl RecognitionFailure {
    /// Maps the error codes reported by Web Speech style recognizers.
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => RecognitionFailure::NoSpeech,
            "not-allowed" | "service-not-allowed" => RecognitionFailure::PermissionDenied,
            "language-not-supported" | "unsupported" => RecognitionFailure::Unsupported,
            other => RecognitionFailure::Engine(other.to_string()),
        }
    }
}
