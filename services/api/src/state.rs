//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the vocabulary bank
//! and the story/illustration services shared by every session.

use crate::config::Config;
use imagitale_core::{content::ContentGenerator, images::ImageProvider, vocab::VocabularyBank};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub vocabulary: Arc<VocabularyBank>,
    pub generator: Arc<dyn ContentGenerator>,
    pub images: Arc<dyn ImageProvider>,
    pub config: Arc<Config>,
}
