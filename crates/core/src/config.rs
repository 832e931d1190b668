use crate::language::Language;
use std::time::Duration;

/// Tunables for one learning session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Language the drill words are prompted in.
    pub native_language: Language,
    /// Language the story is narrated and listened to in.
    pub story_language: Language,
    pub round_size: usize,
    /// Misses on one item before "use a different word" is offered.
    pub skip_threshold: u32,
    pub listen_window_secs: u32,
    /// Pause after a correct answer so the affirmation can finish.
    pub settle_delay: Duration,
    /// Scenes per story, opening and closing included.
    pub story_scenes: usize,
    pub speech_rate: f32,
    pub speech_pitch: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            native_language: Language::Thai,
            story_language: Language::Thai,
            round_size: 5,
            skip_threshold: 3,
            listen_window_secs: 10,
            settle_delay: Duration::from_millis(1200),
            story_scenes: 5,
            speech_rate: 0.9,
            speech_pitch: 1.1,
        }
    }
}
