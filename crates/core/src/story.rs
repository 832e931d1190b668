//! Branching story progress.
//!
//! A `StoryRun` holds the append-only scene list and decides which generation
//! request comes next: the opening (no input), continuations (one input each)
//! and finally the closing scene, followed by the title.

use crate::{
    content::{GenerationRequest, Scene},
    vocab::StoryTone,
};
use serde::Serialize;

/// A scene once it has been appended to the story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneState {
    pub narrative_text: String,
    pub illustration: Option<String>,
    pub choices: Vec<String>,
    /// 1-based.
    pub sequence_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "scene", rename_all = "snake_case")]
pub enum StoryPhase {
    /// Waiting for the scene with this index.
    Generating(usize),
    AwaitingInput,
    Titling,
    Finished,
}

#[derive(Debug, Clone)]
pub struct StoryRun {
    tone: StoryTone,
    vocabulary: Vec<String>,
    total_scenes: usize,
    scenes: Vec<SceneState>,
    spoken: Vec<bool>,
    phase: StoryPhase,
}

impl StoryRun {
    /// Starts a story of `total_scenes` scenes (at least two: opening and closing).
    pub fn new(tone: StoryTone, vocabulary: Vec<String>, total_scenes: usize) -> Self {
        Self {
            tone,
            vocabulary,
            total_scenes: total_scenes.max(2),
            scenes: Vec::new(),
            spoken: Vec::new(),
            phase: StoryPhase::Generating(1),
        }
    }

    pub fn phase(&self) -> StoryPhase {
        self.phase
    }

    pub fn scenes(&self) -> &[SceneState] {
        &self.scenes
    }

    pub fn current(&self) -> Option<&SceneState> {
        self.scenes.last()
    }

    pub fn total_scenes(&self) -> usize {
        self.total_scenes
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.phase, StoryPhase::Generating(_) | StoryPhase::Titling)
    }

    pub fn opening_request(&self) -> GenerationRequest {
        GenerationRequest::Opening {
            vocabulary: self.vocabulary.clone(),
            tone: self.tone,
        }
    }

    /// Every appended scene's text, in order.
    pub fn story_so_far(&self) -> String {
        self.scenes
            .iter()
            .map(|scene| scene.narrative_text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Uses `input` to request the next scene. `None` unless the story is
    /// waiting for input.
    pub fn continue_with(&mut self, input: &str) -> Option<GenerationRequest> {
        let input = input.trim();
        if self.phase != StoryPhase::AwaitingInput || input.is_empty() {
            return None;
        }
        let next = self.scenes.len() + 1;
        self.phase = StoryPhase::Generating(next);
        let story_so_far = self.story_so_far();

        Some(if next >= self.total_scenes {
            GenerationRequest::Closing {
                story_so_far: format!("{story_so_far}\n\n{input}"),
                tone: self.tone,
                vocabulary: self.vocabulary.clone(),
                scene_index: next,
            }
        } else {
            GenerationRequest::Continuation {
                story_so_far,
                input: input.to_string(),
                tone: self.tone,
                vocabulary: self.vocabulary.clone(),
                scene_index: next,
            }
        })
    }

    /// Appends the scene being generated. Returns its index, or `None` if no
    /// scene was expected.
    pub fn accept_scene(&mut self, scene: Scene) -> Option<usize> {
        let StoryPhase::Generating(index) = self.phase else {
            return None;
        };
        let last = index >= self.total_scenes;
        self.scenes.push(SceneState {
            narrative_text: scene.text,
            illustration: scene.illustration,
            choices: if last { Vec::new() } else { scene.choices },
            sequence_index: index,
        });
        self.spoken.push(false);
        self.phase = if last {
            StoryPhase::Titling
        } else {
            StoryPhase::AwaitingInput
        };
        Some(index)
    }

    pub fn title_request(&self) -> Option<GenerationRequest> {
        (self.phase == StoryPhase::Titling).then(|| GenerationRequest::Title {
            full_story: self.story_so_far(),
        })
    }

    /// Closes the story once its title is in. False unless a title was pending.
    pub fn finish(&mut self) -> bool {
        if self.phase != StoryPhase::Titling {
            return false;
        }
        self.phase = StoryPhase::Finished;
        true
    }

    /// Marks a scene's narration as played. True only the first time.
    pub fn mark_spoken(&mut self, sequence_index: usize) -> bool {
        match sequence_index
            .checked_sub(1)
            .and_then(|i| self.spoken.get_mut(i))
        {
            Some(spoken) if !*spoken => {
                *spoken = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(text: &str) -> Scene {
        Scene {
            text: text.to_string(),
            illustration: None,
            choices: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        }
    }

    fn run() -> StoryRun {
        StoryRun::new(StoryTone::Funny, vec!["dog".to_string()], 3)
    }

    #[test]
    fn test_full_run_ends_with_closing_and_title() {
        let mut story = run();
        assert!(matches!(story.opening_request(), GenerationRequest::Opening { .. }));
        assert!(story.continue_with("too early").is_none());

        assert_eq!(story.accept_scene(scene("One.")), Some(1));
        assert_eq!(story.phase(), StoryPhase::AwaitingInput);
        assert!(story.continue_with("   ").is_none());

        match story.continue_with("fly").unwrap() {
            GenerationRequest::Continuation {
                story_so_far,
                input,
                scene_index,
                ..
            } => {
                assert_eq!(story_so_far, "One.");
                assert_eq!(input, "fly");
                assert_eq!(scene_index, 2);
            }
            other => panic!("unexpected request: {other:?}"),
        }
        assert!(story.continue_with("again").is_none());
        story.accept_scene(scene("Two."));

        match story.continue_with("land").unwrap() {
            GenerationRequest::Closing {
                story_so_far,
                scene_index,
                ..
            } => {
                assert_eq!(story_so_far, "One.\n\nTwo.\n\nland");
                assert_eq!(scene_index, 3);
            }
            other => panic!("unexpected request: {other:?}"),
        }
        assert_eq!(story.accept_scene(scene("Three.")), Some(3));
        assert!(story.current().unwrap().choices.is_empty());
        assert_eq!(story.phase(), StoryPhase::Titling);

        assert_eq!(
            story.title_request(),
            Some(GenerationRequest::Title {
                full_story: "One.\n\nTwo.\n\nThree.".to_string()
            })
        );
        assert!(story.finish());
        assert!(!story.finish());
        assert_eq!(story.phase(), StoryPhase::Finished);
        assert_eq!(story.scenes().len(), 3);
        assert!(story.accept_scene(scene("Four.")).is_none());
    }

    #[test]
    fn test_scene_is_spoken_once() {
        let mut story = run();
        story.accept_scene(scene("One."));
        assert!(story.mark_spoken(1));
        assert!(!story.mark_spoken(1));
        assert!(!story.mark_spoken(0));
        assert!(!story.mark_spoken(2));
    }
}
