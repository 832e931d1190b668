//! Story Generation Service
//!
//! This module defines the content-generation capability the turn controller
//! consumes: an opening scene seeded by the round's vocabulary, continuation
//! scenes driven by the child's ideas, a closing scene, and a title. Every
//! call may fail; the controller substitutes fallback content rather than
//! halting the session.

use crate::{
    error::GenerationFailure,
    images::{IllustrationKind, ImageProvider, illustrate_or_placeholder, placeholder},
    language::Language,
    llm_client::{CompletionRequest, LLMClient, ResponseSchema},
    vocab::StoryTone,
};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info};

/// Preset continuations offered with a non-final scene.
pub const CHOICES_PER_SCENE: usize = 3;

/// One unit of generated story content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub text: String,
    pub illustration: Option<String>,
    #[serde(default)]
    pub choices: Vec<String>,
}

impl Scene {
    /// The neutral scene used when generation for `stage` fails.
    pub fn fallback(stage: Stage, language: Language) -> Self {
        let phrases = language.phrases();
        let text = match stage {
            Stage::Opening => phrases.fallback_opening,
            Stage::Continuation => phrases.fallback_continuation,
            Stage::Closing | Stage::Title => phrases.fallback_closing,
        };
        Self {
            text: text.to_string(),
            illustration: None,
            choices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Opening,
    Continuation,
    Closing,
    Title,
}

/// A generation call, captured so it can be run off the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    Opening {
        vocabulary: Vec<String>,
        tone: StoryTone,
    },
    Continuation {
        story_so_far: String,
        input: String,
        tone: StoryTone,
        vocabulary: Vec<String>,
        scene_index: usize,
    },
    Closing {
        story_so_far: String,
        tone: StoryTone,
        vocabulary: Vec<String>,
        scene_index: usize,
    },
    Title {
        full_story: String,
    },
}

/// The successful result of a [`GenerationRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    Scene(Scene),
    Title(String),
}

impl GenerationRequest {
    pub fn stage(&self) -> Stage {
        match self {
            GenerationRequest::Opening { .. } => Stage::Opening,
            GenerationRequest::Continuation { .. } => Stage::Continuation,
            GenerationRequest::Closing { .. } => Stage::Closing,
            GenerationRequest::Title { .. } => Stage::Title,
        }
    }

    /// Runs the request against `generator`.
    pub async fn run(
        &self,
        generator: &dyn ContentGenerator,
    ) -> Result<Generated, GenerationFailure> {
        match self {
            GenerationRequest::Opening { vocabulary, tone } => generator
                .generate_opening(vocabulary, *tone)
                .await
                .map(Generated::Scene),
            GenerationRequest::Continuation {
                story_so_far,
                input,
                tone,
                vocabulary,
                scene_index,
            } => generator
                .generate_continuation(story_so_far, input, *tone, vocabulary, *scene_index)
                .await
                .map(Generated::Scene),
            GenerationRequest::Closing {
                story_so_far,
                tone,
                vocabulary,
                scene_index,
            } => generator
                .generate_closing(story_so_far, *tone, vocabulary, *scene_index)
                .await
                .map(Generated::Scene),
            GenerationRequest::Title { full_story } => generator
                .generate_title(full_story)
                .await
                .map(Generated::Title),
        }
    }
}

/// Defines the contract for any service that can write the branching story.
///
/// This abstraction allows the session to swap between an LLM-backed writer
/// and a deterministic one for development and tests.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Writes the opening scene, seeded only by the vocabulary and tone.
    async fn generate_opening(
        &self,
        vocabulary: &[String],
        tone: StoryTone,
    ) -> Result<Scene, GenerationFailure>;

    /// Continues the story with the child's idea or chosen option.
    ///
    /// `scene_index` is the 1-based position of the scene being written.
    async fn generate_continuation(
        &self,
        story_so_far: &str,
        input: &str,
        tone: StoryTone,
        vocabulary: &[String],
        scene_index: usize,
    ) -> Result<Scene, GenerationFailure>;

    /// Writes the closing scene. Closing scenes never carry choices.
    async fn generate_closing(
        &self,
        story_so_far: &str,
        tone: StoryTone,
        vocabulary: &[String],
        scene_index: usize,
    ) -> Result<Scene, GenerationFailure>;

    /// Produces a short title for the finished story.
    async fn generate_title(&self, full_story: &str) -> Result<String, GenerationFailure>;
}

/// Strips quoting and markdown emphasis the model likes to wrap titles in.
pub fn clean_title(raw: &str) -> String {
    raw.replace(['"', '*'], "").trim().to_string()
}

/// The JSON shape requested for scenes that offer choices.
#[derive(Debug, Deserialize, JsonSchema)]
struct ChoiceSceneDraft {
    /// The paragraph of the story for the current scene.
    text: String,
    /// A simple English prompt for an image generator to illustrate this scene.
    image_prompt: String,
    /// Three short, creative choices for the child to pick from to continue the story.
    choices: Vec<String>,
}

/// The JSON shape requested for the closing scene.
#[derive(Debug, Deserialize, JsonSchema)]
struct ClosingSceneDraft {
    /// The final paragraph of the story.
    text: String,
    /// A simple English prompt for an image generator to illustrate this scene.
    image_prompt: String,
}

fn schema_of<T: JsonSchema>(name: &str) -> Result<ResponseSchema, GenerationFailure> {
    let schema = serde_json::to_value(schemars::schema_for!(T))
        .map_err(|e| GenerationFailure::Malformed(e.to_string()))?;
    Ok(ResponseSchema {
        name: name.to_string(),
        schema,
    })
}

/// An implementation of `ContentGenerator` that uses an OpenAI-compatible API.
///
/// Prompts are templates keyed by name (`system_prompt`, `opening`,
/// `continuation`, `closing`, `title`) with `{placeholder}` substitution.
pub struct LLMContentGenerator {
    client: Arc<dyn LLMClient>,
    images: Arc<dyn ImageProvider>,
    prompts: HashMap<String, String>,
    language: Language,
}

impl LLMContentGenerator {
    pub fn new(
        client: Arc<dyn LLMClient>,
        images: Arc<dyn ImageProvider>,
        prompts: HashMap<String, String>,
        language: Language,
    ) -> Self {
        Self {
            client,
            images,
            prompts,
            language,
        }
    }

    fn render(&self, key: &str, vars: &[(&str, &str)]) -> Result<String, GenerationFailure> {
        let template = self
            .prompts
            .get(key)
            .ok_or_else(|| GenerationFailure::MissingPrompt(key.to_string()))?;
        Ok(vars.iter().fold(template.clone(), |prompt, (name, value)| {
            prompt.replace(&format!("{{{name}}}"), value)
        }))
    }

    fn system_prompt(&self, tone: StoryTone) -> Result<String, GenerationFailure> {
        self.render(
            "system_prompt",
            &[("tone", tone.label()), ("language", self.language.name())],
        )
    }

    async fn illustrate(&self, image_prompt: &str, scene_index: usize) -> Option<String> {
        let kind = IllustrationKind::Scene(scene_index);
        if image_prompt.trim().is_empty() {
            return Some(placeholder("storybook", kind));
        }
        Some(illustrate_or_placeholder(self.images.as_ref(), image_prompt, kind).await)
    }

    async fn choice_scene(
        &self,
        tone: StoryTone,
        user_prompt: String,
        scene_index: usize,
    ) -> Result<Scene, GenerationFailure> {
        let reply = self
            .client
            .complete(CompletionRequest {
                system_prompt: self.system_prompt(tone)?,
                user_prompt,
                schema: Some(schema_of::<ChoiceSceneDraft>("story_scene")?),
            })
            .await?;
        let draft: ChoiceSceneDraft = serde_json::from_str(&reply)
            .map_err(|e| GenerationFailure::Malformed(e.to_string()))?;
        if draft.text.trim().is_empty() {
            return Err(GenerationFailure::Malformed("empty scene text".to_string()));
        }

        let mut choices: Vec<String> = draft
            .choices
            .into_iter()
            .map(|choice| choice.trim().to_string())
            .filter(|choice| !choice.is_empty())
            .collect();
        choices.truncate(CHOICES_PER_SCENE);
        debug!(scene_index, choices = choices.len(), "Scene draft parsed");

        Ok(Scene {
            text: draft.text.trim().to_string(),
            illustration: self.illustrate(&draft.image_prompt, scene_index).await,
            choices,
        })
    }
}

#[async_trait]
impl ContentGenerator for LLMContentGenerator {
    async fn generate_opening(
        &self,
        vocabulary: &[String],
        tone: StoryTone,
    ) -> Result<Scene, GenerationFailure> {
        info!(?tone, words = vocabulary.len(), "Generating opening scene");
        let prompt = self.render("opening", &[("words", &vocabulary.join(", "))])?;
        self.choice_scene(tone, prompt, 1).await
    }

    async fn generate_continuation(
        &self,
        story_so_far: &str,
        input: &str,
        tone: StoryTone,
        vocabulary: &[String],
        scene_index: usize,
    ) -> Result<Scene, GenerationFailure> {
        info!(?tone, scene_index, "Generating continuation scene");
        let prompt = self.render(
            "continuation",
            &[
                ("story", story_so_far),
                ("idea", input),
                ("words", &vocabulary.join(", ")),
            ],
        )?;
        self.choice_scene(tone, prompt, scene_index).await
    }

    async fn generate_closing(
        &self,
        story_so_far: &str,
        tone: StoryTone,
        vocabulary: &[String],
        scene_index: usize,
    ) -> Result<Scene, GenerationFailure> {
        info!(?tone, scene_index, "Generating closing scene");
        let prompt = self.render(
            "closing",
            &[("story", story_so_far), ("words", &vocabulary.join(", "))],
        )?;
        let reply = self
            .client
            .complete(CompletionRequest {
                system_prompt: self.system_prompt(tone)?,
                user_prompt: prompt,
                schema: Some(schema_of::<ClosingSceneDraft>("closing_scene")?),
            })
            .await?;
        let draft: ClosingSceneDraft = serde_json::from_str(&reply)
            .map_err(|e| GenerationFailure::Malformed(e.to_string()))?;
        if draft.text.trim().is_empty() {
            return Err(GenerationFailure::Malformed("empty scene text".to_string()));
        }
        let illustration = self.illustrate(&draft.image_prompt, scene_index).await;
        Ok(Scene {
            text: draft.text.trim().to_string(),
            illustration,
            choices: Vec::new(),
        })
    }

    async fn generate_title(&self, full_story: &str) -> Result<String, GenerationFailure> {
        info!("Generating story title");
        let prompt = self.render(
            "title",
            &[("story", full_story), ("language", self.language.name())],
        )?;
        let reply = self
            .client
            .complete(CompletionRequest {
                system_prompt: "You name children's stories.".to_string(),
                user_prompt: prompt,
                schema: None,
            })
            .await?;
        let title = clean_title(&reply);
        if title.is_empty() {
            return Err(GenerationFailure::Malformed("empty title".to_string()));
        }
        Ok(title)
    }
}

/// A mock `ContentGenerator` for development and integration testing.
///
/// This implementation provides predictable, deterministic output, which is
/// useful for running sessions without external dependencies or API costs.
pub struct MockContentGenerator;

#[async_trait]
impl ContentGenerator for MockContentGenerator {
    async fn generate_opening(
        &self,
        vocabulary: &[String],
        tone: StoryTone,
    ) -> Result<Scene, GenerationFailure> {
        Ok(Scene {
            text: format!(
                "Once upon a time, in a {} tale, there lived a {}.",
                tone.label().to_lowercase(),
                vocabulary.first().map(String::as_str).unwrap_or("little friend")
            ),
            illustration: Some(placeholder("storybook beginning", IllustrationKind::Scene(1))),
            choices: vec![
                "Go on an adventure".to_string(),
                "Meet a new friend".to_string(),
                "Find a hidden treasure".to_string(),
            ],
        })
    }

    async fn generate_continuation(
        &self,
        _story_so_far: &str,
        input: &str,
        _tone: StoryTone,
        vocabulary: &[String],
        scene_index: usize,
    ) -> Result<Scene, GenerationFailure> {
        let word = vocabulary
            .get(scene_index % vocabulary.len().max(1))
            .map(String::as_str)
            .unwrap_or("friend");
        Ok(Scene {
            text: format!("Then they decided to {}, and met a {}.", input.trim(), word),
            illustration: Some(placeholder("storybook journey", IllustrationKind::Scene(scene_index))),
            choices: vec![
                "Keep going".to_string(),
                "Take a rest".to_string(),
                "Sing a song".to_string(),
            ],
        })
    }

    async fn generate_closing(
        &self,
        _story_so_far: &str,
        _tone: StoryTone,
        _vocabulary: &[String],
        scene_index: usize,
    ) -> Result<Scene, GenerationFailure> {
        Ok(Scene {
            text: "And everyone went home happy. The end.".to_string(),
            illustration: Some(placeholder(
                "castle happy ending",
                IllustrationKind::Scene(scene_index),
            )),
            choices: Vec::new(),
        })
    }

    async fn generate_title(&self, full_story: &str) -> Result<String, GenerationFailure> {
        let words = full_story.split_whitespace().count();
        Ok(format!("A Story of {words} Words"))
    }
}
