//! Illustration capability.
//!
//! Image generation is optional: when it is disabled or a request fails, a
//! deterministic placeholder URL stands in for the picture.

use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{CreateImageRequestArgs, Image, ImageModel, ImageResponseFormat, ImageSize},
};
use async_trait::async_trait;
use tracing::warn;

/// What an illustration is for, which decides its style and placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllustrationKind {
    /// A vocabulary flashcard.
    Flashcard,
    /// The picture for the story scene with this 1-based index.
    Scene(usize),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Returns a reference (URL or data URI) to an image matching `description`.
    async fn illustrate(&self, description: &str, kind: IllustrationKind) -> Result<String>;
}

/// The stand-in image reference for `description`.
pub fn placeholder(description: &str, kind: IllustrationKind) -> String {
    match kind {
        IllustrationKind::Flashcard => format!(
            "https://loremflickr.com/400/300/{},illustration,simple?lock={}",
            description,
            description.split_whitespace().collect::<String>()
        ),
        IllustrationKind::Scene(index) => format!(
            "https://loremflickr.com/640/360/{},storybook?lock={}",
            description.split_whitespace().collect::<Vec<_>>().join(","),
            index
        ),
    }
}

/// Illustrates with `provider`, substituting the placeholder on failure.
pub async fn illustrate_or_placeholder(
    provider: &dyn ImageProvider,
    description: &str,
    kind: IllustrationKind,
) -> String {
    match provider.illustrate(description, kind).await {
        Ok(reference) => reference,
        Err(e) => {
            warn!(error = ?e, %description, "Image generation failed, using placeholder");
            placeholder(description, kind)
        }
    }
}

/// The provider used when image generation is switched off.
pub struct PlaceholderImages;

#[async_trait]
impl ImageProvider for PlaceholderImages {
    async fn illustrate(&self, description: &str, kind: IllustrationKind) -> Result<String> {
        Ok(placeholder(description, kind))
    }
}

/// An `ImageProvider` backed by an OpenAI-compatible images endpoint.
pub struct OpenAIImageProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIImageProvider {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    fn prompt(description: &str, kind: IllustrationKind) -> String {
        match kind {
            IllustrationKind::Flashcard => format!(
                "A simple, cute, cartoon-style illustration of a {description}, with a plain white background, for a children's flashcard."
            ),
            IllustrationKind::Scene(_) => format!(
                "A beautiful watercolor storybook illustration of {description}, whimsical and magical style for children."
            ),
        }
    }
}

#[async_trait]
impl ImageProvider for OpenAIImageProvider {
    async fn illustrate(&self, description: &str, kind: IllustrationKind) -> Result<String> {
        let request = CreateImageRequestArgs::default()
            .prompt(Self::prompt(description, kind))
            .model(ImageModel::Other(self.model.clone()))
            .n(1)
            .size(ImageSize::S1024x1024)
            .response_format(ImageResponseFormat::Url)
            .build()?;

        let response = self.client.images().create(request).await?;
        let image = response
            .data
            .first()
            .context("Image response contained no images")?;

        Ok(match image.as_ref() {
            Image::Url { url, .. } => url.to_string(),
            Image::B64Json { b64_json, .. } => format!("data:image/png;base64,{b64_json}"),
        })
    }
}
