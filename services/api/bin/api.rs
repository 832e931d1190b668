//! Main Entrypoint for the Imagitale API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the vocabulary bank and prompt templates.
//! 3. Initializing shared services (story generator and image provider).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use imagitale_api::{
    config::{Config, Provider},
    router::create_router,
    state::AppState,
};
use imagitale_core::{
    content::{ContentGenerator, LLMContentGenerator, MockContentGenerator},
    images::{ImageProvider, OpenAIImageProvider, PlaceholderImages},
    llm_client::OpenAICompatibleClient,
    vocab::VocabularyBank,
};
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = std::fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts from {}", prompts_path.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

fn openai_config(api_key: Option<&String>, api_base: &str) -> anyhow::Result<OpenAIConfig> {
    let api_key = api_key.context("API key missing for the selected provider")?;
    Ok(OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(api_base))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Vocabulary ---
    let vocabulary = Arc::new(VocabularyBank::load(&config.vocabulary_path)?);
    info!(path = %config.vocabulary_path.display(), "Vocabulary bank loaded.");

    // --- 4. Initialize Shared Services ---
    let images: Arc<dyn ImageProvider> = if config.image_generation {
        info!(model = %config.image_model, "Image generation enabled.");
        Arc::new(OpenAIImageProvider::new(
            openai_config(config.openai_api_key.as_ref(), OPENAI_API_BASE)?,
            config.image_model.clone(),
        ))
    } else {
        info!("Image generation disabled; using placeholder illustrations.");
        Arc::new(PlaceholderImages)
    };

    let api = match &config.provider {
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            Some(openai_config(config.openai_api_key.as_ref(), OPENAI_API_BASE)?)
        }
        Provider::Gemini => {
            info!("Using Gemini provider.");
            Some(openai_config(config.gemini_api_key.as_ref(), GEMINI_API_BASE)?)
        }
        Provider::Mock => {
            info!("Using mock story generator.");
            None
        }
    };
    let generator: Arc<dyn ContentGenerator> = match api {
        Some(openai_config) => {
            let prompts = load_prompts(&config.prompts_path)?;
            Arc::new(LLMContentGenerator::new(
                Arc::new(OpenAICompatibleClient::new(
                    openai_config,
                    config.chat_model.clone(),
                )),
                images.clone(),
                prompts,
                config.session.story_language,
            ))
        }
        None => Arc::new(MockContentGenerator),
    };

    let app_state = Arc::new(AppState {
        vocabulary,
        generator,
        images,
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
