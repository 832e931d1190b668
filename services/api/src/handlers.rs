//! Axum Handlers for the REST API
//!
//! This module serves the read-only catalogue the client needs before a
//! session starts: word categories and story tones. It uses `utoipa` doc
//! comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use imagitale_core::vocab::{StoryTone, WordCategory};
use std::sync::Arc;

use crate::{
    models::{CategorySummary, ErrorResponse, ToneSummary, WordEntry},
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

/// List the word categories a round can be drawn from.
#[utoipa::path(
    get,
    path = "/categories",
    responses(
        (status = 200, description = "All word categories", body = [CategorySummary])
    )
)]
pub async fn list_categories(State(state): State<Arc<AppState>>) -> Json<Vec<CategorySummary>> {
    let categories = WordCategory::ALL
        .into_iter()
        .map(|category| CategorySummary {
            id: category.id().to_string(),
            label: category.label().to_string(),
            word_count: state.vocabulary.words(category).len(),
        })
        .collect();
    Json(categories)
}

/// List every word in a category.
#[utoipa::path(
    get,
    path = "/categories/{id}/words",
    responses(
        (status = 200, description = "Words in the category", body = [WordEntry]),
        (status = 404, description = "Unknown category", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Category id, e.g. `animals_nature`")
    )
)]
pub async fn list_category_words(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WordEntry>>, ApiError> {
    let category = WordCategory::from_id(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Category '{}' not found", id)))?;
    let words = state
        .vocabulary
        .words(category)
        .iter()
        .map(|word| WordEntry {
            thai: word.thai.clone(),
            english: word.english.clone(),
        })
        .collect();
    Ok(Json(words))
}

/// List the tones a story can be written in.
#[utoipa::path(
    get,
    path = "/tones",
    responses(
        (status = 200, description = "All story tones", body = [ToneSummary])
    )
)]
pub async fn list_tones() -> Json<Vec<ToneSummary>> {
    Json(
        StoryTone::ALL
            .into_iter()
            .map(|tone| ToneSummary {
                id: tone.id().to_string(),
                label: tone.label().to_string(),
            })
            .collect(),
    )
}
