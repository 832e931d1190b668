//! API Models
//!
//! Response bodies for the REST API, documented with `utoipa`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct CategorySummary {
    #[schema(example = "animals_nature")]
    pub id: String,
    #[schema(example = "Animals & Nature")]
    pub label: String,
    /// Words available in the category, round and swap pool together.
    pub word_count: usize,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct WordEntry {
    #[schema(example = "สุนัข")]
    pub thai: String,
    #[schema(example = "dog")]
    pub english: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ToneSummary {
    #[schema(example = "adventure")]
    pub id: String,
    #[schema(example = "Adventure")]
    pub label: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
