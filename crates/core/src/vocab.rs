//! Vocabulary, story tones, and round preparation.

use crate::{
    images::{IllustrationKind, ImageProvider, illustrate_or_placeholder},
    language::Language,
};
use anyhow::{Context, Result};
use futures::future::join_all;
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};

/// A word pair as stored in the vocabulary bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub thai: String,
    pub english: String,
}

/// A word ready to be drilled: both forms plus its illustration.
///
/// Immutable once a round has loaded it; a swap replaces the whole item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabItem {
    pub native_form: String,
    pub target_form: String,
    pub illustration: String,
}

impl VocabItem {
    pub fn new(word: &Word, illustration: impl Into<String>) -> Self {
        Self {
            native_form: word.thai.clone(),
            target_form: word.english.clone(),
            illustration: illustration.into(),
        }
    }

    /// The form used when weaving the word into a story told in `language`.
    pub fn form_for(&self, language: Language) -> &str {
        match language {
            Language::Thai => &self.native_form,
            Language::English => &self.target_form,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordCategory {
    AnimalsNature,
    FamilyPeople,
    FoodDrink,
    ThingsToys,
    PlacesEnvironment,
    ActionsEmotions,
}

impl WordCategory {
    pub const ALL: [WordCategory; 6] = [
        WordCategory::AnimalsNature,
        WordCategory::FamilyPeople,
        WordCategory::FoodDrink,
        WordCategory::ThingsToys,
        WordCategory::PlacesEnvironment,
        WordCategory::ActionsEmotions,
    ];

    pub fn id(self) -> &'static str {
        match self {
            WordCategory::AnimalsNature => "animals_nature",
            WordCategory::FamilyPeople => "family_people",
            WordCategory::FoodDrink => "food_drink",
            WordCategory::ThingsToys => "things_toys",
            WordCategory::PlacesEnvironment => "places_environment",
            WordCategory::ActionsEmotions => "actions_emotions",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WordCategory::AnimalsNature => "Animals & Nature",
            WordCategory::FamilyPeople => "Family & People",
            WordCategory::FoodDrink => "Food & Drink",
            WordCategory::ThingsToys => "Things & Toys",
            WordCategory::PlacesEnvironment => "Places & Environment",
            WordCategory::ActionsEmotions => "Actions & Emotions",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.id() == id)
    }
}

/// The mood the story generator is asked to write in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryTone {
    Adventure,
    Heartwarming,
    Funny,
    Dreamy,
    Mystery,
    Relationships,
}

impl StoryTone {
    pub const ALL: [StoryTone; 6] = [
        StoryTone::Adventure,
        StoryTone::Heartwarming,
        StoryTone::Funny,
        StoryTone::Dreamy,
        StoryTone::Mystery,
        StoryTone::Relationships,
    ];

    pub fn id(self) -> &'static str {
        match self {
            StoryTone::Adventure => "adventure",
            StoryTone::Heartwarming => "heartwarming",
            StoryTone::Funny => "funny",
            StoryTone::Dreamy => "dreamy",
            StoryTone::Mystery => "mystery",
            StoryTone::Relationships => "relationships",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StoryTone::Adventure => "Adventure",
            StoryTone::Heartwarming => "Heartwarming & Moral",
            StoryTone::Funny => "Funny & Humorous",
            StoryTone::Dreamy => "Dreamy & Imaginative",
            StoryTone::Mystery => "Mystery & Discovery",
            StoryTone::Relationships => "Relationships",
        }
    }
}

/// All words known to the app, grouped by category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VocabularyBank {
    categories: HashMap<WordCategory, Vec<Word>>,
}

impl VocabularyBank {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse vocabulary bank")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read vocabulary from {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn words(&self, category: WordCategory) -> &[Word] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// The words chosen for one round, and the unseen rest of the category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundPlan {
    pub words: Vec<Word>,
    pub pool: Vec<Word>,
}

/// Shuffles the category and splits it into the round and the swap pool.
pub fn select_round<R: Rng + ?Sized>(words: &[Word], round_size: usize, rng: &mut R) -> RoundPlan {
    let mut shuffled = words.to_vec();
    shuffled.shuffle(rng);
    let pool = shuffled.split_off(round_size.min(shuffled.len()));
    RoundPlan {
        words: shuffled,
        pool,
    }
}

/// Fetches every flashcard illustration concurrently. A failed fetch falls
/// back to the word's placeholder image.
pub async fn illustrate_round(words: &[Word], images: &dyn ImageProvider) -> Vec<VocabItem> {
    join_all(words.iter().map(|word| async move {
        let illustration =
            illustrate_or_placeholder(images, &word.english, IllustrationKind::Flashcard).await;
        VocabItem::new(word, illustration)
    }))
    .await
}

/// Selects and illustrates a round from a category's words.
pub async fn prepare_round(
    words: &[Word],
    round_size: usize,
    images: &dyn ImageProvider,
) -> (Vec<VocabItem>, Vec<Word>) {
    let plan = {
        let mut rng = rand::rng();
        select_round(words, round_size, &mut rng)
    };
    let items = illustrate_round(&plan.words, images).await;
    (items, plan.pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::{MockImageProvider, PlaceholderImages};
    use rand::{SeedableRng, rngs::StdRng};

    fn word(thai: &str, english: &str) -> Word {
        Word {
            thai: thai.to_string(),
            english: english.to_string(),
        }
    }

    fn animals() -> Vec<Word> {
        vec![
            word("สุนัข", "dog"),
            word("แมว", "cat"),
            word("นก", "bird"),
            word("ปลา", "fish"),
            word("ช้าง", "elephant"),
            word("ต้นไม้", "tree"),
            word("ดอกไม้", "flower"),
        ]
    }

    #[test]
    fn test_bank_from_json() {
        let bank = VocabularyBank::from_json(
            r#"{"animals_nature": [{"thai": "สุนัข", "english": "dog"}]}"#,
        )
        .unwrap();
        assert_eq!(bank.words(WordCategory::AnimalsNature), &[word("สุนัข", "dog")]);
        assert!(bank.words(WordCategory::FoodDrink).is_empty());
    }

    #[test]
    fn test_select_round_splits_without_loss() {
        let words = animals();
        let mut rng = StdRng::seed_from_u64(7);
        let plan = select_round(&words, 5, &mut rng);
        assert_eq!(plan.words.len(), 5);
        assert_eq!(plan.pool.len(), 2);

        let mut all: Vec<_> = plan.words.iter().chain(&plan.pool).cloned().collect();
        all.sort_by(|a, b| a.english.cmp(&b.english));
        let mut expected = words.clone();
        expected.sort_by(|a, b| a.english.cmp(&b.english));
        assert_eq!(all, expected);
    }

    #[test]
    fn test_select_round_with_small_category() {
        let mut rng = StdRng::seed_from_u64(1);
        let plan = select_round(&animals()[..3], 5, &mut rng);
        assert_eq!(plan.words.len(), 3);
        assert!(plan.pool.is_empty());
    }

    #[test]
    fn test_category_ids_round_trip() {
        for category in WordCategory::ALL {
            assert_eq!(WordCategory::from_id(category.id()), Some(category));
        }
        assert_eq!(WordCategory::from_id("dinosaurs"), None);
    }

    #[test]
    fn test_tone_ids_match_wire_names() {
        for tone in StoryTone::ALL {
            assert_eq!(
                serde_json::to_value(tone).unwrap(),
                serde_json::Value::String(tone.id().to_string())
            );
        }
    }

    #[tokio::test]
    async fn test_illustrate_round_falls_back_per_word() {
        let mut images = MockImageProvider::new();
        images.expect_illustrate().returning(|description, _| {
            if description == "cat" {
                Err(anyhow::anyhow!("quota exceeded"))
            } else {
                Ok(format!("generated:{description}"))
            }
        });

        let words = vec![word("สุนัข", "dog"), word("แมว", "cat")];
        let items = illustrate_round(&words, &images).await;

        assert_eq!(items[0].illustration, "generated:dog");
        assert_eq!(
            items[1].illustration,
            "https://loremflickr.com/400/300/cat,illustration,simple?lock=cat"
        );
        assert_eq!(items[1].native_form, "แมว");
    }

    #[tokio::test]
    async fn test_prepare_round_with_placeholders() {
        let (items, pool) = prepare_round(&animals(), 5, &PlaceholderImages).await;
        assert_eq!(items.len(), 5);
        assert_eq!(pool.len(), 2);
        assert!(items.iter().all(|item| item.illustration.starts_with("https://loremflickr.com/400/300/")));
    }
}
