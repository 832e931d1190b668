//! Vocabulary drill state.
//!
//! `DrillState` tracks one item's attempts and verdict; `DrillRound` walks the
//! round's items in presentation order and owns the swap pool.

use crate::{
    images::{IllustrationKind, placeholder},
    vocab::{VocabItem, Word},
};
use serde::Serialize;

/// Returns true when the spoken transcript contains either form of the word.
///
/// Deliberately permissive: "it's a dog" counts for "dog".
pub fn matches(transcript: &str, native_form: &str, target_form: &str) -> bool {
    let spoken = transcript.trim().to_lowercase();
    [native_form, target_form].iter().any(|form| {
        let form = form.trim().to_lowercase();
        !form.is_empty() && spoken.contains(&form)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    None,
    Pending,
    Correct,
    Incorrect,
}

/// Attempts and verdict for the item currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrillState {
    pub item: VocabItem,
    pub attempt_count: u32,
    pub verdict: Verdict,
}

impl DrillState {
    pub fn new(item: VocabItem) -> Self {
        Self {
            item,
            attempt_count: 0,
            verdict: Verdict::None,
        }
    }

    /// A listen attempt has started; its verdict is not known yet.
    pub fn begin_attempt(&mut self) {
        if self.verdict != Verdict::Correct {
            self.verdict = Verdict::Pending;
        }
    }

    /// The attempt produced nothing to judge.
    pub fn cancel_attempt(&mut self) {
        if self.verdict == Verdict::Pending {
            self.verdict = Verdict::None;
        }
    }

    /// Judges `transcript` and records the verdict.
    pub fn record(&mut self, transcript: &str) -> Verdict {
        self.verdict = if matches(transcript, &self.item.native_form, &self.item.target_form) {
            Verdict::Correct
        } else {
            self.attempt_count += 1;
            Verdict::Incorrect
        };
        self.verdict
    }

    pub fn can_skip(&self, threshold: u32) -> bool {
        self.verdict != Verdict::Correct && self.attempt_count >= threshold
    }
}

/// One pass over the round's items.
#[derive(Debug, Clone)]
pub struct DrillRound {
    items: Vec<VocabItem>,
    pool: Vec<Word>,
    position: usize,
    state: Option<DrillState>,
    collected: Vec<VocabItem>,
}

impl DrillRound {
    pub fn new(items: Vec<VocabItem>, pool: Vec<Word>) -> Self {
        let state = items.first().cloned().map(DrillState::new);
        Self {
            items,
            pool,
            position: 0,
            state,
            collected: Vec::new(),
        }
    }

    /// The item being drilled, `None` once the round is complete.
    pub fn current(&self) -> Option<&DrillState> {
        self.state.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut DrillState> {
        self.state.as_mut()
    }

    /// Zero-based position of the current item.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn round_size(&self) -> usize {
        self.items.len()
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn collected(&self) -> &[VocabItem] {
        &self.collected
    }

    /// Collects the current item (which must have been answered correctly)
    /// and moves on. Returns the new item, if any.
    pub fn advance(&mut self) -> Option<&DrillState> {
        let state = self.state.take_if(|state| state.verdict == Verdict::Correct)?;
        self.collected.push(state.item);
        self.position += 1;
        self.state = self.items.get(self.position).cloned().map(DrillState::new);
        self.state.as_ref()
    }

    /// Replaces the current item with the next unseen word from the pool.
    ///
    /// Only allowed once the item has been missed `threshold` times. The swap
    /// does not count as a collected item.
    pub fn swap(&mut self, threshold: u32) -> Option<&DrillState> {
        if !self.state.as_ref()?.can_skip(threshold) || self.pool.is_empty() {
            return None;
        }
        let word = self.pool.remove(0);
        let item = VocabItem::new(
            &word,
            placeholder(&word.english, IllustrationKind::Flashcard),
        );
        self.items[self.position] = item.clone();
        self.state = Some(DrillState::new(item));
        self.state.as_ref()
    }

    /// Sets a freshly generated illustration on the item with `target_form`,
    /// if it is still the current one.
    pub fn set_illustration(&mut self, target_form: &str, illustration: String) -> bool {
        match self.state.as_mut() {
            Some(state) if state.item.target_form == target_form => {
                state.item.illustration = illustration.clone();
                self.items[self.position].illustration = illustration;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(thai: &str, english: &str) -> Word {
        Word {
            thai: thai.to_string(),
            english: english.to_string(),
        }
    }

    fn item(thai: &str, english: &str) -> VocabItem {
        VocabItem::new(&word(thai, english), format!("img:{english}"))
    }

    fn round() -> DrillRound {
        DrillRound::new(
            vec![item("สุนัข", "dog"), item("แมว", "cat")],
            vec![word("นก", "bird")],
        )
    }

    #[test]
    fn test_match_predicate() {
        assert!(matches("it's a สุนัข", "สุนัข", "dog"));
        assert!(matches("  I see a DOG! ", "สุนัข", "dog"));
        assert!(!matches("cat", "สุนัข", "dog"));
        assert!(!matches("", "สุนัข", "dog"));
    }

    #[test]
    fn test_empty_form_never_matches() {
        assert!(!matches("anything", "", "  "));
    }

    #[test]
    fn test_skip_only_after_threshold() {
        let mut state = DrillState::new(item("สุนัข", "dog"));
        for expected in 1..=2 {
            assert_eq!(state.record("cat"), Verdict::Incorrect);
            assert_eq!(state.attempt_count, expected);
            assert!(!state.can_skip(3));
        }
        state.record("bird");
        assert!(state.can_skip(3));

        assert_eq!(state.record("dog"), Verdict::Correct);
        assert_eq!(state.attempt_count, 3);
        assert!(!state.can_skip(3));
    }

    #[test]
    fn test_advance_requires_correct_verdict() {
        let mut round = round();
        assert!(round.advance().is_none());
        assert_eq!(round.position(), 0);

        round.current_mut().unwrap().record("dog");
        let next = round.advance().unwrap();
        assert_eq!(next.item.target_form, "cat");
        assert_eq!(next.attempt_count, 0);
        assert_eq!(next.verdict, Verdict::None);

        round.current_mut().unwrap().record("แมว");
        assert!(round.advance().is_none());
        assert!(round.current().is_none());
        assert_eq!(round.position(), round.round_size());
        let collected: Vec<_> = round.collected().iter().map(|i| i.target_form.as_str()).collect();
        assert_eq!(collected, vec!["dog", "cat"]);
    }

    #[test]
    fn test_swap_replaces_item_without_collecting() {
        let mut round = round();
        assert!(round.swap(3).is_none());

        for _ in 0..3 {
            round.current_mut().unwrap().record("fish");
        }
        let swapped = round.swap(3).unwrap();
        assert_eq!(swapped.item.target_form, "bird");
        assert_eq!(
            swapped.item.illustration,
            "https://loremflickr.com/400/300/bird,illustration,simple?lock=bird"
        );
        assert_eq!(swapped.attempt_count, 0);
        assert_eq!(round.pool_len(), 0);
        assert!(round.collected().is_empty());
        assert_eq!(round.round_size(), 2);

        assert!(round.set_illustration("bird", "generated:bird".to_string()));
        assert!(!round.set_illustration("dog", "generated:dog".to_string()));
        assert_eq!(round.current().unwrap().item.illustration, "generated:bird");
    }
}
