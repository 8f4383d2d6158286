use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::error::VocabularyError;
use crate::storage::Database;
use crate::text::{normalize_text, Tokenizer};
use crate::types::{CropRect, TrackedWord, WordAppearance};

/// What the context synchronizer needs from vocabulary persistence.
pub trait AppearanceStore {
    /// Every lemma currently tracked, across all readings.
    fn tracked_lemmas(&self) -> Result<HashSet<String>, VocabularyError>;

    /// Records an appearance of a tracked lemma.
    ///
    /// `Ok(None)` means the identical `(word, volume, page, crop)` was already
    /// stored. Fails with [`VocabularyError::UntrackedLemma`] when `lemma` is
    /// not tracked.
    fn add_appearance_if_new(
        &self,
        lemma: &str,
        volume_path: &Path,
        page_index: usize,
        crop: &CropRect,
        sentence_text: &str,
    ) -> Result<Option<WordAppearance>, VocabularyError>;
}

impl<S: AppearanceStore + ?Sized> AppearanceStore for &S {
    fn tracked_lemmas(&self) -> Result<HashSet<String>, VocabularyError> {
        (**self).tracked_lemmas()
    }

    fn add_appearance_if_new(
        &self,
        lemma: &str,
        volume_path: &Path,
        page_index: usize,
        crop: &CropRect,
        sentence_text: &str,
    ) -> Result<Option<WordAppearance>, VocabularyError> {
        (**self).add_appearance_if_new(lemma, volume_path, page_index, crop, sentence_text)
    }
}

/// Tracking words and their appearances on top of [`Database`], using the
/// tokenizer to derive lemma and reading from clicked text.
pub struct VocabularyService<T> {
    db: Database,
    tokenizer: T,
}

impl<T: Tokenizer> VocabularyService<T> {
    pub fn new(db: Database, tokenizer: T) -> Self {
        Self { db, tokenizer }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn list_tracked_words(&self) -> Result<Vec<TrackedWord>, VocabularyError> {
        self.db.list_tracked_words()
    }

    pub fn list_appearances(&self, word_id: i64) -> Result<Vec<WordAppearance>, VocabularyError> {
        self.db.list_appearances_for_word(word_id)
    }

    pub fn is_word_tracked(&self, lemma: &str) -> Result<bool, VocabularyError> {
        Ok(self.db.find_tracked_word(lemma)?.is_some())
    }

    /// Tracks the word (or reuses the existing `(lemma, reading)` entry) and
    /// records where it was seen. The appearance is `None` if that exact spot
    /// was already recorded.
    #[allow(clippy::too_many_arguments)]
    pub fn track_word(
        &self,
        lemma: &str,
        reading: &str,
        part_of_speech: &str,
        volume_path: &Path,
        page_index: usize,
        crop: &CropRect,
        sentence_text: &str,
    ) -> Result<(TrackedWord, Option<WordAppearance>), VocabularyError> {
        let word = self.db.upsert_tracked_word(lemma, reading, part_of_speech)?;
        let volume = self.db.upsert_volume(volume_path, None)?;
        let appearance = self.db.insert_word_appearance(word.id, volume.id, page_index, crop, sentence_text)?;
        info!(lemma = %word.lemma, reading = %word.reading, page_index, "word tracked");
        Ok((word, appearance))
    }

    /// Tracks the first token of `surface_text` after whitespace cleanup.
    /// `None` when the text has no tokens.
    pub fn track_word_from_surface(
        &self,
        surface_text: &str,
        volume_path: &Path,
        page_index: usize,
        crop: &CropRect,
        sentence_text: &str,
    ) -> Result<Option<(TrackedWord, Option<WordAppearance>)>, VocabularyError> {
        let Some(token) = self.tokenizer.tokenize(&normalize_text(surface_text)).into_iter().next() else {
            return Ok(None);
        };
        self.track_word(
            &token.lemma,
            &token.reading,
            &token.part_of_speech,
            volume_path,
            page_index,
            crop,
            sentence_text,
        )
        .map(Some)
    }

    pub fn get_all_tracked_lemmas(&self) -> Result<HashSet<String>, VocabularyError> {
        Ok(self.db.tracked_lemmas()?.into_iter().collect())
    }
}

impl<T: Tokenizer> AppearanceStore for VocabularyService<T> {
    fn tracked_lemmas(&self) -> Result<HashSet<String>, VocabularyError> {
        self.get_all_tracked_lemmas()
    }

    fn add_appearance_if_new(
        &self,
        lemma: &str,
        volume_path: &Path,
        page_index: usize,
        crop: &CropRect,
        sentence_text: &str,
    ) -> Result<Option<WordAppearance>, VocabularyError> {
        let word = self
            .db
            .find_tracked_word(lemma)?
            .ok_or_else(|| VocabularyError::UntrackedLemma(lemma.to_string()))?;
        let volume = self.db.upsert_volume(volume_path, None)?;
        self.db.insert_word_appearance(word.id, volume.id, page_index, crop, sentence_text)
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::text::{LexiconEntry, LexiconTokenizer};

    fn entry(surface: &str, lemma: &str, reading: &str, pos: &str) -> LexiconEntry {
        LexiconEntry { surface: surface.into(), lemma: lemma.into(), reading: reading.into(), pos: pos.into() }
    }

    #[fixture]
    fn service() -> VocabularyService<LexiconTokenizer> {
        let tokenizer = LexiconTokenizer::new([
            entry("走った", "走る", "はしった", "VERB"),
            entry("食べている", "食べる", "たべている", "VERB"),
        ]);
        VocabularyService::new(Database::open_in_memory().unwrap(), tokenizer)
    }

    fn crop() -> CropRect {
        CropRect::new(0.0, 0.0, 10.0, 10.0)
    }

    #[rstest]
    fn tracks_from_surface_using_the_lemma(service: VocabularyService<LexiconTokenizer>) {
        let vol = Path::new("/library/vol");
        let (word, appearance) =
            service.track_word_from_surface("走った", vol, 0, &crop(), "田中さんが走った。").unwrap().unwrap();
        assert_eq!(word.lemma, "走る");
        assert_eq!(word.reading, "はしった");
        assert_eq!(word.part_of_speech, "VERB");
        assert_eq!(appearance.unwrap().sentence_text, "田中さんが走った。");
        assert!(service.is_word_tracked("走る").unwrap());
        assert!(!service.is_word_tracked("走った").unwrap());
    }

    #[rstest]
    fn surface_whitespace_is_cleaned_before_tokenizing(service: VocabularyService<LexiconTokenizer>) {
        let (word, _) = service
            .track_word_from_surface("\n  食べている \t", Path::new("/v"), 2, &crop(), "食べている")
            .unwrap()
            .unwrap();
        assert_eq!(word.lemma, "食べる");
    }

    #[rstest]
    fn surface_without_tokens_tracks_nothing(service: VocabularyService<LexiconTokenizer>) {
        assert!(service.track_word_from_surface("", Path::new("/v"), 0, &crop(), "").unwrap().is_none());
        assert!(service.list_tracked_words().unwrap().is_empty());
    }

    #[rstest]
    fn add_appearance_requires_tracked_lemma(service: VocabularyService<LexiconTokenizer>) {
        let err = service.add_appearance_if_new("食べる", Path::new("/v"), 0, &crop(), "").unwrap_err();
        assert!(matches!(err, VocabularyError::UntrackedLemma(lemma) if lemma == "食べる"));
    }

    #[rstest]
    fn add_appearance_is_idempotent(service: VocabularyService<LexiconTokenizer>) {
        let vol = Path::new("/library/vol");
        service.track_word("食べる", "たべる", "VERB", vol, 0, &crop(), "食べる").unwrap();

        let other = CropRect::new(5.0, 5.0, 1.0, 1.0);
        assert!(service.add_appearance_if_new("食べる", vol, 0, &crop(), "食べる").unwrap().is_none());
        let created = service.add_appearance_if_new("食べる", vol, 0, &other, "食べている").unwrap();
        assert!(created.is_some());
        assert!(service.add_appearance_if_new("食べる", vol, 0, &other, "食べている").unwrap().is_none());

        let word_id = service.list_tracked_words().unwrap()[0].id;
        assert_eq!(service.list_appearances(word_id).unwrap().len(), 2);
    }

    #[rstest]
    fn tracked_lemmas_collapse_readings(service: VocabularyService<LexiconTokenizer>) {
        let vol = Path::new("/library/vol");
        service.track_word("食べる", "たべる", "VERB", vol, 0, &crop(), "").unwrap();
        service.track_word("食べる", "くう", "VERB", vol, 1, &crop(), "").unwrap();
        service.track_word("走る", "はしる", "VERB", vol, 1, &crop(), "").unwrap();

        let lemmas = service.get_all_tracked_lemmas().unwrap();
        assert_eq!(lemmas, HashSet::from(["食べる".to_string(), "走る".to_string()]));
        assert_eq!(service.list_tracked_words().unwrap().len(), 3);
    }
}
