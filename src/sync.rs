use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::{SyncError, VocabularyError};
use crate::text::Tokenizer;
use crate::types::Volume;
use crate::vocabulary::AppearanceStore;

/// UI-agnostic callbacks the synchronizer reports through.
pub trait SyncSink {
    fn confirm(&mut self, title: &str, prompt: &str) -> bool;
    fn notify_progress(&mut self, done: usize, total: usize);
    fn notify_info(&mut self, title: &str, message: &str);
    fn notify_error(&mut self, title: &str, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncSummary {
    pub new_appearances: usize,
    pub words_with_hits: usize,
}

/// How a synchronization run ended. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    NoVolume,
    NoTrackedWords,
    Declined,
    Completed(SyncSummary),
}

/// Rescans a whole volume for tracked lemmas and records every appearance
/// the store has not seen yet.
///
/// Runs synchronously on the calling thread; progress is reported after each
/// page. Deduplication is entirely the store's job.
pub struct ContextSynchronizer<S, T> {
    store: S,
    tokenizer: T,
}

impl<S: AppearanceStore, T: Tokenizer> ContextSynchronizer<S, T> {
    pub fn new(store: S, tokenizer: T) -> Self {
        Self { store, tokenizer }
    }

    pub fn synchronize(
        &self,
        volume: Option<&Volume>,
        sink: &mut dyn SyncSink,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(volume) = volume else {
            sink.notify_error("No Volume Loaded", "Open a volume before synchronizing context appearances.");
            return Ok(SyncOutcome::NoVolume);
        };

        let tracked = self.store.tracked_lemmas().map_err(SyncError::TrackedLemmas)?;
        if tracked.is_empty() {
            sink.notify_info("No Tracked Words", "Track at least one word before running context synchronization.");
            return Ok(SyncOutcome::NoTrackedWords);
        }

        let confirmed = sink.confirm(
            "Synchronize Context",
            "Scan the current volume for all appearances of your tracked words? This may take a few moments.",
        );
        if !confirmed {
            debug!("context synchronization declined");
            return Ok(SyncOutcome::Declined);
        }

        let summary = self.scan(volume, &tracked, sink)?;
        info!(
            title = %volume.title,
            new_appearances = summary.new_appearances,
            words_with_hits = summary.words_with_hits,
            "context synchronization finished"
        );

        if summary.new_appearances == 0 {
            sink.notify_info("Context Synchronization", "No new context appearances were found in this volume.");
        } else {
            sink.notify_info(
                "Context Synchronization Complete",
                &format!(
                    "Found {} new context entries for {} tracked word(s).",
                    summary.new_appearances, summary.words_with_hits
                ),
            );
        }
        Ok(SyncOutcome::Completed(summary))
    }

    fn scan(
        &self,
        volume: &Volume,
        tracked: &HashSet<String>,
        sink: &mut dyn SyncSink,
    ) -> Result<SyncSummary, SyncError> {
        let total = volume.total_pages();
        let mut new_appearances = 0;
        let mut lemmas_with_hits: HashSet<String> = HashSet::new();

        for (page_index, page) in volume.pages().iter().enumerate() {
            for block in &page.blocks {
                let text = block.full_text();
                for token in self.tokenizer.tokenize(&text) {
                    if token.lemma.is_empty() || !tracked.contains(&token.lemma) {
                        continue;
                    }
                    let inserted = match self.store.add_appearance_if_new(
                        &token.lemma,
                        volume.path(),
                        page_index,
                        &block.crop,
                        &text,
                    ) {
                        Ok(inserted) => inserted,
                        // the tracked set changed under us; skip this token and keep scanning
                        Err(VocabularyError::UntrackedLemma(lemma)) => {
                            warn!(%lemma, page_index, "context sync skipped lemma that is no longer tracked");
                            continue;
                        }
                        Err(source) => return Err(SyncError::Store { page_index, source }),
                    };
                    if inserted.is_some() {
                        new_appearances += 1;
                        lemmas_with_hits.insert(token.lemma);
                    }
                }
            }
            debug!(page = page_index + 1, total, "context sync page scanned");
            sink.notify_progress(page_index + 1, total);
        }

        Ok(SyncSummary { new_appearances, words_with_hits: lemmas_with_hits.len() })
    }
}
