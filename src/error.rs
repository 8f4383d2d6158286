use std::path::PathBuf;

use thiserror::Error;

/// A page index outside `0..total` was handed to a volume lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("page index {index} out of bounds for volume with {total} pages")]
pub struct PageOutOfBounds {
    pub index: usize,
    pub total: usize,
}

#[derive(Debug, Error)]
pub enum VocabularyError {
    /// Precondition violation: appearances can only be recorded for tracked lemmas.
    #[error("cannot add appearance for untracked lemma: {0}")]
    UntrackedLemma(String),
    #[error("vocabulary storage failed: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("failed to encode crop coordinates: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("volume not found in library: {0}")]
    NotFound(PathBuf),
    #[error("volume title cannot be empty")]
    EmptyTitle,
    #[error("volume has no pages: {0}")]
    EmptyVolume(PathBuf),
    #[error("library storage failed: {0}")]
    Storage(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("context synchronization aborted on page {page_index}: {source}")]
    Store {
        page_index: usize,
        #[source]
        source: VocabularyError,
    },
    #[error("could not read tracked lemmas: {0}")]
    TrackedLemmas(#[source] VocabularyError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no volume loaded")]
    NoVolumeLoaded,
    #[error("volume '{0}' has no pages")]
    EmptyVolume(String),
    #[error(transparent)]
    PageOutOfBounds(#[from] PageOutOfBounds),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no .mokuro file found in {0}")]
    MissingMokuro(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{field} in {path} ('{value}') is not a valid directory")]
    InvalidDirectory {
        path: PathBuf,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("failed to read lexicon {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse lexicon {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
