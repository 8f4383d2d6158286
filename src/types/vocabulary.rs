use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::volume::CropRect;

/// A word the reader chose to follow. `(lemma, reading)` is unique.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackedWord {
    pub id: i64,
    pub lemma: String,
    pub reading: String,
    pub part_of_speech: String,
    pub date_added: String,
}

/// Persisted identity of a volume, keyed by its resolved path.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VolumeEntry {
    pub id: i64,
    pub path: PathBuf,
    pub name: String,
}

/// One recorded occurrence of a tracked word.
///
/// `(word_id, volume_id, page_index, crop)` is unique; rows are never updated,
/// only removed by cascade when their word or volume goes away.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WordAppearance {
    pub id: i64,
    pub word_id: i64,
    pub volume_id: i64,
    pub page_index: usize,
    pub crop: CropRect,
    pub sentence_text: String,
    pub volume_name: Option<String>,
    pub volume_path: Option<PathBuf>,
}
