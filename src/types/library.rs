use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A volume on the library shelf. Timestamps are unix seconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LibraryVolume {
    pub id: i64,
    pub title: String,
    pub folder_path: PathBuf,
    /// First page image, shown as the cover.
    pub cover_image_path: Option<PathBuf>,
    pub date_added: i64,
    pub last_opened: i64,
    pub last_page_read: usize,
}
