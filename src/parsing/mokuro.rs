use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::IngestError;
use crate::types::{Block, CropRect, Page, Volume};

// Raw mokuro layout. Pages and blocks stay untyped until each one is
// decoded on its own, so a malformed entry only loses itself.
#[derive(Deserialize, Debug, Default)]
struct MokuroFile {
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    pages: Option<Vec<Value>>,
}

#[derive(Deserialize, Debug, Default)]
struct MokuroPage {
    #[serde(default, alias = "image")]
    img_path: String,
    #[serde(default)]
    img_width: f64,
    #[serde(default)]
    img_height: f64,
    #[serde(default)]
    blocks: Option<Vec<Value>>,
}

#[derive(Deserialize, Debug, Default)]
struct MokuroBlock {
    #[serde(rename = "box")]
    bbox: Vec<f64>,
    #[serde(default)]
    lines: Vec<Value>,
    #[serde(default)]
    vertical: Option<bool>,
}

/// Finds the `.mokuro` file inside `dir`. With several, the first by file name wins.
pub fn find_mokuro_file(dir: &Path) -> Result<PathBuf, IngestError> {
    let entries = fs::read_dir(dir).map_err(|source| IngestError::Io { path: dir.to_path_buf(), source })?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "mokuro"))
        .collect();
    candidates.sort();
    candidates.into_iter().next().ok_or_else(|| IngestError::MissingMokuro(dir.to_path_buf()))
}

/// Loads a volume directory: the `.mokuro` OCR file plus the page images it
/// references.
///
/// Pages that cannot be used (missing image, malformed entry) are skipped
/// with a warning, so page numbers are the position in the resulting volume
/// rather than in the file. OCR lines are kept exactly as written.
pub fn ingest_volume(dir: &Path) -> Result<Volume, IngestError> {
    let mokuro_path = find_mokuro_file(dir)?;
    let contents = fs::read_to_string(&mokuro_path)
        .map_err(|source| IngestError::Io { path: mokuro_path.clone(), source })?;
    let file: MokuroFile = serde_json::from_str(&contents)
        .map_err(|source| IngestError::Json { path: mokuro_path.clone(), source })?;

    let title = file
        .title
        .as_ref()
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| dir_name(dir));
    let mut volume = Volume::new(title, dir);

    for (file_index, value) in file.pages.unwrap_or_default().into_iter().enumerate() {
        let Some(raw) = decode::<MokuroPage>(value, "page", file_index) else {
            continue;
        };
        if let Some(page) = parse_page(volume.total_pages(), file_index, raw, dir) {
            volume.add_page(page);
        }
    }

    info!(title = %volume.title, pages = volume.total_pages(), path = %dir.display(), "volume ingested");
    Ok(volume)
}

fn decode<T: DeserializeOwned>(value: Value, kind: &'static str, index: usize) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(kind, index, error = %e, "skipping malformed mokuro entry");
            None
        }
    }
}

fn parse_page(page_number: usize, file_index: usize, raw: MokuroPage, dir: &Path) -> Option<Page> {
    if raw.img_path.trim().is_empty() {
        warn!(file_index, "skipping page without an image path");
        return None;
    }
    let image_path = dir.join(&raw.img_path);
    if !image_path.exists() {
        warn!(file_index, image = %image_path.display(), "skipping page whose image is missing");
        return None;
    }

    let mut page = Page::new(page_number, image_path, pixels(raw.img_width), pixels(raw.img_height));
    page.blocks = raw
        .blocks
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| decode::<MokuroBlock>(value, "block", index))
        .filter_map(parse_block)
        .collect();
    Some(page)
}

// negative and NaN sizes saturate to 0
fn pixels(size: f64) -> u32 {
    size.round() as u32
}

/// `box` is `[x0, y0, x1, y1]`; extra values are ignored, fewer drop the block.
fn parse_block(raw: MokuroBlock) -> Option<Block> {
    let &[x0, y0, x1, y1, ..] = raw.bbox.as_slice() else {
        return None;
    };
    let lines = raw.lines.iter().filter_map(Value::as_str).map(str::to_string).collect();
    let mut block = Block::new(CropRect::new(x0, y0, x1 - x0, y1 - y0), lines);
    if let Some(vertical) = raw.vertical {
        block.vertical = vertical;
    }
    Some(block)
}

fn dir_name(dir: &Path) -> String {
    dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}
