use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PageOutOfBounds;

/// Bounding box of an OCR text region, in page pixel coordinates.
/// Also used as the crop stored with every word appearance.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.x <= x && x <= self.x + self.width && self.y <= y && y <= self.y + self.height
    }
}

/// A single OCR text region with its raw lines.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Block {
    pub crop: CropRect,
    pub lines: Vec<String>,
    #[serde(default = "default_vertical")]
    pub vertical: bool,
}

fn default_vertical() -> bool {
    true // manga text is vertical unless the OCR says otherwise
}

impl Block {
    pub fn new(crop: CropRect, lines: Vec<String>) -> Self {
        Self { crop, lines, vertical: true }
    }

    /// All lines joined without separators, the way they read on the page.
    pub fn full_text(&self) -> String {
        self.lines.concat()
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.crop.contains_point(x, y)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page {
    pub page_number: usize,
    pub image_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn new(page_number: usize, image_path: PathBuf, width: u32, height: u32) -> Self {
        Self { page_number, image_path, width, height, blocks: Vec::new() }
    }

    /// Strictly taller than wide. Square pages count as landscape.
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }

    pub fn find_block_at_position(&self, x: f64, y: f64) -> Option<&Block> {
        self.blocks.iter().find(|block| block.contains_point(x, y))
    }

    pub fn all_text(&self) -> String {
        self.blocks.iter().map(Block::full_text).collect::<Vec<_>>().join("\n")
    }
}

/// An ingested volume. Page order is fixed once ingestion finishes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Volume {
    pub title: String,
    path: PathBuf,
    pages: Vec<Page>,
}

impl Volume {
    pub fn new(title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { title: title.into(), path: path.into(), pages: Vec::new() }
    }

    pub fn with_pages(title: impl Into<String>, path: impl Into<PathBuf>, pages: Vec<Page>) -> Self {
        Self { title: title.into(), path: path.into(), pages }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get_page(&self, index: usize) -> Result<&Page, PageOutOfBounds> {
        self.pages.get(index).ok_or(PageOutOfBounds { index, total: self.pages.len() })
    }

    /// Only called while ingesting.
    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    pub fn validate_coordinates(&self, page_index: usize, x: f64, y: f64) -> bool {
        match self.pages.get(page_index) {
            Some(page) => (0.0..=page.width as f64).contains(&x) && (0.0..=page.height as f64).contains(&y),
            None => false,
        }
    }
}
