use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PageOutOfBounds;
use crate::types::{Page, Volume};

/// Page layout policy. Both variants are stateless; everything they need
/// comes in through the arguments.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Single,
    Double,
}

impl ViewMode {
    pub fn name(self) -> &'static str {
        match self {
            ViewMode::Single => "single",
            ViewMode::Double => "double",
        }
    }

    /// Pages visible at `current`, in reading order. One page, or two for a spread.
    ///
    /// Callers clamp `current` first; an out-of-range index surfaces the
    /// volume's lookup error.
    pub fn pages_to_render<'v>(
        self,
        volume: &'v Volume,
        current: usize,
    ) -> Result<Vec<&'v Page>, PageOutOfBounds> {
        let page = volume.get_page(current)?;
        match self {
            ViewMode::Single => Ok(vec![page]),
            ViewMode::Double => {
                // landscape pages and the final page always stand alone
                if !page.is_portrait() || current + 1 >= volume.total_pages() {
                    return Ok(vec![page]);
                }
                let next = volume.get_page(current + 1)?;
                if next.is_portrait() {
                    Ok(vec![page, next])
                } else {
                    Ok(vec![page])
                }
            }
        }
    }

    /// Index to show after moving forward. Stays put on the last page or spread.
    pub fn next_index(self, volume: &Volume, current: usize) -> usize {
        let step = match self {
            ViewMode::Single => 1,
            ViewMode::Double => match self.pages_to_render(volume, current) {
                Ok(pages) => pages.len(),
                Err(_) => return current,
            },
        };
        let next = current + step;
        if next < volume.total_pages() {
            next
        } else {
            current
        }
    }

    /// Index to show after moving backward. Stays put at 0.
    pub fn previous_index(self, volume: &Volume, current: usize) -> usize {
        if current == 0 {
            return current;
        }
        match self {
            ViewMode::Single => current - 1,
            ViewMode::Double => {
                // rebuild the previous spread from the orientation of the two pages behind us
                if current >= 2 && is_portrait_at(volume, current - 2) && is_portrait_at(volume, current - 1) {
                    current - 2
                } else {
                    current - 1
                }
            }
        }
    }

    /// Index that makes `target` visible, keeping its natural spread partner
    /// on the left when there is one.
    pub fn page_for_appearance(self, volume: &Volume, target: usize, current: usize) -> usize {
        match self {
            ViewMode::Single => target,
            ViewMode::Double => {
                let Ok(page) = volume.get_page(target) else {
                    return current;
                };
                if !page.is_portrait() {
                    return target;
                }
                if target > 0 && is_portrait_at(volume, target - 1) {
                    target - 1
                } else {
                    target
                }
            }
        }
    }

    /// Page to show when the context overlay opens.
    pub fn page_for_context(self, current: usize, last_clicked: Option<usize>) -> usize {
        last_clicked.unwrap_or(current)
    }

    /// Mode forced while the context overlay is open.
    pub fn context_view_mode(self) -> ViewMode {
        ViewMode::Single
    }

    pub fn toggle(self) -> ViewMode {
        match self {
            ViewMode::Single => ViewMode::Double,
            ViewMode::Double => ViewMode::Single,
        }
    }
}

fn is_portrait_at(volume: &Volume, index: usize) -> bool {
    volume.get_page(index).map(Page::is_portrait).unwrap_or(false)
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown view mode '{0}' (expected 'single' or 'double')")]
pub struct UnknownViewMode(pub String);

impl FromStr for ViewMode {
    type Err = UnknownViewMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(ViewMode::Single),
            "double" => Ok(ViewMode::Double),
            other => Err(UnknownViewMode(other.to_string())),
        }
    }
}
