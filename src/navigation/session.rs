use tracing::{debug, info};

use super::view_mode::ViewMode;
use crate::error::{PageOutOfBounds, SessionError};
use crate::types::{Page, Volume};

/// Where the reader was before the context overlay took over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SavedView {
    mode: ViewMode,
    page: usize,
}

/// Live reading state: the open volume, the current index and layout, and
/// the context overlay's save/restore slot.
#[derive(Debug, Default)]
pub struct ReaderSession {
    volume: Option<Volume>,
    current_page: usize,
    view_mode: ViewMode,
    context: Option<SavedView>,
}

impl ReaderSession {
    pub fn new(view_mode: ViewMode) -> Self {
        Self { view_mode, ..Self::default() }
    }

    /// Replaces the open volume and rewinds to the first page. Any open
    /// context overlay is dropped.
    pub fn open_volume(&mut self, volume: Volume) -> Result<(), SessionError> {
        if volume.is_empty() {
            return Err(SessionError::EmptyVolume(volume.title));
        }
        info!(title = %volume.title, pages = volume.total_pages(), "volume opened");
        self.volume = Some(volume);
        self.current_page = 0;
        self.context = None;
        Ok(())
    }

    pub fn close_volume(&mut self) -> Option<Volume> {
        self.current_page = 0;
        self.context = None;
        self.volume.take()
    }

    pub fn volume(&self) -> Option<&Volume> {
        self.volume.as_ref()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn is_context_open(&self) -> bool {
        self.context.is_some()
    }

    fn require_volume(&self) -> Result<&Volume, SessionError> {
        self.volume.as_ref().ok_or(SessionError::NoVolumeLoaded)
    }

    pub fn visible_pages(&self) -> Result<Vec<&Page>, SessionError> {
        let volume = self.require_volume()?;
        Ok(self.view_mode.pages_to_render(volume, self.current_page)?)
    }

    /// Returns whether the index moved.
    pub fn next_page(&mut self) -> Result<bool, SessionError> {
        let next = self.view_mode.next_index(self.require_volume()?, self.current_page);
        Ok(self.move_to(next))
    }

    pub fn previous_page(&mut self) -> Result<bool, SessionError> {
        let previous = self.view_mode.previous_index(self.require_volume()?, self.current_page);
        Ok(self.move_to(previous))
    }

    /// Jumps straight to `page_index`. Out-of-range targets leave the session untouched.
    pub fn jump_to_page(&mut self, page_index: usize) -> Result<(), SessionError> {
        let volume = self.require_volume()?;
        if page_index >= volume.total_pages() {
            return Err(PageOutOfBounds { index: page_index, total: volume.total_pages() }.into());
        }
        self.move_to(page_index);
        Ok(())
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        debug!(from = %self.view_mode, to = %mode, "view mode changed");
        self.view_mode = mode;
    }

    pub fn toggle_view_mode(&mut self) -> ViewMode {
        self.set_view_mode(self.view_mode.toggle());
        self.view_mode
    }

    /// Opens the context overlay: remembers the current layout and page, then
    /// switches to the mode's context layout on the clicked page.
    pub fn enter_context(&mut self, last_clicked: Option<usize>) -> Result<(), SessionError> {
        let total = self.require_volume()?.total_pages();
        let target = self.view_mode.page_for_context(self.current_page, last_clicked);
        if target >= total {
            return Err(PageOutOfBounds { index: target, total }.into());
        }
        // re-entering keeps the original saved view
        if self.context.is_none() {
            self.context = Some(SavedView { mode: self.view_mode, page: self.current_page });
        }
        self.view_mode = self.view_mode.context_view_mode();
        self.current_page = target;
        Ok(())
    }

    /// Navigates to an appearance on `page_index`, respecting the current
    /// layout's pairing.
    pub fn select_appearance(&mut self, page_index: usize) -> Result<usize, SessionError> {
        let volume = self.require_volume()?;
        let target = self.view_mode.page_for_appearance(volume, page_index, self.current_page);
        self.jump_to_page(target)?;
        Ok(target)
    }

    /// Closes the context overlay and restores the saved layout and page.
    /// Does nothing when the overlay is not open.
    pub fn exit_context(&mut self) {
        if let Some(saved) = self.context.take() {
            self.view_mode = saved.mode;
            self.current_page = saved.page;
        }
    }

    fn move_to(&mut self, page_index: usize) -> bool {
        if page_index == self.current_page {
            return false;
        }
        debug!(from = self.current_page, to = page_index, "page changed");
        self.current_page = page_index;
        true
    }
}
