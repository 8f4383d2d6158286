use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

use super::database::{resolve_path, Database};
use crate::error::LibraryError;
use crate::types::{LibraryVolume, Volume};

type Result<T> = std::result::Result<T, LibraryError>;

const LIBRARY_COLUMNS: &str =
    "id, title, folder_path, cover_image_path, date_added, last_opened, last_page_read";

fn path_key(path: &Path) -> (PathBuf, String) {
    let resolved = resolve_path(path);
    let key = resolved.to_string_lossy().into_owned();
    (resolved, key)
}

impl Database {
    /// Adds a volume to the library, or refreshes title, cover and
    /// `last_opened` when the folder is already shelved.
    pub fn add_library_volume(
        &self,
        title: &str,
        folder_path: &Path,
        cover_image_path: Option<&Path>,
    ) -> Result<LibraryVolume> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LibraryError::EmptyTitle);
        }
        let (resolved, key) = path_key(folder_path);
        let cover = cover_image_path.map(|p| p.to_string_lossy().into_owned());
        let now = Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO library_volumes (title, folder_path, cover_image_path, date_added, last_opened)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(folder_path) DO UPDATE SET
                 title = excluded.title,
                 cover_image_path = excluded.cover_image_path,
                 last_opened = excluded.last_opened",
            params![title, key, cover, now],
        )?;
        self.require_library_volume(&resolved)
    }

    /// Shelves a freshly opened volume. A title the user changed is kept;
    /// only the cover and `last_opened` are refreshed.
    pub fn register_volume(&self, volume: &Volume) -> Result<LibraryVolume> {
        let cover = volume
            .pages()
            .first()
            .map(|page| page.image_path.to_string_lossy().into_owned())
            .ok_or_else(|| LibraryError::EmptyVolume(volume.path().to_path_buf()))?;
        let (resolved, key) = path_key(volume.path());
        let title = match volume.title.trim() {
            "" => resolved.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| key.clone()),
            title => title.to_string(),
        };
        let now = Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO library_volumes (title, folder_path, cover_image_path, date_added, last_opened)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(folder_path) DO UPDATE SET
                 cover_image_path = excluded.cover_image_path,
                 last_opened = excluded.last_opened",
            params![title, key, cover, now],
        )?;
        info!(title = %title, path = %resolved.display(), "volume registered in library");
        self.require_library_volume(&resolved)
    }

    pub fn get_library_volume(&self, folder_path: &Path) -> Result<Option<LibraryVolume>> {
        let (_, key) = path_key(folder_path);
        let sql = format!("SELECT {LIBRARY_COLUMNS} FROM library_volumes WHERE folder_path = ?1");
        Ok(self.conn.query_row(&sql, params![key], row_to_library_volume).optional()?)
    }

    /// Most recently opened first.
    pub fn list_library_volumes(&self) -> Result<Vec<LibraryVolume>> {
        let sql = format!("SELECT {LIBRARY_COLUMNS} FROM library_volumes ORDER BY last_opened DESC, id DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let volumes = stmt.query_map([], row_to_library_volume)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(volumes)
    }

    pub fn rename_library_volume(&self, folder_path: &Path, new_title: &str) -> Result<LibraryVolume> {
        let new_title = new_title.trim();
        if new_title.is_empty() {
            return Err(LibraryError::EmptyTitle);
        }
        self.update_library_volume(
            folder_path,
            "UPDATE library_volumes SET title = ?1 WHERE folder_path = ?2",
            &new_title,
        )
    }

    pub fn mark_library_volume_opened(&self, folder_path: &Path) -> Result<LibraryVolume> {
        self.set_last_opened(folder_path, Utc::now().timestamp())
    }

    fn set_last_opened(&self, folder_path: &Path, timestamp: i64) -> Result<LibraryVolume> {
        self.update_library_volume(
            folder_path,
            "UPDATE library_volumes SET last_opened = ?1 WHERE folder_path = ?2",
            &timestamp,
        )
    }

    pub fn save_reading_position(&self, folder_path: &Path, page_index: usize) -> Result<LibraryVolume> {
        debug!(path = %folder_path.display(), page_index, "reading position saved");
        self.update_library_volume(
            folder_path,
            "UPDATE library_volumes SET last_page_read = ?1 WHERE folder_path = ?2",
            &(page_index as i64),
        )
    }

    /// Takes the volume off the shelf. Files and recorded appearances are untouched.
    pub fn remove_library_volume(&self, folder_path: &Path) -> Result<()> {
        let (resolved, key) = path_key(folder_path);
        if self.conn.execute("DELETE FROM library_volumes WHERE folder_path = ?1", params![key])? == 0 {
            return Err(LibraryError::NotFound(resolved));
        }
        info!(path = %resolved.display(), "volume removed from library");
        Ok(())
    }

    /// Runs a single-row `UPDATE` whose `?1` is `value` and `?2` the folder key.
    fn update_library_volume(&self, folder_path: &Path, sql: &str, value: &dyn ToSql) -> Result<LibraryVolume> {
        let (resolved, key) = path_key(folder_path);
        if self.conn.execute(sql, params![value, key])? == 0 {
            return Err(LibraryError::NotFound(resolved));
        }
        self.require_library_volume(&resolved)
    }

    fn require_library_volume(&self, resolved: &Path) -> Result<LibraryVolume> {
        self.get_library_volume(resolved)?
            .ok_or_else(|| LibraryError::NotFound(resolved.to_path_buf()))
    }
}

fn row_to_library_volume(row: &Row<'_>) -> rusqlite::Result<LibraryVolume> {
    Ok(LibraryVolume {
        id: row.get(0)?,
        title: row.get(1)?,
        folder_path: PathBuf::from(row.get::<_, String>(2)?),
        cover_image_path: row.get::<_, Option<String>>(3)?.map(PathBuf::from),
        date_added: row.get(4)?,
        last_opened: row.get(5)?,
        last_page_read: row.get::<_, i64>(6)? as usize,
    })
}
