use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::VocabularyError;
use crate::types::{CropRect, TrackedWord, VolumeEntry, WordAppearance};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tracked_words (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    lemma TEXT NOT NULL,
    reading TEXT NOT NULL DEFAULT '',
    part_of_speech TEXT NOT NULL DEFAULT '',
    date_added TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(lemma, reading)
);

CREATE TABLE IF NOT EXISTS manga_volumes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS word_appearances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    word_id INTEGER NOT NULL,
    volume_id INTEGER NOT NULL,
    page_index INTEGER NOT NULL,
    crop_coordinates TEXT NOT NULL,
    sentence_text TEXT NOT NULL DEFAULT '',
    FOREIGN KEY(word_id) REFERENCES tracked_words(id) ON DELETE CASCADE,
    FOREIGN KEY(volume_id) REFERENCES manga_volumes(id) ON DELETE CASCADE,
    UNIQUE(word_id, volume_id, page_index, crop_coordinates)
);

CREATE TABLE IF NOT EXISTS library_volumes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    folder_path TEXT NOT NULL UNIQUE,
    cover_image_path TEXT,
    date_added INTEGER NOT NULL,
    last_opened INTEGER NOT NULL,
    last_page_read INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_tracked_words_lemma ON tracked_words(lemma);
CREATE INDEX IF NOT EXISTS idx_word_appearances_word ON word_appearances(word_id);
"#;

const APPEARANCE_COLUMNS: &str = "wa.id, wa.word_id, wa.volume_id, wa.page_index, wa.crop_coordinates, \
     wa.sentence_text, mv.name, mv.path";

type Result<T> = std::result::Result<T, VocabularyError>;

/// SQLite persistence for tracked words, volumes and appearances.
///
/// Every write is its own statement, so each insert is atomic on its own.
pub struct Database {
    pub(super) conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| VocabularyError::CreateDir { path: parent.to_path_buf(), source })?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self { conn };
        db.ensure_schema()?;
        Ok(db)
    }

    pub fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Inserts the word, or refreshes its part of speech if `(lemma, reading)` exists.
    pub fn upsert_tracked_word(&self, lemma: &str, reading: &str, part_of_speech: &str) -> Result<TrackedWord> {
        let lemma = lemma.trim();
        let reading = reading.trim();
        self.conn.execute(
            "INSERT INTO tracked_words (lemma, reading, part_of_speech) VALUES (?1, ?2, ?3)
             ON CONFLICT(lemma, reading) DO UPDATE SET part_of_speech = excluded.part_of_speech",
            params![lemma, reading, part_of_speech],
        )?;
        let word = self.conn.query_row(
            "SELECT id, lemma, reading, part_of_speech, date_added FROM tracked_words
             WHERE lemma = ?1 AND reading = ?2",
            params![lemma, reading],
            row_to_tracked_word,
        )?;
        Ok(word)
    }

    /// Registers a volume by its resolved path. The name defaults to the
    /// directory name.
    pub fn upsert_volume(&self, path: &Path, name: Option<&str>) -> Result<VolumeEntry> {
        let resolved = resolve_path(path);
        let path_str = resolved.to_string_lossy().into_owned();
        let name = name.map(str::to_string).unwrap_or_else(|| {
            resolved.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path_str.clone())
        });
        self.conn.execute(
            "INSERT INTO manga_volumes (path, name) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET name = excluded.name",
            params![path_str, name],
        )?;
        let entry = self.conn.query_row(
            "SELECT id, path, name FROM manga_volumes WHERE path = ?1",
            params![path_str],
            |row| {
                Ok(VolumeEntry {
                    id: row.get(0)?,
                    path: PathBuf::from(row.get::<_, String>(1)?),
                    name: row.get(2)?,
                })
            },
        )?;
        Ok(entry)
    }

    /// Records an appearance. Returns `None` when the same
    /// `(word, volume, page, crop)` is already stored.
    pub fn insert_word_appearance(
        &self,
        word_id: i64,
        volume_id: i64,
        page_index: usize,
        crop: &CropRect,
        sentence_text: &str,
    ) -> Result<Option<WordAppearance>> {
        let crop_json = serde_json::to_string(crop)?;
        let inserted = self.conn.execute(
            "INSERT INTO word_appearances (word_id, volume_id, page_index, crop_coordinates, sentence_text)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(word_id, volume_id, page_index, crop_coordinates) DO NOTHING",
            params![word_id, volume_id, page_index as i64, crop_json, sentence_text],
        )?;
        if inserted == 0 {
            debug!(word_id, volume_id, page_index, "appearance already recorded");
            return Ok(None);
        }
        let id = self.conn.last_insert_rowid();
        self.get_word_appearance(id)
    }

    pub fn get_word_appearance(&self, id: i64) -> Result<Option<WordAppearance>> {
        let sql = format!(
            "SELECT {APPEARANCE_COLUMNS} FROM word_appearances wa
             JOIN manga_volumes mv ON wa.volume_id = mv.id WHERE wa.id = ?1"
        );
        Ok(self.conn.query_row(&sql, params![id], row_to_word_appearance).optional()?)
    }

    /// Newest first.
    pub fn list_tracked_words(&self) -> Result<Vec<TrackedWord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, lemma, reading, part_of_speech, date_added FROM tracked_words
             ORDER BY date_added DESC, id DESC",
        )?;
        let words = stmt.query_map([], row_to_tracked_word)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(words)
    }

    /// The most recently tracked word with this lemma, whatever its reading.
    pub fn find_tracked_word(&self, lemma: &str) -> Result<Option<TrackedWord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, lemma, reading, part_of_speech, date_added FROM tracked_words
                 WHERE lemma = ?1 ORDER BY date_added DESC, id DESC LIMIT 1",
                params![lemma],
                row_to_tracked_word,
            )
            .optional()?)
    }

    pub fn tracked_lemmas(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT lemma FROM tracked_words")?;
        let lemmas = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(lemmas)
    }

    pub fn list_appearances_for_word(&self, word_id: i64) -> Result<Vec<WordAppearance>> {
        let sql = format!(
            "SELECT {APPEARANCE_COLUMNS} FROM word_appearances wa
             JOIN manga_volumes mv ON wa.volume_id = mv.id
             WHERE wa.word_id = ?1
             ORDER BY wa.volume_id ASC, wa.page_index ASC, wa.id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![word_id], row_to_word_appearance)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_appearances(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM word_appearances", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Removes the word and, by cascade, all of its appearances.
    pub fn delete_tracked_word(&self, word_id: i64) -> Result<bool> {
        Ok(self.conn.execute("DELETE FROM tracked_words WHERE id = ?1", params![word_id])? > 0)
    }

    /// Removes the volume and, by cascade, every appearance recorded in it.
    pub fn delete_volume(&self, path: &Path) -> Result<bool> {
        let path_str = resolve_path(path).to_string_lossy().into_owned();
        Ok(self.conn.execute("DELETE FROM manga_volumes WHERE path = ?1", params![path_str])? > 0)
    }
}

pub(super) fn resolve_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn row_to_tracked_word(row: &Row<'_>) -> rusqlite::Result<TrackedWord> {
    Ok(TrackedWord {
        id: row.get(0)?,
        lemma: row.get(1)?,
        reading: row.get(2)?,
        part_of_speech: row.get(3)?,
        date_added: row.get(4)?,
    })
}

fn row_to_word_appearance(row: &Row<'_>) -> rusqlite::Result<WordAppearance> {
    let crop_raw: String = row.get(4)?;
    let crop: CropRect = serde_json::from_str(&crop_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let volume_path: Option<String> = row.get(7)?;
    Ok(WordAppearance {
        id: row.get(0)?,
        word_id: row.get(1)?,
        volume_id: row.get(2)?,
        page_index: row.get::<_, i64>(3)? as usize,
        crop,
        sentence_text: row.get(5)?,
        volume_name: row.get(6)?,
        volume_path: volume_path.map(PathBuf::from),
    })
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn crop() -> CropRect {
        CropRect::new(10.0, 20.0, 30.0, 40.0)
    }

    #[rstest]
    fn upsert_word_is_keyed_on_lemma_and_reading(db: Database) {
        let first = db.upsert_tracked_word("食べる", "たべる", "VERB").unwrap();
        let again = db.upsert_tracked_word(" 食べる ", "たべる", "AUXILIARY_VERB").unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.part_of_speech, "AUXILIARY_VERB");

        let other_reading = db.upsert_tracked_word("食べる", "くう", "VERB").unwrap();
        assert_ne!(first.id, other_reading.id);
        assert_eq!(db.list_tracked_words().unwrap().len(), 2);
        assert_eq!(db.tracked_lemmas().unwrap(), vec!["食べる".to_string()]);
    }

    #[rstest]
    fn upsert_volume_defaults_name_to_directory(db: Database) {
        let entry = db.upsert_volume(Path::new("/library/my-volume"), None).unwrap();
        assert_eq!(entry.name, "my-volume");
        let renamed = db.upsert_volume(Path::new("/library/my-volume"), Some("Volume 1")).unwrap();
        assert_eq!(renamed.id, entry.id);
        assert_eq!(renamed.name, "Volume 1");
    }

    #[rstest]
    fn duplicate_appearance_is_reported_not_stored(db: Database) {
        let word = db.upsert_tracked_word("猫", "ねこ", "NOUN").unwrap();
        let vol = db.upsert_volume(Path::new("/library/v1"), None).unwrap();

        let created = db.insert_word_appearance(word.id, vol.id, 3, &crop(), "猫がいる").unwrap().unwrap();
        assert_eq!(created.page_index, 3);
        assert_eq!(created.crop, crop());
        assert_eq!(created.volume_name.as_deref(), Some("v1"));

        assert!(db.insert_word_appearance(word.id, vol.id, 3, &crop(), "猫がいる").unwrap().is_none());
        assert_eq!(db.count_appearances().unwrap(), 1);
    }

    #[rstest]
    fn different_crop_on_same_page_is_a_new_appearance(db: Database) {
        let word = db.upsert_tracked_word("猫", "ねこ", "NOUN").unwrap();
        let vol = db.upsert_volume(Path::new("/library/v1"), None).unwrap();
        let other = CropRect::new(50.0, 20.0, 30.0, 40.0);

        assert!(db.insert_word_appearance(word.id, vol.id, 0, &crop(), "a").unwrap().is_some());
        assert!(db.insert_word_appearance(word.id, vol.id, 0, &other, "b").unwrap().is_some());
        assert!(db.insert_word_appearance(word.id, vol.id, 1, &crop(), "c").unwrap().is_some());

        let listed = db.list_appearances_for_word(word.id).unwrap();
        let pages: Vec<_> = listed.iter().map(|a| a.page_index).collect();
        assert_eq!(pages, vec![0, 0, 1]);
    }

    #[rstest]
    fn deletes_cascade_to_appearances(db: Database) {
        let cat = db.upsert_tracked_word("猫", "ねこ", "NOUN").unwrap();
        let dog = db.upsert_tracked_word("犬", "いぬ", "NOUN").unwrap();
        let v1 = db.upsert_volume(Path::new("/library/v1"), None).unwrap();
        let v2 = db.upsert_volume(Path::new("/library/v2"), None).unwrap();
        db.insert_word_appearance(cat.id, v1.id, 0, &crop(), "").unwrap();
        db.insert_word_appearance(cat.id, v2.id, 0, &crop(), "").unwrap();
        db.insert_word_appearance(dog.id, v1.id, 0, &crop(), "").unwrap();

        assert!(db.delete_volume(Path::new("/library/v2")).unwrap());
        assert_eq!(db.count_appearances().unwrap(), 2);

        assert!(db.delete_tracked_word(cat.id).unwrap());
        assert_eq!(db.count_appearances().unwrap(), 1);
        assert!(!db.delete_tracked_word(cat.id).unwrap());
    }

    #[rstest]
    fn find_tracked_word_ignores_reading(db: Database) {
        assert!(db.find_tracked_word("猫").unwrap().is_none());
        db.upsert_tracked_word("猫", "ねこ", "NOUN").unwrap();
        assert_eq!(db.find_tracked_word("猫").unwrap().map(|w| w.reading).as_deref(), Some("ねこ"));
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vocab.db");
        {
            let db = Database::open(&path).unwrap();
            db.upsert_tracked_word("猫", "ねこ", "NOUN").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_tracked_words().unwrap().len(), 1);
    }

    #[test]
    fn open_reports_why_the_directory_could_not_be_created() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();

        let err = Database::open(&blocker.join("vocab.db")).err().unwrap();
        assert!(matches!(err, VocabularyError::CreateDir { ref path, .. } if *path == blocker));
    }
}
