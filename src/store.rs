use std::path::{Path, PathBuf};

use rusqlite::{Connection, Row, params};
use tracing::debug;

use crate::error::Error;
use crate::model::{Photo, PhotoFile, PhotoId};

type Result<T> = std::result::Result<T, Error>;

const PHOTO_FIELDS: &str = "id, hash_back, rotation, rating, taken_at, display_date, label";
const PHOTO_FILE_FIELDS: &str = "pathname, hash_all, hash_back";

/// SQLite-backed catalog of photos and photo files.
///
/// The store owns photo identity and the mutable metadata (rotation,
/// rating); everything else about a photo is derived from its file.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store at `path` and initialize the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened store");
        let store = Store { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let store = Store {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS photo (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                hash_back    TEXT NOT NULL UNIQUE,
                rotation     INTEGER NOT NULL,
                rating       INTEGER NOT NULL,
                taken_at     INTEGER NOT NULL,
                display_date TEXT NOT NULL,
                label        TEXT NOT NULL
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS photo_file (
                pathname  TEXT PRIMARY KEY,
                hash_all  TEXT NOT NULL,
                hash_back TEXT NOT NULL
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_photo_file_hash_back
             ON photo_file(hash_back)",
            [],
        )?;
        Ok(())
    }

    pub fn all_photos(&self) -> Result<Vec<Photo>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PHOTO_FIELDS} FROM photo"))?;
        let rows = stmt.query_map([], photo_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn photo_by_id(&self, id: PhotoId) -> Result<Option<Photo>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PHOTO_FIELDS} FROM photo WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], photo_from_row)?;
        Ok(rows.next().transpose()?)
    }

    pub fn photo_by_hash_back(&self, hash_back: &str) -> Result<Option<Photo>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PHOTO_FIELDS} FROM photo WHERE hash_back = ?1"
        ))?;
        let mut rows = stmt.query_map(params![hash_back], photo_from_row)?;
        Ok(rows.next().transpose()?)
    }

    pub fn all_photo_files(&self) -> Result<Vec<PhotoFile>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PHOTO_FILE_FIELDS} FROM photo_file"))?;
        let rows = stmt.query_map([], |row| {
            Ok(PhotoFile {
                pathname: PathBuf::from(row.get::<_, String>(0)?),
                hash_all: row.get(1)?,
                hash_back: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Persist a photo's mutable fields (rotation, rating, label, dates).
    pub fn save_photo(&self, photo: &Photo) -> Result<()> {
        self.conn.execute(
            &format!("INSERT OR REPLACE INTO photo ({PHOTO_FIELDS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                photo.id,
                photo.hash_back,
                photo.rotation,
                photo.rating,
                photo.taken_at,
                photo.display_date,
                photo.label,
            ],
        )?;
        Ok(())
    }

    /// Insert a new photo row, returning the assigned id.
    pub fn insert_photo(&self, photo: &Photo) -> Result<PhotoId> {
        self.conn.execute(
            &format!(
                "INSERT INTO photo ({PHOTO_FIELDS}) VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                photo.hash_back,
                photo.rotation,
                photo.rating,
                photo.taken_at,
                photo.display_date,
                photo.label,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn save_photo_file(&self, photo_file: &PhotoFile) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO photo_file ({PHOTO_FILE_FIELDS}) VALUES (?1, ?2, ?3)"
            ),
            params![
                photo_file.pathname.to_string_lossy(),
                photo_file.hash_all,
                photo_file.hash_back,
            ],
        )?;
        Ok(())
    }
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        hash_back: row.get(1)?,
        rotation: row.get(2)?,
        rating: row.get(3)?,
        taken_at: row.get(4)?,
        display_date: row.get(5)?,
        label: row.get(6)?,
        pathname: PathBuf::new(),
        absolute_pathname: PathBuf::new(),
    })
}
