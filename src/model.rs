use std::path::PathBuf;

/// Identity of a photo row in the store.
pub type PhotoId = i64;

/// A photo that was taken. Multiple files on disk ([`PhotoFile`]) can
/// represent this photo; the back-hash ties them together so a renamed
/// file keeps its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub id: PhotoId,
    /// SHA-1 hex of the last 1 kB of the file.
    pub hash_back: String,
    /// Degrees to rotate the decoded image counter-clockwise for display.
    pub rotation: i32,
    /// 1 to 5. 1 means "okay to delete", 2 means "don't show", 3 is the
    /// default, 4 is "great photo", 5 is "deathbed photo album".
    pub rating: i32,
    /// Epoch seconds when the photo was taken. Defaults to the file date.
    pub taken_at: i64,
    /// Date as shown to the user. Usually derived from `taken_at` but may
    /// be vaguer, like "Summer 1975".
    pub display_date: String,
    /// Label to display. Defaults to a cleaned-up version of the pathname.
    pub label: String,
    /// Preferred file for this photo, relative to the library root.
    /// In-memory only, not persisted.
    pub pathname: PathBuf,
    /// `library root + pathname`. In-memory only.
    pub absolute_pathname: PathBuf,
}

impl Photo {
    /// Whether the display rotation puts the photo on its side, swapping
    /// the roles of width and height.
    pub fn is_sideways(&self) -> bool {
        let angle = self.rotation.rem_euclid(360);
        angle == 90 || angle == 270
    }
}

/// A photo file on disk. Several of these (e.g. re-exports with minor
/// header changes) may map to the same [`Photo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoFile {
    /// Pathname relative to the library root.
    pub pathname: PathBuf,
    /// SHA-1 hex of the entire file.
    pub hash_all: String,
    /// SHA-1 hex of the last 1 kB of the file.
    pub hash_back: String,
}
