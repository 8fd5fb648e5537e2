//! Library scanning: discovering image files, fingerprinting them, and
//! reconciling them with the store so renamed files keep their metadata.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use sha1::Sha1;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::Configuration;
use crate::error::Error;
use crate::model::{Photo, PhotoFile, PhotoId};
use crate::store::Store;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// How much of the file tail goes into the back-hash. Enough to survive
/// header edits (EXIF rewrites) while still identifying the image data.
const BACK_HASH_BYTES: usize = 1024;

const MAX_MISSING_FILE_WARNINGS: usize = 10;

/// Return `true` if `path` has one of the accepted image extensions.
pub fn is_supported_image(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|e| *e == ext)
        })
}

fn is_unwanted_dir(entry: &DirEntry, unwanted: &[String]) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| unwanted.iter().any(|u| u == name))
}

/// All image pathnames in the library, relative to the library root.
pub fn scan_library(config: &Configuration) -> Result<BTreeSet<PathBuf>, Error> {
    let root = &config.photo_library_path;
    if !root.is_dir() {
        return Err(Error::BadDir(root.clone()));
    }

    let mut pathnames = BTreeSet::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_unwanted_dir(e, &config.unwanted_directories))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_file() && is_supported_image(path, &config.image_extensions) {
            if let Ok(relative) = path.strip_prefix(root) {
                pathnames.insert(relative.to_path_buf());
            }
        }
    }
    Ok(pathnames)
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hasher.digest().to_string()
}

/// Full-file and trailing-1KB fingerprints.
pub fn file_hashes(bytes: &[u8]) -> (String, String) {
    let start = bytes.len().saturating_sub(BACK_HASH_BYTES);
    (sha1_hex(bytes), sha1_hex(&bytes[start..]))
}

/// The file's display rotation in degrees counter-clockwise, derived from
/// EXIF orientation, or 0 if it cannot be determined.
pub fn file_rotation(path: &Path) -> i32 {
    let orientation = read_exif_orientation(path).unwrap_or(1);
    match orientation {
        3 => 180,
        6 => -90,
        8 => 90,
        _ => 0,
    }
}

fn read_exif_orientation(path: &Path) -> Option<u16> {
    let file = fs::File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let reader = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = reader.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0).map(|v| v as u16)
}

/// The file's modified time as a display string like "January 4, 2009"
/// and as epoch seconds.
pub fn file_date(path: &Path) -> Result<(String, i64)> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("reading mtime of {}", path.display()))?;
    let when: DateTime<Local> = modified.into();
    Ok((when.format("%B %-d, %Y").to_string(), when.timestamp()))
}

fn is_year(part: &str) -> bool {
    part.len() == 4 && (part.starts_with("19") || part.starts_with("20"))
}

fn keep_label_part(part: &str) -> bool {
    if part.is_empty() {
        return false;
    }
    // Drop bare frame counters like "00123" or "P1010823", but keep years.
    if part.chars().all(|c| c.is_ascii_digit()) {
        return is_year(part);
    }
    if let Some(rest) = part.strip_prefix('P')
        && !rest.is_empty()
        && rest.chars().all(|c| c.is_ascii_digit())
    {
        return false;
    }
    true
}

/// A human label derived from the pathname: directory and file names with
/// separators cleaned up and camera-counter noise removed.
pub fn pathname_to_label(pathname: &Path) -> String {
    let mut parts = Vec::new();
    for (i, component) in pathname.components().enumerate() {
        let mut part = component.as_os_str().to_string_lossy().into_owned();
        if i + 1 == pathname.components().count() {
            if let Some(stem) = Path::new(&part).file_stem() {
                part = stem.to_string_lossy().into_owned();
            }
        }
        let cleaned = part.replace(['_', '-'], " ").trim().to_string();
        if keep_label_part(&cleaned) {
            parts.push(cleaned);
        }
    }
    parts.join(", ")
}

/// Record `pathname` in the store, creating a new photo row unless its
/// back-hash matches an existing photo (a renamed or moved file, which
/// keeps its metadata and only refreshes the label). Returns the photo id.
pub fn admit_file(store: &Store, config: &Configuration, pathname: &Path) -> Result<PhotoId> {
    let absolute = config.photo_library_path.join(pathname);
    debug!(path = %pathname.display(), "hashing");
    let bytes =
        fs::read(&absolute).with_context(|| format!("reading {}", absolute.display()))?;
    let (hash_all, hash_back) = file_hashes(&bytes);
    let label = pathname_to_label(pathname);

    store.save_photo_file(&PhotoFile {
        pathname: pathname.to_path_buf(),
        hash_all,
        hash_back: hash_back.clone(),
    })?;

    if let Some(mut photo) = store.photo_by_hash_back(&hash_back)? {
        // Renamed or moved; keep the timestamp, refresh the label.
        debug!(photo = photo.id, "renamed or moved photo");
        photo.label = label;
        store.save_photo(&photo)?;
        return Ok(photo.id);
    }

    let rotation = file_rotation(&absolute);
    let (display_date, taken_at) = file_date(&absolute)?;
    let id = store.insert_photo(&Photo {
        id: 0,
        hash_back,
        rotation,
        rating: 3,
        taken_at,
        display_date,
        label,
        pathname: pathname.to_path_buf(),
        absolute_pathname: absolute,
    })?;
    debug!(photo = id, rotation, "new photo");
    Ok(id)
}

/// Admit every on-disk file the store doesn't know about yet.
pub fn reconcile_new_files(
    store: &Store,
    config: &Configuration,
    disk_pathnames: &BTreeSet<PathBuf>,
) -> Result<()> {
    let mut todo = disk_pathnames.clone();
    for photo_file in store.all_photo_files()? {
        todo.remove(&photo_file.pathname);
    }
    info!(count = todo.len(), "analyzing new or renamed photos");
    for pathname in &todo {
        admit_file(store, config, pathname)?;
    }
    Ok(())
}

/// Keep photos rated at least `min-rating` and inside the configured date
/// range. `now_epoch` is passed in so the filter is testable.
pub fn filter_photos(photos: &mut Vec<Photo>, config: &Configuration, now_epoch: i64) {
    let min_rating = config.min_rating;
    photos.retain(|photo| photo.rating >= min_rating);

    let newest = if config.min_days == 0 {
        0
    } else {
        now_epoch - i64::from(config.min_days) * SECONDS_PER_DAY
    };
    let oldest = if config.max_days == 0 {
        0
    } else {
        now_epoch - i64::from(config.max_days) * SECONDS_PER_DAY
    };
    photos.retain(|photo| {
        (oldest == 0 || photo.taken_at >= oldest) && (newest == 0 || photo.taken_at <= newest)
    });
}

/// Resolve a pathname for each photo, dropping photos with no file on
/// disk.
pub fn assign_pathnames(
    store: &Store,
    config: &Configuration,
    photos: Vec<Photo>,
    disk_pathnames: &BTreeSet<PathBuf>,
) -> Result<Vec<Photo>> {
    let mut by_hash: HashMap<&str, Vec<&PhotoFile>> = HashMap::new();
    let photo_files = store.all_photo_files()?;
    for photo_file in &photo_files {
        by_hash
            .entry(photo_file.hash_back.as_str())
            .or_default()
            .push(photo_file);
    }

    let mut missing = 0usize;
    let mut resolved = Vec::new();
    for mut photo in photos {
        let found = by_hash
            .get(photo.hash_back.as_str())
            .and_then(|files| {
                files
                    .iter()
                    .find(|f| disk_pathnames.contains(&f.pathname))
            });
        match found {
            Some(photo_file) => {
                photo.pathname = photo_file.pathname.clone();
                photo.absolute_pathname = config.photo_library_path.join(&photo.pathname);
                resolved.push(photo);
            }
            None => {
                missing += 1;
                if missing <= MAX_MISSING_FILE_WARNINGS {
                    info!("no file on disk for {} ({})", photo.hash_back, photo.label);
                }
            }
        }
    }
    if missing != 0 {
        info!(count = missing, "files missing on disk");
    }
    Ok(resolved)
}

/// Full startup sequence: scan the tree, reconcile it into the store,
/// then load, filter, and resolve the photos to show.
pub fn load_photos(store: &Store, config: &Configuration) -> Result<Vec<Photo>> {
    let disk_pathnames = scan_library(config)?;
    info!(count = disk_pathnames.len(), "photos on disk");

    reconcile_new_files(store, config, &disk_pathnames)?;

    let mut photos = store.all_photos()?;
    info!(count = photos.len(), "photos in store");
    filter_photos(&mut photos, config, Local::now().timestamp());
    info!(count = photos.len(), "photos after filters");

    let photos = assign_pathnames(store, config, photos, &disk_pathnames)?;
    info!(count = photos.len(), "photos found on disk");

    if photos.is_empty() {
        return Err(Error::EmptyLibrary.into());
    }
    Ok(photos)
}
