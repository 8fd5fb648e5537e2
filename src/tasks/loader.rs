//! Background image decoding. A single worker keeps decode latency off
//! the frame loop; the cache polls for finished images once per frame.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::Result;
use image::{ImageReader, RgbaImage};
use tracing::warn;

use crate::model::{Photo, PhotoId};
use crate::tasks::pool::TaskPool;

/// A decode result. `image` is `None` when the file could not be decoded;
/// the cache turns that into a broken placeholder entry so the photo is
/// not re-requested every frame.
pub struct LoadedImage {
    pub photo: Photo,
    pub image: Option<RgbaImage>,
    pub load_time: Duration,
}

pub struct ImageLoader {
    pool: TaskPool<Photo, LoadedImage>,
    pending: HashSet<PhotoId>,
}

impl ImageLoader {
    /// Decoded images larger than `max_dim` on either side are downscaled
    /// before they leave the worker.
    pub fn new(max_dim: u32) -> Self {
        ImageLoader {
            pool: TaskPool::new("decode", 1, move |photo| decode_photo(photo, max_dim)),
            pending: HashSet::new(),
        }
    }

    /// Queue `photo` for decoding unless it is already in flight.
    pub fn request(&mut self, photo: &Photo) {
        if self.pending.insert(photo.id) {
            self.pool.submit(photo.clone());
        }
    }

    pub fn is_pending(&self, id: PhotoId) -> bool {
        self.pending.contains(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// All decodes that finished since the last drain.
    pub fn drain(&mut self) -> Vec<LoadedImage> {
        let mut done = Vec::new();
        while let Some(loaded) = self.pool.poll_one() {
            self.pending.remove(&loaded.photo.id);
            done.push(loaded);
        }
        done
    }
}

fn decode_photo(photo: Photo, max_dim: u32) -> Result<LoadedImage> {
    let started = Instant::now();
    let decoded = ImageReader::open(&photo.absolute_pathname)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(anyhow::Error::from)
        .and_then(|reader| reader.decode().map_err(anyhow::Error::from));

    let image = match decoded {
        Ok(image) => {
            let image = if image.width() > max_dim || image.height() > max_dim {
                image.thumbnail(max_dim, max_dim)
            } else {
                image
            };
            Some(image.to_rgba8())
        }
        Err(err) => {
            // Decode failures still produce a response so the show can
            // cache a placeholder instead of retrying forever.
            warn!(
                photo = photo.id,
                path = %photo.absolute_pathname.display(),
                "decode failed: {err:#}"
            );
            None
        }
    };

    Ok(LoadedImage {
        photo,
        image,
        load_time: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn photo_at(id: PhotoId, absolute: PathBuf) -> Photo {
        Photo {
            id,
            hash_back: format!("hash-{id}"),
            rotation: 0,
            rating: 3,
            taken_at: 0,
            display_date: String::new(),
            label: String::new(),
            pathname: PathBuf::new(),
            absolute_pathname: absolute,
        }
    }

    fn drain_one(loader: &mut ImageLoader) -> LoadedImage {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(loaded) = loader.drain().pop() {
                return loaded;
            }
            assert!(Instant::now() < deadline, "timed out waiting for decode");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn decodes_and_downscales() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbaImage::new(64, 16).save(&path).unwrap();

        let mut loader = ImageLoader::new(32);
        loader.request(&photo_at(1, path));
        assert!(loader.is_pending(1));

        let loaded = drain_one(&mut loader);
        assert!(!loader.is_pending(1));
        let image = loaded.image.expect("image decodes");
        assert_eq!((image.width(), image.height()), (32, 8));
    }

    #[test]
    fn duplicate_requests_collapse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.png");
        RgbaImage::new(4, 4).save(&path).unwrap();

        let mut loader = ImageLoader::new(2048);
        loader.request(&photo_at(1, path.clone()));
        loader.request(&photo_at(1, path));
        assert_eq!(loader.pending_count(), 1);

        drain_one(&mut loader);
        std::thread::sleep(Duration::from_millis(20));
        assert!(loader.drain().is_empty(), "second request was dropped");
    }

    #[test]
    fn unreadable_file_yields_placeholder_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let mut loader = ImageLoader::new(2048);
        loader.request(&photo_at(7, path));
        let loaded = drain_one(&mut loader);
        assert_eq!(loaded.photo.id, 7);
        assert!(loaded.image.is_none());
    }
}
