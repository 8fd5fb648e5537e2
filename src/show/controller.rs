//! Playback control: the show clock, the pause state, and the mapping
//! from time to the slide (or crossfading pair of slides) on screen.

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info};

use crate::model::{Photo, PhotoId};
use crate::render::TextureFactory;
use crate::show::cache::SlideCache;
use crate::show::slide::{PanDirection, Slide, Timing};
use crate::store::Store;

/// What the show clock says should be on screen right now. `next` is
/// only set inside the trailing crossfade window; its offset is negative
/// until its own slot begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentSlides {
    pub index: i64,
    pub current: Option<PhotoId>,
    pub current_offset: f64,
    pub next: Option<PhotoId>,
    pub next_offset: f64,
}

pub struct Slideshow<F: TextureFactory> {
    photos: Vec<Photo>,
    cache: SlideCache<F>,
    timing: Timing,
    /// Seconds of pause after which the show resumes on its own.
    max_pause: f64,

    /// The show clock, in seconds. Frozen while paused.
    time: f64,
    previous_frame: Option<Instant>,
    paused: bool,
    pause_elapsed: f64,
}

impl<F: TextureFactory> Slideshow<F> {
    pub fn new(photos: Vec<Photo>, cache: SlideCache<F>, timing: Timing, max_pause: f64) -> Self {
        Slideshow {
            photos,
            cache,
            timing,
            max_pause,
            time: 0.0,
            previous_frame: None,
            paused: false,
            pause_elapsed: 0.0,
        }
    }

    /// Advance by the wall-clock time since the last update.
    pub fn update(&mut self) {
        let now = Instant::now();
        let delta = self
            .previous_frame
            .map_or(0.0, |at| now.duration_since(at).as_secs_f64());
        self.previous_frame = Some(now);
        self.tick(delta);
    }

    /// Advance the show by `delta` seconds and animate the on-screen
    /// slides one frame.
    pub fn tick(&mut self, delta: f64) {
        if self.paused {
            self.pause_elapsed += delta;
            if self.pause_elapsed >= self.max_pause {
                info!("pause expired, resuming");
                self.paused = false;
                self.pause_elapsed = 0.0;
            }
        }
        if !self.paused {
            self.time += delta;
        }

        let slides = self.current_slides();
        if let Some(id) = slides.current {
            self.ensure_pan(id, slides.index);
            self.cache
                .animate(id, self.paused, slides.current_offset, self.timing);
        }
        if let Some(id) = slides.next {
            self.ensure_pan(id, slides.index + 1);
            self.cache
                .animate(id, self.paused, slides.next_offset, self.timing);
        }
    }

    /// Where the show clock currently points.
    pub fn current_slides(&self) -> CurrentSlides {
        if self.photos.is_empty() {
            return CurrentSlides {
                index: 0,
                current: None,
                current_offset: 0.0,
                next: None,
                next_offset: 0.0,
            };
        }
        let slot = self.timing.slot;
        let index = (self.time / slot).floor() as i64;
        let offset = self.time - index as f64 * slot;
        let (next, next_offset) = if offset >= slot - self.timing.transition {
            (Some(self.photo_by_index(index + 1).id), offset - slot)
        } else {
            (None, 0.0)
        };
        CurrentSlides {
            index,
            current: Some(self.photo_by_index(index).id),
            current_offset: offset,
            next,
            next_offset,
        }
    }

    fn photo_by_index(&self, index: i64) -> &Photo {
        let wrapped = index.rem_euclid(self.photos.len() as i64) as usize;
        &self.photos[wrapped]
    }

    /// Give a newly resident slide its drift direction, set by the parity
    /// of the slide position it first appears at, so consecutive slides
    /// always move opposite ways.
    fn ensure_pan(&mut self, id: PhotoId, index: i64) {
        if let Some(slide) = self.cache.peek(id)
            && slide.pan == PanDirection::Unset
        {
            let pan = if index.rem_euclid(2) == 0 {
                PanDirection::ZoomOut
            } else {
                PanDirection::ZoomIn
            };
            self.cache.set_pan(id, pan);
        }
    }

    /// Keep the next few slides warm: request or touch half the cache's
    /// worth of upcoming photos, starting at the one on screen.
    pub fn prefetch(&mut self) {
        if self.photos.is_empty() {
            return;
        }
        let index = self.current_slides().index;
        let ahead = self.cache.capacity() / 2 + 1;
        for i in 0..ahead as i64 {
            let photo = self.photo_by_index(index + i).clone();
            self.cache.get(&photo);
        }
    }

    /// Jump `delta` slides forward (or back), landing at the start of the
    /// target slot. The clock never goes below zero.
    pub fn jump_relative(&mut self, delta: i64) {
        if self.photos.is_empty() {
            return;
        }
        let offset = self.current_slides().current_offset;
        self.time = (self.time + delta as f64 * self.timing.slot - offset).max(0.0);
        debug!(time = self.time, "jumped");
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        self.pause_elapsed = 0.0;
        info!(paused = self.paused, "pause toggled");
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Rotate the photo on screen by `degrees` and persist it. Ignored
    /// unless the slide is resident and decoded, since rotating a
    /// placeholder would save a rotation the user never saw.
    pub fn rotate(&mut self, store: &Store, degrees: i32) -> Result<()> {
        let slides = self.current_slides();
        let Some(id) = slides.current else {
            return Ok(());
        };
        match self.cache.peek(id) {
            Some(slide) if !slide.broken => {}
            _ => return Ok(()),
        }

        let wrapped = slides.index.rem_euclid(self.photos.len() as i64) as usize;
        let photo = &mut self.photos[wrapped];
        photo.rotation += degrees;
        store.save_photo(photo)?;
        let rotation = photo.rotation;
        info!(photo = id, rotation, "rotated");
        self.cache.set_rotation(id, rotation);
        // Restart the slot so the whole turn is visible.
        self.jump_relative(0);
        Ok(())
    }

    /// Rate the photo on screen and persist it.
    pub fn rate(&mut self, store: &Store, rating: i32) -> Result<()> {
        let slides = self.current_slides();
        let Some(id) = slides.current else {
            return Ok(());
        };
        if self.cache.peek(id).is_none() {
            return Ok(());
        }

        let wrapped = slides.index.rem_euclid(self.photos.len() as i64) as usize;
        let photo = &mut self.photos[wrapped];
        photo.rating = rating;
        store.save_photo(photo)?;
        info!(photo = id, rating, "rated");
        self.cache.set_rating(id, rating);
        Ok(())
    }

    /// Splice `photo` in right after the slide on screen, without moving
    /// the show clock off the current photo. The clock counts laps over
    /// the whole list, so growing the list means crediting the clock for
    /// the laps already completed.
    pub fn insert_photo(&mut self, photo: Photo) {
        if self.photos.is_empty() {
            self.photos.push(photo);
            self.time = 0.0;
            return;
        }
        let index = self.current_slides().index;
        let laps = index.div_euclid(self.photos.len() as i64);
        self.time += laps as f64 * self.timing.slot;
        let at = index.rem_euclid(self.photos.len() as i64) as usize + 1;
        info!(photo = photo.id, at, "spliced into the show");
        self.photos.insert(at, photo);
    }

    /// Reset the animation of every cached slide that is not on screen.
    pub fn reset_offscreen(&mut self, slides: &CurrentSlides) {
        let mut protected = Vec::with_capacity(2);
        protected.extend(slides.current);
        protected.extend(slides.next);
        self.cache.reset_unused(&protected);
    }

    pub fn slide(&self, id: PhotoId) -> Option<&Slide<F::Texture>> {
        self.cache.peek(id)
    }

    pub fn touch(&mut self, id: PhotoId) {
        self.cache.touch(id);
    }

    pub fn show_time(&self) -> f64 {
        self.time
    }

    pub fn photo_count(&self) -> usize {
        self.photos.len()
    }
}
