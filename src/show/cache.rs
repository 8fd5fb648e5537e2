//! Bounded cache of decoded, texture-backed slides.
//!
//! The cache never blocks on a decode: `get` for an absent photo queues a
//! background load and returns nothing, and finished loads are folded in
//! at the start of the next lookup. When full, the least recently used
//! slide is evicted and its texture released.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, warn};

use crate::model::{Photo, PhotoId};
use crate::render::TextureFactory;
use crate::show::slide::{PanDirection, Slide, Timing};
use crate::tasks::loader::ImageLoader;

pub struct SlideCache<F: TextureFactory> {
    slides: BTreeMap<PhotoId, Slide<F::Texture>>,
    loader: ImageLoader,
    factory: F,
    capacity: usize,
    screen_width: u32,
    screen_height: u32,
    /// Monotonic recency counter; bumps on every touch.
    tick: u64,
}

impl<F: TextureFactory> SlideCache<F> {
    pub fn new(
        loader: ImageLoader,
        factory: F,
        capacity: usize,
        screen_width: u32,
        screen_height: u32,
    ) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        SlideCache {
            slides: BTreeMap::new(),
            loader,
            factory,
            capacity,
            screen_width,
            screen_height,
            tick: 0,
        }
    }

    /// The slide for `photo` if it is resident, marking it recently used.
    /// Otherwise a background load is queued (at most once per photo) and
    /// `None` is returned; some later call will find the slide resident.
    pub fn get(&mut self, photo: &Photo) -> Option<&Slide<F::Texture>> {
        self.drain_loader();
        if self.slides.contains_key(&photo.id) {
            self.touch(photo.id);
            return self.slides.get(&photo.id);
        }
        if !self.loader.is_pending(photo.id) {
            self.shrink();
            self.loader.request(photo);
        }
        None
    }

    /// Fold finished decodes into the cache.
    fn drain_loader(&mut self) {
        for loaded in self.loader.drain() {
            self.shrink();

            let prep_started = Instant::now();
            let (texture, broken) = match &loaded.image {
                Some(image) => match self.factory.prepare(image) {
                    Ok(texture) => (texture, false),
                    Err(err) => {
                        warn!(photo = loaded.photo.id, "texture upload failed: {err:#}");
                        (self.factory.placeholder(), true)
                    }
                },
                None => (self.factory.placeholder(), true),
            };

            let id = loaded.photo.id;
            let mut slide = Slide::new(loaded.photo, texture, broken);
            slide.load_time = loaded.load_time;
            slide.prep_time = prep_started.elapsed();
            slide.compute_ideal_size(self.screen_width, self.screen_height);
            self.tick += 1;
            slide.touch(self.tick);
            debug!(
                photo = id,
                broken,
                load_ms = slide.load_time.as_millis() as u64,
                prep_ms = slide.prep_time.as_millis() as u64,
                "slide ready"
            );

            if let Some(old) = self.slides.insert(id, slide) {
                self.factory.release(old.into_texture());
            }
        }
    }

    /// Evict until there is room for one more slide.
    fn shrink(&mut self) {
        while self.slides.len() >= self.capacity {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        // First minimum wins, so ties break toward the lowest id.
        let mut oldest: Option<(PhotoId, u64)> = None;
        for (&id, slide) in &self.slides {
            match oldest {
                Some((_, best)) if slide.last_used >= best => {}
                _ => oldest = Some((id, slide.last_used)),
            }
        }
        if let Some((id, _)) = oldest
            && let Some(slide) = self.slides.remove(&id)
        {
            debug!(photo = id, "evicting slide");
            self.factory.release(slide.into_texture());
        }
    }

    /// Mark `id` recently used, if resident.
    pub fn touch(&mut self, id: PhotoId) {
        self.tick += 1;
        let tick = self.tick;
        if let Some(slide) = self.slides.get_mut(&id) {
            slide.touch(tick);
        }
    }

    /// Animate the slide one frame if it is resident, marking it used.
    /// Returns whether the slide was there to animate.
    pub fn animate(&mut self, id: PhotoId, paused: bool, offset: f64, timing: Timing) -> bool {
        self.tick += 1;
        let tick = self.tick;
        match self.slides.get_mut(&id) {
            Some(slide) => {
                slide.animate(paused, offset, timing);
                slide.touch(tick);
                true
            }
            None => false,
        }
    }

    /// Reset the animation of every resident slide except the protected
    /// ones, so off-screen slides re-enter with a fresh fade-in.
    pub fn reset_unused(&mut self, protected: &[PhotoId]) {
        for (id, slide) in &mut self.slides {
            if !protected.contains(id) && slide.is_configured() {
                slide.reset();
            }
        }
    }

    pub fn peek(&self, id: PhotoId) -> Option<&Slide<F::Texture>> {
        self.slides.get(&id)
    }

    pub fn set_pan(&mut self, id: PhotoId, pan: PanDirection) {
        if let Some(slide) = self.slides.get_mut(&id) {
            slide.pan = pan;
        }
    }

    pub fn set_rotation(&mut self, id: PhotoId, rotation: i32) {
        let (screen_width, screen_height) = (self.screen_width, self.screen_height);
        if let Some(slide) = self.slides.get_mut(&id) {
            slide.photo.rotation = rotation;
            slide.compute_ideal_size(screen_width, screen_height);
        }
    }

    pub fn set_rating(&mut self, id: PhotoId, rating: i32) {
        if let Some(slide) = self.slides.get_mut(&id) {
            slide.photo.rating = rating;
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<F: TextureFactory> Drop for SlideCache<F> {
    fn drop(&mut self) {
        for (_, slide) in std::mem::take(&mut self.slides) {
            self.factory.release(slide.into_texture());
        }
    }
}
