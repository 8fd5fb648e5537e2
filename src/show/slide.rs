//! One resident slide: a decoded photo's texture plus the animated state
//! (rotation, size, zoom, alpha) that eases toward its targets each frame.

use std::time::Duration;

use crate::model::Photo;
use crate::render::{RenderState, Texture};

/// Fraction of the remaining distance covered per frame once a slide is
/// on screen.
const SMOOTH_STEP: f64 = 0.3;
/// Alpha always eases, even on the first frame, so slides fade in rather
/// than pop.
const ALPHA_STEP: f64 = 0.3;

const START_ZOOM: f64 = 0.9;
const END_ZOOM: f64 = 1.3;

/// Ken Burns drift direction. Assigned once per photo, by id parity, so
/// consecutive slides move in opposite directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanDirection {
    #[default]
    Unset,
    ZoomIn,
    ZoomOut,
}

/// Slideshow timing in seconds. `slot` is the full per-slide budget
/// including the crossfade; `transition` is the crossfade alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub slot: f64,
    pub transition: f64,
}

impl Timing {
    pub fn new(display_time: Duration, transition_time: Duration) -> Self {
        Timing {
            slot: (display_time + transition_time).as_secs_f64(),
            transition: transition_time.as_secs_f64(),
        }
    }
}

pub struct Slide<T: Texture> {
    pub photo: Photo,
    texture: T,
    /// The photo failed to decode; the texture is a placeholder.
    pub broken: bool,

    rotation: f64,
    width: f64,
    height: f64,
    zoom: f64,
    alpha: f64,

    ideal_width: f64,
    ideal_height: f64,
    pub pan: PanDirection,

    /// Set after the first animate. While false, the next animate snaps
    /// geometry straight to its targets instead of easing.
    configured: bool,
    /// Recency stamp from the cache's tick counter.
    pub last_used: u64,

    pub load_time: Duration,
    pub prep_time: Duration,
}

impl<T: Texture> Slide<T> {
    pub fn new(photo: Photo, texture: T, broken: bool) -> Self {
        Slide {
            photo,
            texture,
            broken,
            rotation: 0.0,
            width: 0.0,
            height: 0.0,
            zoom: 1.0,
            alpha: 0.0,
            ideal_width: 0.0,
            ideal_height: 0.0,
            pan: PanDirection::Unset,
            configured: false,
            last_used: 0,
            load_time: Duration::ZERO,
            prep_time: Duration::ZERO,
        }
    }

    /// Fit the texture to the screen, honoring the display rotation: a
    /// sideways photo trades width for height before fitting.
    pub fn compute_ideal_size(&mut self, screen_width: u32, screen_height: u32) {
        let (mut w, mut h) = (
            f64::from(self.texture.width()),
            f64::from(self.texture.height()),
        );
        if self.broken {
            // Placeholders render unrotated.
        } else if self.photo.is_sideways() {
            std::mem::swap(&mut w, &mut h);
        }
        let scale = (f64::from(screen_width) / w).min(f64::from(screen_height) / h);
        if self.photo.is_sideways() && !self.broken {
            // Size applies to the texture before rotation.
            std::mem::swap(&mut w, &mut h);
        }
        self.ideal_width = w * scale;
        self.ideal_height = h * scale;
    }

    /// Advance the animated state one frame toward its targets for this
    /// offset into the slot. The first animate after construction or
    /// [`reset`](Self::reset) snaps geometry to its targets; alpha always
    /// eases.
    pub fn animate(&mut self, paused: bool, offset: f64, timing: Timing) {
        let step = if self.configured {
            SMOOTH_STEP
        } else {
            self.configured = true;
            1.0
        };

        let rotation_target = if self.broken {
            0.0
        } else {
            f64::from(self.photo.rotation)
        };
        self.rotation = lerp(self.rotation, rotation_target, step);
        self.width = lerp(self.width, self.ideal_width, step);
        self.height = lerp(self.height, self.ideal_height, step);

        let zoom_target = if paused {
            1.0
        } else {
            target_zoom(self.pan, offset, timing)
        };
        self.zoom = lerp(self.zoom, zoom_target, step);

        self.alpha = lerp(self.alpha, target_alpha(paused, offset, timing), ALPHA_STEP);
    }

    /// Forget the animated state so the next appearance starts fresh:
    /// geometry snaps into place and the slide fades in from invisible.
    pub fn reset(&mut self) {
        self.configured = false;
        self.alpha = 0.0;
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn touch(&mut self, tick: u64) {
        self.last_used = tick;
    }

    pub fn texture(&self) -> &T {
        &self.texture
    }

    pub fn into_texture(self) -> T {
        self.texture
    }

    pub fn render_state(&self) -> RenderState {
        RenderState {
            rotation: self.rotation as f32,
            width: self.width as f32,
            height: self.height as f32,
            zoom: self.zoom as f32,
            alpha: self.alpha as f32,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }
}

fn lerp(from: f64, to: f64, step: f64) -> f64 {
    from + (to - from) * step
}

/// Ken Burns zoom target: drift from [`START_ZOOM`] to [`END_ZOOM`] over
/// the slot, reversed for [`PanDirection::ZoomOut`].
fn target_zoom(pan: PanDirection, offset: f64, timing: Timing) -> f64 {
    let t = (offset / timing.slot).clamp(0.0, 1.0);
    let t = match pan {
        PanDirection::ZoomOut => 1.0 - t,
        _ => t,
    };
    START_ZOOM + (END_ZOOM - START_ZOOM) * t
}

/// Alpha target at `offset` seconds into the slide's slot. A negative
/// offset means the slide is still incoming: its fade-in exactly mirrors
/// the outgoing slide's fade-out, so the two alphas sum to one all the
/// way through a crossfade.
fn target_alpha(paused: bool, offset: f64, timing: Timing) -> f64 {
    if paused {
        return if offset >= 0.0 { 1.0 } else { 0.0 };
    }
    if offset < 0.0 {
        ((offset + timing.transition) / timing.transition).clamp(0.0, 1.0)
    } else if offset < timing.slot - timing.transition {
        1.0
    } else {
        ((timing.slot - offset) / timing.transition).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{SoftwareTextureFactory, TextureFactory};
    use image::RgbaImage;
    use std::path::PathBuf;

    fn timing() -> Timing {
        // display-time 14s + transition-time 2s
        Timing {
            slot: 16.0,
            transition: 2.0,
        }
    }

    fn slide(rotation: i32, tex_w: u32, tex_h: u32) -> Slide<crate::render::SoftwareTexture> {
        let photo = Photo {
            id: 1,
            hash_back: String::new(),
            rotation,
            rating: 3,
            taken_at: 0,
            display_date: String::new(),
            label: String::new(),
            pathname: PathBuf::new(),
            absolute_pathname: PathBuf::new(),
        };
        let mut factory = SoftwareTextureFactory;
        let texture = factory.prepare(&RgbaImage::new(tex_w, tex_h)).unwrap();
        let mut slide = Slide::new(photo, texture, false);
        slide.compute_ideal_size(1920, 1080);
        slide
    }

    #[test]
    fn crossfade_alphas_are_complementary() {
        let t = timing();
        // Outgoing slide 15s into a 16s slot, incoming slide 1s before
        // its own slot starts.
        let fading_out = target_alpha(false, 15.0, t);
        let fading_in = target_alpha(false, -1.0, t);
        assert!((fading_out - 0.5).abs() < 1e-9);
        assert!((fading_out + fading_in - 1.0).abs() < 1e-9);

        assert_eq!(target_alpha(false, 5.0, t), 1.0);
        assert_eq!(target_alpha(false, -2.0, t), 0.0);
        assert_eq!(target_alpha(false, 16.0, t), 0.0);
    }

    #[test]
    fn paused_alpha_is_all_or_nothing() {
        let t = timing();
        assert_eq!(target_alpha(true, 15.9, t), 1.0);
        assert_eq!(target_alpha(true, -0.1, t), 0.0);
    }

    #[test]
    fn first_animate_snaps_geometry_but_not_alpha() {
        let mut slide = slide(90, 1080, 1920);
        slide.animate(false, 0.0, timing());

        assert_eq!(slide.rotation(), 90.0);
        let state = slide.render_state();
        assert_eq!((state.width, state.height), (1080.0, 1920.0));
        // Zoom snapped straight to its offset-0 target.
        assert!((slide.zoom() - START_ZOOM).abs() < 1e-9);
        // Alpha eased from 0 toward 1 instead of snapping.
        assert!((slide.alpha() - ALPHA_STEP).abs() < 1e-9);
    }

    #[test]
    fn later_animates_ease() {
        let mut slide = slide(0, 1920, 1080);
        slide.animate(false, 0.0, timing());
        let zoom_before = slide.zoom();
        slide.animate(false, 8.0, timing());
        let target = target_zoom(PanDirection::Unset, 8.0, timing());
        let expected = zoom_before + (target - zoom_before) * SMOOTH_STEP;
        assert!((slide.zoom() - expected).abs() < 1e-9);
    }

    #[test]
    fn reset_restarts_the_fade() {
        let mut slide = slide(0, 1920, 1080);
        for _ in 0..50 {
            slide.animate(false, 1.0, timing());
        }
        assert!(slide.alpha() > 0.99);

        slide.reset();
        assert!(!slide.is_configured());
        assert_eq!(slide.alpha(), 0.0);
        slide.animate(false, 0.0, timing());
        assert!((slide.alpha() - ALPHA_STEP).abs() < 1e-9);
    }

    #[test]
    fn zoom_directions_mirror_each_other() {
        let t = timing();
        let zoom_in = target_zoom(PanDirection::ZoomIn, 4.0, t);
        let zoom_out = target_zoom(PanDirection::ZoomOut, 12.0, t);
        assert!((zoom_in - zoom_out).abs() < 1e-9);
        assert_eq!(target_zoom(PanDirection::ZoomIn, 0.0, t), START_ZOOM);
        assert_eq!(target_zoom(PanDirection::ZoomIn, 16.0, t), END_ZOOM);
        assert_eq!(target_zoom(PanDirection::ZoomOut, 0.0, t), END_ZOOM);
    }

    #[test]
    fn sideways_photo_fits_rotated() {
        // A 1080x1920 texture shown rotated fills the 1920x1080 screen.
        let slide = slide(-90, 1080, 1920);
        let (w, h) = (slide.ideal_width, slide.ideal_height);
        assert!((w - 1080.0).abs() < 1e-6);
        assert!((h - 1920.0).abs() < 1e-6);
    }

    #[test]
    fn broken_slide_levels_out() {
        let photo = slide(90, 640, 480).photo.clone();
        let mut factory = SoftwareTextureFactory;
        let mut broken = Slide::new(photo, factory.placeholder(), true);
        broken.compute_ideal_size(1920, 1080);
        broken.animate(false, 0.0, timing());
        assert_eq!(broken.rotation(), 0.0, "placeholders ignore rotation");
    }
}
