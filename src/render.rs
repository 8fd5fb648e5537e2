//! The seam between the show and whatever puts pixels on a screen.
//!
//! The show only needs two things from a backend: a way to turn decoded
//! images into textures it can hold on to ([`TextureFactory`]) and a way
//! to draw them ([`Renderer`]). The software implementations here keep
//! the whole engine runnable and testable without a display.

use anyhow::Result;
use chrono::{DateTime, Utc};
use image::RgbaImage;
use tracing::trace;

use crate::model::Photo;

pub trait Texture {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

pub trait TextureFactory {
    type Texture: Texture;

    /// Upload a decoded image.
    fn prepare(&mut self, image: &RgbaImage) -> Result<Self::Texture>;

    /// Texture shown in place of a photo that failed to decode.
    fn placeholder(&mut self) -> Self::Texture;

    /// Called exactly once per texture when the show is done with it.
    fn release(&mut self, texture: Self::Texture);
}

/// Per-frame draw parameters for one slide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    /// Degrees counter-clockwise.
    pub rotation: f32,
    /// On-screen size before zoom, in pixels.
    pub width: f32,
    pub height: f32,
    pub zoom: f32,
    /// 0 is invisible, 1 is opaque.
    pub alpha: f32,
}

pub trait Renderer<T: Texture> {
    fn begin_frame(&mut self);
    fn draw_slide(&mut self, photo: &Photo, texture: &T, state: &RenderState);
    fn draw_arrivals(&mut self, times: &[DateTime<Utc>]);
    fn end_frame(&mut self);
}

/// Texture that remembers its size and nothing else.
pub struct SoftwareTexture {
    width: u32,
    height: u32,
}

impl Texture for SoftwareTexture {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

#[derive(Default)]
pub struct SoftwareTextureFactory;

impl TextureFactory for SoftwareTextureFactory {
    type Texture = SoftwareTexture;

    fn prepare(&mut self, image: &RgbaImage) -> Result<SoftwareTexture> {
        Ok(SoftwareTexture {
            width: image.width(),
            height: image.height(),
        })
    }

    fn placeholder(&mut self) -> SoftwareTexture {
        SoftwareTexture {
            width: 640,
            height: 480,
        }
    }

    fn release(&mut self, _texture: SoftwareTexture) {}
}

/// Renderer that only logs what it would draw. Useful headless and when
/// chasing animation bugs.
#[derive(Default)]
pub struct TraceRenderer;

impl<T: Texture> Renderer<T> for TraceRenderer {
    fn begin_frame(&mut self) {
        trace!("frame begin");
    }

    fn draw_slide(&mut self, photo: &Photo, texture: &T, state: &RenderState) {
        trace!(
            photo = photo.id,
            width = texture.width(),
            height = texture.height(),
            zoom = state.zoom,
            alpha = state.alpha,
            rotation = state.rotation,
            "draw slide"
        );
    }

    fn draw_arrivals(&mut self, times: &[DateTime<Utc>]) {
        trace!(count = times.len(), "draw arrivals");
    }

    fn end_frame(&mut self) {
        trace!("frame end");
    }
}
