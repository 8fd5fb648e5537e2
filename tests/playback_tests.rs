//! Playback over a real library: decoded slides crossfading under a
//! deterministic clock.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use frameshow::model::{Photo, PhotoId};
use frameshow::render::SoftwareTextureFactory;
use frameshow::show::cache::SlideCache;
use frameshow::show::controller::Slideshow;
use frameshow::show::slide::Timing;
use frameshow::tasks::loader::ImageLoader;
use image::RgbaImage;

const SLOT: f64 = 16.0;

fn build_show(dir: &std::path::Path, count: i64) -> Slideshow<SoftwareTextureFactory> {
    let photos: Vec<Photo> = (1..=count)
        .map(|id| {
            let path = dir.join(format!("{id}.png"));
            RgbaImage::new(32, 24).save(&path).unwrap();
            Photo {
                id,
                hash_back: format!("hash-{id}"),
                rotation: 0,
                rating: 3,
                taken_at: 0,
                display_date: String::new(),
                label: format!("photo {id}"),
                pathname: PathBuf::from(format!("{id}.png")),
                absolute_pathname: path,
            }
        })
        .collect();
    let cache = SlideCache::new(ImageLoader::new(2048), SoftwareTextureFactory, 4, 1920, 1080);
    let timing = Timing {
        slot: SLOT,
        transition: 2.0,
    };
    Slideshow::new(photos, cache, timing, 3600.0)
}

fn wait_resident(show: &mut Slideshow<SoftwareTextureFactory>, id: PhotoId) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while show.slide(id).is_none() {
        assert!(Instant::now() < deadline, "timed out waiting for slide {id}");
        show.prefetch();
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn a_crossfade_hands_off_between_slides() {
    let dir = tempfile::tempdir().unwrap();
    let mut show = build_show(dir.path(), 3);
    wait_resident(&mut show, 1);
    wait_resident(&mut show, 2);

    // Settle mid-slot at 25 fps.
    for _ in 0..250 {
        show.tick(0.04);
    }
    let mid = show.slide(1).unwrap().alpha();
    assert!(mid > 0.99, "fully faded in mid-slot, got {mid}");
    assert!(show.current_slides().next.is_none());

    // Walk into the transition window.
    while show.show_time() < SLOT - 1.0 {
        show.tick(0.04);
    }
    let slides = show.current_slides();
    assert_eq!(slides.current, Some(1));
    assert_eq!(slides.next, Some(2));

    let outgoing = show.slide(1).unwrap().alpha();
    let incoming = show.slide(2).unwrap().alpha();
    assert!(outgoing < mid, "outgoing slide is fading");
    assert!(incoming > 0.0, "incoming slide is fading in");

    // Well into the next slot the handoff is complete.
    for _ in 0..250 {
        show.tick(0.04);
    }
    assert_eq!(show.current_slides().current, Some(2));
    assert!(show.slide(2).unwrap().alpha() > 0.99);
}

#[test]
fn offscreen_slides_restart_their_fade() {
    let dir = tempfile::tempdir().unwrap();
    let mut show = build_show(dir.path(), 3);
    wait_resident(&mut show, 1);
    wait_resident(&mut show, 2);

    for _ in 0..100 {
        show.tick(0.04);
    }
    assert!(show.slide(1).unwrap().is_configured());

    // Skip ahead so slide 1 leaves the screen.
    show.jump_relative(1);
    show.tick(0.0);
    let slides = show.current_slides();
    show.reset_offscreen(&slides);

    let parked = show.slide(1).unwrap();
    assert!(!parked.is_configured());
    assert_eq!(parked.alpha(), 0.0);
}

#[test]
fn prefetch_keeps_upcoming_slides_warm() {
    let dir = tempfile::tempdir().unwrap();
    let mut show = build_show(dir.path(), 8);

    // capacity 4 means the current slide plus two ahead stay warm.
    wait_resident(&mut show, 1);
    wait_resident(&mut show, 2);
    wait_resident(&mut show, 3);
    assert!(show.slide(4).is_none());

    // Advancing shifts the warm window without evicting the new current.
    show.jump_relative(1);
    let deadline = Instant::now() + Duration::from_secs(5);
    while show.slide(4).is_none() {
        assert!(Instant::now() < deadline, "timed out prefetching");
        show.prefetch();
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(show.slide(2).is_some());
}
