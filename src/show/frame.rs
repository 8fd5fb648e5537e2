//! The per-frame loop: fold in arrivals and inbound photos, advance the
//! show, draw, and pace to the target frame rate.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use tracing::{info, warn};

use crate::config::Configuration;
use crate::render::{Renderer, TextureFactory};
use crate::scan;
use crate::show::controller::Slideshow;
use crate::store::Store;
use crate::tasks::arrivals::ArrivalsPoller;
use crate::tasks::intake::IntakeFetcher;

/// User input, already decoded from whatever produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    TogglePause,
    Next,
    Previous,
    RotateClockwise,
    RotateCounterclockwise,
    Rate(i32),
}

/// Run the show until a [`Command::Quit`] arrives.
pub fn run<F, R>(
    show: &mut Slideshow<F>,
    renderer: &mut R,
    store: &Store,
    config: &Configuration,
    mut arrivals: Option<ArrivalsPoller>,
    mut intake: Option<IntakeFetcher>,
    commands: &Receiver<Command>,
) -> Result<()>
where
    F: TextureFactory,
    R: Renderer<F::Texture>,
{
    let frame_budget = Duration::from_secs_f64(1.0 / f64::from(config.target_fps));
    info!(
        fps = config.target_fps,
        photos = show.photo_count(),
        "show running"
    );

    loop {
        let frame_started = Instant::now();

        if let Some(intake) = intake.as_mut() {
            intake.initiate_fetch();
            for pathname in intake.drain() {
                let admitted = scan::admit_file(store, config, &pathname).and_then(|id| {
                    let mut photo = store
                        .photo_by_id(id)?
                        .context("photo missing right after intake")?;
                    photo.pathname = pathname.clone();
                    photo.absolute_pathname = config.photo_library_path.join(&pathname);
                    Ok(photo)
                });
                match admitted {
                    Ok(photo) => show.insert_photo(photo),
                    Err(err) => {
                        warn!("could not admit {}: {err:#}", pathname.display());
                    }
                }
            }
        }

        show.prefetch();
        show.update();
        let slides = show.current_slides();

        renderer.begin_frame();
        for id in [slides.current, slides.next].into_iter().flatten() {
            if let Some(slide) = show.slide(id)
                && slide.is_configured()
            {
                renderer.draw_slide(&slide.photo, slide.texture(), &slide.render_state());
            }
        }
        if let Some(arrivals) = arrivals.as_mut() {
            renderer.draw_arrivals(arrivals.times());
        }
        renderer.end_frame();

        show.reset_offscreen(&slides);

        for command in commands.try_iter() {
            match command {
                Command::Quit => {
                    info!("quit requested");
                    return Ok(());
                }
                Command::TogglePause => show.toggle_pause(),
                Command::Next => show.jump_relative(1),
                Command::Previous => show.jump_relative(-1),
                Command::RotateClockwise => show.rotate(store, -90)?,
                Command::RotateCounterclockwise => show.rotate(store, 90)?,
                Command::Rate(rating) => show.rate(store, rating)?,
            }
        }

        let elapsed = frame_started.elapsed();
        if elapsed < frame_budget {
            std::thread::sleep(frame_budget - elapsed);
        }
    }
}
