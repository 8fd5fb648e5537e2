use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use crossbeam_channel::{Sender, unbounded};
use rand::seq::SliceRandom;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use frameshow::config;
use frameshow::render::{SoftwareTextureFactory, TraceRenderer};
use frameshow::scan;
use frameshow::show::cache::SlideCache;
use frameshow::show::controller::Slideshow;
use frameshow::show::frame::{self, Command};
use frameshow::show::slide::Timing;
use frameshow::store::Store;
use frameshow::tasks::arrivals::{ArrivalsPoller, CommandArrivalSource};
use frameshow::tasks::intake::{IntakeFetcher, SpoolIntakeSource};
use frameshow::tasks::loader::ImageLoader;

#[derive(Parser, Debug)]
#[command(about = "Photo frame slideshow")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("frameshow={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::from_yaml_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.validate()?;

    info!(
        display = %humantime::format_duration(config.display_time),
        transition = %humantime::format_duration(config.transition_time),
        "timing"
    );

    let store = Store::open(&config.database_file)?;
    let mut photos = scan::load_photos(&store, &config)?;
    photos.shuffle(&mut rand::rng());
    info!(count = photos.len(), "showing photos");

    let loader = ImageLoader::new(config.max_texture_dim);
    let cache = SlideCache::new(
        loader,
        SoftwareTextureFactory,
        config.cache_capacity,
        config.screen_width,
        config.screen_height,
    );
    let timing = Timing::new(config.display_time, config.transition_time);
    let mut show = Slideshow::new(photos, cache, timing, config.max_pause.as_secs_f64());

    let arrivals = config.arrivals_command.clone().map(|command| {
        ArrivalsPoller::new(
            CommandArrivalSource::new(command),
            config.arrivals_poll_interval,
        )
    });
    let intake = config.intake_spool.clone().map(|spool| {
        IntakeFetcher::new(
            SpoolIntakeSource::new(
                spool,
                config.photo_library_path.clone(),
                config.intake_subdir.clone(),
            ),
            config.intake_poll_interval,
        )
    });

    let (command_tx, command_rx) = unbounded();
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || read_commands(&command_tx))?;

    let mut renderer = TraceRenderer;
    frame::run(
        &mut show,
        &mut renderer,
        &store,
        &config,
        arrivals,
        intake,
        &command_rx,
    )
}

/// Feed commands typed on stdin into the show. EOF quits.
fn read_commands(commands: &Sender<Command>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        match parse_command(&line) {
            Some(command) => {
                if commands.send(command).is_err() {
                    return;
                }
            }
            None => warn!("unknown command {line:?}"),
        }
    }
    let _ = commands.send(Command::Quit);
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "q" => Some(Command::Quit),
        "" => Some(Command::TogglePause),
        "n" => Some(Command::Next),
        "p" => Some(Command::Previous),
        "r" => Some(Command::RotateClockwise),
        "l" => Some(Command::RotateCounterclockwise),
        rating @ ("1" | "2" | "3" | "4" | "5") => rating.parse().ok().map(Command::Rate),
        _ => None,
    }
}
