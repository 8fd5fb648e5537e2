use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

/// Runtime configuration, loaded from a YAML file.
///
/// This holds everything the show needs at startup: where the photos and
/// the store live, the slideshow timing, the cache bound, and the sets of
/// names that used to be process-wide globals (unwanted directory names,
/// accepted extensions).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    /// Root directory of the photo library. Scanned recursively.
    pub photo_library_path: PathBuf,

    /// SQLite database holding photo metadata.
    #[serde(default = "Configuration::default_database_file")]
    pub database_file: PathBuf,

    /// How long each slide is fully visible, excluding the crossfade.
    #[serde(with = "humantime_serde", default = "Configuration::default_display_time")]
    pub display_time: Duration,

    /// Duration of the crossfade between consecutive slides.
    #[serde(
        with = "humantime_serde",
        default = "Configuration::default_transition_time"
    )]
    pub transition_time: Duration,

    /// Maximum number of decoded slides kept resident.
    #[serde(default = "Configuration::default_cache_capacity")]
    pub cache_capacity: usize,

    /// Pausing auto-resumes after this long.
    #[serde(with = "humantime_serde", default = "Configuration::default_max_pause")]
    pub max_pause: Duration,

    /// Minimum interval between arrival-board fetches.
    #[serde(
        with = "humantime_serde",
        default = "Configuration::default_arrivals_poll_interval"
    )]
    pub arrivals_poll_interval: Duration,

    /// Minimum interval between inbound-photo fetches.
    #[serde(
        with = "humantime_serde",
        default = "Configuration::default_intake_poll_interval"
    )]
    pub intake_poll_interval: Duration,

    /// Only photos rated at least this are shown.
    #[serde(default = "Configuration::default_min_rating")]
    pub min_rating: i32,

    /// Skip photos newer than this many days. 0 disables the filter.
    #[serde(default)]
    pub min_days: u32,

    /// Skip photos older than this many days. 0 disables the filter.
    #[serde(default)]
    pub max_days: u32,

    /// Directory names never recursed into during the scan.
    #[serde(default = "Configuration::default_unwanted_directories")]
    pub unwanted_directories: Vec<String>,

    /// Accepted image file extensions, lowercase, without the dot.
    #[serde(default = "Configuration::default_image_extensions")]
    pub image_extensions: Vec<String>,

    #[serde(default = "Configuration::default_screen_width")]
    pub screen_width: u32,

    #[serde(default = "Configuration::default_screen_height")]
    pub screen_height: u32,

    #[serde(default = "Configuration::default_target_fps")]
    pub target_fps: u32,

    /// Images larger than this on either side are downscaled at decode time.
    #[serde(default = "Configuration::default_max_texture_dim")]
    pub max_texture_dim: u32,

    /// Subdirectory of the library where inbound photos are filed,
    /// relative to `photo-library-path`.
    #[serde(default = "Configuration::default_intake_subdir")]
    pub intake_subdir: PathBuf,

    /// External program that prints upcoming arrival times as epoch
    /// seconds, one per line. Unset disables the arrival board.
    #[serde(default)]
    pub arrivals_command: Option<String>,

    /// Directory watched for inbound photo files (e.g. dropped there by an
    /// MMS gateway). Unset disables the intake poller.
    #[serde(default)]
    pub intake_spool: Option<PathBuf>,
}

impl Configuration {
    fn default_database_file() -> PathBuf {
        PathBuf::from("frameshow.db")
    }

    fn default_display_time() -> Duration {
        Duration::from_secs(10)
    }

    fn default_transition_time() -> Duration {
        Duration::from_secs(2)
    }

    fn default_cache_capacity() -> usize {
        4
    }

    fn default_max_pause() -> Duration {
        Duration::from_secs(60 * 60)
    }

    fn default_arrivals_poll_interval() -> Duration {
        Duration::from_secs(60)
    }

    fn default_intake_poll_interval() -> Duration {
        Duration::from_secs(1)
    }

    fn default_min_rating() -> i32 {
        3
    }

    fn default_unwanted_directories() -> Vec<String> {
        vec![
            ".thumbnails".into(),
            ".small".into(),
            "@eaDir".into(),
            ".tmp".into(),
        ]
    }

    fn default_image_extensions() -> Vec<String> {
        vec!["jpg".into(), "jpeg".into()]
    }

    fn default_screen_width() -> u32 {
        1920
    }

    fn default_screen_height() -> u32 {
        1080
    }

    fn default_target_fps() -> u32 {
        40
    }

    fn default_max_texture_dim() -> u32 {
        2048
    }

    fn default_intake_subdir() -> PathBuf {
        PathBuf::from("intake")
    }

    /// One slide's total time budget: fully-visible time plus crossfade.
    pub fn slot_duration(&self) -> Duration {
        self.display_time + self.transition_time
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.photo_library_path.is_dir(),
            "photo-library-path {} is not a directory",
            self.photo_library_path.display()
        );
        ensure!(
            !self.display_time.is_zero(),
            "display-time must be positive"
        );
        ensure!(
            self.transition_time <= self.display_time,
            "transition-time must not exceed display-time"
        );
        ensure!(self.cache_capacity >= 2, "cache-capacity must be at least 2");
        ensure!(
            (1..=5).contains(&self.min_rating),
            "min-rating must be between 1 and 5"
        );
        ensure!(self.target_fps > 0, "target-fps must be positive");
        Ok(())
    }
}

/// Load a [`Configuration`] from a YAML file.
pub fn from_yaml_file(path: &Path) -> Result<Configuration> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let cfg: Configuration = serde_yaml::from_str(&text)?;
    Ok(cfg)
}
