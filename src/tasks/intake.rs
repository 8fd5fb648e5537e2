//! Inbound photos. A single worker moves files that arrive out-of-band
//! (an MMS gateway spool, for instance) into the library; the frame loop
//! drains the results and splices the new photos into the running show.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use crate::tasks::pool::TaskPool;

pub trait IntakeSource: Send + Sync + 'static {
    /// Collect newly arrived photo files into the library and return
    /// their pathnames relative to the library root.
    fn fetch_inbound(&self) -> Result<Vec<PathBuf>>;
}

pub struct IntakeFetcher {
    pool: TaskPool<(), Vec<PathBuf>>,
    min_interval: Duration,
    previous_fetch: Option<Instant>,
}

impl IntakeFetcher {
    pub fn new<S: IntakeSource>(source: S, min_interval: Duration) -> Self {
        IntakeFetcher {
            pool: TaskPool::new("intake", 1, move |()| source.fetch_inbound()),
            min_interval,
            previous_fetch: None,
        }
    }

    /// Kick off a fetch if enough time has passed since the last one.
    /// Any fetch still sitting in the queue is superseded first, so at
    /// most one request is ever queued behind the running one.
    pub fn initiate_fetch(&mut self) {
        let due = self
            .previous_fetch
            .is_none_or(|at| at.elapsed() >= self.min_interval);
        if due {
            self.previous_fetch = Some(Instant::now());
            self.pool.clear_pending();
            self.pool.submit(());
        }
    }

    /// Pathnames of photos that arrived since the last drain, relative to
    /// the library root.
    pub fn drain(&mut self) -> Vec<PathBuf> {
        let mut arrived = Vec::new();
        while let Some(mut batch) = self.pool.poll_one() {
            arrived.append(&mut batch);
        }
        arrived
    }
}

/// Moves files out of a spool directory into the library's intake
/// subdirectory, renaming each to a name that cannot collide.
pub struct SpoolIntakeSource {
    spool: PathBuf,
    library_root: PathBuf,
    intake_subdir: PathBuf,
}

impl SpoolIntakeSource {
    pub fn new(spool: PathBuf, library_root: PathBuf, intake_subdir: PathBuf) -> Self {
        SpoolIntakeSource {
            spool,
            library_root,
            intake_subdir,
        }
    }

    fn file_into_library(&self, spooled: &Path) -> Result<PathBuf> {
        let intake_dir = self.library_root.join(&self.intake_subdir);
        fs::create_dir_all(&intake_dir)
            .with_context(|| format!("creating {}", intake_dir.display()))?;

        let extension = spooled
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        let name = unique_filename(&intake_dir, &extension)?;
        let destination = intake_dir.join(&name);

        // rename fails across filesystems; fall back to copy + remove.
        if fs::rename(spooled, &destination).is_err() {
            fs::copy(spooled, &destination)
                .with_context(|| format!("copying {}", spooled.display()))?;
            fs::remove_file(spooled)?;
        }
        info!(
            from = %spooled.display(),
            to = %destination.display(),
            "filed inbound photo"
        );
        Ok(self.intake_subdir.join(name))
    }
}

impl IntakeSource for SpoolIntakeSource {
    fn fetch_inbound(&self) -> Result<Vec<PathBuf>> {
        if !self.spool.is_dir() {
            return Ok(Vec::new());
        }
        let mut spooled = Vec::new();
        for entry in fs::read_dir(&self.spool)
            .with_context(|| format!("reading {}", self.spool.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                spooled.push(entry.path());
            }
        }
        spooled.sort();

        let mut filed = Vec::new();
        for path in spooled {
            filed.push(self.file_into_library(&path)?);
        }
        Ok(filed)
    }
}

/// First name of the form `intake-NNNNNNNN<ext>` not already present in
/// `dir`.
fn unique_filename(dir: &Path, extension: &str) -> Result<String> {
    for counter in 0..u32::MAX {
        let name = format!("intake-{counter:08}{extension}");
        if !dir.join(&name).exists() {
            return Ok(name);
        }
    }
    anyhow::bail!("no free filename in {}", dir.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_drained(fetcher: &mut IntakeFetcher) -> Vec<PathBuf> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let arrived = fetcher.drain();
            if !arrived.is_empty() {
                return arrived;
            }
            assert!(Instant::now() < deadline, "timed out waiting for intake");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn spooled_files_move_into_the_intake_subdir() {
        let spool = tempfile::tempdir().unwrap();
        let library = tempfile::tempdir().unwrap();
        fs::write(spool.path().join("mms-1.jpg"), b"one").unwrap();
        fs::write(spool.path().join("mms-2.JPG"), b"two").unwrap();

        let source = SpoolIntakeSource::new(
            spool.path().to_path_buf(),
            library.path().to_path_buf(),
            PathBuf::from("intake"),
        );
        let mut fetcher = IntakeFetcher::new(source, Duration::ZERO);
        fetcher.initiate_fetch();

        let mut arrived = wait_drained(&mut fetcher);
        arrived.sort();
        assert_eq!(
            arrived,
            vec![
                PathBuf::from("intake/intake-00000000.jpg"),
                PathBuf::from("intake/intake-00000001.jpg"),
            ]
        );
        assert_eq!(
            fs::read(library.path().join("intake/intake-00000000.jpg")).unwrap(),
            b"one"
        );
        assert!(fs::read_dir(spool.path()).unwrap().next().is_none());
    }

    #[test]
    fn throttles_between_fetches() {
        let spool = tempfile::tempdir().unwrap();
        let library = tempfile::tempdir().unwrap();
        fs::write(spool.path().join("a.jpg"), b"a").unwrap();

        let source = SpoolIntakeSource::new(
            spool.path().to_path_buf(),
            library.path().to_path_buf(),
            PathBuf::from("intake"),
        );
        let mut fetcher = IntakeFetcher::new(source, Duration::from_secs(3600));
        fetcher.initiate_fetch();
        assert_eq!(wait_drained(&mut fetcher).len(), 1);

        // A second file arrives, but the next fetch is not due yet.
        fs::write(spool.path().join("b.jpg"), b"b").unwrap();
        fetcher.initiate_fetch();
        std::thread::sleep(Duration::from_millis(30));
        assert!(fetcher.drain().is_empty());
    }

    #[test]
    fn missing_spool_directory_is_not_an_error() {
        let library = tempfile::tempdir().unwrap();
        let source = SpoolIntakeSource::new(
            library.path().join("no-such-spool"),
            library.path().to_path_buf(),
            PathBuf::from("intake"),
        );
        assert!(source.fetch_inbound().unwrap().is_empty());
    }
}
