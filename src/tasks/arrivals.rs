//! Bus arrival board. A single worker fetches upcoming arrival times in
//! the background; the frame loop asks for the latest answer each frame.

use std::process::Command;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::tasks::pool::TaskPool;

pub trait ArrivalSource: Send + Sync + 'static {
    /// Upcoming arrival times, soonest first.
    fn fetch_arrivals(&self) -> Result<Vec<DateTime<Utc>>>;
}

pub struct ArrivalsPoller {
    pool: TaskPool<(), Vec<DateTime<Utc>>>,
    interval: Duration,
    last_fetch: Option<Instant>,
    latest: Vec<DateTime<Utc>>,
}

impl ArrivalsPoller {
    pub fn new<S: ArrivalSource>(source: S, interval: Duration) -> Self {
        ArrivalsPoller {
            pool: TaskPool::new("arrivals", 1, move |()| source.fetch_arrivals()),
            interval,
            last_fetch: None,
            latest: Vec::new(),
        }
    }

    /// The most recently fetched arrival times, kicking off a new fetch if
    /// the previous one is old enough. A failed fetch keeps the last good
    /// answer on the board.
    pub fn times(&mut self) -> &[DateTime<Utc>] {
        let due = self
            .last_fetch
            .is_none_or(|at| at.elapsed() >= self.interval);
        if due {
            self.last_fetch = Some(Instant::now());
            self.pool.submit(());
        }
        if let Some(times) = self.pool.poll_latest() {
            debug!(count = times.len(), "arrivals updated");
            self.latest = times;
        }
        &self.latest
    }
}

/// Runs an external command that prints one epoch-seconds arrival time
/// per line.
pub struct CommandArrivalSource {
    command: String,
}

impl CommandArrivalSource {
    pub fn new(command: String) -> Self {
        CommandArrivalSource { command }
    }
}

impl ArrivalSource for CommandArrivalSource {
    fn fetch_arrivals(&self) -> Result<Vec<DateTime<Utc>>> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .output()
            .with_context(|| format!("running {}", self.command))?;
        anyhow::ensure!(
            output.status.success(),
            "{} exited with {}",
            self.command,
            output.status
        );
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut times = parse_arrival_lines(&stdout)?;
        times.sort();
        Ok(times)
    }
}

fn parse_arrival_lines(text: &str) -> Result<Vec<DateTime<Utc>>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let epoch: i64 = line
                .parse()
                .with_context(|| format!("bad arrival time {line:?}"))?;
            DateTime::from_timestamp(epoch, 0)
                .with_context(|| format!("arrival time {epoch} out of range"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Vec<i64>);

    impl ArrivalSource for FixedSource {
        fn fetch_arrivals(&self) -> Result<Vec<DateTime<Utc>>> {
            Ok(self
                .0
                .iter()
                .map(|&e| DateTime::from_timestamp(e, 0).unwrap())
                .collect())
        }
    }

    struct FailingSource;

    impl ArrivalSource for FailingSource {
        fn fetch_arrivals(&self) -> Result<Vec<DateTime<Utc>>> {
            anyhow::bail!("board offline")
        }
    }

    fn wait_for_times(poller: &mut ArrivalsPoller, want: usize) -> Vec<DateTime<Utc>> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let times = poller.times().to_vec();
            if times.len() == want {
                return times;
            }
            assert!(Instant::now() < deadline, "timed out waiting for arrivals");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn fetches_and_retains_latest() {
        let mut poller =
            ArrivalsPoller::new(FixedSource(vec![100, 200]), Duration::from_secs(3600));
        let times = wait_for_times(&mut poller, 2);
        assert_eq!(times[0], DateTime::from_timestamp(100, 0).unwrap());
        // Within the interval no new fetch happens, but the answer stays.
        assert_eq!(poller.times().len(), 2);
    }

    #[test]
    fn failed_fetch_keeps_previous_answer() {
        let mut poller = ArrivalsPoller::new(FailingSource, Duration::from_secs(3600));
        std::thread::sleep(Duration::from_millis(30));
        assert!(poller.times().is_empty());
    }

    #[test]
    fn parses_one_epoch_per_line() {
        let times = parse_arrival_lines("300\n100\n\n  200  \n").unwrap();
        assert_eq!(times.len(), 3);
        assert!(parse_arrival_lines("soon\n").is_err());
    }
}
