use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{error, warn};

enum Job<Req> {
    Run(Req),
    Terminate,
}

/// Hands requests to a fixed set of worker threads and makes the results
/// available to the submitting thread.
///
/// `submit` never blocks. A response may never arrive for a given request:
/// if the work function fails, the error is logged and the response is
/// simply dropped, so callers must not assume one response per request.
pub struct TaskPool<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    req_tx: Sender<Job<Req>>,
    // Kept so queued-but-not-started jobs can be discarded.
    req_rx: Receiver<Job<Req>>,
    res_rx: Receiver<Res>,
    workers: Vec<JoinHandle<()>>,
}

impl<Req, Res> TaskPool<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Start `worker_count` threads, each running `work` on every request
    /// it pulls off the queue.
    pub fn new<F>(name: &str, worker_count: usize, work: F) -> Self
    where
        F: Fn(Req) -> Result<Res> + Send + Sync + 'static,
    {
        let (req_tx, req_rx) = unbounded::<Job<Req>>();
        let (res_tx, res_rx) = unbounded::<Res>();
        let work = Arc::new(work);

        let workers = (0..worker_count)
            .map(|i| {
                let req_rx = req_rx.clone();
                let res_tx = res_tx.clone();
                let work = Arc::clone(&work);
                std::thread::Builder::new()
                    .name(format!("{name}-{i}"))
                    .spawn(move || worker_loop(&req_rx, &res_tx, work.as_ref()))
                    .expect("spawning pool worker thread")
            })
            .collect();

        TaskPool {
            req_tx,
            req_rx,
            res_rx,
            workers,
        }
    }

    /// Enqueue a request. Returns immediately.
    pub fn submit(&self, request: Req) {
        // Send only fails once the workers are gone, i.e. during drop.
        let _ = self.req_tx.send(Job::Run(request));
    }

    /// The oldest completed response, if any. Never blocks.
    pub fn poll_one(&self) -> Option<Res> {
        self.res_rx.try_recv().ok()
    }

    /// Drain all completed responses and return only the most recent,
    /// discarding the rest. For pollers where only the freshest answer
    /// matters.
    pub fn poll_latest(&self) -> Option<Res> {
        let mut latest = None;
        while let Ok(response) = self.res_rx.try_recv() {
            latest = Some(response);
        }
        latest
    }

    /// Discard requests that are queued but not yet started. Call before
    /// `submit` to keep at most one request queued at a time.
    ///
    /// This assumes discarded work has no required side effect (true for
    /// decode and poll tasks; revisit before reusing the pool for work
    /// that must not be lost).
    pub fn clear_pending(&self) {
        while let Ok(job) = self.req_rx.try_recv() {
            if matches!(job, Job::Terminate) {
                // Not ours to discard; put the shutdown signal back.
                let _ = self.req_tx.send(Job::Terminate);
            }
        }
    }
}

impl<Req, Res> Drop for TaskPool<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    fn drop(&mut self) {
        self.clear_pending();
        for _ in &self.workers {
            let _ = self.req_tx.send(Job::Terminate);
        }
        // Blocks until every worker finishes its current task.
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("pool worker panicked");
            }
        }
    }
}

fn worker_loop<Req, Res, F>(req_rx: &Receiver<Job<Req>>, res_tx: &Sender<Res>, work: &F)
where
    F: Fn(Req) -> Result<Res>,
{
    while let Ok(job) = req_rx.recv() {
        match job {
            Job::Run(request) => match work(request) {
                Ok(response) => {
                    if res_tx.send(response).is_err() {
                        break;
                    }
                }
                Err(err) => error!("pool task failed: {err:#}"),
            },
            Job::Terminate => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::time::{Duration, Instant};

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for pool");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn responses_arrive_in_submission_order() {
        let pool: TaskPool<i32, i32> = TaskPool::new("double", 1, |n| Ok(n * 2));
        pool.submit(1);
        pool.submit(2);
        pool.submit(3);

        wait_until(|| pool.res_rx.len() == 3);
        assert_eq!(pool.poll_one(), Some(2));
        assert_eq!(pool.poll_one(), Some(4));
        assert_eq!(pool.poll_one(), Some(6));
        assert_eq!(pool.poll_one(), None);
    }

    #[test]
    fn poll_latest_keeps_only_newest() {
        let pool: TaskPool<i32, i32> = TaskPool::new("latest", 1, |n| Ok(n));
        pool.submit(1);
        pool.submit(2);
        pool.submit(3);

        wait_until(|| pool.res_rx.len() == 3);
        assert_eq!(pool.poll_latest(), Some(3));
        assert_eq!(pool.poll_latest(), None);
    }

    #[test]
    fn failed_task_produces_no_response() {
        let pool: TaskPool<i32, i32> = TaskPool::new("flaky", 1, |n| {
            if n % 2 == 1 {
                bail!("odd input");
            }
            Ok(n)
        });
        pool.submit(1);
        pool.submit(2);

        wait_until(|| pool.res_rx.len() == 1);
        assert_eq!(pool.poll_one(), Some(2));
        assert_eq!(pool.poll_one(), None);
    }

    #[test]
    fn drop_discards_queued_work_and_joins() {
        let (gate_tx, gate_rx) = unbounded::<()>();
        let (started_tx, started_rx) = unbounded::<()>();
        let (done_tx, done_rx) = unbounded::<i32>();
        let pool: TaskPool<i32, i32> = TaskPool::new("teardown", 1, move |n| {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap();
            done_tx.send(n).unwrap();
            Ok(n)
        });

        pool.submit(1);
        started_rx.recv().unwrap(); // worker is mid-task
        pool.submit(2);
        pool.submit(3);

        // Unblock the worker only after drop has started tearing down.
        let opener = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            gate_tx.send(()).unwrap();
        });
        drop(pool); // drains the queue, then joins
        opener.join().unwrap();

        assert_eq!(done_rx.try_recv(), Ok(1));
        assert!(done_rx.try_recv().is_err(), "queued work was discarded");
    }

    #[test]
    fn clear_pending_discards_queued_requests() {
        let (gate_tx, gate_rx) = unbounded::<()>();
        let (started_tx, started_rx) = unbounded::<()>();
        let pool: TaskPool<i32, i32> = TaskPool::new("gated", 1, move |n| {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap();
            Ok(n)
        });

        pool.submit(1);
        started_rx.recv().unwrap(); // worker is now mid-task
        pool.submit(2);
        pool.submit(3);
        pool.clear_pending();
        gate_tx.send(()).unwrap();

        wait_until(|| pool.res_rx.len() == 1);
        assert_eq!(pool.poll_one(), Some(1));
        // 2 and 3 were discarded before they started.
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(pool.poll_one(), None);
    }
}
