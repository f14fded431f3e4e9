use rayon::{ThreadPool, ThreadPoolBuilder};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use crate::errors::Result;

/// Bounded set of worker threads that run search tasks.
///
/// Each thread runs one task to completion before picking up the next.
/// The pool itself never decides what to run; sessions hand it work only
/// while they are below [`WorkerPool::capacity`] active tasks.
#[derive(Debug)]
pub struct WorkerPool {
    pool: ThreadPool,
    capacity: usize,
    running: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(threads: NonZeroUsize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.get())
            .thread_name(|i| format!("treescout-worker-{}", i))
            .panic_handler(|_| error!("Search worker panicked outside a task boundary"))
            .build()?;

        debug!("Worker pool initialized with {} threads", threads.get());
        Ok(Self {
            pool,
            capacity: threads.get(),
            running: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Maximum number of tasks that execute at the same time
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of jobs currently executing on a worker thread
    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Queues `job` for execution; never runs it on the calling thread
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let running = Arc::clone(&self.running);
        self.pool.spawn(move || {
            running.fetch_add(1, Ordering::AcqRel);
            let _guard = RunningGuard(running);
            job();
        });
    }
}

struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};
    use std::time::Duration;

    #[test]
    fn test_capacity() {
        let pool = WorkerPool::new(NonZeroUsize::new(3).unwrap()).unwrap();
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.running(), 0);
    }

    #[test]
    fn test_spawn_runs_jobs() {
        let pool = WorkerPool::new(NonZeroUsize::new(2).unwrap()).unwrap();
        let (tx, rx) = unbounded();
        for i in 0..10 {
            let tx = tx.clone();
            pool.spawn(move || {
                tx.send(i).unwrap();
            });
        }
        let mut seen: Vec<i32> = (0..10)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_running_count() {
        let pool = WorkerPool::new(NonZeroUsize::new(1).unwrap()).unwrap();
        let (started_tx, started_rx) = bounded(1);
        let (release_tx, release_rx) = bounded::<()>(1);
        pool.spawn(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });

        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(pool.running(), 1);
        release_tx.send(()).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while pool.running() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(pool.running(), 0);
    }
}
