//! Shared state of one search generation.
//!
//! The pending-directory queue and the active-task count live under a
//! single lock. Every decision that reads one and writes the other
//! (dispatching queued work, retiring a finished task, declaring the walk
//! over) happens inside that lock, so a task that sees an empty queue
//! cannot declare completion while a sibling is between discovering a
//! directory and queueing it, and two finishing tasks cannot both claim
//! the same free slot.
//!
//! Delivery to the consumer goes through a second, independent lock that
//! also carries the terminated/suppressed flags. The two locks are never
//! held at the same time.

use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

use super::content::ContentScanner;
use super::fs::FilesystemAccessor;
use super::matcher::QueryMatcher;
use super::pool::WorkerPool;
use super::task::SearchTask;
use crate::config::{SearchConfig, SearchMode, SearchOptions};
use crate::events::{SearchEvent, SearchProgress};
use crate::metrics::SearchCounters;
use crate::results::ResultBatch;

/// Per-task tuning copied out of [`SearchConfig`]
#[derive(Debug, Clone, Copy)]
pub(crate) struct TaskLimits {
    pub batch_size: usize,
    pub progress_file_step: usize,
}

#[derive(Debug, Default)]
struct SchedulerState {
    /// Directories discovered but not yet handed to a task
    pending: VecDeque<PathBuf>,
    /// Tasks dispatched to the pool and not yet finished
    active: usize,
    /// Set once, by whoever observes `active == 0` with nothing pending
    finishing: bool,
}

#[derive(Debug, Default)]
struct DeliveryState {
    terminated: bool,
    suppressed: bool,
}

/// Everything the tasks of one generation share
pub(crate) struct SearchSession {
    generation: u64,
    root: PathBuf,
    options: SearchOptions,
    matcher: QueryMatcher,
    scanner: Option<ContentScanner>,
    limits: TaskLimits,
    fs: Arc<dyn FilesystemAccessor>,
    pool: Arc<WorkerPool>,
    counters: SearchCounters,
    stop: AtomicBool,
    faulted: AtomicBool,
    started: Instant,
    scheduler: Mutex<SchedulerState>,
    idle: Condvar,
    delivery: Mutex<DeliveryState>,
    events: Sender<SearchEvent>,
}

impl SearchSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        generation: u64,
        matcher: QueryMatcher,
        root: PathBuf,
        options: SearchOptions,
        config: &SearchConfig,
        fs: Arc<dyn FilesystemAccessor>,
        pool: Arc<WorkerPool>,
        events: Sender<SearchEvent>,
    ) -> Self {
        let scanner = (options.mode == SearchMode::Content).then(|| {
            ContentScanner::new(
                matcher.clone(),
                config.max_results_per_file.get(),
                config.line_window,
                config.encoding_mode,
            )
        });

        Self {
            generation,
            root,
            options,
            matcher,
            scanner,
            limits: TaskLimits {
                batch_size: config.batch_size.get(),
                progress_file_step: config.progress_file_step.get(),
            },
            fs,
            pool,
            counters: SearchCounters::new(),
            stop: AtomicBool::new(false),
            faulted: AtomicBool::new(false),
            started: Instant::now(),
            scheduler: Mutex::new(SchedulerState::default()),
            idle: Condvar::new(),
            delivery: Mutex::new(DeliveryState::default()),
            events,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub(crate) fn matcher(&self) -> &QueryMatcher {
        &self.matcher
    }

    pub(crate) fn scanner(&self) -> Option<&ContentScanner> {
        self.scanner.as_ref()
    }

    pub(crate) fn limits(&self) -> TaskLimits {
        self.limits
    }

    pub(crate) fn fs(&self) -> &dyn FilesystemAccessor {
        self.fs.as_ref()
    }

    pub(crate) fn counters(&self) -> &SearchCounters {
        &self.counters
    }

    /// Seeds the queue with the root and launches the first task
    pub(crate) fn start(self: &Arc<Self>) {
        let mut state = self.scheduler.lock();
        state.pending.push_back(self.root.clone());
        self.dispatch(&mut state);
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Queues a discovered directory, starting a task for it if a slot is free
    pub(crate) fn enqueue_directory(self: &Arc<Self>, path: PathBuf) {
        if self.should_stop() {
            return;
        }
        let mut state = self.scheduler.lock();
        state.pending.push_back(path);
        self.dispatch(&mut state);
    }

    /// Hands queued directories to the pool until it is saturated.
    /// Must be called with the scheduler lock held.
    fn dispatch(self: &Arc<Self>, state: &mut SchedulerState) {
        while state.active < self.pool.capacity() && !self.should_stop() {
            let Some(dir) = state.pending.pop_front() else {
                break;
            };
            state.active += 1;
            trace!("Dispatching {} ({} active)", dir.display(), state.active);

            let session = Arc::clone(self);
            self.pool.spawn(move || SearchTask::new(session, dir).run());
        }
    }

    /// Retires one task. Either hands its slot to queued work or, when the
    /// last task leaves an empty queue, emits the terminal notification.
    pub(crate) fn task_finished(self: &Arc<Self>) {
        let finished = {
            let mut state = self.scheduler.lock();
            state.active = state.active.saturating_sub(1);

            if self.should_stop() {
                state.pending.clear();
            } else {
                self.dispatch(&mut state);
            }

            if state.active == 0 && state.pending.is_empty() && !state.finishing {
                state.finishing = true;
                true
            } else {
                false
            }
        };

        self.idle.notify_all();
        if finished {
            self.emit_terminal();
        }
    }

    /// Adds to the processed-entry totals
    pub(crate) fn increment_counters(&self, files: usize, directories: usize) {
        self.counters.increment(files as u64, directories as u64);
    }

    /// Delivers a batch unless the search was stopped, superseded or already finished
    pub(crate) fn report_results(&self, batch: ResultBatch) {
        if batch.is_empty() {
            return;
        }
        let delivery = self.delivery.lock();
        if delivery.terminated || delivery.suppressed || self.should_stop() {
            return;
        }
        self.counters.record_results(batch.len());
        let _ = self.events.send(SearchEvent::ResultsFound {
            generation: self.generation,
            batch,
        });
    }

    /// Sends a progress snapshot. Returns false once nothing more may be sent.
    pub(crate) fn emit_progress(&self) -> bool {
        let delivery = self.delivery.lock();
        if delivery.terminated || delivery.suppressed {
            return false;
        }
        self.events
            .send(SearchEvent::Progress {
                generation: self.generation,
                progress: self.counters.progress(),
            })
            .is_ok()
    }

    /// Sends `Completed` or `Cancelled`, at most once per session
    pub(crate) fn emit_terminal(&self) -> bool {
        let mut delivery = self.delivery.lock();
        if delivery.terminated {
            return false;
        }
        delivery.terminated = true;

        let elapsed = self.started.elapsed();
        self.counters.log_stats(self.generation);

        if delivery.suppressed {
            debug!("Generation {} superseded after {:?}", self.generation, elapsed);
            return false;
        }

        if self.should_stop() || self.faulted.load(Ordering::Acquire) {
            info!("Search cancelled (generation {}) after {:?}", self.generation, elapsed);
            let _ = self.events.send(SearchEvent::Cancelled {
                generation: self.generation,
            });
        } else {
            let total_results = self.counters.results_found() as usize;
            info!(
                "Search completed (generation {}): {} results in {:?}",
                self.generation, total_results, elapsed
            );
            let _ = self.events.send(SearchEvent::Progress {
                generation: self.generation,
                progress: self.counters.progress(),
            });
            let _ = self.events.send(SearchEvent::Completed {
                generation: self.generation,
                total_results,
            });
        }
        true
    }

    /// Sets the stop flag and drops queued directories
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        let mut state = self.scheduler.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        debug!(
            "Stop requested for generation {} ({} queued directories dropped, {} active)",
            self.generation, dropped, state.active
        );
    }

    /// Silences every later notification of this session
    pub(crate) fn suppress(&self) {
        self.delivery.lock().suppressed = true;
    }

    /// Records a fault caught at a task boundary; the search ends as cancelled
    pub(crate) fn record_fault(&self, dir: &Path, message: &str) {
        error!(
            "Search task for {} failed: {}; cancelling generation {}",
            dir.display(),
            message,
            self.generation
        );
        self.faulted.store(true, Ordering::Release);
        self.request_stop();
    }

    /// Waits until no task of this session is active. Returns false on timeout.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.scheduler.lock();
        while state.active > 0 {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return state.active == 0;
            }
        }
        true
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.delivery.lock().terminated
    }

    /// Number of tasks dispatched and not yet finished
    pub(crate) fn active_tasks(&self) -> usize {
        self.scheduler.lock().active
    }

    /// True while any of active tasks, queued directories or busy pool
    /// threads indicates the walk is still in progress
    pub(crate) fn is_active(&self) -> bool {
        if self.is_terminated() {
            return false;
        }
        let state = self.scheduler.lock();
        state.active > 0 || !state.pending.is_empty() || state.finishing || self.pool.running() > 0
    }
}
