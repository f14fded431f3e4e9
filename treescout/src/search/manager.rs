use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::fs::{FilesystemAccessor, LocalFilesystem};
use super::matcher::QueryMatcher;
use super::pool::WorkerPool;
use super::progress::ProgressReporter;
use super::session::SearchSession;
use crate::config::{SearchConfig, SearchOptions};
use crate::errors::Result;
use crate::events::{SearchEvent, SearchProgress};
use crate::metrics::SearchStats;

struct ActiveSearch {
    session: Arc<SearchSession>,
    reporter: Option<ProgressReporter>,
}

/// Runs filesystem searches on a worker pool and streams their results.
///
/// One manager runs at most one search at a time. Starting a new search
/// stops, drains and silences the previous one first: after
/// [`SearchManager::start_search`] returns, the old generation sends
/// nothing, not even `Cancelled`. Events it sent before that are still in
/// the channel, so consumers filter on the returned generation.
///
/// ```rust,ignore
/// let (manager, events) = SearchManager::new(SearchConfig::default())?;
/// let generation = manager.start_search("readme", "/home/me", SearchOptions::file_name())?;
/// for event in events.iter().filter(|e| e.generation() == generation) {
///     match event {
///         SearchEvent::ResultsFound { batch, .. } => show(batch),
///         SearchEvent::Progress { progress, .. } => update(progress),
///         SearchEvent::Completed { .. } | SearchEvent::Cancelled { .. } => break,
///     }
/// }
/// ```
pub struct SearchManager {
    config: SearchConfig,
    pool: Arc<WorkerPool>,
    fs: Arc<dyn FilesystemAccessor>,
    events: Sender<SearchEvent>,
    generation: AtomicU64,
    current: Mutex<Option<ActiveSearch>>,
}

impl SearchManager {
    /// Creates a manager over the local filesystem and the receiving end of its event channel
    pub fn new(config: SearchConfig) -> Result<(Self, Receiver<SearchEvent>)> {
        Self::with_filesystem(config, Arc::new(LocalFilesystem))
    }

    /// Creates a manager that lists and reads through `fs`
    pub fn with_filesystem(
        config: SearchConfig,
        fs: Arc<dyn FilesystemAccessor>,
    ) -> Result<(Self, Receiver<SearchEvent>)> {
        let pool = Arc::new(WorkerPool::new(config.thread_count)?);
        let (events, receiver) = unbounded();

        info!(
            "SearchManager initialized with {} worker threads",
            pool.capacity()
        );

        let manager = Self {
            config,
            pool,
            fs,
            events,
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
        };
        Ok((manager, receiver))
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Starts searching `root` for `query` and returns the new generation.
    ///
    /// Returns as soon as the first task is queued. A search already in
    /// progress is stopped and drained first and sends nothing afterwards;
    /// events it delivered earlier stay queued under its own generation.
    pub fn start_search(
        &self,
        query: &str,
        root: impl Into<PathBuf>,
        options: SearchOptions,
    ) -> Result<u64> {
        let matcher = QueryMatcher::new(query)?;
        let root = absolute_root(root.into())?;

        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            if !previous.session.is_terminated() {
                debug!(
                    "Superseding generation {}",
                    previous.session.generation()
                );
                previous.session.suppress();
            }
            self.shutdown(previous);
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        info!(
            "Search started (generation {}): {:?} in {} ({:?} mode)",
            generation,
            query,
            root.display(),
            options.mode
        );

        let session = Arc::new(SearchSession::new(
            generation,
            matcher,
            root,
            options,
            &self.config,
            Arc::clone(&self.fs),
            Arc::clone(&self.pool),
            self.events.clone(),
        ));
        let reporter =
            ProgressReporter::spawn(Arc::clone(&session), self.config.progress_interval());
        session.start();

        *current = Some(ActiveSearch { session, reporter });
        Ok(generation)
    }

    /// Cancels the running search and waits (bounded) for its workers.
    ///
    /// Emits `Cancelled` for the running generation. Does nothing when no
    /// search is running.
    pub fn stop_search(&self) {
        self.stop_with_timeout(self.config.drain_timeout());
    }

    fn stop_with_timeout(&self, timeout: Duration) {
        let mut current = self.current.lock();
        let Some(active) = current.as_mut() else {
            return;
        };
        if active.session.is_terminated() {
            if let Some(reporter) = active.reporter.take() {
                reporter.stop();
            }
            return;
        }

        let session = Arc::clone(&active.session);
        session.request_stop();
        Self::drain(&session, timeout);
        session.emit_terminal();

        if let Some(reporter) = active.reporter.take() {
            reporter.stop();
        }
    }

    /// Stops a superseded search; its notifications are already suppressed
    fn shutdown(&self, previous: ActiveSearch) {
        let ActiveSearch { session, reporter } = previous;
        if !session.is_terminated() {
            session.request_stop();
            Self::drain(&session, self.config.drain_timeout());
            session.emit_terminal();
        }
        if let Some(reporter) = reporter {
            reporter.stop();
        }
    }

    fn drain(session: &SearchSession, timeout: Duration) {
        if !session.wait_idle(timeout) {
            warn!(
                "Abandoning {} in-flight tasks of generation {} after {:?}",
                session.active_tasks(),
                session.generation(),
                timeout
            );
        }
    }

    /// True from `start_search` until the terminal notification has been sent
    pub fn is_searching(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|active| active.session.is_active())
    }

    /// Generation of the most recently started search, if any
    pub fn current_generation(&self) -> Option<u64> {
        self.current
            .lock()
            .as_ref()
            .map(|active| active.session.generation())
    }

    /// Live counters of the most recent search
    pub fn progress(&self) -> Option<SearchProgress> {
        self.current
            .lock()
            .as_ref()
            .map(|active| active.session.counters().progress())
    }

    /// All counters of the most recent search, including skipped entries
    pub fn stats(&self) -> Option<SearchStats> {
        self.current
            .lock()
            .as_ref()
            .map(|active| active.session.counters().get_stats())
    }
}

impl Drop for SearchManager {
    fn drop(&mut self) {
        // Teardown allows in-flight workers longer than an interactive stop.
        let timeout = self.config.drain_timeout().max(Duration::from_secs(5));
        self.stop_with_timeout(timeout);
    }
}

fn absolute_root(root: PathBuf) -> Result<PathBuf> {
    if root.is_absolute() {
        Ok(root)
    } else {
        Ok(std::env::current_dir()?.join(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchOptions;
    use crate::errors::SearchError;
    use std::fs;
    use std::num::NonZeroUsize;
    use tempfile::tempdir;

    fn config(threads: usize) -> SearchConfig {
        SearchConfig {
            thread_count: NonZeroUsize::new(threads).unwrap(),
            ..SearchConfig::default()
        }
    }

    fn wait_terminal(events: &Receiver<SearchEvent>) -> SearchEvent {
        loop {
            let event = events
                .recv_timeout(Duration::from_secs(10))
                .expect("search did not finish");
            if event.is_terminal() {
                return event;
            }
        }
    }

    #[test]
    fn test_start_returns_generation() {
        let dir = tempdir().unwrap();
        let (manager, events) = SearchManager::new(config(2)).unwrap();

        let first = manager
            .start_search("x", dir.path(), SearchOptions::default())
            .unwrap();
        wait_terminal(&events);
        let second = manager
            .start_search("x", dir.path(), SearchOptions::default())
            .unwrap();
        assert_eq!(second, first + 1);
        assert_eq!(manager.current_generation(), Some(second));
        assert_eq!(wait_terminal(&events).generation(), second);
    }

    #[test]
    fn test_invalid_query() {
        let dir = tempdir().unwrap();
        let (manager, events) = SearchManager::new(config(1)).unwrap();
        let result = manager.start_search("  ", dir.path(), SearchOptions::default());
        assert!(matches!(result, Err(SearchError::InvalidQuery(_))));
        assert!(!manager.is_searching());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (manager, events) = SearchManager::new(config(1)).unwrap();
        manager.stop_search();
        manager.stop_search();
        assert!(!manager.is_searching());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_stop_after_completion_is_noop() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        let (manager, events) = SearchManager::new(config(2)).unwrap();

        manager
            .start_search("a", dir.path(), SearchOptions::default())
            .unwrap();
        assert!(matches!(
            wait_terminal(&events),
            SearchEvent::Completed { .. }
        ));
        manager.stop_search();
        assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let root = absolute_root(PathBuf::from("some/dir")).unwrap();
        assert!(root.is_absolute());
        assert!(root.ends_with("some/dir"));
    }

    #[test]
    fn test_stats_available_after_search() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("photo.png"), "hello").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let (manager, events) = SearchManager::new(config(2)).unwrap();

        manager
            .start_search("hello", dir.path(), SearchOptions::content())
            .unwrap();
        wait_terminal(&events);

        let stats = manager.stats().unwrap();
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.skipped_not_text, 1);
        assert_eq!(stats.results_found, 1);
    }
}
