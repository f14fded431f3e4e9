//! Concurrent directory-tree search.
//!
//! A search is a breadth-first walk that is never enumerated up front.
//! Each `SearchTask` scans exactly one directory: it matches the
//! entries it finds, hands matches to the consumer in small batches and
//! queues every subdirectory it discovers. Queued directories are picked up
//! by the next free worker, so the tree is explored by up to
//! `thread_count` tasks at once no matter how deep or wide it is.
//!
//! # Layout
//!
//! - [`manager::SearchManager`] is the public entry point. It owns the
//!   worker pool and the event channel, and runs one search generation at
//!   a time.
//! - `session` holds everything the tasks of one generation share: the
//!   pending-directory queue, the active-task count, the counters and the
//!   delivery flags. The termination rule lives there.
//! - [`pool::WorkerPool`] is a fixed-size rayon pool.
//! - `progress` samples counters on a fixed interval.
//! - [`content::ContentScanner`] reads files in chunks for content mode.
//! - [`fs::FilesystemAccessor`] abstracts listing and reading so tests can
//!   drive the engine with a slow or failing filesystem.
//!
//! # Termination
//!
//! A search completes when no task is running and the queue is empty. Both
//! are checked, and the terminal event claimed, under the same lock that
//! guards enqueueing, so a directory discovered by the last running task
//! is always either queued before the check or its task is still counted
//! as active.
//!
//! ```rust,ignore
//! let (manager, events) = SearchManager::new(SearchConfig::default())?;
//! let generation = manager.start_search("todo", "./src", SearchOptions::content())?;
//! while let Ok(event) = events.recv() {
//!     if event.generation() == generation && event.is_terminal() {
//!         break;
//!     }
//! }
//! ```

pub mod content;
pub mod engine;
pub mod fs;
pub mod manager;
pub mod matcher;
pub mod pool;
pub(crate) mod progress;
pub(crate) mod session;
pub(crate) mod task;

pub use content::{window_line, ContentScanner, LineMatch};
pub use engine::{search, SearchOutcome};
pub use fs::{EntryInfo, FilesystemAccessor, LocalFilesystem};
pub use manager::SearchManager;
pub use matcher::QueryMatcher;
pub use pool::WorkerPool;
