use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::trace;

use super::content::LineMatch;
use super::fs::EntryInfo;
use super::session::SearchSession;
use crate::config::SearchMode;
use crate::errors::SearchError;
use crate::filters::{file_type_label, is_text_file};
use crate::metrics::SkipReason;
use crate::results::{ResultBatch, SearchResult};

/// Scans a single directory, non-recursively.
///
/// Subdirectories are not descended into here; they are queued on the
/// session so that any free worker can pick them up. Whatever happens
/// inside the scan, the task always reports itself finished exactly once.
pub(crate) struct SearchTask {
    session: Arc<SearchSession>,
    dir: PathBuf,
}

impl SearchTask {
    pub(crate) fn new(session: Arc<SearchSession>, dir: PathBuf) -> Self {
        Self { session, dir }
    }

    pub(crate) fn run(self) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.scan()));
        if let Err(payload) = outcome {
            self.session.record_fault(&self.dir, &panic_message(payload.as_ref()));
        }
        self.session.task_finished();
    }

    fn scan(&self) {
        let session = &self.session;
        if session.should_stop() {
            return;
        }

        let entries = match session.fs().list_entries(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                trace!("Skipping unreadable directory {}: {}", self.dir.display(), err);
                session.counters().record_unreadable_directory();
                return;
            }
        };
        trace!("Scanning {} ({} entries)", self.dir.display(), entries.len());

        let limits = session.limits();
        let mode = session.options().mode;
        let mut batch = Batch::new(session, limits.batch_size);
        let mut unreported_files = 0;

        for entry in &entries {
            if session.should_stop() {
                session.increment_counters(unreported_files, 0);
                return;
            }

            if entry.is_dir {
                if mode == SearchMode::FileName && session.matcher().is_match(&entry.name) {
                    batch.push(name_result(entry));
                }
                // Symlinked directories are reported but never walked into.
                if !entry.is_symlink {
                    session.enqueue_directory(entry.path.clone());
                }
                continue;
            }

            unreported_files += 1;
            match mode {
                SearchMode::FileName => {
                    if session.matcher().is_match(&entry.name) {
                        batch.push(name_result(entry));
                    }
                }
                SearchMode::Content => {
                    for line in self.scan_contents(entry) {
                        batch.push(line_result(entry, line));
                    }
                }
            }

            if unreported_files == limits.progress_file_step {
                session.increment_counters(unreported_files, 0);
                unreported_files = 0;
            }
        }

        batch.flush();
        session.increment_counters(unreported_files, 1);
    }

    /// Matching lines of one file; any failure yields nothing
    fn scan_contents(&self, entry: &EntryInfo) -> Vec<LineMatch> {
        let session = &self.session;
        let Some(scanner) = session.scanner() else {
            return Vec::new();
        };
        let options = session.options();

        if entry.size > options.max_scannable_file_size {
            session.counters().record_skip(SkipReason::TooLarge);
            return Vec::new();
        }
        if !is_text_file(&entry.path, options.text_extensions.as_deref()) {
            session.counters().record_skip(SkipReason::NotText);
            return Vec::new();
        }

        let reader = match session.fs().open_for_read(&entry.path) {
            Ok(reader) => reader,
            Err(err) => {
                trace!("Cannot open {}: {}", entry.path.display(), err);
                session.counters().record_skip(SkipReason::Unreadable);
                return Vec::new();
            }
        };

        match scanner.scan(&entry.path, reader, || session.should_stop()) {
            Ok(matches) => matches,
            Err(err) => {
                trace!("Abandoning {}: {}", entry.path.display(), err);
                let reason = match err {
                    SearchError::EncodingError { .. } => SkipReason::NotUtf8,
                    _ => SkipReason::Unreadable,
                };
                session.counters().record_skip(reason);
                Vec::new()
            }
        }
    }
}

/// Local result buffer, delivered whenever it reaches the batch size
struct Batch<'a> {
    session: &'a SearchSession,
    items: ResultBatch,
    limit: usize,
}

impl<'a> Batch<'a> {
    fn new(session: &'a SearchSession, limit: usize) -> Self {
        Self {
            session,
            items: Vec::with_capacity(limit),
            limit,
        }
    }

    fn push(&mut self, result: SearchResult) {
        self.items.push(result);
        if self.items.len() >= self.limit {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if !self.items.is_empty() {
            let full = mem::replace(&mut self.items, Vec::with_capacity(self.limit));
            self.session.report_results(full);
        }
    }
}

fn name_result(entry: &EntryInfo) -> SearchResult {
    SearchResult {
        file_name: entry.name.clone(),
        path: entry.path.clone(),
        size: entry.size,
        file_type: file_type_label(&entry.path, entry.is_dir, entry.is_symlink),
        last_modified: entry.last_modified,
        is_directory: entry.is_dir,
        line_number: None,
        matched_line: None,
    }
}

fn line_result(entry: &EntryInfo, line: LineMatch) -> SearchResult {
    SearchResult {
        line_number: Some(line.line_number),
        matched_line: Some(line.text),
        ..name_result(entry)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
