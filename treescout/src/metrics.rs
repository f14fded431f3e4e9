use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::events::SearchProgress;

/// Why a file was not content-scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooLarge,
    NotText,
    Unreadable,
    NotUtf8,
}

/// Aggregate counters for one search generation.
///
/// Each counter moves independently, so plain atomics are enough; nothing
/// here takes part in the termination decision.
#[derive(Debug, Default)]
pub struct SearchCounters {
    files_processed: AtomicU64,
    directories_processed: AtomicU64,
    results_found: AtomicU64,

    skipped_too_large: AtomicU64,
    skipped_not_text: AtomicU64,
    skipped_unreadable: AtomicU64,
    skipped_not_utf8: AtomicU64,
    unreadable_directories: AtomicU64,
}

impl SearchCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds to the processed totals
    pub fn increment(&self, files: u64, directories: u64) {
        if files > 0 {
            self.files_processed.fetch_add(files, Ordering::Relaxed);
        }
        if directories > 0 {
            self.directories_processed
                .fetch_add(directories, Ordering::Relaxed);
        }
    }

    pub fn record_results(&self, count: usize) {
        self.results_found.fetch_add(count as u64, Ordering::AcqRel);
    }

    pub fn record_skip(&self, reason: SkipReason) {
        let counter = match reason {
            SkipReason::TooLarge => &self.skipped_too_large,
            SkipReason::NotText => &self.skipped_not_text,
            SkipReason::Unreadable => &self.skipped_unreadable,
            SkipReason::NotUtf8 => &self.skipped_not_utf8,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unreadable_directory(&self) {
        self.unreadable_directories.fetch_add(1, Ordering::Relaxed);
    }

    pub fn results_found(&self) -> u64 {
        self.results_found.load(Ordering::Acquire)
    }

    /// Current progress snapshot
    pub fn progress(&self) -> SearchProgress {
        SearchProgress {
            files_processed: self.files_processed.load(Ordering::Relaxed),
            directories_processed: self.directories_processed.load(Ordering::Relaxed),
        }
    }

    pub fn get_stats(&self) -> SearchStats {
        let progress = self.progress();
        SearchStats {
            files_processed: progress.files_processed,
            directories_processed: progress.directories_processed,
            results_found: self.results_found(),
            skipped_too_large: self.skipped_too_large.load(Ordering::Relaxed),
            skipped_not_text: self.skipped_not_text.load(Ordering::Relaxed),
            skipped_unreadable: self.skipped_unreadable.load(Ordering::Relaxed),
            skipped_not_utf8: self.skipped_not_utf8.load(Ordering::Relaxed),
            unreadable_directories: self.unreadable_directories.load(Ordering::Relaxed),
        }
    }

    /// Logs the final counters for a generation
    pub fn log_stats(&self, generation: u64) {
        let stats = self.get_stats();
        info!(
            generation,
            files = stats.files_processed,
            directories = stats.directories_processed,
            results = stats.results_found,
            "Search statistics"
        );
        debug!(
            "Skipped files (too large/not text/unreadable/not utf-8): {}/{}/{}/{}, unreadable directories: {}",
            stats.skipped_too_large,
            stats.skipped_not_text,
            stats.skipped_unreadable,
            stats.skipped_not_utf8,
            stats.unreadable_directories
        );
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub files_processed: u64,
    pub directories_processed: u64,
    pub results_found: u64,
    pub skipped_too_large: u64,
    pub skipped_not_text: u64,
    pub skipped_unreadable: u64,
    pub skipped_not_utf8: u64,
    pub unreadable_directories: u64,
}
