//! Search result types.
//!
//! A [`SearchResult`] is an immutable value record. Tasks build them, move
//! them into a [`ResultBatch`], and the batch is handed to the consumer by
//! value; nothing in the engine keeps a reference once a batch is sent.
//!
//! [`SearchSummary`] is the consumer-side counterpart: it folds delivered
//! batches into running totals so a front end (or a test) can check that
//! the completion count matches what actually arrived.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::SystemTime;

/// A single match: an entry whose name matched, or one matching line of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Final path component
    pub file_name: String,
    /// Absolute path of the entry
    pub path: PathBuf,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Coarse type label, e.g. "RS File", "Folder" or "Shortcut"
    pub file_type: String,
    /// Last modification time, when the filesystem reports one
    pub last_modified: Option<SystemTime>,
    pub is_directory: bool,
    /// 1-based line number of a content match
    pub line_number: Option<usize>,
    /// Trimmed (and possibly windowed) text of the matching line
    pub matched_line: Option<String>,
}

impl SearchResult {
    /// True when this result came from a content scan
    pub fn is_content_match(&self) -> bool {
        self.line_number.is_some()
    }
}

/// Results produced by one task, in directory-listing order
pub type ResultBatch = Vec<SearchResult>;

/// Running totals over delivered batches
#[derive(Debug, Clone, Default)]
pub struct SearchSummary {
    /// Every result received, in delivery order
    pub results: Vec<SearchResult>,
    /// Number of batches received
    pub batches: usize,
    /// Total number of results across all batches
    pub total_results: usize,
    /// Number of distinct paths with at least one result
    pub paths_with_matches: usize,
    seen_paths: HashSet<PathBuf>,
}

impl SearchSummary {
    /// Creates a new empty summary
    pub fn new() -> Self {
        Default::default()
    }

    /// Folds one delivered batch into the summary
    pub fn add_batch(&mut self, batch: ResultBatch) {
        self.batches += 1;
        for result in batch {
            self.push(result);
        }
    }

    /// Merges another summary into this one
    pub fn merge(&mut self, other: SearchSummary) {
        self.batches += other.batches;
        for result in other.results {
            self.push(result);
        }
    }

    fn push(&mut self, result: SearchResult) {
        if self.seen_paths.insert(result.path.clone()) {
            self.paths_with_matches += 1;
        }
        self.total_results += 1;
        self.results.push(result);
    }

    pub fn is_empty(&self) -> bool {
        self.total_results == 0
    }
}

/// Formats a byte count the way file managers do: "512 bytes", "1.5 KB", ...
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.1} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.1} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.1} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_match(path: &str) -> SearchResult {
        let path = PathBuf::from(path);
        SearchResult {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path,
            size: 10,
            file_type: "TXT File".to_string(),
            last_modified: None,
            is_directory: false,
            line_number: None,
            matched_line: None,
        }
    }

    fn line_match(path: &str, line: usize) -> SearchResult {
        SearchResult {
            line_number: Some(line),
            matched_line: Some("hello".to_string()),
            ..name_match(path)
        }
    }

    #[test]
    fn test_result_kind() {
        assert!(!name_match("/a/readme.md").is_content_match());
        assert!(line_match("/a/b.txt", 1).is_content_match());
    }

    #[test]
    fn test_summary_new() {
        let summary = SearchSummary::new();
        assert!(summary.is_empty());
        assert_eq!(summary.batches, 0);
        assert_eq!(summary.paths_with_matches, 0);
    }

    #[test]
    fn test_summary_add_batch() {
        let mut summary = SearchSummary::new();
        summary.add_batch(vec![
            line_match("/a/b.txt", 1),
            line_match("/a/b.txt", 7),
            line_match("/a/c.txt", 2),
        ]);
        summary.add_batch(vec![line_match("/a/b.txt", 9)]);

        assert_eq!(summary.batches, 2);
        assert_eq!(summary.total_results, 4);
        assert_eq!(summary.paths_with_matches, 2);
        assert_eq!(summary.results[1].line_number, Some(7));
    }

    #[test]
    fn test_summary_merge() {
        let mut first = SearchSummary::new();
        first.add_batch(vec![name_match("/x/readme.md")]);

        let mut second = SearchSummary::new();
        second.add_batch(vec![name_match("/y/README"), name_match("/x/readme.md")]);

        first.merge(second);
        assert_eq!(first.batches, 2);
        assert_eq!(first.total_results, 3);
        assert_eq!(first.paths_with_matches, 2);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 bytes");
        assert_eq!(format_file_size(512), "512 bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10.0 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
