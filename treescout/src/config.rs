use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::Result;

/// Upper bound on the default worker count, regardless of core count.
pub const MAX_DEFAULT_THREADS: usize = 8;

/// Default ceiling on the size of a file we are willing to scan (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Engine-wide configuration for a [`crate::SearchManager`].
///
/// These settings live for as long as the manager does. Anything that may
/// change from one search to the next belongs in [`SearchOptions`] instead.
///
/// # Configuration Locations
///
/// Loaded from, in order of increasing precedence:
/// 1. Global `$CONFIG_DIR/treescout/config.yaml`
/// 2. Local `.treescout.yaml` in the current directory
/// 3. A file passed explicitly via `--config`
///
/// Command-line flags are merged on top with [`SearchConfig::merge_with_cli`].
///
/// # Configuration Format
///
/// ```yaml
/// # Worker threads (default: min(8, CPU cores))
/// thread_count: 4
///
/// # Results per delivered batch
/// batch_size: 15
///
/// # Files between partial progress increments
/// progress_file_step: 100
///
/// # Progress sampling period in milliseconds
/// progress_interval_ms: 300
///
/// # Content matches kept per file
/// max_results_per_file: 3
///
/// # Matched lines longer than this are windowed around the match
/// line_window: 150
///
/// # How long stop_search waits for in-flight workers
/// drain_timeout_ms: 2000
///
/// # Default size ceiling for content scanning, in bytes
/// default_max_file_size: 10485760
///
/// # failfast (skip files that are not UTF-8) or lossy
/// encoding_mode: failfast
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "warn"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of worker threads in the pool
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Number of results accumulated before a batch is delivered
    #[serde(default = "default_batch_size")]
    pub batch_size: NonZeroUsize,

    /// Number of files a task processes between partial progress increments
    #[serde(default = "default_progress_file_step")]
    pub progress_file_step: NonZeroUsize,

    /// Interval between progress snapshots, in milliseconds
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Maximum number of content matches recorded for a single file
    #[serde(default = "default_max_results_per_file")]
    pub max_results_per_file: NonZeroUsize,

    /// Matched lines longer than this many characters are truncated
    #[serde(default = "default_line_window")]
    pub line_window: usize,

    /// Bounded wait used when draining the pool, in milliseconds
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Size ceiling applied by front ends that do not choose their own
    #[serde(default = "default_max_file_size")]
    pub default_max_file_size: u64,

    /// How file contents that are not valid UTF-8 are handled
    #[serde(default)]
    pub encoding_mode: EncodingMode,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// What the content scanner does with bytes that are not valid UTF-8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Abandon the file; it contributes no matches
    #[default]
    FailFast,
    /// Replace invalid sequences with U+FFFD and keep scanning
    Lossy,
}

/// Whether a search matches entry names or file contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    FileName,
    Content,
}

/// Per-search options, fixed for the lifetime of one search generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub mode: SearchMode,

    /// Files larger than this are never opened in content mode
    pub max_scannable_file_size: u64,

    /// Replaces the built-in list of text extensions when set
    #[serde(default)]
    pub text_extensions: Option<Vec<String>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::FileName,
            max_scannable_file_size: DEFAULT_MAX_FILE_SIZE,
            text_extensions: None,
        }
    }
}

impl SearchOptions {
    pub fn file_name() -> Self {
        Self::default()
    }

    pub fn content() -> Self {
        Self {
            mode: SearchMode::Content,
            ..Self::default()
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_scannable_file_size = bytes;
        self
    }
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get().clamp(1, MAX_DEFAULT_THREADS)).unwrap_or(NonZeroUsize::MIN)
}

fn default_batch_size() -> NonZeroUsize {
    NonZeroUsize::new(15).unwrap_or(NonZeroUsize::MIN)
}

fn default_progress_file_step() -> NonZeroUsize {
    NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN)
}

fn default_progress_interval_ms() -> u64 {
    300
}

fn default_max_results_per_file() -> NonZeroUsize {
    NonZeroUsize::new(3).unwrap_or(NonZeroUsize::MIN)
}

fn default_line_window() -> usize {
    150
}

fn default_drain_timeout_ms() -> u64 {
    2000
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            thread_count: default_thread_count(),
            batch_size: default_batch_size(),
            progress_file_step: default_progress_file_step(),
            progress_interval_ms: default_progress_interval_ms(),
            max_results_per_file: default_max_results_per_file(),
            line_window: default_line_window(),
            drain_timeout_ms: default_drain_timeout_ms(),
            default_max_file_size: default_max_file_size(),
            encoding_mode: EncodingMode::default(),
            log_level: default_log_level(),
        }
    }
}

impl SearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus an explicit file.
    ///
    /// An explicit file that does not exist is an error; the default
    /// locations are simply skipped when absent.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("treescout/config.yaml")),
            Some(PathBuf::from(".treescout.yaml")),
        ];

        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Merges command-line overrides into values loaded from files
    pub fn merge_with_cli(mut self, overrides: CliOverrides) -> Self {
        if let Some(threads) = overrides.thread_count {
            self.thread_count = threads;
        }
        if let Some(size) = overrides.default_max_file_size {
            self.default_max_file_size = size;
        }
        if let Some(mode) = overrides.encoding_mode {
            self.encoding_mode = mode;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        self
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Values a front end may override on top of file-based configuration.
/// `None` leaves the loaded value in place.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub thread_count: Option<NonZeroUsize>,
    pub default_max_file_size: Option<u64>,
    pub encoding_mode: Option<EncodingMode>,
    pub log_level: Option<String>,
}
