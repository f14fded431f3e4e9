pub mod config;
pub mod errors;
pub mod events;
pub mod filters;
pub mod metrics;
pub mod results;
pub mod search;

pub use config::{CliOverrides, EncodingMode, SearchConfig, SearchMode, SearchOptions};
pub use errors::{Result, SearchError};
pub use events::{SearchEvent, SearchProgress};
pub use metrics::SearchStats;
pub use results::{format_file_size, ResultBatch, SearchResult, SearchSummary};
pub use search::{search, FilesystemAccessor, LocalFilesystem, SearchManager, SearchOutcome};
