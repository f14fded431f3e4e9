use std::path::PathBuf;
use tracing::debug;

use super::manager::SearchManager;
use crate::config::{SearchConfig, SearchOptions};
use crate::errors::Result;
use crate::events::{SearchEvent, SearchProgress};
use crate::results::SearchSummary;

/// Everything a blocking search produced
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub summary: SearchSummary,
    /// Last progress snapshot received
    pub progress: SearchProgress,
    /// False when the search ended as cancelled
    pub completed: bool,
}

/// Runs one search to the end on a fresh manager and collects every batch.
///
/// Convenience wrapper for callers that do not need streaming; results
/// arrive in the summary in the order the workers delivered them.
pub fn search(
    config: SearchConfig,
    query: &str,
    root: impl Into<PathBuf>,
    options: SearchOptions,
) -> Result<SearchOutcome> {
    let (manager, events) = SearchManager::new(config)?;
    let generation = manager.start_search(query, root, options)?;

    let mut outcome = SearchOutcome::default();
    for event in events.iter() {
        match event {
            SearchEvent::ResultsFound { batch, .. } => outcome.summary.add_batch(batch),
            SearchEvent::Progress { progress, .. } => outcome.progress = progress,
            SearchEvent::Completed { total_results, .. } => {
                debug!(
                    "Generation {} collected {} of {} results",
                    generation, outcome.summary.total_results, total_results
                );
                outcome.completed = true;
                break;
            }
            SearchEvent::Cancelled { .. } => break,
        }
    }

    Ok(outcome)
}
