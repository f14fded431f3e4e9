//! Notifications delivered from a running search to its consumer.
//!
//! Every event is tagged with the generation returned by
//! [`crate::SearchManager::start_search`]. A superseded generation sends
//! nothing more once the next search has started, but events it delivered
//! earlier may still be waiting in the channel. Consumers must drop every
//! event whose generation is not the one they are waiting for.

use serde::{Deserialize, Serialize};

use crate::results::ResultBatch;

/// Sampled aggregate counters. Both fields only ever grow within a generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchProgress {
    pub files_processed: u64,
    pub directories_processed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    /// A batch of matches from one task
    ResultsFound { generation: u64, batch: ResultBatch },
    /// Periodic progress snapshot
    Progress {
        generation: u64,
        progress: SearchProgress,
    },
    /// The walk finished; `total_results` equals the sum of delivered batch sizes
    Completed { generation: u64, total_results: usize },
    /// The search was stopped, or hit an internal fault
    Cancelled { generation: u64 },
}

impl SearchEvent {
    pub fn generation(&self) -> u64 {
        match self {
            SearchEvent::ResultsFound { generation, .. }
            | SearchEvent::Progress { generation, .. }
            | SearchEvent::Completed { generation, .. }
            | SearchEvent::Cancelled { generation } => *generation,
        }
    }

    /// True for `Completed` and `Cancelled`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchEvent::Completed { .. } | SearchEvent::Cancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_and_terminal() {
        let events = [
            SearchEvent::ResultsFound {
                generation: 1,
                batch: Vec::new(),
            },
            SearchEvent::Progress {
                generation: 2,
                progress: SearchProgress::default(),
            },
            SearchEvent::Completed {
                generation: 3,
                total_results: 0,
            },
            SearchEvent::Cancelled { generation: 4 },
        ];

        let generations: Vec<u64> = events.iter().map(SearchEvent::generation).collect();
        assert_eq!(generations, vec![1, 2, 3, 4]);

        let terminal: Vec<bool> = events.iter().map(SearchEvent::is_terminal).collect();
        assert_eq!(terminal, vec![false, false, true, true]);
    }
}
