use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

use crate::errors::{Result, SearchError};

/// Compiled queries, keyed by the raw query text. Restarting a search with
/// the same text (the common case while a user refines a path) reuses the
/// compiled automaton.
static QUERY_CACHE: Lazy<DashMap<String, Arc<Regex>>> = Lazy::new(DashMap::new);

/// The cache is emptied once it holds this many queries.
const MAX_CACHED_QUERIES: usize = 256;

fn cache_query(
    cache: &DashMap<String, Arc<Regex>>,
    query: &str,
    regex: Arc<Regex>,
    limit: usize,
) {
    if cache.len() >= limit {
        cache.clear();
    }
    cache.insert(query.to_string(), regex);
}

/// Case-insensitive literal substring matcher.
///
/// The query is escaped before compilation, so regex metacharacters in it
/// match themselves. Offsets returned by [`QueryMatcher::find`] are byte
/// offsets into the haystack as given, which keeps them usable for slicing
/// even when case folding changes the byte length of a character.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    query: String,
    regex: Arc<Regex>,
}

impl QueryMatcher {
    /// Creates a matcher for `query`. Empty or whitespace-only queries are rejected.
    pub fn new(query: &str) -> Result<Self> {
        if query.trim().is_empty() {
            return Err(SearchError::invalid_query(query));
        }

        let regex = if let Some(entry) = QUERY_CACHE.get(query) {
            entry.clone()
        } else {
            let regex = RegexBuilder::new(&regex::escape(query))
                .case_insensitive(true)
                .build()
                .map_err(|e| SearchError::invalid_query(e.to_string()))?;
            let regex = Arc::new(regex);
            cache_query(&QUERY_CACHE, query, regex.clone(), MAX_CACHED_QUERIES);
            regex
        };

        Ok(Self {
            query: query.to_string(),
            regex,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    /// Byte range of the first occurrence
    pub fn find(&self, haystack: &str) -> Option<(usize, usize)> {
        self.regex.find(haystack).map(|m| (m.start(), m.end()))
    }
}
