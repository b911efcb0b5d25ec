//! Full-text scan over the flattened trace list.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::tree::{NodeKey, TraceNodeValue, TraceTree};

/// Text a missing-instrumentation row is matched against.
pub const MISSING_INSTRUMENTATION_LABEL: &str = "missing instrumentation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchResult {
    /// Position of the node in the flat list at scan time.
    pub index: usize,
    pub node: NodeKey,
}

/// Matches in list order plus a node -> ordinal lookup.
///
/// `lookup` always has exactly one entry per result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SearchResult>", into = "Vec<SearchResult>")]
pub struct SearchResults {
    results: Vec<SearchResult>,
    lookup: AHashMap<NodeKey, usize>,
}

impl SearchResults {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, index: usize, node: NodeKey) {
        if self.lookup.contains_key(&node) {
            return;
        }
        self.lookup.insert(node, self.results.len());
        self.results.push(SearchResult { index, node });
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, ordinal: usize) -> Option<&SearchResult> {
        self.results.get(ordinal)
    }

    /// The match ordinal of `node`, if it matched.
    pub fn ordinal_of(&self, node: NodeKey) -> Option<usize> {
        self.lookup.get(&node).copied()
    }

    pub fn contains(&self, node: NodeKey) -> bool {
        self.lookup.contains_key(&node)
    }

    pub fn as_slice(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchResult> {
        self.results.iter()
    }

    pub fn lookup_len(&self) -> usize {
        self.lookup.len()
    }
}

/// Builds the lookup; a node listed twice keeps its first ordinal.
impl From<Vec<SearchResult>> for SearchResults {
    fn from(results: Vec<SearchResult>) -> Self {
        let mut out = SearchResults::new();
        for result in results {
            out.push(result.index, result.node);
        }
        out
    }
}

impl From<SearchResults> for Vec<SearchResult> {
    fn from(results: SearchResults) -> Self {
        results.results
    }
}

impl<'a> IntoIterator for &'a SearchResults {
    type Item = &'a SearchResult;
    type IntoIter = std::slice::Iter<'a, SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

fn contains_opt(field: &Option<String>, query: &str) -> bool {
    field.as_deref().is_some_and(|value| value.contains(query))
}

/// Whether a single row matches `query`.
///
/// Only the fields relevant to the row's kind are checked: substring matches on names and
/// descriptions, exact matches on ids and error level.
pub fn node_matches(query: &str, value: &TraceNodeValue) -> bool {
    if query.is_empty() {
        return false;
    }
    match value {
        TraceNodeValue::Span(span) => {
            contains_opt(&span.op, query)
                || contains_opt(&span.description, query)
                || span.span_id == query
        }
        TraceNodeValue::Transaction(txn) => {
            contains_opt(&txn.op, query)
                || contains_opt(&txn.transaction, query)
                || txn.event_id == query
        }
        TraceNodeValue::Error(err) => {
            err.level.as_deref() == Some(query) || contains_opt(&err.title, query)
        }
        TraceNodeValue::Autogroup(group) => {
            contains_opt(&group.op, query) || contains_opt(&group.description, query)
        }
        TraceNodeValue::MissingInstrumentation => MISSING_INSTRUMENTATION_LABEL.contains(query),
        TraceNodeValue::Root => false,
    }
}

/// Scan the whole tree in one go. An empty query matches nothing.
pub fn search_in_trace_tree(query: &str, tree: &TraceTree) -> SearchResults {
    let mut scan = TraceSearchScan::new(query);
    scan.step(tree, usize::MAX);
    scan.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanProgress {
    Pending { scanned: usize, total: usize },
    Done,
}

/// A resumable scan that looks at a bounded number of rows per [`step`](Self::step).
///
/// Large traces can be searched a slice at a time between frames. The tree must not change
/// between steps; when it does, drop the scan and start a new one. Dropping a scan is also how
/// an outdated query is cancelled.
#[derive(Debug, Clone)]
pub struct TraceSearchScan {
    query: String,
    cursor: usize,
    done: bool,
    results: SearchResults,
}

impl TraceSearchScan {
    pub fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        let done = query.is_empty();
        Self {
            query,
            cursor: 0,
            done,
            results: SearchResults::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Scan up to `budget` more rows.
    pub fn step(&mut self, tree: &TraceTree, budget: usize) -> ScanProgress {
        if self.done {
            return ScanProgress::Done;
        }

        let list = tree.list();
        let end = self.cursor.saturating_add(budget).min(list.len());
        for (index, node) in list.iter().enumerate().take(end).skip(self.cursor) {
            if node_matches(&self.query, &node.value) {
                self.results.push(index, node.key);
            }
        }
        self.cursor = end;

        if self.cursor >= list.len() {
            self.done = true;
            log::debug!(
                "trace search for {:?} matched {} of {} rows",
                self.query,
                self.results.len(),
                list.len()
            );
            ScanProgress::Done
        } else {
            ScanProgress::Pending {
                scanned: self.cursor,
                total: list.len(),
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Matches found so far.
    pub fn partial_results(&self) -> &SearchResults {
        &self.results
    }

    pub fn finish(self) -> SearchResults {
        self.results
    }
}
