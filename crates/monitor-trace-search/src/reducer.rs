//! Search box state for the trace view.
//!
//! [`trace_search_reducer`] is a pure `(state, action) -> state` function. The input state is
//! never modified, so a host can keep the previous state around and compare. Result sets are
//! shared between states through an [`Arc`] rather than copied on every transition.

use std::sync::Arc;

use crate::search::{SearchResult, SearchResults};
use crate::tree::NodeKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceSearchAction {
    /// A new query was typed. Its results arrive later through `SetResults`.
    SetQuery(String),
    SetResults(SearchResults),
    GoToNextMatch,
    GoToPreviousMatch,
    /// Focus a specific match, e.g. one clicked in a results list.
    ///
    /// Ignored when `result_iterator_index` is not a valid ordinal for the current results.
    SetIteratorIndex {
        result_iterator_index: usize,
        result_index: usize,
    },
    ClearIteratorIndex,
    ClearQuery,
}

/// `result_iterator_index` and `result_index` are always both set or both unset, and when set
/// `result_index == results[result_iterator_index].index`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceSearchState {
    query: Option<String>,
    results: Option<Arc<SearchResults>>,
    result_iterator_index: Option<usize>,
    result_index: Option<usize>,
}

impl TraceSearchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reduce(&self, action: TraceSearchAction) -> Self {
        trace_search_reducer(self, action)
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn results(&self) -> Option<&SearchResults> {
        self.results.as_deref()
    }

    /// Ordinal of the focused match within the results.
    pub fn result_iterator_index(&self) -> Option<usize> {
        self.result_iterator_index
    }

    /// Flat-list index of the focused node.
    pub fn result_index(&self) -> Option<usize> {
        self.result_index
    }

    pub fn focused(&self) -> Option<&SearchResult> {
        let ordinal = self.result_iterator_index?;
        self.results.as_ref()?.get(ordinal)
    }

    pub fn match_count(&self) -> usize {
        self.results.as_ref().map_or(0, |r| r.len())
    }

    pub fn ordinal_of(&self, node: NodeKey) -> Option<usize> {
        self.results.as_ref()?.ordinal_of(node)
    }

    pub fn is_match(&self, node: NodeKey) -> bool {
        self.ordinal_of(node).is_some()
    }

    pub fn is_focused(&self, node: NodeKey) -> bool {
        self.focused().is_some_and(|r| r.node == node)
    }
}

/// Panics if `index` is not a valid position in a result set of length `len`.
///
/// Navigation arithmetic wraps within bounds, so this only fires on a bug in the reducer.
#[track_caller]
pub fn assert_bounded_index(index: usize, len: usize) {
    assert!(
        index < len,
        "search result index {index} out of bounds for {len} results"
    );
}

pub fn trace_search_reducer(
    state: &TraceSearchState,
    action: TraceSearchAction,
) -> TraceSearchState {
    log::trace!("trace search action: {action:?}");
    match action {
        TraceSearchAction::SetQuery(query) => TraceSearchState {
            query: Some(query),
            results: None,
            result_iterator_index: None,
            result_index: None,
        },
        TraceSearchAction::SetResults(results) => TraceSearchState {
            query: state.query.clone(),
            results: Some(Arc::new(results)),
            result_iterator_index: None,
            result_index: None,
        },
        TraceSearchAction::GoToNextMatch => {
            let Some(results) = non_empty(state) else {
                return state.clone();
            };
            let len = results.len();
            let next = match state.result_iterator_index {
                None => 0,
                Some(current) if current + 1 >= len => 0,
                Some(current) => current + 1,
            };
            focus(state, results, next)
        }
        TraceSearchAction::GoToPreviousMatch => {
            let Some(results) = non_empty(state) else {
                return state.clone();
            };
            let len = results.len();
            let previous = match state.result_iterator_index {
                None | Some(0) => len - 1,
                Some(current) => current.min(len) - 1,
            };
            focus(state, results, previous)
        }
        TraceSearchAction::SetIteratorIndex {
            result_iterator_index,
            result_index,
        } => {
            let Some(results) = state.results.as_ref() else {
                return state.clone();
            };
            let Some(result) = results.get(result_iterator_index) else {
                log::warn!(
                    "ignoring focus on match {result_iterator_index} of {}",
                    results.len()
                );
                return state.clone();
            };
            if result.index != result_index {
                log::warn!(
                    "match {result_iterator_index} is at row {}, not {result_index}",
                    result.index
                );
            }
            focus(state, results, result_iterator_index)
        }
        TraceSearchAction::ClearIteratorIndex => TraceSearchState {
            query: state.query.clone(),
            results: state.results.clone(),
            result_iterator_index: None,
            result_index: None,
        },
        TraceSearchAction::ClearQuery => TraceSearchState::default(),
    }
}

fn non_empty(state: &TraceSearchState) -> Option<&Arc<SearchResults>> {
    state.results.as_ref().filter(|r| !r.is_empty())
}

fn focus(
    state: &TraceSearchState,
    results: &Arc<SearchResults>,
    ordinal: usize,
) -> TraceSearchState {
    assert_bounded_index(ordinal, results.len());
    let index = results.get(ordinal).map(|r| r.index);
    TraceSearchState {
        query: state.query.clone(),
        results: Some(Arc::clone(results)),
        result_iterator_index: Some(ordinal),
        result_index: index,
    }
}
