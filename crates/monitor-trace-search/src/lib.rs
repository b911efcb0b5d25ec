#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Text search over a flattened trace tree.
//!
//! - [`search_in_trace_tree`] scans the tree's row list once, in order, and returns the
//!   matching rows together with a node -> match-ordinal lookup. [`TraceSearchScan`] does the
//!   same work a bounded slice at a time.
//! - [`trace_search_reducer`] holds the search box state (query, results, focused match) and
//!   implements next/previous navigation with wrap-around.
//!
//! Rows are a closed [`TraceNodeValue`] union; each kind is matched on its own fields.

pub mod reducer;
pub mod search;
pub mod tree;

pub use reducer::{assert_bounded_index, trace_search_reducer, TraceSearchAction, TraceSearchState};
pub use search::{
    node_matches, search_in_trace_tree, ScanProgress, SearchResult, SearchResults,
    TraceSearchScan, MISSING_INSTRUMENTATION_LABEL,
};
pub use tree::{
    AutogroupNode, ErrorNode, NodeKey, SpanNode, TraceNode, TraceNodeValue, TraceTree,
    TransactionNode, TreeError,
};
