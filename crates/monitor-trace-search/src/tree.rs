//! Flattened trace tree rows.

use serde::{Deserialize, Serialize};

/// Stable identity of a row in a [`TraceTree`].
///
/// Keys survive inserts and removals (expanding or collapsing a subtree shifts list indices but
/// not keys), which is what search lookups are keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(pub u64);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanNode {
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub span_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionNode {
    #[serde(default, rename = "transaction.op", alias = "op")]
    pub op: Option<String>,
    #[serde(default)]
    pub transaction: Option<String>,
    pub event_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNode {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// A run of sibling or nested spans collapsed into one row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutogroupNode {
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceNodeValue {
    Span(SpanNode),
    Transaction(TransactionNode),
    Error(ErrorNode),
    Autogroup(AutogroupNode),
    /// Placeholder for an uninstrumented gap between two spans.
    MissingInstrumentation,
    Root,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceNode {
    pub key: NodeKey,
    #[serde(flatten)]
    pub value: TraceNodeValue,
}

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("invalid trace tree JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The precomputed, flattened list of visible trace rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceTree {
    list: Vec<TraceNode>,
    next_key: u64,
}

impl TraceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = TraceNodeValue>,
    {
        let mut tree = Self::new();
        for value in values {
            tree.push(value);
        }
        tree
    }

    /// Parse a JSON array of node values (`[{"kind": "span", ...}, ...]`).
    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        let values: Vec<TraceNodeValue> = serde_json::from_str(json)?;
        Ok(Self::from_values(values))
    }

    pub fn push(&mut self, value: TraceNodeValue) -> NodeKey {
        let key = self.alloc_key();
        self.list.push(TraceNode { key, value });
        key
    }

    /// Insert a row at `index`, shifting later rows down.
    ///
    /// Panics if `index > len`, like [`Vec::insert`].
    pub fn insert(&mut self, index: usize, value: TraceNodeValue) -> NodeKey {
        let key = self.alloc_key();
        self.list.insert(index, TraceNode { key, value });
        key
    }

    pub fn remove(&mut self, index: usize) -> Option<TraceNode> {
        if index < self.list.len() {
            Some(self.list.remove(index))
        } else {
            None
        }
    }

    pub fn list(&self) -> &[TraceNode] {
        &self.list
    }

    pub fn get(&self, index: usize) -> Option<&TraceNode> {
        self.list.get(index)
    }

    pub fn position_of(&self, key: NodeKey) -> Option<usize> {
        self.list.iter().position(|node| node.key == key)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    fn alloc_key(&mut self) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        key
    }
}
