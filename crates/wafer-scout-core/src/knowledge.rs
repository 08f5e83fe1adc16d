//! Discretized knowledge index of already-explored positions.
//!
//! Every position the agent has been told about or has suggested is reduced
//! to a [`KnowledgeKey`] — a fixed-width fixed-point encoding — and held in a
//! set. Candidates whose key is already present are redundant: they fall
//! within one resolution unit of a known position and re-measuring them buys
//! nothing.
//!
//! Discretization is `floor(value / resolution)` per component. Floor, not
//! truncation: `-0.04 / 0.1` must map to cell `-1`, not cell `0`, so coverage
//! of negative coordinate ranges stays symmetric with positive ones.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Discretize one component to its grid cell index.
pub fn discretize(value: f64, resolution: f64) -> i64 {
    (value / resolution).floor() as i64
}

/// Hashable fixed-point key for an independent-variable vector.
///
/// The `i64` cell indices hash identically on every platform, unlike the
/// float tuples they replace; two positions within less than one resolution
/// unit of each other on every axis (and on the same side of each cell edge)
/// collapse to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnowledgeKey(Vec<i64>);

impl KnowledgeKey {
    /// Encode a position at the given resolution.
    pub fn encode(point: &[f64], resolution: f64) -> Self {
        Self(point.iter().map(|&v| discretize(v, resolution)).collect())
    }

    /// The raw cell indices.
    pub fn cells(&self) -> &[i64] {
        &self.0
    }
}

/// Monotonically growing set of explored keys.
///
/// No removal operation exists; the index only shrinks through
/// [`KnowledgeIndex::clear`] as part of a full agent restart.
#[derive(Debug, Default)]
pub struct KnowledgeIndex {
    keys: HashSet<KnowledgeKey>,
}

impl KnowledgeIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `key` has been recorded.
    pub fn contains(&self, key: &KnowledgeKey) -> bool {
        self.keys.contains(key)
    }

    /// Record a key. Returns `false` when it was already present.
    pub fn insert(&mut self, key: KnowledgeKey) -> bool {
        self.keys.insert(key)
    }

    /// Number of distinct keys recorded.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when no key has been recorded.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Drop every recorded key. Only called alongside a full restart.
    pub fn clear(&mut self) {
        self.keys.clear();
    }
}
