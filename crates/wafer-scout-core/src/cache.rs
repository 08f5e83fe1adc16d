//! Append-only observation caches and the durable tell document.
//!
//! The cache holds three index-aligned sequences: independent positions,
//! dependent observables, and the full [`TellRecord`] documents. Appends are
//! the only mutation path; everything else reads. The alignment invariant
//! `independent.len() == dependent.len() == records.len()` holds after every
//! public call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgentError, CoreResult};

/// Durable, inspectable record of one `tell`.
///
/// Positions are stored agent-relative; the origin that was subtracted is
/// carried alongside so the absolute position can always be reconstructed as
/// `independent_variable + absolute_position_offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TellRecord {
    /// Unique id of this record.
    pub uid: Uuid,
    /// Ingestion timestamp.
    pub time: DateTime<Utc>,
    /// Measured position, agent-relative.
    pub independent_variable: Vec<f64>,
    /// Measured observable vector.
    pub observable: Vec<f64>,
    /// Origin offset that was subtracted from the raw position.
    pub absolute_position_offset: Vec<f64>,
}

impl TellRecord {
    /// Build a record stamped with a fresh uid and the current time.
    pub fn new(independent: Vec<f64>, observable: Vec<f64>, offset: Vec<f64>) -> Self {
        Self {
            uid: Uuid::new_v4(),
            time: Utc::now(),
            independent_variable: independent,
            observable,
            absolute_position_offset: offset,
        }
    }

    /// Absolute position: relative coordinate plus the recorded offset.
    pub fn absolute_position(&self) -> Vec<f64> {
        self.independent_variable
            .iter()
            .zip(&self.absolute_position_offset)
            .map(|(x, o)| x + o)
            .collect()
    }
}

/// Append-only storage of told observations.
#[derive(Debug, Default)]
pub struct StateCache {
    independent: Vec<Vec<f64>>,
    dependent: Vec<Vec<f64>>,
    records: Vec<TellRecord>,
}

impl StateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one observation and its record.
    ///
    /// # Errors
    ///
    /// [`AgentError::Shape`] when the observation's dimensionality conflicts
    /// with the dimensionality established by prior entries. Nothing is
    /// stored on error.
    pub fn append(&mut self, record: TellRecord) -> CoreResult<()> {
        if let Some(first) = self.independent.first() {
            if record.independent_variable.len() != first.len() {
                return Err(AgentError::Shape {
                    which: "independent",
                    expected: first.len(),
                    actual: record.independent_variable.len(),
                });
            }
        }
        if let Some(first) = self.dependent.first() {
            if record.observable.len() != first.len() {
                return Err(AgentError::Shape {
                    which: "dependent",
                    expected: first.len(),
                    actual: record.observable.len(),
                });
            }
        }

        self.independent.push(record.independent_variable.clone());
        self.dependent.push(record.observable.clone());
        self.records.push(record);
        Ok(())
    }

    /// Reset all three sequences to empty. The knowledge index is a separate
    /// structure and is not touched here.
    pub fn clear(&mut self) {
        self.independent.clear();
        self.dependent.clear();
        self.records.clear();
    }

    /// Number of told observations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been told yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cached positions, in tell order.
    pub fn independent(&self) -> &[Vec<f64>] {
        &self.independent
    }

    /// Cached observables, in tell order.
    pub fn dependent(&self) -> &[Vec<f64>] {
        &self.dependent
    }

    /// Full tell documents, in tell order.
    pub fn records(&self) -> &[TellRecord] {
        &self.records
    }

    /// Most recent tell document, if any.
    pub fn latest(&self) -> Option<&TellRecord> {
        self.records.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(x: Vec<f64>, y: Vec<f64>) -> TellRecord {
        TellRecord::new(x, y, vec![0.0; 1])
    }

    #[test]
    fn append_keeps_sequences_aligned() {
        let mut cache = StateCache::new();
        for i in 0..7 {
            cache
                .append(record(vec![i as f64], vec![0.1, 0.2, 0.3]))
                .unwrap();
            assert_eq!(cache.independent().len(), cache.dependent().len());
            assert_eq!(cache.dependent().len(), cache.records().len());
        }
        assert_eq!(cache.len(), 7);
    }

    #[test]
    fn independent_shape_conflict_rejected() {
        let mut cache = StateCache::new();
        cache.append(record(vec![0.0], vec![1.0, 2.0])).unwrap();
        let err = cache
            .append(record(vec![0.0, 1.0], vec![1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::Shape {
                which: "independent",
                expected: 1,
                actual: 2,
            }
        ));
        // Nothing partially stored.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn dependent_shape_conflict_rejected() {
        let mut cache = StateCache::new();
        cache.append(record(vec![0.0], vec![1.0, 2.0])).unwrap();
        assert!(cache.append(record(vec![1.0], vec![1.0])).is_err());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_resets_everything() {
        let mut cache = StateCache::new();
        for i in 0..5 {
            cache.append(record(vec![i as f64], vec![1.0])).unwrap();
        }
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.latest().is_none());
    }

    #[test]
    fn absolute_position_round_trip() {
        let rec = TellRecord::new(vec![0.5, -0.5], vec![1.0], vec![1.0, 1.0]);
        assert_eq!(rec.absolute_position(), vec![1.5, 0.5]);
    }
}
