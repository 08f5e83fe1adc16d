//! In-memory implementations of the collaborator traits.
//!
//! Used by the integration tests and the demo CLI; deployments replace them
//! with adapters to the real message bus, execution queue, and document
//! store. Behavior is deliberately simple and fully deterministic so tests
//! can assert on exact state.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::cache::TellRecord;
use crate::error::{AgentError, CoreResult};
use crate::traits::{
    DocumentStream, HistorySource, JobHandle, MeasurementPlan, PlanDispatcher, RunRecord,
    RunUnpacker,
};

/// Build a run record from named motor readbacks and an observable payload.
pub fn run_record(motors: &[(&str, f64)], observable: Value) -> RunRecord {
    RunRecord {
        uid: Uuid::new_v4(),
        positions: motors
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect::<BTreeMap<_, _>>(),
        observable,
    }
}

/// Deterministic synthetic spectrum for demos: eight channels with a peak
/// whose position depends on which region of the wafer the point falls in.
pub fn synthetic_observable(position: &[f64]) -> Vec<f64> {
    let radius = position.iter().map(|v| v * v).sum::<f64>().sqrt();
    let region = if radius < 1.5 {
        0
    } else if radius < 3.0 {
        1
    } else {
        2
    };
    let peak = 1.5 + 2.5 * region as f64;
    let ripple = 0.01 * (position[0] * 13.7).sin();
    (0..8)
        .map(|c| 10.0 * (-((c as f64 - peak).powi(2)) / 2.0).exp() + ripple)
        .collect()
}

// ----------------------------------------------------------------------
// Unpacker
// ----------------------------------------------------------------------

/// Reference unpacker with the standard rank-reduction rule.
///
/// The observable may arrive with extra leading dimensions; rank 3 reduces by
/// taking the first block, rank 2 by taking a configurable row — the rule the
/// production detector stack uses for image-like payloads.
pub struct FlatUnpacker {
    motor_names: Vec<String>,
    /// Row selected when the observable arrives rank-2.
    pub row_index: usize,
}

impl FlatUnpacker {
    /// Unpacker reading the given motors, reducing rank-2 payloads at row 1.
    pub fn new(motor_names: Vec<String>) -> Self {
        Self {
            motor_names,
            row_index: 1,
        }
    }
}

impl RunUnpacker for FlatUnpacker {
    fn unpack_run(&self, record: &RunRecord) -> CoreResult<(Vec<f64>, Vec<f64>)> {
        let mut x = Vec::with_capacity(self.motor_names.len());
        for name in &self.motor_names {
            let value = record.positions.get(name).ok_or_else(|| {
                AgentError::MalformedRecord(format!("missing motor readback '{name}'"))
            })?;
            x.push(*value);
        }

        let mut observable = &record.observable;
        // Rank 3 -> first block, rank 2 -> configured row.
        if rank(observable) == 3 {
            observable = nested_index(observable, 0)?;
        }
        if rank(observable) == 2 {
            observable = nested_index(observable, self.row_index)?;
        }
        let y = parse_vector(observable)?;
        Ok((x, y))
    }
}

fn rank(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.first().map(rank).unwrap_or(0),
        _ => 0,
    }
}

fn nested_index(value: &Value, index: usize) -> CoreResult<&Value> {
    value
        .as_array()
        .and_then(|items| items.get(index))
        .ok_or_else(|| {
            AgentError::MalformedRecord(format!("observable has no block at index {index}"))
        })
}

fn parse_vector(value: &Value) -> CoreResult<Vec<f64>> {
    match value {
        Value::Number(n) => Ok(vec![n.as_f64().unwrap_or(f64::NAN)]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_f64().ok_or_else(|| {
                    AgentError::MalformedRecord("non-numeric observable entry".to_string())
                })
            })
            .collect(),
        other => Err(AgentError::MalformedRecord(format!(
            "observable must be numeric, got {other}"
        ))),
    }
}

// ----------------------------------------------------------------------
// Stream
// ----------------------------------------------------------------------

/// Document stream fed through a tokio channel. Dropping every sender ends
/// the stream.
pub struct ChannelStream {
    receiver: mpsc::Receiver<RunRecord>,
}

impl ChannelStream {
    /// Create a stream and its feeding side.
    pub fn new(capacity: usize) -> (mpsc::Sender<RunRecord>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { receiver: rx })
    }
}

#[async_trait]
impl DocumentStream for ChannelStream {
    async fn next_document(&mut self) -> Option<RunRecord> {
        self.receiver.recv().await
    }
}

// ----------------------------------------------------------------------
// Dispatcher
// ----------------------------------------------------------------------

/// Dispatcher that records every submitted plan.
#[derive(Default)]
pub struct RecordingDispatcher {
    plans: Mutex<Vec<MeasurementPlan>>,
    failing: Mutex<bool>,
}

impl RecordingDispatcher {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All plans submitted so far, in order.
    pub fn plans(&self) -> Vec<MeasurementPlan> {
        self.plans.lock().clone()
    }

    /// Make subsequent submissions fail, for exercising the logging path.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

#[async_trait]
impl PlanDispatcher for RecordingDispatcher {
    async fn submit(&self, plan: MeasurementPlan) -> CoreResult<JobHandle> {
        if *self.failing.lock() {
            return Err(AgentError::Dispatch {
                plan: plan.name,
                reason: "queue unavailable (stub)".to_string(),
            });
        }
        self.plans.lock().push(plan);
        Ok(Uuid::new_v4())
    }
}

// ----------------------------------------------------------------------
// History
// ----------------------------------------------------------------------

/// History source over an in-memory record list.
#[derive(Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<TellRecord>>,
}

impl MemoryHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the stored history.
    pub fn push(&self, record: TellRecord) {
        self.records.lock().push(record);
    }
}

#[async_trait]
impl HistorySource for MemoryHistory {
    async fn records(&self) -> CoreResult<Vec<TellRecord>> {
        Ok(self.records.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unpacker_reads_motors_in_order() {
        let unpacker = FlatUnpacker::new(vec!["wafer_x".into(), "wafer_y".into()]);
        let record = run_record(&[("wafer_y", 2.0), ("wafer_x", 1.0)], json!([0.5, 0.6]));
        let (x, y) = unpacker.unpack_run(&record).unwrap();
        assert_eq!(x, vec![1.0, 2.0]);
        assert_eq!(y, vec![0.5, 0.6]);
    }

    #[test]
    fn unpacker_reduces_rank_two_at_configured_row() {
        let unpacker = FlatUnpacker::new(vec!["motor".into()]);
        let record = run_record(
            &[("motor", 0.0)],
            json!([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]),
        );
        let (_, y) = unpacker.unpack_run(&record).unwrap();
        assert_eq!(y, vec![3.0, 4.0]);
    }

    #[test]
    fn unpacker_reduces_rank_three_then_rank_two() {
        let unpacker = FlatUnpacker::new(vec!["motor".into()]);
        let record = run_record(
            &[("motor", 0.0)],
            json!([[[1.0, 2.0], [3.0, 4.0]], [[9.0, 9.0], [9.0, 9.0]]]),
        );
        let (_, y) = unpacker.unpack_run(&record).unwrap();
        // First block, then row 1.
        assert_eq!(y, vec![3.0, 4.0]);
    }

    #[test]
    fn unpacker_rejects_missing_motor() {
        let unpacker = FlatUnpacker::new(vec!["motor".into()]);
        let record = run_record(&[("other", 0.0)], json!([1.0]));
        assert!(matches!(
            unpacker.unpack_run(&record),
            Err(AgentError::MalformedRecord(_))
        ));
    }

    #[test]
    fn unpacker_rejects_non_numeric_payload() {
        let unpacker = FlatUnpacker::new(vec!["motor".into()]);
        let record = run_record(&[("motor", 0.0)], json!(["a", "b"]));
        assert!(unpacker.unpack_run(&record).is_err());
    }

    #[tokio::test]
    async fn channel_stream_ends_when_senders_drop() {
        let (tx, mut stream) = ChannelStream::new(4);
        tx.send(run_record(&[("motor", 1.0)], json!([1.0])))
            .await
            .unwrap();
        drop(tx);

        assert!(stream.next_document().await.is_some());
        assert!(stream.next_document().await.is_none());
    }

    #[tokio::test]
    async fn recording_dispatcher_captures_plans() {
        let dispatcher = RecordingDispatcher::new();
        let plan = MeasurementPlan {
            name: "scan".to_string(),
            args: vec![],
            kwargs: serde_json::Map::new(),
        };
        dispatcher.submit(plan.clone()).await.unwrap();
        assert_eq!(dispatcher.plans(), vec![plan]);

        dispatcher.set_failing(true);
        let failed = dispatcher
            .submit(MeasurementPlan {
                name: "scan".to_string(),
                args: vec![],
                kwargs: serde_json::Map::new(),
            })
            .await;
        assert!(matches!(failed, Err(AgentError::Dispatch { .. })));
    }

    #[test]
    fn synthetic_observable_separates_regions() {
        let inner = synthetic_observable(&[0.0, 0.0]);
        let outer = synthetic_observable(&[4.0, 0.0]);
        assert_eq!(inner.len(), 8);
        // Peaks land on different channels.
        let argmax = |v: &[f64]| {
            v.iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .map(|(i, _)| i)
                .unwrap()
        };
        assert_ne!(argmax(&inner), argmax(&outer));
    }
}
