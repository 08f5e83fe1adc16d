//! Trait seams toward the external collaborators.
//!
//! The agent core never talks to a message bus, an execution queue, or a
//! document store directly; it consumes these traits. Deployments implement
//! them against their infrastructure; tests and the demo CLI use the
//! in-memory implementations in [`crate::stubs`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::cache::TellRecord;
use crate::error::CoreResult;

/// One completed-experiment record as delivered by the document stream.
///
/// Only the minimal data shape the agent requires: named motor readbacks and
/// an observable payload whose rank depends on the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique id of the originating run.
    pub uid: Uuid,
    /// Motor readbacks by motor name.
    pub positions: BTreeMap<String, f64>,
    /// Observable payload; possibly carrying extra leading/singleton
    /// dimensions (nested arrays) that the unpacker reduces.
    pub observable: Value,
}

/// Handle returned by the execution queue for a submitted plan.
pub type JobHandle = Uuid;

/// Dispatchable description of the next experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPlan {
    /// Queue-side plan name.
    pub name: String,
    /// Positional plan arguments.
    pub args: Vec<Value>,
    /// Keyword plan arguments (absolute motor positions, by motor name).
    pub kwargs: Map<String, Value>,
}

/// Extracts `(independent, dependent)` vectors from a run record.
///
/// The reduction rule for higher-rank observables is deployment-specific and
/// therefore lives behind this trait rather than in the agent.
pub trait RunUnpacker: Send + Sync {
    /// Reduce a record to the measured position and observable vector.
    ///
    /// # Errors
    ///
    /// [`crate::error::AgentError::MalformedRecord`] when required motors are
    /// missing or the observable cannot be reduced to a vector.
    fn unpack_run(&self, record: &RunRecord) -> CoreResult<(Vec<f64>, Vec<f64>)>;
}

/// Ordered stream of completed-experiment documents.
///
/// `next_document` resolving to `None` means end of stream; the ingestion
/// loop then shuts down without losing already-told state.
#[async_trait]
pub trait DocumentStream: Send {
    /// Wait for the next document.
    async fn next_document(&mut self) -> Option<RunRecord>;
}

/// Fire-and-forget submission to the remote execution queue.
///
/// The agent never awaits completion of the measurement itself — success or
/// failure of the plan is only ever observed later as a new document arriving
/// back through the stream. Retry policy belongs to the queue, not here.
#[async_trait]
pub trait PlanDispatcher: Send + Sync {
    /// Submit one plan; returns the queue's job handle.
    async fn submit(&self, plan: MeasurementPlan) -> CoreResult<JobHandle>;
}

/// Source of prior tell documents for restart-with-reingest.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// All records to replay, in original tell order.
    async fn records(&self) -> CoreResult<Vec<TellRecord>>;
}
