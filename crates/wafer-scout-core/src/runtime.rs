//! Agent lifecycle and the ingestion loop.
//!
//! [`AgentRuntime`] is the explicit lifecycle object an external supervisor
//! drives: `start` spawns the single ingestion task, `stop` cancels it
//! without losing already-told state. There is no process-wide singleton and
//! no implicit startup hook.
//!
//! The ingestion path is the only caller that suspends on I/O — waiting for
//! the next document. Dispatch to the execution queue is fire-and-forget:
//! submission results are logged and never retried here; the measurement's
//! fate comes back later as a new document on the stream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::agent::{ClusterAgent, RestartOptions, Suggestion};
use crate::error::{AgentError, CoreResult};
use crate::traits::{DocumentStream, HistorySource, PlanDispatcher, RunUnpacker};

/// Batch size used when `ask_on_tell` triggers an ask from the loop.
const ON_TELL_BATCH_SIZE: usize = 1;

/// Supervisor-facing lifecycle wrapper around one agent.
pub struct AgentRuntime {
    agent: Arc<ClusterAgent>,
    unpacker: Arc<dyn RunUnpacker>,
    dispatcher: Arc<dyn PlanDispatcher>,
    shutdown: Arc<Notify>,
    ingest_task: Option<JoinHandle<()>>,
    documents_told: Arc<AtomicUsize>,
    documents_skipped: Arc<AtomicUsize>,
}

impl AgentRuntime {
    /// Wire an agent to its collaborators.
    pub fn new(
        agent: Arc<ClusterAgent>,
        unpacker: Arc<dyn RunUnpacker>,
        dispatcher: Arc<dyn PlanDispatcher>,
    ) -> Self {
        Self {
            agent,
            unpacker,
            dispatcher,
            shutdown: Arc::new(Notify::new()),
            ingest_task: None,
            documents_told: Arc::new(AtomicUsize::new(0)),
            documents_skipped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The wrapped agent.
    pub fn agent(&self) -> &Arc<ClusterAgent> {
        &self.agent
    }

    /// Documents successfully told since construction.
    pub fn documents_told(&self) -> usize {
        self.documents_told.load(Ordering::Relaxed)
    }

    /// Documents dropped by the unpacker or rejected by `tell`.
    pub fn documents_skipped(&self) -> usize {
        self.documents_skipped.load(Ordering::Relaxed)
    }

    /// Spawn the ingestion task over `stream`.
    ///
    /// Documents are told strictly in stream order, one `tell` per document.
    /// The task ends on stream exhaustion or [`AgentRuntime::stop`].
    ///
    /// # Errors
    ///
    /// [`AgentError::Configuration`] when an ingestion task is already
    /// running.
    pub fn start(&mut self, mut stream: Box<dyn DocumentStream>) -> CoreResult<()> {
        if self.ingest_task.is_some() {
            return Err(AgentError::configuration(
                "ingestion task already running; stop it first",
            ));
        }

        // Fresh Notify per run: a permit left over from a previous stop must
        // not cancel the new task on its first poll.
        self.shutdown = Arc::new(Notify::new());

        let agent = self.agent.clone();
        let unpacker = self.unpacker.clone();
        let dispatcher = self.dispatcher.clone();
        let shutdown = self.shutdown.clone();
        let told = self.documents_told.clone();
        let skipped = self.documents_skipped.clone();

        self.ingest_task = Some(tokio::spawn(async move {
            info!("ingestion loop started");
            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        info!("ingestion loop cancelled");
                        break;
                    }
                    doc = stream.next_document() => {
                        let Some(record) = doc else {
                            info!("document stream ended");
                            break;
                        };
                        match ingest_one(&agent, unpacker.as_ref(), &dispatcher, &record).await {
                            Ok(()) => {
                                told.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(err) => {
                                skipped.fetch_add(1, Ordering::Relaxed);
                                warn!(uid = %record.uid, error = %err, "document skipped");
                            }
                        }
                    }
                }
            }
        }));
        Ok(())
    }

    /// Cancel the ingestion task and wait for it to finish. Already-told
    /// state stays intact. No-op when nothing is running.
    pub async fn stop(&mut self) {
        if let Some(task) = self.ingest_task.take() {
            // notify_one stores a permit, so the signal is not lost when the
            // task is mid-document rather than parked on notified().
            self.shutdown.notify_one();
            if let Err(err) = task.await {
                error!(error = %err, "ingestion task panicked");
            }
        }
    }

    /// Ask for `batch_size` candidates and submit one plan per kept point,
    /// fire-and-forget. Returns the suggestion documents.
    pub async fn ask_and_dispatch(&self, batch_size: usize) -> CoreResult<Vec<Suggestion>> {
        let (documents, points) = self.agent.ask(batch_size)?;
        for point in &points {
            let plan = self.agent.measurement_plan(point)?;
            dispatch_fire_and_forget(&self.dispatcher, plan);
        }
        Ok(documents)
    }

    /// Restart the agent, optionally replaying prior history back through
    /// `tell` (moving the state machine from `Idle` back to `Active`).
    ///
    /// # Errors
    ///
    /// Propagates history-source failures and shape errors from replayed
    /// records; records before the failing one remain told.
    pub async fn restart(
        &self,
        options: RestartOptions,
        reingest_from: Option<&dyn HistorySource>,
    ) -> CoreResult<usize> {
        self.agent.restart(options);
        let Some(source) = reingest_from else {
            return Ok(0);
        };

        let records = source.records().await?;
        let count = records.len();
        for record in records {
            self.agent
                .tell(&record.absolute_position(), &record.observable)?;
        }
        info!(count, "reingested history after restart");
        Ok(count)
    }
}

/// Tell one document, then run the configured on-tell behaviors.
///
/// Only a failed tell fails the document; follow-up behaviors log their own
/// errors so one bad ask cannot stall ingestion.
async fn ingest_one(
    agent: &Arc<ClusterAgent>,
    unpacker: &dyn RunUnpacker,
    dispatcher: &Arc<dyn PlanDispatcher>,
    record: &crate::traits::RunRecord,
) -> CoreResult<()> {
    let (x, y) = unpacker.unpack_run(record)?;
    agent.tell(&x, &y)?;

    let config = agent.config();

    if config.report_on_tell {
        match agent.report() {
            Ok(report) => debug!(cache_len = report.cache_len, "report on tell"),
            // Retryable: the model just needs more data.
            Err(err) if err.is_retryable() => debug!(error = %err, "report deferred"),
            Err(err) => error!(error = %err, "report on tell failed"),
        }
    }

    if config.ask_on_tell {
        match agent.ask(ON_TELL_BATCH_SIZE) {
            Ok((_, points)) => {
                if config.direct_to_queue {
                    for point in &points {
                        match agent.measurement_plan(point) {
                            Ok(plan) => dispatch_fire_and_forget(dispatcher, plan),
                            Err(err) => error!(error = %err, "plan rejected"),
                        }
                    }
                }
            }
            Err(err) if err.is_retryable() => debug!(error = %err, "ask deferred"),
            Err(err) => error!(error = %err, "ask on tell failed"),
        }
    }

    Ok(())
}

/// Submit without awaiting: the queue owns completion and retries.
fn dispatch_fire_and_forget(
    dispatcher: &Arc<dyn PlanDispatcher>,
    plan: crate::traits::MeasurementPlan,
) {
    let dispatcher = dispatcher.clone();
    tokio::spawn(async move {
        let name = plan.name.clone();
        match dispatcher.submit(plan).await {
            Ok(handle) => debug!(plan = %name, job = %handle, "plan submitted"),
            Err(err) => warn!(plan = %name, error = %err, "dispatch failed"),
        }
    });
}
