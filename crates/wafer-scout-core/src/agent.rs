//! The closed-loop steering agent: tell / ask / report.
//!
//! [`ClusterAgent`] orchestrates the caches, the knowledge index, the
//! clustering engine, and the uncertainty estimator behind one exclusive
//! lock. `tell` must never interleave with the body of `ask` or `report` —
//! a concurrent append would invalidate the length-stable cache the fit runs
//! on — so every mutating or model-fitting operation takes the lock for its
//! whole duration. Read-only telemetry (`phase`, `cache_len`) reads
//! atomically-published mirrors and never contends.
//!
//! The agent operates in a relative coordinate frame: `tell` subtracts the
//! configured origin from incoming positions, `measurement_plan` adds it
//! back before dispatch.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::cache::{StateCache, TellRecord};
use crate::clustering::KMeansEngine;
use crate::config::{AgentConfig, SearchBounds};
use crate::error::{AgentError, CoreResult};
use crate::knowledge::{KnowledgeIndex, KnowledgeKey};
use crate::traits::MeasurementPlan;
use crate::uncertainty::UncertaintyEstimator;

/// Protocol state of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AgentPhase {
    /// No observations told yet.
    Idle = 0,
    /// At least one observation told.
    Active = 1,
    /// Inside an `ask` call.
    Deciding = 2,
    /// Inside a `report` call.
    Reporting = 3,
}

impl AgentPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => AgentPhase::Active,
            2 => AgentPhase::Deciding,
            3 => AgentPhase::Reporting,
            _ => AgentPhase::Idle,
        }
    }
}

impl std::fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentPhase::Idle => write!(f, "Idle"),
            AgentPhase::Active => write!(f, "Active"),
            AgentPhase::Deciding => write!(f, "Deciding"),
            AgentPhase::Reporting => write!(f, "Reporting"),
        }
    }
}

/// One kept candidate, as returned by `ask`.
///
/// Transient: exists only in the ask-response, never persisted by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Proposed position, agent-relative.
    pub suggestion: Vec<f64>,
    /// Cluster centers of the fit that scored this candidate.
    pub cluster_centers: Vec<Vec<f64>>,
    /// Cache length at ask time.
    pub cache_len: usize,
    /// Most recent tell document at ask time.
    pub latest_record: Option<TellRecord>,
    /// Batch size the caller requested.
    pub requested_batch_size: usize,
    /// Shortfall attributed to redundancy: `requested - kept`.
    pub redundant_points_discarded: usize,
    /// Origin offset of the relative frame.
    pub absolute_position_offset: Vec<f64>,
}

/// Read-only snapshot produced by `report`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Centers of the freshly refit model.
    pub cluster_centers: Vec<Vec<f64>>,
    /// Number of told observations.
    pub cache_len: usize,
    /// Most recent tell document.
    pub latest_record: Option<TellRecord>,
    /// Snapshot time.
    pub time: DateTime<Utc>,
}

/// Options for [`ClusterAgent::restart`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RestartOptions {
    /// Also clear the knowledge index (default: keep it, so previously
    /// explored cells stay suppressed across the restart).
    pub clear_knowledge: bool,
}

/// Everything guarded by the exclusive lock.
struct AgentState {
    config: AgentConfig,
    cache: StateCache,
    knowledge: KnowledgeIndex,
    engine: KMeansEngine,
    estimator: UncertaintyEstimator,
}

/// The closed-loop decision agent.
pub struct ClusterAgent {
    state: Mutex<AgentState>,
    // Atomically-published mirrors for lock-free readers.
    phase: AtomicU8,
    cache_len: AtomicUsize,
}

impl ClusterAgent {
    /// Build an agent from a validated configuration.
    ///
    /// # Errors
    ///
    /// [`AgentError::Configuration`] when the configuration is unusable.
    pub fn new(config: AgentConfig) -> CoreResult<Self> {
        config.validate()?;
        let engine = KMeansEngine::new(config.n_clusters, config.seed);
        let estimator = UncertaintyEstimator::new(config.seed);
        info!(
            name = %config.instance_name,
            dim = config.bounds.dim(),
            k = config.n_clusters,
            "agent created"
        );
        Ok(Self {
            state: Mutex::new(AgentState {
                config,
                cache: StateCache::new(),
                knowledge: KnowledgeIndex::new(),
                engine,
                estimator,
            }),
            phase: AtomicU8::new(AgentPhase::Idle as u8),
            cache_len: AtomicUsize::new(0),
        })
    }

    // ------------------------------------------------------------------
    // Protocol
    // ------------------------------------------------------------------

    /// Ingest one observed `(position, observable)` pair.
    ///
    /// `x` arrives in absolute coordinates; the configured origin is
    /// subtracted before storage and recorded in the returned document. The
    /// discretized position is added to the knowledge index so the agent
    /// never re-suggests a cell it has already measured.
    ///
    /// # Errors
    ///
    /// [`AgentError::Shape`] when the dimensionality conflicts with the
    /// configuration or the established cache entries.
    pub fn tell(&self, x: &[f64], y: &[f64]) -> CoreResult<TellRecord> {
        let mut state = self.state.lock();

        let origins = state.config.motor_origins.clone();
        if x.len() != origins.len() {
            return Err(AgentError::Shape {
                which: "independent",
                expected: origins.len(),
                actual: x.len(),
            });
        }

        let relative: Vec<f64> = x.iter().zip(&origins).map(|(v, o)| v - o).collect();
        let record = TellRecord::new(relative.clone(), y.to_vec(), origins);
        state.cache.append(record.clone())?;

        let key = KnowledgeKey::encode(&relative, state.config.motor_resolution);
        state.knowledge.insert(key);

        self.cache_len.store(state.cache.len(), Ordering::Release);
        self.publish_phase(AgentPhase::Active);
        debug!(uid = %record.uid, cache_len = state.cache.len(), "told observation");
        Ok(record)
    }

    /// Request the next batch of non-redundant candidate positions.
    ///
    /// Internally the estimator is asked for its full sampled/ranked supply;
    /// the walk keeps the first `batch_size` candidates whose discretized key
    /// is not already known, records the kept keys, and logs every discard.
    /// Exhausting the supply before the batch is full yields fewer
    /// suggestions — that is not an error.
    ///
    /// # Errors
    ///
    /// [`AgentError::InsufficientData`] while the cache is smaller than the
    /// cluster count; [`AgentError::Configuration`] when no distribution can
    /// be built.
    pub fn ask(&self, batch_size: usize) -> CoreResult<(Vec<Suggestion>, Vec<Vec<f64>>)> {
        let mut state = self.state.lock();
        self.publish_phase(AgentPhase::Deciding);
        let result = Self::ask_locked(&mut state, batch_size);
        self.publish_phase(if state.cache.is_empty() {
            AgentPhase::Idle
        } else {
            AgentPhase::Active
        });
        result
    }

    fn ask_locked(
        state: &mut AgentState,
        batch_size: usize,
    ) -> CoreResult<(Vec<Suggestion>, Vec<Vec<f64>>)> {
        let AgentState {
            config,
            cache,
            knowledge,
            engine,
            estimator,
        } = state;

        // Oversupply: unbounded batch, so redundant candidates can be
        // skipped without starving the request.
        let candidates = estimator.propose(
            config,
            engine,
            cache.independent(),
            cache.dependent(),
            None,
        )?;

        let mut kept: Vec<Vec<f64>> = Vec::with_capacity(batch_size);
        for point in &candidates.points {
            if kept.len() >= batch_size {
                break;
            }
            let key = KnowledgeKey::encode(point, config.motor_resolution);
            if knowledge.contains(&key) {
                warn!(point = ?point, key = ?key.cells(), "suggestion ignored: already in knowledge index");
                continue;
            }
            knowledge.insert(key);
            kept.push(point.clone());
        }

        if kept.len() < batch_size {
            debug!(
                requested = batch_size,
                kept = kept.len(),
                "candidate supply exhausted before batch filled"
            );
        }

        let discarded = batch_size.saturating_sub(kept.len());
        let documents: Vec<Suggestion> = kept
            .iter()
            .map(|point| Suggestion {
                suggestion: point.clone(),
                cluster_centers: candidates.centers.clone(),
                cache_len: cache.len(),
                latest_record: cache.latest().cloned(),
                requested_batch_size: batch_size,
                redundant_points_discarded: discarded,
                absolute_position_offset: config.motor_origins.clone(),
            })
            .collect();

        Ok((documents, kept))
    }

    /// Refit on the current cache and snapshot the model state.
    ///
    /// Pure read/compute: the knowledge index is untouched and the caches
    /// are only read. A failed refit leaves any previous fit intact.
    pub fn report(&self) -> CoreResult<Report> {
        let mut state = self.state.lock();
        self.publish_phase(AgentPhase::Reporting);

        let result = (|| {
            let AgentState { cache, engine, .. } = &mut *state;
            engine.refit(cache.dependent())?;
            Ok(Report {
                cluster_centers: engine
                    .cluster_centers()
                    .map(|c| c.to_vec())
                    .unwrap_or_default(),
                cache_len: cache.len(),
                latest_record: cache.latest().cloned(),
                time: Utc::now(),
            })
        })();

        self.publish_phase(if state.cache.is_empty() {
            AgentPhase::Idle
        } else {
            AgentPhase::Active
        });
        result
    }

    /// Clear the caches (and optionally the knowledge index) and return to
    /// `Idle`. Reingestion of prior history, when wanted, is driven by the
    /// runtime replaying records back through [`ClusterAgent::tell`].
    pub fn restart(&self, options: RestartOptions) {
        let mut state = self.state.lock();
        state.cache.clear();
        state.engine.invalidate();
        if options.clear_knowledge {
            state.knowledge.clear();
        }
        self.cache_len.store(0, Ordering::Release);
        self.publish_phase(AgentPhase::Idle);
        info!(
            clear_knowledge = options.clear_knowledge,
            "agent restarted"
        );
    }

    /// Translate a kept (relative) candidate into a dispatchable plan.
    ///
    /// The origin offset is added back so the queue receives absolute motor
    /// positions, keyed by motor name.
    ///
    /// # Errors
    ///
    /// [`AgentError::OutOfBounds`] when the relative point lies outside the
    /// configured search bounds; nothing is dispatched.
    pub fn measurement_plan(&self, relative_point: &[f64]) -> CoreResult<MeasurementPlan> {
        let state = self.state.lock();
        let config = &state.config;

        if !config.bounds.contains(relative_point) {
            return Err(AgentError::OutOfBounds {
                point: relative_point.to_vec(),
                bounds: config.bounds.flatten(),
            });
        }

        let mut kwargs = Map::new();
        for ((name, rel), origin) in config
            .motor_names
            .iter()
            .zip(relative_point)
            .zip(&config.motor_origins)
        {
            kwargs.insert(name.clone(), Value::from(rel + origin));
        }

        Ok(MeasurementPlan {
            name: config.plan_name.clone(),
            args: Vec::new(),
            kwargs,
        })
    }

    // ------------------------------------------------------------------
    // Configuration surface
    // ------------------------------------------------------------------

    /// Snapshot of the current configuration.
    pub fn config(&self) -> AgentConfig {
        self.state.lock().config.clone()
    }

    /// Update the cluster count; invalidates the current fit, which is
    /// rebuilt on the next `ask`/`report`.
    pub fn set_n_clusters(&self, k: usize) -> CoreResult<()> {
        let mut state = self.state.lock();
        state.engine.set_cluster_count(k)?;
        state.config.n_clusters = k;
        info!(k, "cluster count updated, fit invalidated");
        Ok(())
    }

    /// Update the motor resolution used for grids and knowledge keys.
    pub fn set_motor_resolution(&self, resolution: f64) -> CoreResult<()> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(AgentError::configuration(format!(
                "motor_resolution must be finite and > 0, got {resolution}"
            )));
        }
        self.state.lock().config.motor_resolution = resolution;
        Ok(())
    }

    /// Replace the search bounds. The dimensionality must stay the same —
    /// caches and the knowledge index are keyed by it.
    pub fn set_bounds(&self, bounds: SearchBounds) -> CoreResult<()> {
        let mut state = self.state.lock();
        if bounds.dim() != state.config.bounds.dim() {
            return Err(AgentError::configuration(format!(
                "cannot change bounds dimensionality from {} to {}",
                state.config.bounds.dim(),
                bounds.dim()
            )));
        }
        state.config.bounds = bounds;
        Ok(())
    }

    /// Toggle ask-on-tell behavior.
    pub fn set_ask_on_tell(&self, flag: bool) {
        self.state.lock().config.ask_on_tell = flag;
    }

    /// Toggle report-on-tell behavior.
    pub fn set_report_on_tell(&self, flag: bool) {
        self.state.lock().config.report_on_tell = flag;
    }

    /// Toggle direct dispatch of runtime-triggered ask results.
    pub fn set_direct_to_queue(&self, flag: bool) {
        self.state.lock().config.direct_to_queue = flag;
    }

    // ------------------------------------------------------------------
    // Lock-free telemetry
    // ------------------------------------------------------------------

    /// Current protocol phase.
    pub fn phase(&self) -> AgentPhase {
        AgentPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Number of told observations.
    pub fn cache_len(&self) -> usize {
        self.cache_len.load(Ordering::Acquire)
    }

    /// Number of distinct knowledge keys recorded.
    pub fn knowledge_len(&self) -> usize {
        self.state.lock().knowledge.len()
    }

    fn publish_phase(&self, phase: AgentPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}
