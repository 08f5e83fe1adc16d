//! Wafer-Scout Core Library
//!
//! Closed-loop steering agent for autonomous wafer measurement. After each
//! completed experiment the agent decides where to measure next, suppressing
//! redundant locations with a discretized knowledge index and quantifying
//! the informativeness of candidate positions with an online-refit
//! clustering model.
//!
//! # Architecture
//!
//! ```text
//! DocumentStream → unpack_run → tell → StateCache + KnowledgeIndex
//!                                          │
//!                        ask → KMeansEngine refit → UncertaintyEstimator
//!                                          │
//!                  KnowledgeIndex redundancy filter → Suggestions
//!                                          │
//!                    measurement_plan → PlanDispatcher (fire-and-forget)
//! ```
//!
//! This crate defines:
//! - The protocol surface ([`agent::ClusterAgent`]: tell / ask / report)
//! - State storage ([`cache::StateCache`], [`knowledge::KnowledgeIndex`])
//! - The candidate-selection algorithms ([`uncertainty::UncertaintyEstimator`])
//! - Trait seams toward external collaborators ([`traits`]) and in-memory
//!   stubs for tests and demos ([`stubs`])
//! - The supervisor-driven lifecycle ([`runtime::AgentRuntime`])
//! - The remote-control property table ([`properties::PropertyRegistry`])

pub mod agent;
pub mod cache;
pub mod clustering;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod properties;
pub mod runtime;
pub mod stubs;
pub mod traits;
pub mod uncertainty;

// Re-exports for convenience
pub use agent::{AgentPhase, ClusterAgent, Report, RestartOptions, Suggestion};
pub use cache::{StateCache, TellRecord};
pub use config::{AgentConfig, AxisRange, SearchBounds};
pub use error::{AgentError, CoreResult};
pub use knowledge::{KnowledgeIndex, KnowledgeKey};
pub use runtime::AgentRuntime;
pub use traits::{DocumentStream, MeasurementPlan, PlanDispatcher, RunRecord, RunUnpacker};
