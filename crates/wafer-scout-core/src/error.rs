//! Error types for wafer-scout-core.
//!
//! One unified error enum covers the whole crate. Library code never panics;
//! every fallible path returns [`CoreResult`] and propagates with `?`.
//!
//! Two of the variants deserve care at call sites:
//!
//! - [`AgentError::InsufficientData`] is retryable — the fit simply needs more
//!   told observations. Callers on the ingestion path should log and move on.
//! - [`AgentError::Configuration`] is fatal — the agent must not proceed with
//!   a degenerate distribution or a zero resolution.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type CoreResult<T> = Result<T, AgentError>;

/// Unified error type for the steering agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Observation dimensionality conflicts with the cached sequences.
    #[error("shape mismatch for {which}: expected {expected} components, got {actual}")]
    Shape {
        /// Which sequence rejected the observation (`"independent"` or `"dependent"`).
        which: &'static str,
        /// Dimensionality established by prior entries.
        expected: usize,
        /// Dimensionality of the rejected observation.
        actual: usize,
    },

    /// A fit was attempted with fewer samples than cluster centers.
    ///
    /// # Recovery
    ///
    /// Retryable: tell more observations and ask again. A previous successful
    /// fit, if any, is left intact.
    #[error("insufficient data: {samples} samples for {clusters} clusters")]
    InsufficientData {
        /// Samples currently cached.
        samples: usize,
        /// Configured cluster count.
        clusters: usize,
    },

    /// A requested point lies outside the configured search bounds.
    ///
    /// The operation is aborted with no partial mutation.
    #[error("point {point:?} lies outside bounds {bounds:?}")]
    OutOfBounds {
        /// The offending point (agent-relative coordinates).
        point: Vec<f64>,
        /// Flattened `[lo, hi]` pairs per axis.
        bounds: Vec<f64>,
    },

    /// The agent configuration is unusable (zero resolution, empty bounds,
    /// an uncertainty curve that sums to zero, ...). Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The document stream handed over a record the unpacker cannot reduce.
    #[error("malformed run record: {0}")]
    MalformedRecord(String),

    /// The execution queue rejected a submitted plan.
    ///
    /// Dispatch is fire-and-forget; this is only ever logged, never retried
    /// by the agent itself.
    #[error("dispatch failed for plan '{plan}': {reason}")]
    Dispatch {
        /// Plan name that was submitted.
        plan: String,
        /// Queue-side failure description.
        reason: String,
    },
}

impl AgentError {
    /// Shorthand for a [`AgentError::Configuration`] with a formatted message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        AgentError::Configuration(msg.into())
    }

    /// True when the caller may simply retry after more data arrives.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::InsufficientData { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_is_retryable() {
        let err = AgentError::InsufficientData {
            samples: 1,
            clusters: 3,
        };
        assert!(err.is_retryable());
        assert!(!AgentError::configuration("bad").is_retryable());
    }

    #[test]
    fn display_carries_context() {
        let err = AgentError::Shape {
            which: "dependent",
            expected: 10,
            actual: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("dependent"));
        assert!(msg.contains("10"));
        assert!(msg.contains("7"));
    }
}
