//! Agent configuration and named defaults.
//!
//! Magic numbers live here as named constants, not inline literals. The two
//! empirical constants of the selection algorithm — the polynomial degree of
//! the 1-D uncertainty fit and the radius fraction of the 2-D candidate grid —
//! are ordinary configuration fields with named defaults, so a deployment can
//! tune them without touching the algorithm.

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, CoreResult};

/// Defaults shared by configuration and tests.
pub mod defaults {
    /// Degree of the 1-D uncertainty polynomial fit.
    pub const POLY_DEGREE: usize = 5;

    /// Fraction of the half-extent used as the 2-D candidate-grid radius.
    ///
    /// Sampling is kept away from the bounds' corners, where geometric
    /// validity of the wafer is least certain.
    pub const GRID_RADIUS_FRACTION: f64 = 0.95;

    /// Seed for the clustering and sampling RNG.
    pub const SEED: u64 = 42;

    /// Lloyd-iteration cap for a single k-means refit.
    pub const KMEANS_MAX_ITER: usize = 100;

    /// Gradient-descent iterations for the multinomial classifier.
    pub const SOFTMAX_MAX_ITER: usize = 200;

    /// Gradient-descent step size for the multinomial classifier.
    pub const SOFTMAX_LEARNING_RATE: f64 = 0.5;

    /// L2 penalty applied to classifier weights.
    pub const SOFTMAX_L2: f64 = 1e-3;

    /// Plan name dispatched to the execution queue.
    pub const PLAN_NAME: &str = "agent_move_and_measure";
}

/// Closed interval on one motor axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    /// Lower edge, inclusive.
    pub lo: f64,
    /// Upper edge, exclusive for grid construction.
    pub hi: f64,
}

impl AxisRange {
    /// Create a range; `lo < hi` is enforced by [`AgentConfig::validate`].
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Width of the range.
    pub fn extent(&self) -> f64 {
        self.hi - self.lo
    }

    /// Midpoint of the range.
    pub fn midpoint(&self) -> f64 {
        self.lo + self.extent() / 2.0
    }

    /// True when `v` lies within `[lo, hi]`.
    pub fn contains(&self, v: f64) -> bool {
        v >= self.lo && v <= self.hi
    }
}

/// Search bounds: a line segment for 1-D scans, a rectangle for 2-D scans.
///
/// The dimensionality of the bounds selects the candidate-selection mode:
/// polynomial-fit sampling on a line, entropy-over-grid on a plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SearchBounds {
    /// One independent axis.
    Line(AxisRange),
    /// Two independent axes.
    Plane {
        /// First motor axis.
        x: AxisRange,
        /// Second motor axis.
        y: AxisRange,
    },
}

impl SearchBounds {
    /// Number of independent axes.
    pub fn dim(&self) -> usize {
        match self {
            SearchBounds::Line(_) => 1,
            SearchBounds::Plane { .. } => 2,
        }
    }

    /// True when `point` (agent-relative) lies inside the bounds.
    pub fn contains(&self, point: &[f64]) -> bool {
        match self {
            SearchBounds::Line(r) => point.len() == 1 && r.contains(point[0]),
            SearchBounds::Plane { x, y } => {
                point.len() == 2 && x.contains(point[0]) && y.contains(point[1])
            }
        }
    }

    /// Flattened `[lo, hi]` pairs, axis-major. Used for error payloads and
    /// the property surface.
    pub fn flatten(&self) -> Vec<f64> {
        match self {
            SearchBounds::Line(r) => vec![r.lo, r.hi],
            SearchBounds::Plane { x, y } => vec![x.lo, x.hi, y.lo, y.hi],
        }
    }
}

/// Full configuration of a steering agent.
///
/// Constructed once, validated with [`AgentConfig::validate`], then owned by
/// the agent. Individual fields remain writable at runtime through the
/// property surface; setters re-run the relevant validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Human-readable agent name, surfaced read-only over the property table.
    pub instance_name: String,

    /// Motor names, one per independent axis, in axis order.
    pub motor_names: Vec<String>,

    /// Absolute origin of the agent-relative frame, one entry per axis.
    ///
    /// `tell` subtracts this from incoming positions; `measurement_plan`
    /// adds it back before dispatch.
    pub motor_origins: Vec<f64>,

    /// Minimum meaningful motor step (beam width / 2), in the same units as
    /// the bounds. Also the discretization resolution of the knowledge index.
    pub motor_resolution: f64,

    /// Search bounds in agent-relative coordinates.
    pub bounds: SearchBounds,

    /// Cluster count for the observable model.
    pub n_clusters: usize,

    /// Degree of the 1-D uncertainty polynomial fit.
    pub poly_degree: usize,

    /// Radius fraction of the 2-D candidate grid.
    pub grid_radius_fraction: f64,

    /// RNG seed; refits and draws are reproducible for a fixed seed and cache.
    pub seed: u64,

    /// When set, every `tell` is followed by an `ask`.
    pub ask_on_tell: bool,

    /// When set, every `tell` is followed by a `report`.
    pub report_on_tell: bool,

    /// When set, plans from runtime-triggered asks go straight to the queue.
    pub direct_to_queue: bool,

    /// Plan name used by `measurement_plan`.
    pub plan_name: String,
}

impl AgentConfig {
    /// Configuration for a 1-D scan over `bounds` with `n_clusters` clusters.
    pub fn line(motor: impl Into<String>, bounds: AxisRange, n_clusters: usize) -> Self {
        Self {
            motor_names: vec![motor.into()],
            motor_origins: vec![0.0],
            bounds: SearchBounds::Line(bounds),
            n_clusters,
            ..Self::base()
        }
    }

    /// Configuration for a 2-D scan over the rectangle `x × y`.
    pub fn plane(
        motors: [&str; 2],
        x: AxisRange,
        y: AxisRange,
        n_clusters: usize,
    ) -> Self {
        Self {
            motor_names: motors.iter().map(|m| m.to_string()).collect(),
            motor_origins: vec![0.0, 0.0],
            bounds: SearchBounds::Plane { x, y },
            n_clusters,
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            instance_name: "wafer-scout".to_string(),
            motor_names: Vec::new(),
            motor_origins: Vec::new(),
            motor_resolution: 0.1,
            bounds: SearchBounds::Line(AxisRange::new(0.0, 1.0)),
            n_clusters: 3,
            poly_degree: defaults::POLY_DEGREE,
            grid_radius_fraction: defaults::GRID_RADIUS_FRACTION,
            seed: defaults::SEED,
            ask_on_tell: false,
            report_on_tell: false,
            direct_to_queue: true,
            plan_name: defaults::PLAN_NAME.to_string(),
        }
    }

    /// Set the absolute origin of the relative frame.
    #[must_use]
    pub fn with_origins(mut self, origins: Vec<f64>) -> Self {
        self.motor_origins = origins;
        self
    }

    /// Set the motor resolution.
    #[must_use]
    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.motor_resolution = resolution;
        self
    }

    /// Set the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fail-fast validation of every invariant the algorithms rely on.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Configuration`] on the first violated invariant:
    /// non-positive or non-finite resolution, inverted bounds, zero clusters,
    /// axis-count mismatches, a zero-degree polynomial, or a radius fraction
    /// outside `(0, 1]`.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.motor_resolution.is_finite() || self.motor_resolution <= 0.0 {
            return Err(AgentError::configuration(format!(
                "motor_resolution must be finite and > 0, got {}",
                self.motor_resolution
            )));
        }

        let ranges: Vec<AxisRange> = match self.bounds {
            SearchBounds::Line(r) => vec![r],
            SearchBounds::Plane { x, y } => vec![x, y],
        };
        for r in &ranges {
            if !r.lo.is_finite() || !r.hi.is_finite() || r.lo >= r.hi {
                return Err(AgentError::configuration(format!(
                    "bounds must satisfy lo < hi with finite edges, got [{}, {}]",
                    r.lo, r.hi
                )));
            }
        }

        if self.n_clusters == 0 {
            return Err(AgentError::configuration(
                "n_clusters must be a positive integer",
            ));
        }

        let dim = self.bounds.dim();
        if self.motor_names.len() != dim {
            return Err(AgentError::configuration(format!(
                "{} motor names for {}-dimensional bounds",
                self.motor_names.len(),
                dim
            )));
        }
        if self.motor_origins.len() != dim {
            return Err(AgentError::configuration(format!(
                "{} origin components for {}-dimensional bounds",
                self.motor_origins.len(),
                dim
            )));
        }

        if self.poly_degree == 0 {
            return Err(AgentError::configuration("poly_degree must be >= 1"));
        }
        if !(self.grid_radius_fraction > 0.0 && self.grid_radius_fraction <= 1.0) {
            return Err(AgentError::configuration(format!(
                "grid_radius_fraction must be in (0, 1], got {}",
                self.grid_radius_fraction
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_config_validates() {
        let cfg = AgentConfig::line("motor", AxisRange::new(-5.0, 5.0), 3);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.bounds.dim(), 1);
    }

    #[test]
    fn plane_config_validates() {
        let cfg = AgentConfig::plane(
            ["wafer_x", "wafer_y"],
            AxisRange::new(-5.0, 5.0),
            AxisRange::new(-5.0, 5.0),
            3,
        );
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.bounds.dim(), 2);
        assert_eq!(cfg.motor_names.len(), 2);
    }

    #[test]
    fn zero_resolution_rejected() {
        let cfg = AgentConfig::line("motor", AxisRange::new(0.0, 1.0), 2).with_resolution(0.0);
        assert!(matches!(
            cfg.validate(),
            Err(AgentError::Configuration(_))
        ));
    }

    #[test]
    fn negative_resolution_rejected() {
        let cfg = AgentConfig::line("motor", AxisRange::new(0.0, 1.0), 2).with_resolution(-0.5);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_bounds_rejected() {
        let cfg = AgentConfig::line("motor", AxisRange::new(2.0, -2.0), 2);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_clusters_rejected() {
        let cfg = AgentConfig::line("motor", AxisRange::new(0.0, 1.0), 0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bounds_containment() {
        let b = SearchBounds::Plane {
            x: AxisRange::new(-1.0, 1.0),
            y: AxisRange::new(-1.0, 1.0),
        };
        assert!(b.contains(&[0.0, 0.5]));
        assert!(!b.contains(&[0.0, 1.5]));
        assert!(!b.contains(&[0.0]));
    }
}
