//! Uncertainty-driven candidate selection.
//!
//! The estimator turns the current cluster fit into a ranked or sampled set
//! of next measurement positions, in one of two mutually exclusive modes
//! keyed by the dimensionality of the search bounds:
//!
//! - **1-D**: per-sample uncertainty = minimum distance from the observable
//!   to any cluster center; a polynomial fit of uncertainty against position
//!   is evaluated over the bounds at motor resolution, clipped at zero, and
//!   sampled as an unnormalized probability mass. Draws are with replacement;
//!   duplicates are resolved later by the knowledge-index filter.
//! - **2-D**: a circular candidate grid over the bounds; a multinomial
//!   classifier mapping positions to predicted cluster labels yields class
//!   probabilities per grid point; candidates are ranked by Shannon entropy
//!   and returned most-informative-first.
//!
//! An uncertainty curve that sums to zero cannot be made into a distribution
//! and surfaces as a configuration error — never a silent division by zero.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::clustering::KMeansEngine;
use crate::config::{defaults, AgentConfig, AxisRange, SearchBounds};
use crate::error::{AgentError, CoreResult};

/// Probability floor for entropy computation. Keeps `ln` defined when the
/// classifier drives a class probability to zero.
const PROB_FLOOR: f64 = 1e-12;

/// Ridge added to the normal-equation diagonal so duplicate positions cannot
/// make the polynomial fit singular.
const POLYFIT_RIDGE: f64 = 1e-9;

/// Candidate positions plus the cluster centers that produced them.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    /// Proposed positions, most informative first (2-D) or in draw order (1-D).
    pub points: Vec<Vec<f64>>,
    /// Cluster centers of the fit used for scoring, for logging/metadata.
    pub centers: Vec<Vec<f64>>,
}

/// Candidate selector. Owns the sampling RNG so successive asks continue one
/// reproducible stream instead of replaying the same draws.
#[derive(Debug)]
pub struct UncertaintyEstimator {
    rng: ChaCha8Rng,
}

impl UncertaintyEstimator {
    /// Create an estimator with a seeded sampling stream.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Refit the engine on the current caches and propose candidates.
    ///
    /// `batch_size = None` requests the full sampled/ranked set — the
    /// oversupply the dedup-aware ask walks through.
    ///
    /// # Errors
    ///
    /// - [`AgentError::InsufficientData`] when the cache is smaller than the
    ///   cluster count (propagated from the refit).
    /// - [`AgentError::Configuration`] when the 1-D curve sums to zero or the
    ///   grid is empty at the configured resolution.
    pub fn propose(
        &mut self,
        config: &AgentConfig,
        engine: &mut KMeansEngine,
        independent: &[Vec<f64>],
        dependent: &[Vec<f64>],
        batch_size: Option<usize>,
    ) -> CoreResult<CandidateSet> {
        let (sorted_independent, sorted_dependent) = sort_joint(independent, dependent);

        engine.refit(&sorted_dependent)?;
        let centers: Vec<Vec<f64>> = engine
            .cluster_centers()
            .map(|c| c.to_vec())
            .unwrap_or_default();

        let points = match config.bounds {
            SearchBounds::Line(range) => self.sample_line(
                config,
                range,
                engine,
                &sorted_independent,
                &sorted_dependent,
                batch_size,
            )?,
            SearchBounds::Plane { x, y } => self.rank_plane(
                config,
                x,
                y,
                engine,
                &sorted_independent,
                &sorted_dependent,
                batch_size,
            )?,
        };

        Ok(CandidateSet { points, centers })
    }

    /// 1-D mode: polynomial-fit sampling.
    fn sample_line(
        &mut self,
        config: &AgentConfig,
        range: AxisRange,
        engine: &KMeansEngine,
        independent: &[Vec<f64>],
        dependent: &[Vec<f64>],
        batch_size: Option<usize>,
    ) -> CoreResult<Vec<Vec<f64>>> {
        let centers = engine
            .cluster_centers()
            .ok_or_else(|| AgentError::configuration("sampling before a successful fit"))?;
        let scores = min_distance_scores(dependent, centers);
        let positions: Vec<f64> = independent.iter().map(|x| x[0]).collect();

        // Degree capped at n-1 keeps the normal equations well-posed on
        // short caches.
        let degree = config.poly_degree.min(positions.len().saturating_sub(1)).max(1);
        let coeffs = polyfit(&positions, &scores, degree)?;

        let grid = arange(range.lo, range.hi, config.motor_resolution);
        if grid.is_empty() {
            return Err(AgentError::configuration(format!(
                "no grid points in [{}, {}) at resolution {}",
                range.lo, range.hi, config.motor_resolution
            )));
        }

        let weights: Vec<f64> = grid
            .iter()
            .map(|&x| polyval(&coeffs, x).max(0.0))
            .collect();
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return Err(AgentError::configuration(
                "uncertainty curve sums to zero: no signal to sample from",
            ));
        }

        let n_draws = batch_size.unwrap_or(grid.len());
        let dist = WeightedIndex::new(&weights)
            .map_err(|e| AgentError::configuration(format!("degenerate distribution: {e}")))?;
        let picks: Vec<Vec<f64>> = (0..n_draws)
            .map(|_| vec![grid[dist.sample(&mut self.rng)]])
            .collect();

        debug!(draws = picks.len(), grid = grid.len(), "1-D uncertainty sampling");
        Ok(picks)
    }

    /// 2-D mode: entropy over the circular grid, most informative first.
    #[allow(clippy::too_many_arguments)]
    fn rank_plane(
        &mut self,
        config: &AgentConfig,
        x: AxisRange,
        y: AxisRange,
        engine: &KMeansEngine,
        independent: &[Vec<f64>],
        dependent: &[Vec<f64>],
        batch_size: Option<usize>,
    ) -> CoreResult<Vec<Vec<f64>>> {
        let grid = wafer_grid(x, y, config.motor_resolution, config.grid_radius_fraction);
        if grid.is_empty() {
            return Err(AgentError::configuration(format!(
                "empty candidate grid at resolution {} over {:?} x {:?}",
                config.motor_resolution, x, y
            )));
        }

        let labels = engine
            .predict(dependent)
            .ok_or_else(|| AgentError::configuration("ranking before a successful fit"))?;

        let classifier = SoftmaxClassifier::fit(independent, &labels);
        let entropy: Vec<f64> = grid
            .iter()
            .map(|p| shannon_entropy(&classifier.predict_proba(p)))
            .collect();

        // Ascending entropy; the top of the ranking (highest entropy = least
        // certain = most informative) is walked first by the caller.
        let mut order: Vec<usize> = (0..grid.len()).collect();
        order.sort_by(|&a, &b| {
            entropy[a]
                .partial_cmp(&entropy[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let take = batch_size.unwrap_or(grid.len()).min(grid.len());
        let picks: Vec<Vec<f64>> = order
            .iter()
            .rev()
            .take(take)
            .map(|&i| grid[i].clone())
            .collect();

        debug!(
            candidates = grid.len(),
            kept = picks.len(),
            "2-D entropy ranking"
        );
        Ok(picks)
    }
}

/// Minimum distance from each sample to any cluster center — the raw
/// uncertainty score. Higher means the sample is less well explained by the
/// existing clusters.
pub fn min_distance_scores(samples: &[Vec<f64>], centers: &[Vec<f64>]) -> Vec<f64> {
    samples
        .iter()
        .map(|s| {
            centers
                .iter()
                .map(|c| crate::clustering::euclidean_distance(s, c))
                .fold(f64::MAX, f64::min)
        })
        .collect()
}

/// Sort (x, y) pairs jointly by x, ties broken by y, so the pairing survives
/// the sort intact.
pub fn sort_joint(
    independent: &[Vec<f64>],
    dependent: &[Vec<f64>],
) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let mut order: Vec<usize> = (0..independent.len()).collect();
    order.sort_by(|&a, &b| {
        lex_cmp(&independent[a], &independent[b])
            .then_with(|| lex_cmp(&dependent[a], &dependent[b]))
    });
    (
        order.iter().map(|&i| independent[i].clone()).collect(),
        order.iter().map(|&i| dependent[i].clone()).collect(),
    )
}

fn lex_cmp(a: &[f64], b: &[f64]) -> std::cmp::Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.partial_cmp(y) {
            Some(std::cmp::Ordering::Equal) | None => continue,
            Some(ord) => return ord,
        }
    }
    a.len().cmp(&b.len())
}

/// Half-open range `[lo, hi)` at the given step.
pub fn arange(lo: f64, hi: f64, step: f64) -> Vec<f64> {
    let mut out = Vec::new();
    if step <= 0.0 {
        return out;
    }
    let n = ((hi - lo) / step).ceil() as usize;
    for i in 0..n {
        let v = lo + i as f64 * step;
        if v < hi {
            out.push(v);
        }
    }
    out
}

/// All grid positions inside the circle of `radius_fraction` of the bounds'
/// half-extent, centered at the bounds' midpoint.
///
/// Corners of the rectangle are excluded on purpose: at the edge of the
/// wafer the geometric validity of a measurement is least certain.
pub fn wafer_grid(x: AxisRange, y: AxisRange, step: f64, radius_fraction: f64) -> Vec<Vec<f64>> {
    let xs = arange(x.lo, x.hi, step);
    let ys = arange(y.lo, y.hi, step);
    let center = [x.midpoint(), y.midpoint()];
    let radius = (x.extent() / 2.0).min(y.extent() / 2.0) * radius_fraction;

    let mut grid = Vec::new();
    for &gy in &ys {
        for &gx in &xs {
            let dist = ((gx - center[0]).powi(2) + (gy - center[1]).powi(2)).sqrt();
            if dist < radius {
                grid.push(vec![gx, gy]);
            }
        }
    }
    grid
}

/// Least-squares polynomial fit, coefficients in ascending-power order.
///
/// Solves the Vandermonde normal equations with a small ridge on the
/// diagonal; duplicate sample positions therefore cannot make the system
/// singular.
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> CoreResult<Vec<f64>> {
    let n = degree + 1;
    if xs.len() != ys.len() || xs.is_empty() {
        return Err(AgentError::configuration(
            "polynomial fit needs equally many positions and scores",
        ));
    }

    // Normal equations: (V^T V) c = V^T y with V_{ij} = x_i^j.
    let mut ata = vec![vec![0.0f64; n]; n];
    let mut aty = vec![0.0f64; n];
    for (&x, &y) in xs.iter().zip(ys) {
        let mut powers = vec![1.0f64; 2 * n - 1];
        for p in 1..2 * n - 1 {
            powers[p] = powers[p - 1] * x;
        }
        for i in 0..n {
            aty[i] += powers[i] * y;
            for j in 0..n {
                ata[i][j] += powers[i + j];
            }
        }
    }
    for (i, row) in ata.iter_mut().enumerate() {
        row[i] += POLYFIT_RIDGE;
    }

    solve_linear(ata, aty)
}

/// Evaluate ascending-power coefficients at `x` (Horner form).
pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Gaussian elimination with partial pivoting.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> CoreResult<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| {
                a[r1][col]
                    .abs()
                    .partial_cmp(&a[r2][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot_row][col].abs() < f64::EPSILON {
            return Err(AgentError::configuration(
                "singular system in polynomial fit",
            ));
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0f64; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for col in row + 1..n {
            acc -= a[row][col] * x[col];
        }
        x[row] = acc / a[row][row];
    }
    Ok(x)
}

/// Shannon entropy with the probability floored at [`PROB_FLOOR`], so a
/// zero-probability class contributes zero rather than NaN.
pub fn shannon_entropy(probabilities: &[f64]) -> f64 {
    -probabilities
        .iter()
        .map(|&p| p * p.max(PROB_FLOOR).ln())
        .sum::<f64>()
}

/// Multinomial logistic (softmax) classifier from positions to cluster
/// labels. Deterministic: zero-initialized weights, full-batch gradient
/// descent on standardized features with a small L2 penalty.
#[derive(Debug)]
pub struct SoftmaxClassifier {
    /// Distinct labels, ascending; output probabilities follow this order.
    classes: Vec<usize>,
    feature_means: Vec<f64>,
    feature_stds: Vec<f64>,
    /// One weight row per class: `[bias, w_1, ..., w_d]`.
    weights: Vec<Vec<f64>>,
}

impl SoftmaxClassifier {
    /// Fit on `positions` (rows) against `labels` (one per row).
    pub fn fit(positions: &[Vec<f64>], labels: &[usize]) -> Self {
        let dim = positions.first().map(|p| p.len()).unwrap_or(0);

        let mut classes: Vec<usize> = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();

        let (means, stds) = feature_moments(positions, dim);
        let mut weights = vec![vec![0.0f64; dim + 1]; classes.len()];

        if classes.len() < 2 || positions.is_empty() {
            // Point-mass posterior; nothing to learn.
            return Self {
                classes,
                feature_means: means,
                feature_stds: stds,
                weights,
            };
        }

        let n = positions.len() as f64;
        let standardized: Vec<Vec<f64>> = positions
            .iter()
            .map(|p| standardize(p, &means, &stds))
            .collect();
        let class_index: Vec<usize> = labels
            .iter()
            .map(|l| {
                classes
                    .iter()
                    .position(|c| c == l)
                    .unwrap_or(0)
            })
            .collect();

        for _ in 0..defaults::SOFTMAX_MAX_ITER {
            let mut grad = vec![vec![0.0f64; dim + 1]; classes.len()];

            for (features, &target) in standardized.iter().zip(&class_index) {
                let proba = softmax_scores(&weights, features);
                for (c, row) in grad.iter_mut().enumerate() {
                    let err = proba[c] - if c == target { 1.0 } else { 0.0 };
                    row[0] += err;
                    for (d, &f) in features.iter().enumerate() {
                        row[d + 1] += err * f;
                    }
                }
            }

            for (w_row, g_row) in weights.iter_mut().zip(&grad) {
                for (w, &g) in w_row.iter_mut().zip(g_row) {
                    *w -= defaults::SOFTMAX_LEARNING_RATE * (g / n + defaults::SOFTMAX_L2 * *w);
                }
            }
        }

        Self {
            classes,
            feature_means: means,
            feature_stds: stds,
            weights,
        }
    }

    /// Class probabilities for one position, ordered by ascending label.
    pub fn predict_proba(&self, position: &[f64]) -> Vec<f64> {
        if self.classes.len() < 2 {
            return vec![1.0; self.classes.len().max(1)];
        }
        let features = standardize(position, &self.feature_means, &self.feature_stds);
        softmax_scores(&self.weights, &features)
    }

    /// Labels this classifier can emit, ascending.
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }
}

fn feature_moments(positions: &[Vec<f64>], dim: usize) -> (Vec<f64>, Vec<f64>) {
    let n = positions.len().max(1) as f64;
    let mut means = vec![0.0f64; dim];
    for p in positions {
        for (d, &v) in p.iter().enumerate() {
            means[d] += v / n;
        }
    }
    let mut stds = vec![0.0f64; dim];
    for p in positions {
        for (d, &v) in p.iter().enumerate() {
            stds[d] += (v - means[d]).powi(2) / n;
        }
    }
    for s in stds.iter_mut() {
        *s = s.sqrt();
        if *s < f64::EPSILON {
            *s = 1.0;
        }
    }
    (means, stds)
}

fn standardize(position: &[f64], means: &[f64], stds: &[f64]) -> Vec<f64> {
    position
        .iter()
        .zip(means.iter().zip(stds))
        .map(|(&v, (&m, &s))| (v - m) / s)
        .collect()
}

/// Numerically stable softmax over per-class linear scores.
fn softmax_scores(weights: &[Vec<f64>], features: &[f64]) -> Vec<f64> {
    let logits: Vec<f64> = weights
        .iter()
        .map(|row| {
            row[0]
                + row[1..]
                    .iter()
                    .zip(features)
                    .map(|(w, f)| w * f)
                    .sum::<f64>()
        })
        .collect();
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;

    #[test]
    fn arange_half_open() {
        let grid = arange(0.0, 1.0, 0.25);
        assert_eq!(grid, vec![0.0, 0.25, 0.5, 0.75]);
        assert!(arange(0.0, 1.0, -0.1).is_empty());
    }

    #[test]
    fn polyfit_recovers_quadratic() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.5 - 5.0).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 2.0 * x * x - 3.0 * x + 1.0).collect();
        let coeffs = polyfit(&xs, &ys, 2).unwrap();
        assert!((coeffs[0] - 1.0).abs() < 1e-6, "{coeffs:?}");
        assert!((coeffs[1] + 3.0).abs() < 1e-6, "{coeffs:?}");
        assert!((coeffs[2] - 2.0).abs() < 1e-6, "{coeffs:?}");
    }

    #[test]
    fn polyval_horner() {
        // 1 + 2x + 3x^2 at x = 2 -> 17
        assert_eq!(polyval(&[1.0, 2.0, 3.0], 2.0), 17.0);
    }

    #[test]
    fn polyfit_survives_duplicate_positions() {
        let xs = vec![1.0, 1.0, 1.0, 2.0];
        let ys = vec![3.0, 3.0, 3.0, 5.0];
        assert!(polyfit(&xs, &ys, 1).is_ok());
    }

    #[test]
    fn min_distance_score_highlights_unexplained_sample() {
        // One center at 2.0, observables 1, 3, 10 at positions 0, 1, 2 ->
        // the sample at position 2.0 scores highest.
        let centers = vec![vec![2.0]];
        let samples = vec![vec![1.0], vec![3.0], vec![10.0]];
        let scores = min_distance_scores(&samples, &centers);
        assert_eq!(scores, vec![1.0, 1.0, 8.0]);
        let argmax = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(argmax, 2);
    }

    #[test]
    fn joint_sort_keeps_pairs_together() {
        let xs = vec![vec![2.0], vec![0.0], vec![1.0], vec![1.0]];
        let ys = vec![vec![20.0], vec![0.0], vec![11.0], vec![10.0]];
        let (sx, sy) = sort_joint(&xs, &ys);
        assert_eq!(sx, vec![vec![0.0], vec![1.0], vec![1.0], vec![2.0]]);
        // Tie at x = 1.0 broken by the dependent entry.
        assert_eq!(sy, vec![vec![0.0], vec![10.0], vec![11.0], vec![20.0]]);
    }

    #[test]
    fn wafer_grid_stays_inside_circle() {
        let x = AxisRange::new(-5.0, 5.0);
        let y = AxisRange::new(-5.0, 5.0);
        let grid = wafer_grid(x, y, 0.5, 0.95);
        assert!(!grid.is_empty());
        let radius = 5.0 * 0.95;
        for p in &grid {
            let dist = (p[0].powi(2) + p[1].powi(2)).sqrt();
            assert!(dist < radius, "{p:?} outside radius {radius}");
        }
        // The corner of the rectangle is excluded.
        assert!(!grid.iter().any(|p| p[0] < -4.5 && p[1] < -4.5));
    }

    #[test]
    fn entropy_maximal_for_uniform() {
        let uniform = shannon_entropy(&[0.25, 0.25, 0.25, 0.25]);
        let peaked = shannon_entropy(&[0.97, 0.01, 0.01, 0.01]);
        assert!(uniform > peaked);
        // Zero probabilities stay finite.
        assert!(shannon_entropy(&[1.0, 0.0]).is_finite());
    }

    #[test]
    fn softmax_separates_left_from_right() {
        let positions: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![i as f64 / 4.0 - 5.0, 0.0])
            .collect();
        let labels: Vec<usize> = positions
            .iter()
            .map(|p| usize::from(p[0] > 0.0))
            .collect();
        let clf = SoftmaxClassifier::fit(&positions, &labels);

        let left = clf.predict_proba(&[-4.0, 0.0]);
        let right = clf.predict_proba(&[4.0, 0.0]);
        assert!(left[0] > 0.9, "{left:?}");
        assert!(right[1] > 0.9, "{right:?}");

        // Near the decision edge the posterior is genuinely uncertain.
        let edge = clf.predict_proba(&[0.0, 0.0]);
        assert!(shannon_entropy(&edge) > shannon_entropy(&left));
    }

    #[test]
    fn single_class_posterior_is_point_mass() {
        let positions = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let clf = SoftmaxClassifier::fit(&positions, &[2, 2]);
        assert_eq!(clf.predict_proba(&[0.5, 0.5]), vec![1.0]);
    }

    #[test]
    fn zero_curve_is_a_configuration_error() {
        // All observables sit exactly on the single center: every score is
        // zero, the fitted curve is (numerically) zero everywhere, and no
        // distribution can be built from it.
        let cfg = AgentConfig::line("motor", AxisRange::new(0.0, 1.0), 1).with_resolution(0.1);
        let mut engine = KMeansEngine::new(1, cfg.seed);
        let mut estimator = UncertaintyEstimator::new(cfg.seed);

        let xs = vec![vec![0.1], vec![0.5], vec![0.9]];
        let ys = vec![vec![4.0], vec![4.0], vec![4.0]];
        let result = estimator.propose(&cfg, &mut engine, &xs, &ys, Some(1));
        assert!(matches!(result, Err(AgentError::Configuration(_))));
    }

    #[test]
    fn one_dimensional_mode_draws_within_bounds() {
        let cfg = AgentConfig::line("motor", AxisRange::new(-5.0, 5.0), 2).with_resolution(0.1);
        let mut engine = KMeansEngine::new(2, cfg.seed);
        let mut estimator = UncertaintyEstimator::new(cfg.seed);

        let xs: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64 - 5.0]).collect();
        let ys: Vec<Vec<f64>> = (0..10)
            .map(|i| vec![if i < 5 { 0.0 } else { 10.0 }, i as f64])
            .collect();

        let set = estimator
            .propose(&cfg, &mut engine, &xs, &ys, Some(4))
            .unwrap();
        assert_eq!(set.points.len(), 4);
        assert_eq!(set.centers.len(), 2);
        for p in &set.points {
            assert!(p.len() == 1 && p[0] >= -5.0 && p[0] < 5.0, "{p:?}");
        }
    }

    #[test]
    fn two_dimensional_mode_ranks_full_grid_when_unbounded() {
        let cfg = AgentConfig::plane(
            ["wafer_x", "wafer_y"],
            AxisRange::new(-2.0, 2.0),
            AxisRange::new(-2.0, 2.0),
            2,
        )
        .with_resolution(0.5);
        let mut engine = KMeansEngine::new(2, cfg.seed);
        let mut estimator = UncertaintyEstimator::new(cfg.seed);

        let xs: Vec<Vec<f64>> = (0..12)
            .map(|i| vec![(i % 4) as f64 - 1.5, (i / 4) as f64 - 1.0])
            .collect();
        let ys: Vec<Vec<f64>> = xs
            .iter()
            .map(|p| vec![if p[0] < 0.0 { 0.0 } else { 8.0 }])
            .collect();

        let grid_len = wafer_grid(
            AxisRange::new(-2.0, 2.0),
            AxisRange::new(-2.0, 2.0),
            0.5,
            cfg.grid_radius_fraction,
        )
        .len();

        let full = estimator
            .propose(&cfg, &mut engine, &xs, &ys, None)
            .unwrap();
        assert_eq!(full.points.len(), grid_len);

        let top = estimator
            .propose(&cfg, &mut engine, &xs, &ys, Some(3))
            .unwrap();
        assert_eq!(top.points.len(), 3);
        // The top pick is the head of the full ranking.
        assert_eq!(top.points[0], full.points[0]);
    }
}
