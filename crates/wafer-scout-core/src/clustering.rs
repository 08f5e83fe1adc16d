//! Seeded k-means engine over the dependent-variable cache.
//!
//! Every [`KMeansEngine::refit`] fits fresh on the samples it is handed — no
//! incremental update — so the model always reflects the current cache.
//! Initialization is k-means++ driven by a `ChaCha8Rng` seeded from the agent
//! configuration: the same seed and the same cache give the same fit.
//!
//! A failed refit (too few samples) leaves the previous successful fit
//! intact; changing the cluster count invalidates the fit outright and the
//! next `ask`/`report` refits.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::defaults;
use crate::error::{AgentError, CoreResult};

/// Squared Euclidean distance between two equal-length vectors.
pub fn euclidean_distance_squared(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Euclidean distance between two equal-length vectors.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    euclidean_distance_squared(a, b).sqrt()
}

/// Relabel a sequence so distinct labels appear in first-seen order.
///
/// The first distinct label seen becomes `0`, the next distinct label `1`,
/// and so on (0-based, matching cluster indices everywhere else):
///
/// ```
/// use wafer_scout_core::clustering::ordered_relabeling;
///
/// assert_eq!(
///     ordered_relabeling(&[4, 4, 1, 1, 2, 1, 3]),
///     vec![0, 0, 1, 1, 2, 1, 3]
/// );
/// ```
pub fn ordered_relabeling(labels: &[usize]) -> Vec<usize> {
    let mut mapping: Vec<(usize, usize)> = Vec::new();
    let mut next = 0usize;
    for &label in labels {
        if !mapping.iter().any(|&(raw, _)| raw == label) {
            mapping.push((label, next));
            next += 1;
        }
    }
    labels
        .iter()
        .map(|&label| {
            mapping
                .iter()
                .find(|&&(raw, _)| raw == label)
                .map(|&(_, new)| new)
                .unwrap_or(label)
        })
        .collect()
}

/// Result of one successful refit.
#[derive(Debug, Clone)]
struct KMeansFit {
    centers: Vec<Vec<f64>>,
}

/// Refittable k-means estimator.
#[derive(Debug)]
pub struct KMeansEngine {
    n_clusters: usize,
    max_iter: usize,
    seed: u64,
    fit: Option<KMeansFit>,
}

impl KMeansEngine {
    /// Create an unfitted engine.
    pub fn new(n_clusters: usize, seed: u64) -> Self {
        Self {
            n_clusters,
            max_iter: defaults::KMEANS_MAX_ITER,
            seed,
            fit: None,
        }
    }

    /// Configured cluster count.
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// True when a successful refit is current.
    pub fn is_fitted(&self) -> bool {
        self.fit.is_some()
    }

    /// Update the cluster count. Does not refit; the current fit (if any) is
    /// invalidated and the next `refit` call rebuilds the model.
    ///
    /// # Errors
    ///
    /// [`AgentError::Configuration`] when `k` is zero.
    pub fn set_cluster_count(&mut self, k: usize) -> CoreResult<()> {
        if k == 0 {
            return Err(AgentError::configuration(
                "cluster count must be a positive integer",
            ));
        }
        self.n_clusters = k;
        self.fit = None;
        Ok(())
    }

    /// Drop the current fit without touching the configuration. Used by a
    /// full agent restart so no stale centers survive into the next report.
    pub fn invalidate(&mut self) {
        self.fit = None;
    }

    /// Fit fresh on `samples`.
    ///
    /// # Errors
    ///
    /// [`AgentError::InsufficientData`] when fewer samples exist than the
    /// configured cluster count; a previous successful fit stays intact.
    pub fn refit(&mut self, samples: &[Vec<f64>]) -> CoreResult<()> {
        if samples.len() < self.n_clusters {
            return Err(AgentError::InsufficientData {
                samples: samples.len(),
                clusters: self.n_clusters,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut centers = self.init_centers(samples, &mut rng);
        let mut assignments = vec![0usize; samples.len()];

        let mut iteration = 0;
        loop {
            iteration += 1;

            let mut changed = false;
            for (i, sample) in samples.iter().enumerate() {
                let nearest = nearest_center(sample, &centers);
                if nearest != assignments[i] {
                    assignments[i] = nearest;
                    changed = true;
                }
            }

            if !changed || iteration >= self.max_iter {
                debug!(iteration, changed, "k-means converged");
                break;
            }

            centers = recompute_centers(samples, &assignments, &centers);
        }

        self.fit = Some(KMeansFit { centers });
        Ok(())
    }

    /// Cluster centers from the current fit, row per cluster.
    ///
    /// `None` until a successful [`KMeansEngine::refit`], and again after
    /// [`KMeansEngine::set_cluster_count`].
    pub fn cluster_centers(&self) -> Option<&[Vec<f64>]> {
        self.fit.as_ref().map(|f| f.centers.as_slice())
    }

    /// Nearest-center label for each sample. `None` when unfitted.
    pub fn predict(&self, samples: &[Vec<f64>]) -> Option<Vec<usize>> {
        let fit = self.fit.as_ref()?;
        Some(
            samples
                .iter()
                .map(|s| nearest_center(s, &fit.centers))
                .collect(),
        )
    }

    /// Distance matrix: one row per sample, one column per center.
    /// `None` when unfitted.
    pub fn transform(&self, samples: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
        let fit = self.fit.as_ref()?;
        Some(
            samples
                .iter()
                .map(|s| fit.centers.iter().map(|c| euclidean_distance(s, c)).collect())
                .collect(),
        )
    }

    /// k-means++ initialization: first center uniform, the rest proportional
    /// to squared distance from the nearest chosen center.
    fn init_centers(&self, samples: &[Vec<f64>], rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
        let mut centers: Vec<Vec<f64>> = Vec::with_capacity(self.n_clusters);
        centers.push(samples[rng.gen_range(0..samples.len())].clone());

        let mut min_d2 = vec![f64::MAX; samples.len()];
        for _ in 1..self.n_clusters {
            let last = centers.last().cloned().unwrap_or_default();
            for (i, sample) in samples.iter().enumerate() {
                let d2 = euclidean_distance_squared(sample, &last);
                if d2 < min_d2[i] {
                    min_d2[i] = d2;
                }
            }

            match WeightedIndex::new(min_d2.iter().copied()) {
                Ok(dist) => centers.push(samples[dist.sample(rng)].clone()),
                // All remaining points coincide with chosen centers; any
                // sample is as good as any other.
                Err(_) => centers.push(samples[rng.gen_range(0..samples.len())].clone()),
            }
        }

        centers
    }
}

fn nearest_center(sample: &[f64], centers: &[Vec<f64>]) -> usize {
    let mut best = 0usize;
    let mut best_d2 = f64::MAX;
    for (i, center) in centers.iter().enumerate() {
        let d2 = euclidean_distance_squared(sample, center);
        if d2 < best_d2 {
            best_d2 = d2;
            best = i;
        }
    }
    best
}

/// Mean of each cluster's members; a cluster left empty keeps its previous
/// center so the matrix shape never degrades mid-fit.
fn recompute_centers(
    samples: &[Vec<f64>],
    assignments: &[usize],
    previous: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    let k = previous.len();
    let dim = previous.first().map(|c| c.len()).unwrap_or(0);
    let mut sums = vec![vec![0.0f64; dim]; k];
    let mut counts = vec![0usize; k];

    for (sample, &cluster) in samples.iter().zip(assignments) {
        counts[cluster] += 1;
        for (d, v) in sample.iter().enumerate() {
            sums[cluster][d] += v;
        }
    }

    sums.into_iter()
        .zip(counts)
        .enumerate()
        .map(|(cluster, (mut sum, count))| {
            if count == 0 {
                previous[cluster].clone()
            } else {
                for v in sum.iter_mut() {
                    *v /= count as f64;
                }
                sum
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two tight blobs around (0, 0) and (10, 10).
    fn two_blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.1],
            vec![0.1, 0.0],
            vec![-0.1, 0.1],
            vec![10.0, 10.1],
            vec![10.1, 9.9],
            vec![9.9, 10.0],
        ]
    }

    #[test]
    fn refit_separates_blobs() {
        let mut engine = KMeansEngine::new(2, 42);
        engine.refit(&two_blobs()).unwrap();

        let centers = engine.cluster_centers().unwrap();
        assert_eq!(centers.len(), 2);
        let near_origin = centers
            .iter()
            .any(|c| euclidean_distance(c, &[0.0, 0.066]) < 1.0);
        let near_ten = centers
            .iter()
            .any(|c| euclidean_distance(c, &[10.0, 10.0]) < 1.0);
        assert!(near_origin && near_ten, "centers: {centers:?}");
    }

    #[test]
    fn refit_is_deterministic_for_fixed_seed() {
        let samples = two_blobs();
        let mut a = KMeansEngine::new(2, 7);
        let mut b = KMeansEngine::new(2, 7);
        a.refit(&samples).unwrap();
        b.refit(&samples).unwrap();
        assert_eq!(a.cluster_centers().unwrap(), b.cluster_centers().unwrap());
    }

    #[test]
    fn too_few_samples_is_insufficient_data() {
        let mut engine = KMeansEngine::new(3, 42);
        let err = engine.refit(&[vec![1.0], vec![2.0]]).unwrap_err();
        assert!(matches!(
            err,
            AgentError::InsufficientData {
                samples: 2,
                clusters: 3,
            }
        ));
        assert!(!engine.is_fitted());
    }

    #[test]
    fn failed_refit_keeps_previous_fit() {
        let mut engine = KMeansEngine::new(2, 42);
        engine.refit(&two_blobs()).unwrap();
        let before = engine.cluster_centers().unwrap().to_vec();

        assert!(engine.refit(&[vec![0.0, 0.0]]).is_err());
        assert_eq!(engine.cluster_centers().unwrap(), before.as_slice());
    }

    #[test]
    fn set_cluster_count_invalidates_fit() {
        let mut engine = KMeansEngine::new(2, 42);
        engine.refit(&two_blobs()).unwrap();
        engine.set_cluster_count(3).unwrap();
        assert!(!engine.is_fitted());
        assert!(engine.cluster_centers().is_none());
        assert_eq!(engine.n_clusters(), 3);
    }

    #[test]
    fn zero_cluster_count_rejected() {
        let mut engine = KMeansEngine::new(2, 42);
        assert!(engine.set_cluster_count(0).is_err());
    }

    #[test]
    fn predict_assigns_nearest_center() {
        let mut engine = KMeansEngine::new(2, 42);
        engine.refit(&two_blobs()).unwrap();
        let labels = engine
            .predict(&[vec![0.05, 0.05], vec![10.05, 10.05]])
            .unwrap();
        assert_ne!(labels[0], labels[1]);
    }

    #[test]
    fn transform_gives_distance_per_center() {
        let mut engine = KMeansEngine::new(2, 42);
        engine.refit(&two_blobs()).unwrap();
        let rows = engine.transform(&[vec![0.0, 0.0]]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 2);
        // One center is close, the other ~14 away.
        let min = rows[0].iter().cloned().fold(f64::MAX, f64::min);
        let max = rows[0].iter().cloned().fold(f64::MIN, f64::max);
        assert!(min < 1.0);
        assert!(max > 10.0);
    }

    #[test]
    fn relabeling_is_first_seen_zero_based() {
        assert_eq!(
            ordered_relabeling(&[4, 4, 1, 1, 2, 1, 3]),
            vec![0, 0, 1, 1, 2, 1, 3]
        );
        assert_eq!(ordered_relabeling(&[]), Vec::<usize>::new());
        assert_eq!(ordered_relabeling(&[0, 0, 0]), vec![0, 0, 0]);
    }
}
