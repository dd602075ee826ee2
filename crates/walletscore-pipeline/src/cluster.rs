//! k-means over the log-transformed, min-max scaled feature space.
//!
//! Each restart seeds with k-means++ and runs Lloyd iterations until the
//! total squared centroid shift drops below `tolerance` times the mean
//! column variance, or `max_iterations` is reached. The restart with the
//! lowest inertia wins; earlier restarts win ties. All restarts draw from
//! one RNG seeded with `seed`, so a fit is reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use walletscore_core::constants::FEATURE_COUNT;
use walletscore_core::error::ClusterError;
use walletscore_core::features::FeatureColumn;
use walletscore_core::table::FeatureTable;

use crate::config::PipelineConfig;
use crate::scaling::{log_floor, MinMaxScaler};

/// A point in the scaled feature space.
pub type Point = [f64; FEATURE_COUNT];

/// Result of fitting the partition.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterFit {
    /// Cluster id per input row, in input order.
    pub assignments: Vec<usize>,
    /// Fitted centroids in scaled space, indexed by cluster id.
    pub centroids: Vec<Point>,
    /// Input rows in scaled space.
    pub scaled: Vec<Point>,
    /// Within-cluster sum of squared distances.
    pub inertia: f64,
    /// Lloyd iterations run by the winning restart.
    pub iterations: usize,
}

impl ClusterFit {
    pub fn cluster_count(&self) -> usize {
        self.centroids.len()
    }

    /// Members per cluster id.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &c in &self.assignments {
            if let Some(s) = sizes.get_mut(c) {
                *s += 1;
            }
        }
        sizes
    }

    /// Euclidean distance from row `row` to its own centroid.
    pub fn distance_to_centroid(&self, row: usize) -> f64 {
        squared_distance(&self.scaled[row], &self.centroids[self.assignments[row]]).sqrt()
    }
}

#[derive(Debug, Clone)]
pub struct ClusterEngine {
    clusters: usize,
    restarts: usize,
    max_iterations: usize,
    tolerance: f64,
    epsilon: f64,
    seed: u64,
}

impl ClusterEngine {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            clusters: config.clusters,
            restarts: config.kmeans_restarts.max(1),
            max_iterations: config.max_iterations.max(1),
            tolerance: config.tolerance,
            epsilon: config.epsilon,
            seed: config.seed,
        }
    }

    /// Log-transform and scale the table's features.
    pub fn transform(&self, table: &FeatureTable) -> Result<Vec<Point>, ClusterError> {
        let mut logged = Vec::with_capacity(table.len());
        for (i, row) in table.rows().iter().enumerate() {
            if let Some(column) = row.features.first_non_finite() {
                return Err(ClusterError::NonFiniteInput { row: i, column: column.name() });
            }
            let mut p = [0.0; FEATURE_COUNT];
            for column in FeatureColumn::ALL {
                p[column.index()] = log_floor(row.features[column], self.epsilon);
            }
            logged.push(p);
        }

        let scaler = MinMaxScaler::fit(&logged);
        Ok(logged
            .iter()
            .map(|p| {
                let mut out = [0.0; FEATURE_COUNT];
                for (j, x) in p.iter().enumerate() {
                    out[j] = scaler.transform_value(j, *x);
                }
                out
            })
            .collect())
    }

    /// Fit the partition over every row of `table`.
    pub fn fit(&self, table: &FeatureTable) -> Result<ClusterFit, ClusterError> {
        if self.clusters == 0 {
            return Err(ClusterError::ZeroClusters);
        }
        if table.len() < self.clusters {
            return Err(ClusterError::TooFewRows { rows: table.len(), clusters: self.clusters });
        }

        let scaled = self.transform(table)?;
        let threshold = self.tolerance * mean_variance(&scaled);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut best: Option<Restart> = None;
        for restart in 0..self.restarts {
            let run = self.lloyd(&scaled, threshold, &mut rng);
            debug!(restart, inertia = run.inertia, iterations = run.iterations, "k-means restart");
            if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }
        let Some(best) = best else {
            return Err(ClusterError::ZeroClusters);
        };

        let fit = ClusterFit {
            assignments: best.assignments,
            centroids: best.centroids,
            scaled,
            inertia: best.inertia,
            iterations: best.iterations,
        };
        info!(
            rows = table.len(),
            clusters = self.clusters,
            inertia = fit.inertia,
            sizes = ?fit.sizes(),
            "fitted clusters"
        );
        Ok(fit)
    }

    fn lloyd(&self, points: &[Point], threshold: f64, rng: &mut StdRng) -> Restart {
        let k = self.clusters;
        let mut centroids = kmeans_plus_plus(points, k, rng);
        let mut assignments = vec![0; points.len()];
        let mut iterations = 0;

        for _ in 0..self.max_iterations {
            iterations += 1;
            assign(points, &centroids, &mut assignments);
            let updated = update_centroids(points, &mut assignments, k);
            let shift: f64 = centroids
                .iter()
                .zip(&updated)
                .map(|(a, b)| squared_distance(a, b))
                .sum();
            centroids = updated;
            if shift <= threshold {
                break;
            }
        }

        let inertia = assign(points, &centroids, &mut assignments);
        Restart { assignments, centroids, inertia, iterations }
    }
}

struct Restart {
    assignments: Vec<usize>,
    centroids: Vec<Point>,
    inertia: f64,
    iterations: usize,
}

pub fn squared_distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the nearest centroid; ties go to the lowest id.
fn nearest(point: &Point, centroids: &[Point]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

/// Assign every point to its nearest centroid. Returns the inertia.
fn assign(points: &[Point], centroids: &[Point], assignments: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (p, slot) in points.iter().zip(assignments.iter_mut()) {
        let (c, d) = nearest(p, centroids);
        *slot = c;
        inertia += d;
    }
    inertia
}

/// Recompute means. An empty cluster takes over the point farthest from
/// its current centroid.
fn update_centroids(points: &[Point], assignments: &mut [usize], k: usize) -> Vec<Point> {
    let mut sums = vec![[0.0; FEATURE_COUNT]; k];
    let mut counts = vec![0usize; k];
    for (p, &c) in points.iter().zip(assignments.iter()) {
        counts[c] += 1;
        for (s, x) in sums[c].iter_mut().zip(p) {
            *s += x;
        }
    }
    let mut centroids: Vec<Point> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &n)| {
            let mut m = *s;
            if n > 0 {
                m.iter_mut().for_each(|x| *x /= n as f64);
            }
            m
        })
        .collect();

    let empties: Vec<usize> = (0..k).filter(|&c| counts[c] == 0).collect();
    for empty in empties {
        let mut far = (0, -1.0);
        for (i, p) in points.iter().enumerate() {
            let owner = assignments[i];
            if counts[owner] <= 1 {
                continue;
            }
            let d = squared_distance(p, &centroids[owner]);
            if d > far.1 {
                far = (i, d);
            }
        }
        if far.1 < 0.0 {
            continue;
        }
        let (i, _) = far;
        debug!(cluster = empty, point = i, "reseeding empty cluster");
        counts[assignments[i]] -= 1;
        assignments[i] = empty;
        counts[empty] = 1;
        centroids[empty] = points[i];
    }
    centroids
}

fn kmeans_plus_plus(points: &[Point], k: usize, rng: &mut StdRng) -> Vec<Point> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);
    let mut closest: Vec<f64> = points.iter().map(|p| squared_distance(p, &centroids[0])).collect();

    while centroids.len() < k {
        let total: f64 = closest.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.gen_range(0.0..total);
            let mut chosen = points.len() - 1;
            for (i, d) in closest.iter().enumerate() {
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            rng.gen_range(0..points.len())
        };
        let c = points[next];
        for (d, p) in closest.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &c));
        }
        centroids.push(c);
    }
    centroids
}

fn mean_variance(points: &[Point]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let n = points.len() as f64;
    let mut total = 0.0;
    for j in 0..FEATURE_COUNT {
        let mean = points.iter().map(|p| p[j]).sum::<f64>() / n;
        total += points.iter().map(|p| (p[j] - mean).powi(2)).sum::<f64>() / n;
    }
    total / FEATURE_COUNT as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletscore_core::features::FeatureVector;
    use walletscore_core::table::FeatureRow;

    fn engine() -> ClusterEngine {
        ClusterEngine::new(&PipelineConfig::default())
    }

    /// Five well separated groups along the debt and health axes.
    fn grouped_table(per_group: usize) -> FeatureTable {
        let mut rows = Vec::new();
        for g in 0..5 {
            for i in 0..per_group {
                let jitter = 1.0 + i as f64 * 0.01;
                let v = FeatureVector::zeroed()
                    .with(FeatureColumn::TotalOutstandingDebt, 10f64.powi(g * 2) * jitter)
                    .with(FeatureColumn::AverageHealthFactor, 10f64.powi(4 - g) * jitter)
                    .with(FeatureColumn::WalletAgeDays, 100.0);
                rows.push(FeatureRow::new(format!("g{g}-{i}").as_str(), v));
            }
        }
        FeatureTable::new(rows)
    }

    #[test]
    fn recovers_separated_groups() {
        let fit = engine().fit(&grouped_table(8)).unwrap();
        assert_eq!(fit.cluster_count(), 5);
        for g in 0..5 {
            let members = &fit.assignments[g * 8..(g + 1) * 8];
            assert!(members.iter().all(|&c| c == members[0]), "group {g} split: {members:?}");
        }
        let mut distinct: Vec<usize> = (0..5).map(|g| fit.assignments[g * 8]).collect();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), 5);
    }

    #[test]
    fn fit_is_deterministic() {
        let table = grouped_table(6);
        assert_eq!(engine().fit(&table).unwrap(), engine().fit(&table).unwrap());
    }

    #[test]
    fn scaled_values_lie_in_unit_interval() {
        let fit = engine().fit(&grouped_table(4)).unwrap();
        assert!(fit.scaled.iter().flatten().all(|x| (0.0..=1.0).contains(x)));
    }

    #[test]
    fn too_few_rows() {
        let err = engine().fit(&grouped_table(0)).unwrap_err();
        assert_eq!(err, ClusterError::TooFewRows { rows: 0, clusters: 5 });
    }

    #[test]
    fn zero_clusters_rejected() {
        let cfg = PipelineConfig { clusters: 0, ..PipelineConfig::default() };
        let err = ClusterEngine::new(&cfg).fit(&grouped_table(2)).unwrap_err();
        assert_eq!(err, ClusterError::ZeroClusters);
    }

    #[test]
    fn non_finite_input_rejected() {
        let mut table = grouped_table(2);
        table.rows_mut()[3].features[FeatureColumn::DebtToAssetRatio] = f64::NAN;
        let err = engine().fit(&table).unwrap_err();
        assert_eq!(
            err,
            ClusterError::NonFiniteInput { row: 3, column: FeatureColumn::DebtToAssetRatio.name() }
        );
    }

    #[test]
    fn every_row_is_assigned_to_a_valid_cluster() {
        let fit = engine().fit(&grouped_table(3)).unwrap();
        assert_eq!(fit.assignments.len(), 15);
        assert!(fit.assignments.iter().all(|&c| c < 5));
        assert_eq!(fit.sizes().iter().sum::<usize>(), 15);
    }

    #[test]
    fn nearest_prefers_lowest_id_on_ties() {
        let p = [0.5; FEATURE_COUNT];
        let centroids = [[0.0; FEATURE_COUNT], [1.0; FEATURE_COUNT]];
        assert_eq!(nearest(&p, &centroids).0, 0);
    }

    #[test]
    fn empty_cluster_takes_farthest_point() {
        let mut points = vec![[0.0; FEATURE_COUNT]; 3];
        points[2][0] = 1.0;
        let mut assignments = vec![0, 0, 0];
        let centroids = update_centroids(&points, &mut assignments, 2);
        assert_eq!(assignments, vec![0, 0, 1]);
        assert_eq!(centroids[1], points[2]);
    }

    #[test]
    fn several_empty_clusters_never_drain_a_donor() {
        let mut points = vec![[0.0; FEATURE_COUNT]; 4];
        for (i, p) in points.iter_mut().enumerate() {
            p[0] = i as f64;
        }
        let mut assignments = vec![0, 0, 0, 0];
        update_centroids(&points, &mut assignments, 4);

        let mut sizes = [0; 4];
        for &c in &assignments {
            sizes[c] += 1;
        }
        assert_eq!(sizes, [1, 1, 1, 1]);
    }
}
