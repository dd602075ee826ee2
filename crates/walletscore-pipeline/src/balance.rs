//! Rebalances a labeled table across score bands by nearest-neighbor
//! interpolation.
//!
//! Rows are min-max scaled over the 18 features plus the score. Every
//! band below the majority count receives new rows, each placed at a
//! uniformly random point on the segment between a randomly chosen band
//! member and one of its `neighbors` nearest same-band rows. New rows are
//! mapped back to original units and their scores clamped to the band.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use walletscore_core::band::ScoreBand;
use walletscore_core::constants::FEATURE_COUNT;
use walletscore_core::error::{BalanceError, TableError};
use walletscore_core::features::FeatureVector;
use walletscore_core::table::{BalancedRow, BalancedTable, LabeledTable, RowOrigin};

use crate::config::BalanceConfig;
use crate::scaling::MinMaxScaler;

const WIDTH: usize = FEATURE_COUNT + 1;

#[derive(Debug, Clone)]
pub struct ClassBalancer {
    neighbors: usize,
    seed: u64,
}

impl ClassBalancer {
    pub fn new(neighbors: usize, seed: u64) -> Self {
        Self { neighbors, seed }
    }

    pub fn from_config(config: &BalanceConfig) -> Self {
        Self::new(config.neighbors, config.seed)
    }

    pub fn balance(&self, labeled: &LabeledTable) -> Result<BalancedTable, BalanceError> {
        if labeled.is_empty() {
            return Err(TableError::Empty.into());
        }
        if self.neighbors == 0 {
            return Err(BalanceError::ZeroNeighbors);
        }

        let counts = labeled.band_counts();
        let (smallest, min_count) = ScoreBand::ALL
            .into_iter()
            .map(|b| (b, counts[b.rank()]))
            .min_by_key(|&(_, n)| n)
            .unwrap_or((ScoreBand::Poor, 0));
        if min_count < self.neighbors + 1 {
            return Err(BalanceError::InsufficientMinoritySamples {
                band: smallest.label().to_string(),
                count: min_count,
                neighbors: self.neighbors,
            });
        }

        let raw: Vec<Vec<f64>> = labeled
            .rows()
            .iter()
            .map(|r| {
                let mut v = r.features.as_slice().to_vec();
                v.push(f64::from(r.score));
                v
            })
            .collect();
        let scaler = MinMaxScaler::fit(&raw);
        let scaled: Vec<Vec<f64>> = raw.iter().map(|v| scaler.transform(v)).collect();

        let mut out: Vec<BalancedRow> = labeled
            .rows()
            .iter()
            .map(|r| BalancedRow {
                features: r.features,
                band: r.band,
                score: r.score,
                origin: RowOrigin::Original,
            })
            .collect();

        let majority = counts.iter().copied().max().unwrap_or(0);
        let mut rng = StdRng::seed_from_u64(self.seed);
        for band in ScoreBand::ALL {
            let needed = majority - counts[band.rank()];
            if needed == 0 {
                continue;
            }
            let members: Vec<&[f64]> = labeled
                .rows()
                .iter()
                .zip(&scaled)
                .filter(|(r, _)| r.band == band)
                .map(|(_, s)| s.as_slice())
                .collect();
            let neighbors = nearest_neighbors(&members, self.neighbors);

            for _ in 0..needed {
                let i = rng.gen_range(0..members.len());
                let j = neighbors[i][rng.gen_range(0..neighbors[i].len())];
                let gap: f64 = rng.gen_range(0.0..1.0);
                let point: Vec<f64> = members[i]
                    .iter()
                    .zip(members[j])
                    .map(|(a, b)| a + gap * (b - a))
                    .collect();
                out.push(unscale(&scaler, &point, band));
            }
            debug!(%band, synthesized = needed, "balanced band");
        }

        let table = BalancedTable::new(out);
        info!(
            rows = table.len(),
            synthesized = table.synthesized_count(),
            per_band = majority,
            "balanced labeled table"
        );
        Ok(table)
    }
}

/// Indices of the `k` nearest other members of each member. Ties go to
/// the lower index.
fn nearest_neighbors(members: &[&[f64]], k: usize) -> Vec<Vec<usize>> {
    members
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let mut others: Vec<(f64, usize)> = members
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, b)| (a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f64>(), j))
                .collect();
            others.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));
            others.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect()
}

fn unscale(scaler: &MinMaxScaler, point: &[f64], band: ScoreBand) -> BalancedRow {
    let values = scaler.inverse(point);
    let mut features = [0.0; FEATURE_COUNT];
    features.copy_from_slice(&values[..FEATURE_COUNT]);
    let score = values[WIDTH - 1]
        .round()
        .clamp(f64::from(band.min()), f64::from(band.max())) as u16;
    BalancedRow {
        features: FeatureVector::from_array(features),
        band,
        score,
        origin: RowOrigin::Synthesized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletscore_core::features::FeatureColumn;
    use walletscore_core::table::{LabeledRow, WalletId};

    fn labeled(counts: [usize; 5]) -> LabeledTable {
        let mut rows = Vec::new();
        for band in ScoreBand::ALL {
            for i in 0..counts[band.rank()] {
                let x = (band.rank() * 100 + i) as f64;
                rows.push(LabeledRow {
                    wallet: WalletId::new(format!("{band}-{i}")),
                    features: FeatureVector::zeroed()
                        .with(FeatureColumn::TotalOutstandingDebt, x)
                        .with(FeatureColumn::AverageHealthFactor, 1.0 + i as f64),
                    cluster: band.rank(),
                    band,
                    score: band.interpolate(i as f64 / counts[band.rank()].max(1) as f64),
                });
            }
        }
        LabeledTable::new(rows)
    }

    #[test]
    fn too_few_minority_rows_fail() {
        let err = ClassBalancer::new(3, 42).balance(&labeled([10, 10, 10, 10, 2])).unwrap_err();
        assert_eq!(
            err,
            BalanceError::InsufficientMinoritySamples {
                band: ScoreBand::Poor.label().to_string(),
                count: 2,
                neighbors: 3,
            }
        );
    }

    #[test]
    fn missing_band_fails() {
        let err = ClassBalancer::new(1, 42).balance(&labeled([5, 5, 0, 5, 5])).unwrap_err();
        assert!(matches!(err, BalanceError::InsufficientMinoritySamples { count: 0, .. }));
    }

    #[test]
    fn exactly_neighbors_plus_one_is_enough() {
        let out = ClassBalancer::new(3, 42).balance(&labeled([10, 4, 4, 4, 4])).unwrap();
        assert_eq!(out.band_counts(), [10; 5]);
    }

    #[test]
    fn bands_are_equalised_to_the_majority() {
        let out = ClassBalancer::new(3, 42).balance(&labeled([12, 6, 9, 4, 7])).unwrap();
        assert_eq!(out.band_counts(), [12; 5]);
        assert_eq!(out.synthesized_count(), 60 - 38);
        let originals = out.rows().iter().take_while(|r| r.origin == RowOrigin::Original).count();
        assert_eq!(originals, 38);
    }

    #[test]
    fn synthesized_rows_stay_in_band_and_span() {
        let input = labeled([12, 6, 9, 4, 7]);
        let out = ClassBalancer::new(3, 42).balance(&input).unwrap();
        for row in out.rows().iter().filter(|r| r.origin == RowOrigin::Synthesized) {
            assert!(row.band.contains(row.score));
            assert!(row.features.is_finite());
            let debt = row.features[FeatureColumn::TotalOutstandingDebt];
            let lo = (row.band.rank() * 100) as f64;
            assert!(debt >= lo - 1e-6 && debt <= lo + 12.0, "debt {debt} outside band span");
        }
    }

    #[test]
    fn balancing_is_seeded() {
        let input = labeled([8, 4, 5, 6, 4]);
        let a = ClassBalancer::new(3, 7).balance(&input).unwrap();
        let b = ClassBalancer::new(3, 7).balance(&input).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn already_balanced_table_is_unchanged() {
        let input = labeled([4; 5]);
        let out = ClassBalancer::new(3, 42).balance(&input).unwrap();
        assert_eq!(out.len(), 20);
        assert_eq!(out.synthesized_count(), 0);
    }

    #[test]
    fn zero_neighbors_rejected() {
        let err = ClassBalancer::new(0, 42).balance(&labeled([4; 5])).unwrap_err();
        assert_eq!(err, BalanceError::ZeroNeighbors);
    }

    #[test]
    fn empty_table_rejected() {
        let err = ClassBalancer::new(3, 42).balance(&LabeledTable::default()).unwrap_err();
        assert_eq!(err, BalanceError::Table(TableError::Empty));
    }

    #[test]
    fn neighbors_exclude_self_and_prefer_lower_index_on_ties() {
        let a = [0.0, 0.0];
        let b = [1.0, 0.0];
        let c = [1.0, 0.0];
        let members: Vec<&[f64]> = vec![&a[..], &b[..], &c[..]];
        let nn = nearest_neighbors(&members, 1);
        assert_eq!(nn, vec![vec![1], vec![2], vec![1]]);
    }
}
