//! Repairs a raw feature table so every cell is finite.
//!
//! Repairs run in a fixed order:
//! 1. health factor `±inf` → the column's largest finite value
//! 2. `±inf` in every other column → that column's largest finite value
//! 3. health factor `0` → `1` (neutral)
//! 4. `NaN` → the column median of the remaining finite values
//!
//! Step 1 precedes step 3 so an unbounded wallet normally lands on the
//! healthiest observed value, not the neutral one. The exception is a table
//! whose only finite health factors are `0`: step 1 then writes `0` and
//! step 3 turns it into the neutral `1` like every other unreported row.

use tracing::{debug, info};
use walletscore_core::constants::NEUTRAL_HEALTH_FACTOR;
use walletscore_core::error::SanitizeError;
use walletscore_core::features::FeatureColumn;
use walletscore_core::table::FeatureTable;

#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetSanitizer;

impl DatasetSanitizer {
    pub fn new() -> Self {
        Self
    }

    /// Repair `table`. Row order and wallet identity are preserved.
    pub fn sanitize(&self, mut table: FeatureTable) -> Result<FeatureTable, SanitizeError> {
        if table.is_empty() {
            return Ok(table);
        }

        let health = FeatureColumn::AverageHealthFactor;
        let mut replaced_infinite = replace_infinite(&mut table, health)?;
        for column in FeatureColumn::ALL.into_iter().filter(|&c| c != health) {
            replaced_infinite += replace_infinite(&mut table, column)?;
        }

        let mut neutralized = 0usize;
        for row in table.rows_mut() {
            if row.features[health] == 0.0 {
                row.features[health] = NEUTRAL_HEALTH_FACTOR;
                neutralized += 1;
            }
        }

        let mut imputed = 0usize;
        for column in FeatureColumn::ALL {
            imputed += impute_median(&mut table, column)?;
        }

        validate(&table)?;
        info!(
            rows = table.len(),
            replaced_infinite, neutralized, imputed, "sanitized feature table"
        );
        Ok(table)
    }
}

fn max_finite(table: &FeatureTable, column: FeatureColumn) -> Option<f64> {
    table
        .rows()
        .iter()
        .map(|r| r.features[column])
        .filter(|x| x.is_finite())
        .reduce(f64::max)
}

fn replace_infinite(table: &mut FeatureTable, column: FeatureColumn) -> Result<usize, SanitizeError> {
    let has_infinite = table.rows().iter().any(|r| r.features[column].is_infinite());
    if !has_infinite {
        return Ok(0);
    }
    let max = max_finite(table, column).ok_or(SanitizeError::NoFiniteValues { column: column.name() })?;
    let mut count = 0;
    for row in table.rows_mut() {
        if row.features[column].is_infinite() {
            row.features[column] = max;
            count += 1;
        }
    }
    debug!(%column, count, max, "replaced infinite values");
    Ok(count)
}

/// Median of `values`; the mean of the two middle values for even counts.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn impute_median(table: &mut FeatureTable, column: FeatureColumn) -> Result<usize, SanitizeError> {
    let has_missing = table.rows().iter().any(|r| r.features[column].is_nan());
    if !has_missing {
        return Ok(0);
    }
    let mut finite: Vec<f64> = table
        .rows()
        .iter()
        .map(|r| r.features[column])
        .filter(|x| x.is_finite())
        .collect();
    let fill = median(&mut finite).ok_or(SanitizeError::NoFiniteValues { column: column.name() })?;
    let mut count = 0;
    for row in table.rows_mut() {
        if row.features[column].is_nan() {
            row.features[column] = fill;
            count += 1;
        }
    }
    debug!(%column, count, fill, "imputed missing values");
    Ok(count)
}

/// Fails on the first non-finite cell, naming its wallet and column.
pub fn validate(table: &FeatureTable) -> Result<(), SanitizeError> {
    for row in table.rows() {
        if let Some(column) = row.features.first_non_finite() {
            return Err(SanitizeError::InvariantViolation {
                wallet: row.wallet.to_string(),
                column: column.name(),
            });
        }
    }
    Ok(())
}
