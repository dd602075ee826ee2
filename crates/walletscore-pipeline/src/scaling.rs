//! Feature-space transforms shared by clustering and balancing.

/// `log1p(x)` with non-positive values floored at `epsilon` first.
pub fn log_floor(x: f64, epsilon: f64) -> f64 {
    let x = if x > 0.0 { x } else { epsilon };
    x.ln_1p()
}

/// Per-column min-max scaling onto `[0, 1]`.
///
/// A constant column maps to 0 and inverts back to its constant.
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxScaler {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit over `rows`, each of the same width. An empty input yields a
    /// zero-width scaler.
    pub fn fit<R: AsRef<[f64]>>(rows: &[R]) -> Self {
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        let mut min = vec![f64::INFINITY; width];
        let mut max = vec![f64::NEG_INFINITY; width];
        for row in rows {
            for (j, &x) in row.as_ref().iter().enumerate().take(width) {
                min[j] = min[j].min(x);
                max[j] = max[j].max(x);
            }
        }
        Self { min, max }
    }

    pub fn width(&self) -> usize {
        self.min.len()
    }

    pub fn transform_value(&self, column: usize, x: f64) -> f64 {
        let range = self.max[column] - self.min[column];
        if range > 0.0 { (x - self.min[column]) / range } else { 0.0 }
    }

    pub fn inverse_value(&self, column: usize, x: f64) -> f64 {
        let range = self.max[column] - self.min[column];
        self.min[column] + x * range.max(0.0)
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, &x)| self.transform_value(j, x))
            .collect()
    }

    pub fn inverse(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, &x)| self.inverse_value(j, x))
            .collect()
    }
}
