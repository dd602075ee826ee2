//! Score bands: five contiguous sub-ranges of `[300, 850]`, best to worst.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{CREDIT_SCORE_MAX, CREDIT_SCORE_MIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScoreBand {
    #[serde(rename = "Exceptional (800-850)")]
    Exceptional,
    #[serde(rename = "Very Good (740-799)")]
    VeryGood,
    #[serde(rename = "Good (670-739)")]
    Good,
    #[serde(rename = "Fair (580-669)")]
    Fair,
    #[serde(rename = "Poor (300-579)")]
    Poor,
}

impl ScoreBand {
    /// All bands ordered from best to worst.
    pub const ALL: [ScoreBand; 5] = [
        Self::Exceptional,
        Self::VeryGood,
        Self::Good,
        Self::Fair,
        Self::Poor,
    ];

    /// Closed score range `(min, max)` of this band.
    pub const fn range(self) -> (u16, u16) {
        match self {
            Self::Exceptional => (800, 850),
            Self::VeryGood => (740, 799),
            Self::Good => (670, 739),
            Self::Fair => (580, 669),
            Self::Poor => (300, 579),
        }
    }

    pub const fn min(self) -> u16 {
        self.range().0
    }

    pub const fn max(self) -> u16 {
        self.range().1
    }

    pub fn contains(self, score: u16) -> bool {
        let (lo, hi) = self.range();
        (lo..=hi).contains(&score)
    }

    /// Position in best-to-worst order (0 = Exceptional).
    pub fn rank(self) -> usize {
        self as usize
    }

    /// Band at a best-to-worst position, if any.
    pub fn from_rank(rank: usize) -> Option<Self> {
        Self::ALL.get(rank).copied()
    }

    /// Band containing `score`, if the score is in `[300, 850]`.
    pub fn for_score(score: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.contains(score))
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Exceptional => "Exceptional (800-850)",
            Self::VeryGood => "Very Good (740-799)",
            Self::Good => "Good (670-739)",
            Self::Fair => "Fair (580-669)",
            Self::Poor => "Poor (300-579)",
        }
    }

    /// Score inside this band for a closeness quantile in `[0, 1]`:
    /// `min + floor(q * (max - min))`.
    pub fn interpolate(self, quantile: f64) -> u16 {
        let (lo, hi) = self.range();
        let q = if quantile.is_nan() { 0.0 } else { quantile.clamp(0.0, 1.0) };
        let offset = (q * f64::from(hi - lo)).floor() as u16;
        (lo + offset).min(hi)
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a score onto `[0, 1]` relative to the full score range.
pub fn normalize_score(score: u16) -> f64 {
    let s = score.clamp(CREDIT_SCORE_MIN, CREDIT_SCORE_MAX);
    f64::from(s - CREDIT_SCORE_MIN) / f64::from(CREDIT_SCORE_MAX - CREDIT_SCORE_MIN)
}

/// Inverse of [`normalize_score`], rounding to the nearest integer score.
pub fn denormalize_score(normalized: f64) -> u16 {
    let span = f64::from(CREDIT_SCORE_MAX - CREDIT_SCORE_MIN);
    let p = if normalized.is_nan() { 0.0 } else { normalized.clamp(0.0, 1.0) };
    (f64::from(CREDIT_SCORE_MIN) + (p * span).round()) as u16
}
