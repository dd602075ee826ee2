//! Rule-based sanity check of pipeline bands.
//!
//! An additive heuristic scores each wallet's key metrics, maps the total
//! onto a band and compares it with the band the pipeline assigned. Only
//! real wallets are compared.

use serde::{Deserialize, Serialize};
use walletscore_core::band::ScoreBand;
use walletscore_core::features::{FeatureColumn as C, FeatureVector};
use walletscore_core::table::LabeledTable;

/// Additive rule score over health, liquidations, debt, debt-to-asset,
/// repayment activity and earnings efficiency.
pub fn heuristic_score(f: &FeatureVector) -> i32 {
    let mut score = 0;

    let health = f[C::AverageHealthFactor];
    score += if health >= 1e5 {
        5
    } else if health >= 1000.0 {
        3
    } else if health >= 10.0 {
        2
    } else if health >= 1.0 {
        1
    } else {
        -2
    };

    let liquidations = f[C::LiquidationEventCount];
    score += if liquidations == 0.0 {
        3
    } else if liquidations <= 1.0 {
        1
    } else {
        -4
    };

    let debt = f[C::TotalOutstandingDebt];
    score += if debt > 50_000.0 {
        -5
    } else if debt > 1000.0 {
        -3
    } else if debt > 0.0 {
        -1
    } else {
        2
    };

    let dta = f[C::DebtToAssetRatio];
    score += if dta > 50.0 {
        -3
    } else if dta > 10.0 {
        -2
    } else if dta > 1.0 {
        -1
    } else {
        2
    };

    let repayment = f[C::RepaymentActivity];
    score += if repayment > 100.0 {
        -2
    } else if repayment > 10.0 {
        -1
    } else {
        1
    };

    let efficiency = f[C::EarningsEfficiency];
    score += if efficiency > 100.0 {
        4
    } else if efficiency > 10.0 {
        2
    } else if efficiency > 0.0 {
        1
    } else if efficiency < -100.0 {
        -3
    } else {
        -1
    };

    score
}

pub fn heuristic_band(score: i32) -> ScoreBand {
    match score {
        s if s >= 12 => ScoreBand::Exceptional,
        s if s >= 8 => ScoreBand::VeryGood,
        s if s >= 5 => ScoreBand::Good,
        s if s >= 2 => ScoreBand::Fair,
        _ => ScoreBand::Poor,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossCheckReport {
    /// Real wallets compared.
    pub compared: usize,
    pub agreeing: usize,
    /// `agreeing / compared * 100`, or 0 when nothing was compared.
    pub agreement_pct: f64,
    /// `confusion[heuristic][pipeline]`, indexed by band rank.
    pub confusion: [[usize; 5]; 5],
}

pub fn cross_check(labeled: &LabeledTable) -> CrossCheckReport {
    let mut report = CrossCheckReport::default();
    for row in labeled.real_rows() {
        let expected = heuristic_band(heuristic_score(&row.features));
        report.confusion[expected.rank()][row.band.rank()] += 1;
        report.compared += 1;
        if expected == row.band {
            report.agreeing += 1;
        }
    }
    if report.compared > 0 {
        report.agreement_pct = report.agreeing as f64 / report.compared as f64 * 100.0;
    }
    report
}
