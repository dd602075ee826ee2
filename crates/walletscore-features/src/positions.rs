//! Single-pass summary of a wallet's DeFi positions.
//!
//! Each position is tested against three independent predicates
//! (collateral-enabled, debt, liquidity-bearing); a position may match
//! any combination of them.

use std::collections::HashSet;

use walletscore_core::activity::DefiPosition;
use walletscore_core::constants::UNBOUNDED_HEALTH_FACTOR;

/// Aggregates derived from one scan over the position list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionSummary {
    pub position_count: usize,
    pub total_collateral_usd: f64,
    pub total_debt_usd: f64,
    pub total_yearly_earnings_usd: f64,
    /// Mean of finite health factors, or `f64::INFINITY` if any position
    /// reported an unbounded one. `0.0` when none reported a factor.
    pub average_health_factor: f64,
    pub average_apy: Option<f64>,
    pub protocol_count: usize,
    pub lending_protocol_count: usize,
    pub liquidity_position_count: usize,
}

impl PositionSummary {
    pub fn scan(positions: &[DefiPosition]) -> Self {
        let mut summary = Self {
            position_count: positions.len(),
            ..Self::default()
        };
        let mut protocols: HashSet<&str> = HashSet::new();
        let mut lending: HashSet<&str> = HashSet::new();
        let mut health_sum = 0.0;
        let mut health_finite = 0usize;
        let mut unbounded = false;
        let mut apy_sum = 0.0;
        let mut apy_count = 0usize;

        for position in positions {
            let name = position.protocol_name.as_deref().filter(|n| !n.is_empty());
            if let Some(name) = name {
                protocols.insert(name);
            }

            if position.is_enabled_as_collateral {
                summary.total_collateral_usd += position.balance_usd;
            }
            if position.is_debt {
                summary.total_debt_usd += position.balance_usd;
                if let Some(name) = name {
                    lending.insert(name);
                }
            }
            if position.is_liquidity() {
                summary.liquidity_position_count += 1;
            }

            summary.total_yearly_earnings_usd += position.projected_yearly_earnings_usd.unwrap_or(0.0);

            // A zero factor means "not reported".
            match position.health_factor {
                Some(hf) if hf == 0.0 || hf.is_nan() => {}
                Some(hf) if hf >= UNBOUNDED_HEALTH_FACTOR => unbounded = true,
                Some(hf) => {
                    health_sum += hf;
                    health_finite += 1;
                }
                None => {}
            }

            if let Some(apy) = position.net_apy {
                apy_sum += apy;
                apy_count += 1;
            }
        }

        summary.protocol_count = protocols.len();
        summary.lending_protocol_count = lending.len();
        summary.average_health_factor = if unbounded {
            f64::INFINITY
        } else if health_finite > 0 {
            round_to(health_sum / health_finite as f64, 4)
        } else {
            0.0
        };
        summary.average_apy = (apy_count > 0).then(|| apy_sum / apy_count as f64);
        summary
    }

    /// Borrowed value over collateral deposited; 0 without collateral.
    pub fn collateral_utilization(&self) -> f64 {
        if self.total_collateral_usd == 0.0 {
            return 0.0;
        }
        round_to(self.total_debt_usd / self.total_collateral_usd, 4)
    }

    /// Projected yearly earnings over collateral deposited; 0 without collateral.
    pub fn earnings_efficiency(&self) -> f64 {
        if self.total_collateral_usd == 0.0 {
            return 0.0;
        }
        round_to(self.total_yearly_earnings_usd / self.total_collateral_usd, 4)
    }

    pub fn total_debt(&self) -> f64 {
        round_to(self.total_debt_usd, 2)
    }

    /// Total debt spread over every position (not only debt positions).
    pub fn average_debt_size(&self) -> f64 {
        self.total_debt() / self.position_count.max(1) as f64
    }

    /// Debt over net worth, with net worth floored at 1 USD.
    pub fn debt_to_asset_ratio(&self, net_worth_usd: f64) -> f64 {
        round_to(self.total_debt() / net_worth_usd.max(1.0), 4)
    }
}

/// Round half away from zero to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(name: &str, balance: f64) -> DefiPosition {
        DefiPosition {
            protocol_name: Some(name.to_string()),
            balance_usd: balance,
            ..DefiPosition::default()
        }
    }

    #[test]
    fn empty_positions_are_neutral() {
        let s = PositionSummary::scan(&[]);
        assert_eq!(s.average_health_factor, 0.0);
        assert_eq!(s.collateral_utilization(), 0.0);
        assert_eq!(s.earnings_efficiency(), 0.0);
        assert_eq!(s.average_debt_size(), 0.0);
        assert_eq!(s.protocol_count, 0);
    }

    #[test]
    fn collateral_and_debt_are_independent_predicates() {
        let both = DefiPosition {
            is_enabled_as_collateral: true,
            is_debt: true,
            ..position("aave", 100.0)
        };
        let s = PositionSummary::scan(&[both]);
        assert_eq!(s.total_collateral_usd, 100.0);
        assert_eq!(s.total_debt_usd, 100.0);
        assert_eq!(s.collateral_utilization(), 1.0);
        assert_eq!(s.lending_protocol_count, 1);
    }

    #[test]
    fn utilization_and_efficiency() {
        let collateral = DefiPosition {
            is_enabled_as_collateral: true,
            projected_yearly_earnings_usd: Some(50.0),
            ..position("aave", 1000.0)
        };
        let debt = DefiPosition {
            is_debt: true,
            ..position("compound", 250.0)
        };
        let s = PositionSummary::scan(&[collateral, debt]);
        assert_eq!(s.collateral_utilization(), 0.25);
        assert_eq!(s.earnings_efficiency(), 0.05);
        assert_eq!(s.total_debt(), 250.0);
        assert_eq!(s.average_debt_size(), 125.0);
        assert_eq!(s.debt_to_asset_ratio(500.0), 0.5);
        assert_eq!(s.debt_to_asset_ratio(0.0), 250.0);
    }

    #[test]
    fn protocol_counts_are_distinct() {
        let positions = vec![
            DefiPosition { is_debt: true, ..position("aave", 1.0) },
            DefiPosition { is_debt: true, ..position("aave", 2.0) },
            position("uniswap", 3.0),
            position("", 4.0),
        ];
        let s = PositionSummary::scan(&positions);
        assert_eq!(s.protocol_count, 2);
        assert_eq!(s.lending_protocol_count, 1);
    }

    #[test]
    fn finite_health_factors_are_averaged() {
        let positions = vec![
            DefiPosition { health_factor: Some(1.5), ..position("a", 0.0) },
            DefiPosition { health_factor: Some(2.5), ..position("b", 0.0) },
            DefiPosition { health_factor: Some(0.0), ..position("c", 0.0) },
        ];
        let s = PositionSummary::scan(&positions);
        assert_eq!(s.average_health_factor, 2.0);
    }

    #[test]
    fn unbounded_health_factor_dominates() {
        let positions = vec![
            DefiPosition { health_factor: Some(1.2), ..position("a", 0.0) },
            DefiPosition { health_factor: Some(1e6), ..position("b", 0.0) },
        ];
        let s = PositionSummary::scan(&positions);
        assert_eq!(s.average_health_factor, f64::INFINITY);
    }

    #[test]
    fn positions_without_health_factor_average_to_zero() {
        let s = PositionSummary::scan(&[position("a", 10.0)]);
        assert_eq!(s.average_health_factor, 0.0);
        assert!(s.average_apy.is_none());
    }

    #[test]
    fn liquidity_positions_counted() {
        let lp = DefiPosition { liquidity: 3.0, ..position("uniswap", 10.0) };
        let s = PositionSummary::scan(&[lp, position("aave", 1.0)]);
        assert_eq!(s.liquidity_position_count, 1);
    }

    #[test]
    fn round_to_places() {
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(2.005, 0), 2.0);
        assert!(round_to(f64::INFINITY, 2).is_infinite());
    }
}
