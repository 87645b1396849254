//! Piecewise-linear interest-rate curve.
//!
//! All values are WAD-scaled `U256` integers; divisions truncate. The curve
//! has three segments:
//!
//! ```text
//!  rate
//!   max_rate ·························┌──────
//!                                ╱    │
//!   rate_at_optimal ········╱         │
//!                     ╱     │         │
//!   base_rate ──╱           │         │
//!              0        optimal   max_util   utilization
//! ```
//!
//! The second segment is anchored at `(optimal, rate_at_optimal)` and aims at
//! `(WAD, max_rate)`; at or above `max_utilization` the rate saturates.

use crate::domain::{RateCurve, WAD};
use alloy_primitives::{U256, U512};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("division by zero: {0} is zero")]
    DivisionByZero(&'static str),
    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

/// `total_borrow / total_supply` at WAD scale; zero when nothing is supplied.
pub fn utilization(total_supply: U256, total_borrow: U256) -> Result<U256, RateError> {
    if total_supply.is_zero() {
        return Ok(U256::ZERO);
    }
    mul_div(total_borrow, WAD, total_supply, "utilization")
}

/// Borrow rate of a pool with the given totals.
///
/// An idle pool (nothing supplied or nothing borrowed) is quoted at the base
/// rate. A zero `optimal_utilization` (or one at WAD, for the upper segment)
/// on the segment being evaluated is a configuration error and fails instead
/// of quoting zero.
pub fn borrow_rate(
    total_supply: U256,
    total_borrow: U256,
    curve: &RateCurve,
) -> Result<U256, RateError> {
    if total_supply.is_zero() || total_borrow.is_zero() {
        return Ok(curve.base_rate);
    }

    let u = utilization(total_supply, total_borrow)?;

    if u >= curve.max_utilization {
        return Ok(curve.max_rate);
    }

    if u <= curve.optimal_utilization {
        return interpolate(
            curve.base_rate,
            curve.rate_at_optimal,
            u,
            curve.optimal_utilization,
            "optimal_utilization",
        );
    }

    interpolate(
        curve.rate_at_optimal,
        curve.max_rate,
        u - curve.optimal_utilization,
        WAD.saturating_sub(curve.optimal_utilization),
        "WAD - optimal_utilization",
    )
}

/// Rate earned by suppliers: the borrow rate, scaled by utilization, minus
/// the reserve factor's cut.
///
/// The triple product is formed in 512 bits, so only a result that does not
/// fit `U256` is an overflow.
pub fn supply_apr(
    borrow_rate: U256,
    utilization: U256,
    reserve_factor: U256,
) -> Result<U256, RateError> {
    let retained = WAD.saturating_sub(reserve_factor);
    let scale = widen(WAD) * widen(WAD);
    widen(borrow_rate)
        .checked_mul(widen(utilization))
        .and_then(|v| v.checked_mul(widen(retained)))
        .and_then(|v| narrow(v / scale))
        .ok_or(RateError::Overflow("supply_apr"))
}

/// Walk from `start` toward `end`, `offset / span` of the way.
///
/// A falling segment (end below start) steps downward and floors at zero.
fn interpolate(
    start: U256,
    end: U256,
    offset: U256,
    span: U256,
    what: &'static str,
) -> Result<U256, RateError> {
    if end >= start {
        let step = mul_div(offset, end - start, span, what)?;
        start.checked_add(step).ok_or(RateError::Overflow(what))
    } else {
        let step = mul_div(offset, start - end, span, what)?;
        Ok(start.saturating_sub(step))
    }
}

fn mul_div(a: U256, b: U256, denominator: U256, what: &'static str) -> Result<U256, RateError> {
    if denominator.is_zero() {
        return Err(RateError::DivisionByZero(what));
    }
    let product: U512 = a.widening_mul(b);
    narrow(product / widen(denominator)).ok_or(RateError::Overflow(what))
}

fn widen(v: U256) -> U512 {
    U512::from_limbs_slice(v.as_limbs())
}

fn narrow(v: U512) -> Option<U256> {
    U256::checked_from_limbs_slice(v.as_limbs())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `n / 1000` at WAD scale.
    fn milli(n: u64) -> U256 {
        U256::from(n) * WAD / U256::from(1000u64)
    }

    fn tokens(n: u64) -> U256 {
        U256::from(n) * WAD
    }

    fn curve() -> RateCurve {
        RateCurve {
            base_rate: milli(20),
            rate_at_optimal: milli(100),
            optimal_utilization: milli(800),
            max_utilization: milli(950),
            max_rate: WAD,
        }
    }

    #[test]
    fn test_idle_pool_quotes_base_rate() {
        let c = curve();
        assert_eq!(borrow_rate(U256::ZERO, tokens(5), &c).unwrap(), c.base_rate);
        assert_eq!(borrow_rate(tokens(5), U256::ZERO, &c).unwrap(), c.base_rate);
    }

    #[test]
    fn test_lower_segment_value() {
        // u = 0.4 -> 0.02 + 0.4 * 0.08 / 0.8 = 0.06
        let rate = borrow_rate(tokens(1000), tokens(400), &curve()).unwrap();
        assert_eq!(rate, milli(60));
    }

    #[test]
    fn test_continuity_at_optimal() {
        let rate = borrow_rate(tokens(1000), tokens(800), &curve()).unwrap();
        assert_eq!(rate, curve().rate_at_optimal);
    }

    #[test]
    fn test_upper_segment_value() {
        // u = 0.9 -> 0.1 + 0.1 * 0.9 / 0.2 = 0.55
        let rate = borrow_rate(tokens(1000), tokens(900), &curve()).unwrap();
        assert_eq!(rate, milli(550));
    }

    #[test]
    fn test_saturates_at_max_utilization() {
        let c = curve();
        assert_eq!(borrow_rate(tokens(1000), tokens(950), &c).unwrap(), c.max_rate);
        assert_eq!(borrow_rate(tokens(1000), tokens(2000), &c).unwrap(), c.max_rate);
    }

    #[test]
    fn test_just_above_zero_utilization_approaches_base() {
        let c = curve();
        // one wei borrowed against 1000 tokens: utilization truncates to zero
        let rate = borrow_rate(tokens(1000), U256::from(1u64), &c).unwrap();
        assert_eq!(rate, c.base_rate);

        let rate = borrow_rate(tokens(1000), tokens(1), &c).unwrap();
        assert!(rate > c.base_rate);
        assert!(rate - c.base_rate < milli(1));
    }

    #[test]
    fn test_monotone_and_bounded() {
        let c = curve();
        let supply = tokens(1000);
        let mut previous = c.base_rate;
        for borrowed in (1..=1200u64).step_by(7) {
            let rate = borrow_rate(supply, tokens(borrowed), &c).unwrap();
            assert!(rate >= previous, "rate fell at borrow {borrowed}");
            assert!(rate >= c.base_rate && rate <= c.max_rate);
            previous = rate;
        }
    }

    #[test]
    fn test_zero_optimal_utilization_is_fatal() {
        let c = RateCurve {
            optimal_utilization: U256::ZERO,
            max_utilization: WAD,
            ..curve()
        };
        // upper segment divides by WAD - 0
        assert!(borrow_rate(tokens(1000), tokens(500), &c).is_ok());

        // utilization rounds to zero, lands on the lower segment
        assert_eq!(
            borrow_rate(tokens(1000), U256::from(1u64), &c),
            Err(RateError::DivisionByZero("optimal_utilization"))
        );
    }

    #[test]
    fn test_optimal_at_wad_upper_segment_is_fatal() {
        let c = RateCurve {
            optimal_utilization: WAD,
            max_utilization: milli(1500),
            ..curve()
        };
        assert!(matches!(
            borrow_rate(tokens(1000), tokens(1200), &c),
            Err(RateError::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_partially_configured_curve_steps_down() {
        // only base rate and utilization bounds merged so far; rate_at_optimal still zero
        let c = RateCurve {
            base_rate: milli(20),
            rate_at_optimal: U256::ZERO,
            optimal_utilization: milli(800),
            max_utilization: milli(950),
            max_rate: U256::ZERO,
        };
        // 0.02 - 0.4 * 0.02 / 0.8 = 0.01
        assert_eq!(borrow_rate(tokens(1000), tokens(400), &c).unwrap(), milli(10));
    }

    #[test]
    fn test_all_zero_curve_saturates_to_zero() {
        let rate = borrow_rate(tokens(1000), tokens(400), &RateCurve::default()).unwrap();
        assert_eq!(rate, U256::ZERO);
    }

    #[test]
    fn test_supply_apr() {
        // 0.06 * 0.4 * (1 - 0.1) = 0.0216
        let apr = supply_apr(milli(60), milli(400), milli(100)).unwrap();
        assert_eq!(apr, U256::from(21_600_000_000_000_000u64));
    }

    #[test]
    fn test_supply_apr_reserve_factor_above_wad_is_zero() {
        assert_eq!(supply_apr(milli(60), milli(400), tokens(2)).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_supply_apr_wide_intermediate() {
        // borrow far above dust supply: 1.0 * 1e42 * 0.9 overflows 256 bits
        // before the WAD^2 division but the result fits
        let huge_utilization = U256::from(10u64).pow(U256::from(60u64));
        let apr = supply_apr(WAD, huge_utilization, milli(100)).unwrap();
        assert_eq!(apr, U256::from(9u64) * U256::from(10u64).pow(U256::from(59u64)));
    }

    #[test]
    fn test_supply_apr_unrepresentable_result_overflows() {
        assert_eq!(
            supply_apr(U256::MAX, U256::MAX, U256::ZERO),
            Err(RateError::Overflow("supply_apr"))
        );
    }

    #[test]
    fn test_utilization_of_huge_borrow() {
        // borrow * WAD exceeds 256 bits
        let borrow = U256::MAX / U256::from(2u64);
        assert_eq!(utilization(borrow, borrow).unwrap(), WAD);
    }

    #[test]
    fn test_utilization() {
        assert_eq!(utilization(U256::ZERO, tokens(1)).unwrap(), U256::ZERO);
        assert_eq!(utilization(tokens(1000), tokens(400)).unwrap(), milli(400));
    }
}
