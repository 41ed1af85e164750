//! Reimbursement calculator.
//!
//! Pure functions over [`Decimal`]. All monetary results are rounded to two decimal places with
//! half-up rounding (ties away from zero, which is half-up for the non-negative amounts handled
//! here). Binary floating point is never involved.
//!
//! | Doctor category | Rate |
//! |-----------------|------|
//! | Generalist      | 100% |
//! | Specialist      | 80%  |

use crate::{CoreError, CoreResult};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

pub const GENERALIST_RATE: Decimal = dec!(1.00);
pub const SPECIALIST_RATE: Decimal = dec!(0.80);

/// Two decimals half-up.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rate applied to a consultation with a doctor of the given category.
pub fn rate_for(is_generalist: bool) -> Decimal {
    if is_generalist {
        GENERALIST_RATE
    } else {
        SPECIALIST_RATE
    }
}

/// Amount reimbursed for `cost` at the doctor category's rate.
///
/// # Errors
///
/// [`CoreError::InvalidArgument`] if `cost` is missing or negative.
pub fn calculate(cost: impl Into<Option<Decimal>>, is_generalist: bool) -> CoreResult<Decimal> {
    calculate_with_rate(cost, rate_for(is_generalist))
}

/// Amount reimbursed for `cost` at an arbitrary `rate` in `[0, 1]`.
pub fn calculate_with_rate(cost: impl Into<Option<Decimal>>, rate: Decimal) -> CoreResult<Decimal> {
    let cost = require_cost(cost.into())?;
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(CoreError::InvalidArgument(format!(
            "rate must be between 0 and 1, got {rate}"
        )));
    }
    Ok(round_money(cost * rate))
}

/// Share of `cost` covered by `reimbursed`, in percent (0 to 100, two decimals).
///
/// The ratio is taken at four decimals before scaling, so `percentage(1, 3)` is `33.33`.
/// Returns zero when `cost` is zero.
pub fn percentage(reimbursed: Decimal, cost: Decimal) -> Decimal {
    if cost.is_zero() {
        return Decimal::ZERO;
    }
    let ratio = (reimbursed / cost).round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
    round_money(ratio * dec!(100)).clamp(Decimal::ZERO, dec!(100.00))
}

/// Part of `cost` the insured pays themselves; never negative.
pub fn out_of_pocket(cost: Decimal, reimbursed: Decimal) -> Decimal {
    round_money((cost - reimbursed).max(Decimal::ZERO))
}

/// True when `reimbursed` is within one cent of the expected amount for `cost`.
pub fn verify(reimbursed: Decimal, cost: Decimal, is_generalist: bool) -> bool {
    match calculate(cost, is_generalist) {
        Ok(expected) => (reimbursed - expected).abs() < dec!(0.01),
        Err(_) => false,
    }
}

/// What a specialist consultation costs the insured beyond a generalist one.
pub fn specialist_savings(total_specialist_cost: Decimal) -> Decimal {
    if total_specialist_cost.is_sign_negative() {
        return Decimal::ZERO;
    }
    round_money(total_specialist_cost - total_specialist_cost * SPECIALIST_RATE)
}

/// `"12.50 €"`
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2} €", round_money(amount))
}

/// `"80.00 %"`
pub fn format_percentage(percent: Decimal) -> String {
    format!("{:.2} %", round_money(percent))
}

fn require_cost(cost: Option<Decimal>) -> CoreResult<Decimal> {
    match cost {
        None => Err(CoreError::InvalidArgument("cost is required".into())),
        Some(c) if c.is_sign_negative() && !c.is_zero() => Err(CoreError::InvalidArgument(
            format!("cost cannot be negative, got {c}"),
        )),
        Some(c) => Ok(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generalist_full_rate() {
        assert_eq!(calculate(dec!(100.00), true).unwrap(), dec!(100.00));
        assert_eq!(calculate(dec!(25), true).unwrap(), dec!(25.00));
    }

    #[test]
    fn test_specialist_eighty_percent() {
        assert_eq!(calculate(dec!(50.00), false).unwrap(), dec!(40.00));
        assert_eq!(calculate(dec!(80.00), false).unwrap(), dec!(64.00));
    }

    #[test]
    fn test_half_up_rounding() {
        // 10.06 * 0.8 = 8.048
        assert_eq!(calculate(dec!(10.06), false).unwrap(), dec!(8.05));
        // 0.015625 * 0.8 = 0.0125
        assert_eq!(calculate(dec!(0.015625), false).unwrap(), dec!(0.01));
        // midpoints go up
        assert_eq!(calculate(dec!(10.005), true).unwrap(), dec!(10.01));
        assert_eq!(calculate(dec!(0.03125), false).unwrap(), dec!(0.03));
    }

    #[test]
    fn test_generalist_amount_is_rounded_cost() {
        for cost in [dec!(0), dec!(0.004), dec!(19.999), dec!(1234.565)] {
            assert_eq!(calculate(cost, true).unwrap(), round_money(cost));
            assert_eq!(
                calculate(cost, false).unwrap(),
                round_money(cost * dec!(0.8))
            );
        }
    }

    #[test]
    fn test_calculate_rejects_negative_or_missing() {
        assert!(matches!(
            calculate(dec!(-1), true),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            calculate(None, true),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(calculate(dec!(0), false).is_ok());
    }

    #[test]
    fn test_calculate_with_rate_bounds() {
        assert_eq!(
            calculate_with_rate(dec!(200), dec!(0.35)).unwrap(),
            dec!(70.00)
        );
        assert!(calculate_with_rate(dec!(200), dec!(1.01)).is_err());
        assert!(calculate_with_rate(dec!(200), dec!(-0.1)).is_err());
        assert_eq!(calculate_with_rate(dec!(200), dec!(0)).unwrap(), dec!(0));
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(dec!(40), dec!(50)), dec!(80.00));
        assert_eq!(percentage(dec!(1), dec!(3)), dec!(33.33));
        assert_eq!(percentage(dec!(2), dec!(3)), dec!(66.67));
        assert_eq!(percentage(dec!(10), dec!(0)), Decimal::ZERO);
        assert_eq!(percentage(dec!(60), dec!(50)), dec!(100.00));
    }

    #[test]
    fn test_out_of_pocket() {
        assert_eq!(out_of_pocket(dec!(100.00), dec!(100.00)), dec!(0.00));
        assert_eq!(out_of_pocket(dec!(50.00), dec!(40.00)), dec!(10.00));
        assert_eq!(out_of_pocket(dec!(10.00), dec!(12.00)), Decimal::ZERO);
    }

    #[test]
    fn test_verify_tolerance() {
        assert!(verify(dec!(40.00), dec!(50.00), false));
        assert!(verify(dec!(40.009), dec!(50.00), false));
        assert!(!verify(dec!(40.01), dec!(50.00), false));
        assert!(!verify(dec!(50.00), dec!(50.00), false));
        assert!(!verify(dec!(0), dec!(-5), true));
    }

    #[test]
    fn test_specialist_savings() {
        assert_eq!(specialist_savings(dec!(50.00)), dec!(10.00));
        assert_eq!(specialist_savings(dec!(-5)), Decimal::ZERO);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_amount(dec!(12.5)), "12.50 €");
        assert_eq!(format_percentage(dec!(80)), "80.00 %");
    }

    #[test]
    fn test_rate_for() {
        assert_eq!(rate_for(true), GENERALIST_RATE);
        assert_eq!(rate_for(false), SPECIALIST_RATE);
    }
}
