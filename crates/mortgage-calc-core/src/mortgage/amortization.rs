//! Level-payment amortization.
//!
//! The fixed installment `P` that repays `amount` over `period` months at a
//! constant monthly rate `i`:
//!
//! ```text
//! P = amount * i / (1 - (1 + i)^(-period))
//! ```

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::MortgageCalcError;
use crate::types::{Money, Rate};
use crate::MortgageCalcResult;

/// Convert a nominal annual percentage (6.0 = 6%) into a monthly fraction.
pub fn monthly_rate(annual_percent: Rate) -> Rate {
    annual_percent / dec!(100) / dec!(12)
}

/// Fixed monthly payment that fully amortizes `amount`.
///
/// A zero rate falls back to straight-line repayment (`amount / period`),
/// since the annuity formula is undefined there. Negative rates go through
/// the formula unchanged.
///
/// `(1 + i)^(-period)` must fit in a `Decimal`; very long terms at high
/// rates (e.g. 7000 months at 1% a month) return `ArithmeticOverflow`.
pub fn monthly_payment(amount: Money, monthly_rate: Rate, period: u32) -> MortgageCalcResult<Money> {
    if period == 0 {
        return Err(MortgageCalcError::InvalidInput {
            field: "period".into(),
            reason: "Number of monthly installments must be at least 1".into(),
        });
    }

    if monthly_rate.is_zero() {
        return Ok(amount / Decimal::from(period));
    }

    let one_plus_r = Decimal::ONE + monthly_rate;
    if one_plus_r.is_zero() {
        return Err(MortgageCalcError::DivisionByZero {
            context: "amortization discount factor (monthly rate of -100%)".into(),
        });
    }

    let discount = one_plus_r.checked_powi(-i64::from(period)).ok_or_else(|| {
        MortgageCalcError::ArithmeticOverflow {
            context: format!("amortization discount factor (1 + {monthly_rate})^-{period}"),
        }
    })?;

    let annuity_denominator = Decimal::ONE.checked_sub(discount).ok_or_else(|| {
        MortgageCalcError::ArithmeticOverflow {
            context: "amortization annuity denominator".into(),
        }
    })?;
    if annuity_denominator.is_zero() {
        return Err(MortgageCalcError::DivisionByZero {
            context: "amortization annuity denominator".into(),
        });
    }

    monthly_rate
        .checked_div(annuity_denominator)
        .and_then(|factor| amount.checked_mul(factor))
        .ok_or_else(|| MortgageCalcError::ArithmeticOverflow {
            context: "amortized monthly payment".into(),
        })
}
