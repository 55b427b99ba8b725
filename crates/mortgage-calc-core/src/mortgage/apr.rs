//! APR solver.
//!
//! The APR is the monthly rate `a` at which a fee-free loan of `loan_amount`
//! would cost the same installment as the actual loan with its fees folded in.
//! With `k = 1 + a`, `N` installments and payment ratio `r = P / C`, the
//! amortization identity `r = a k^N / (k^N - 1)` rearranges to
//!
//! ```text
//! f(k)  = k^(N+1) - k^N (r + 1) + r = 0
//! f'(k) = (N+1) k^N - N (r + 1) k^(N-1)
//! ```
//!
//! which is solved by Newton-Raphson starting from the nominal rate.

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use tracing::debug;

use super::amortization;
use super::newton::{newton_raphson, NewtonConfig};
use super::quote::LoanTerms;
use crate::error::MortgageCalcError;
use crate::types::{Money, Rate};
use crate::MortgageCalcResult;

/// Months per year times percent scale.
const ANNUALIZE_PERCENT: Decimal = dec!(1200);

/// The APR polynomial for a fixed term and payment ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AprEquation {
    periods: u32,
    payment_ratio: Decimal,
}

impl AprEquation {
    pub fn new(periods: u32, payment_ratio: Decimal) -> Self {
        Self {
            periods,
            payment_ratio,
        }
    }

    pub fn periods(&self) -> u32 {
        self.periods
    }

    pub fn payment_ratio(&self) -> Decimal {
        self.payment_ratio
    }

    /// `f(k) = k^(N+1) - k^N (r + 1) + r`
    pub fn evaluate(&self, k: Decimal) -> MortgageCalcResult<Decimal> {
        let k_n = self.power(k, self.periods)?;
        let ratio_plus_one = self.payment_ratio + Decimal::ONE;

        k_n.checked_mul(k)
            .zip(k_n.checked_mul(ratio_plus_one))
            .and_then(|(k_n1, scaled)| k_n1.checked_sub(scaled))
            .and_then(|v| v.checked_add(self.payment_ratio))
            .ok_or_else(|| self.overflow("APR equation", k))
    }

    /// `f'(k) = (N+1) k^N - N (r + 1) k^(N-1)`
    pub fn derivative(&self, k: Decimal) -> MortgageCalcResult<Decimal> {
        let n = Decimal::from(self.periods);
        let k_n = self.power(k, self.periods)?;
        let k_n_minus_1 = self.power(k, self.periods.saturating_sub(1))?;
        let ratio_plus_one = self.payment_ratio + Decimal::ONE;

        (n + Decimal::ONE)
            .checked_mul(k_n)
            .zip(
                n.checked_mul(ratio_plus_one)
                    .and_then(|c| c.checked_mul(k_n_minus_1)),
            )
            .and_then(|(lead, tail)| lead.checked_sub(tail))
            .ok_or_else(|| self.overflow("APR equation derivative", k))
    }

    fn power(&self, k: Decimal, exp: u32) -> MortgageCalcResult<Decimal> {
        k.checked_powu(u64::from(exp))
            .ok_or_else(|| self.overflow("APR equation power", k))
    }

    fn overflow(&self, what: &str, k: Decimal) -> MortgageCalcError {
        MortgageCalcError::ArithmeticOverflow {
            context: format!("{what} at k = {k} over {} periods", self.periods),
        }
    }
}

/// Solve for the APR (annual percent) implied by a fee-inclusive payment.
///
/// The payment ratio divides by `loan_amount` alone; fees are already inside
/// `monthly_payment_with_fees`.
pub fn solve_apr(
    loan_amount: Money,
    monthly_payment_with_fees: Money,
    monthly_interest_rate: Rate,
    period: u32,
    config: &NewtonConfig,
) -> MortgageCalcResult<Rate> {
    if period == 0 {
        return Err(MortgageCalcError::InvalidInput {
            field: "period".into(),
            reason: "Number of monthly installments must be at least 1".into(),
        });
    }
    if monthly_interest_rate.is_zero() {
        return Err(MortgageCalcError::InvalidInput {
            field: "interest_rate".into(),
            reason: "APR is undefined at a zero nominal rate: k = 1 is a trivial root of the APR equation".into(),
        });
    }
    if loan_amount.is_zero() {
        return Err(MortgageCalcError::DivisionByZero {
            context: "APR payment ratio (loan amount is zero)".into(),
        });
    }

    let payment_ratio = monthly_payment_with_fees
        .checked_div(loan_amount)
        .ok_or_else(|| MortgageCalcError::ArithmeticOverflow {
            context: format!(
                "APR payment ratio {monthly_payment_with_fees} / {loan_amount}"
            ),
        })?;
    let equation = AprEquation::new(period, payment_ratio);
    let start = monthly_interest_rate.checked_add(Decimal::ONE).ok_or_else(|| {
        MortgageCalcError::ArithmeticOverflow {
            context: "APR starting estimate".into(),
        }
    })?;

    let root = newton_raphson(
        |k| equation.evaluate(k),
        |k| equation.derivative(k),
        start,
        config,
    )?;
    let apr = root
        .checked_sub(Decimal::ONE)
        .and_then(|rate| rate.checked_mul(ANNUALIZE_PERCENT))
        .ok_or_else(|| MortgageCalcError::ArithmeticOverflow {
            context: format!("annualizing APR root k = {root}"),
        })?;

    debug!(%payment_ratio, %start, %root, %apr, "solved APR");
    Ok(apr)
}

/// Solve the APR for a set of loan terms with the default solver settings.
pub fn solve_apr_for(terms: &LoanTerms) -> MortgageCalcResult<Rate> {
    let monthly_interest_rate = amortization::monthly_rate(terms.interest_rate);
    let payment_with_fees = amortization::monthly_payment(
        terms.financed_with_fee()?,
        monthly_interest_rate,
        terms.period,
    )?;
    solve_apr(
        terms.loan_amount,
        payment_with_fees,
        monthly_interest_rate,
        terms.period,
        &NewtonConfig::default(),
    )
}
