//! Loan terms and the derived mortgage quote.
//!
//! A [`MortgageQuote`] is computed once from [`LoanTerms`] and never changes:
//! every derived figure is a plain field filled in at construction.
//!
//! Fees travel on two separate channels:
//! - `fee` is folded into the APR figure only (`monthly_payment_with_fees`),
//! - `borrowed_fees` are financed and raise `monthly_payment` only.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use super::amortization;
use super::apr;
use super::newton::NewtonConfig;
use crate::coercion;
use crate::error::MortgageCalcError;
use crate::fees;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::MortgageCalcResult;

/// Installments assumed when none are given: a 30-year monthly loan.
pub const DEFAULT_PERIOD: u32 = 360;

/// Fees above this share of the loan amount get a warning.
const HIGH_FEE_RATIO: Decimal = dec!(0.10);

/// Solved APRs this close to zero (in percent) are the polynomial's k = 1 root.
const TRIVIAL_ROOT_APR: Decimal = dec!(0.001);

fn default_period() -> u32 {
    DEFAULT_PERIOD
}

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Terms of a fixed-rate mortgage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    /// Principal borrowed, excluding any fees.
    pub loan_amount: Money,
    /// Nominal annual rate as a percentage (6.0 = 6%).
    pub interest_rate: Rate,
    /// Number of monthly installments.
    #[serde(default = "default_period")]
    pub period: u32,
    /// Total fees for obtaining the loan. Negative for a net credit.
    pub fee: Money,
    /// Fees added to the amount financed. Excluded from APR.
    #[serde(default)]
    pub borrowed_fees: Money,
}

impl LoanTerms {
    pub fn new(loan_amount: Money, interest_rate: Rate, fee: Money, period: u32) -> Self {
        Self {
            loan_amount,
            interest_rate,
            period,
            fee,
            borrowed_fees: Decimal::ZERO,
        }
    }

    /// Terms whose fee is `flat_fee` plus `points` percent of the principal.
    pub fn with_points(
        loan_amount: Money,
        interest_rate: Rate,
        points: Decimal,
        flat_fee: Money,
        period: u32,
    ) -> Self {
        Self::new(
            loan_amount,
            interest_rate,
            fees::total_fee(loan_amount, points, flat_fee),
            period,
        )
    }

    /// Build terms from caller-supplied strings.
    pub fn parse(
        loan_amount: &str,
        interest_rate: &str,
        fee: &str,
        period: &str,
    ) -> MortgageCalcResult<Self> {
        Self::parse_with_borrowed_fees(loan_amount, interest_rate, fee, Some(period), None)
    }

    /// Like [`LoanTerms::parse`], with every scalar going through coercion.
    /// A missing `period` is [`DEFAULT_PERIOD`]; missing `borrowed_fees` is zero.
    pub fn parse_with_borrowed_fees(
        loan_amount: &str,
        interest_rate: &str,
        fee: &str,
        period: Option<&str>,
        borrowed_fees: Option<&str>,
    ) -> MortgageCalcResult<Self> {
        let period = match period {
            Some(raw) => coercion::parse_period("period", raw)?,
            None => DEFAULT_PERIOD,
        };
        let borrowed_fees = match borrowed_fees {
            Some(raw) => coercion::parse_decimal("borrowed_fees", raw)?,
            None => Decimal::ZERO,
        };
        Ok(Self::new(
            coercion::parse_decimal("loan_amount", loan_amount)?,
            coercion::parse_decimal("interest_rate", interest_rate)?,
            coercion::parse_decimal("fee", fee)?,
            period,
        )
        .with_borrowed_fees(borrowed_fees))
    }

    pub fn with_borrowed_fees(mut self, borrowed_fees: Money) -> Self {
        self.borrowed_fees = borrowed_fees;
        self
    }

    /// `loan_amount + fee`: the amount the APR payment is computed on.
    pub fn financed_with_fee(&self) -> MortgageCalcResult<Money> {
        self.loan_amount
            .checked_add(self.fee)
            .ok_or_else(|| MortgageCalcError::ArithmeticOverflow {
                context: format!("loan amount {} plus fee {}", self.loan_amount, self.fee),
            })
    }

    /// `loan_amount + borrowed_fees`: the amount actually repaid.
    pub fn financed_with_borrowed_fees(&self) -> MortgageCalcResult<Money> {
        self.loan_amount
            .checked_add(self.borrowed_fees)
            .ok_or_else(|| MortgageCalcError::ArithmeticOverflow {
                context: format!(
                    "loan amount {} plus borrowed fees {}",
                    self.loan_amount, self.borrowed_fees
                ),
            })
    }
}

/// Inputs for a stand-alone monthly payment calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInput {
    /// Amount financed.
    pub amount: Money,
    /// Nominal annual rate as a percentage (6.0 = 6%).
    pub interest_rate: Rate,
    #[serde(default = "default_period")]
    pub period: u32,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Derived figures for a set of loan terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MortgageQuote {
    #[serde(skip)]
    terms: LoanTerms,
    /// Nominal monthly rate as a fraction (0.005 for 6% a year).
    monthly_interest_rate: Rate,
    /// Installment on `loan_amount + borrowed_fees`.
    monthly_payment: Money,
    /// Installment on `loan_amount + fee`; the basis of the APR.
    monthly_payment_with_fees: Money,
    /// Annual percentage rate, in percent.
    apr: Rate,
    total_fees: Money,
}

impl MortgageQuote {
    pub fn new(terms: LoanTerms) -> MortgageCalcResult<Self> {
        Self::with_config(terms, &NewtonConfig::default())
    }

    pub fn with_config(terms: LoanTerms, config: &NewtonConfig) -> MortgageCalcResult<Self> {
        let monthly_interest_rate = amortization::monthly_rate(terms.interest_rate);

        let monthly_payment = amortization::monthly_payment(
            terms.financed_with_borrowed_fees()?,
            monthly_interest_rate,
            terms.period,
        )?;
        let monthly_payment_with_fees = amortization::monthly_payment(
            terms.financed_with_fee()?,
            monthly_interest_rate,
            terms.period,
        )?;

        let apr = apr::solve_apr(
            terms.loan_amount,
            monthly_payment_with_fees,
            monthly_interest_rate,
            terms.period,
            config,
        )?;

        debug!(
            loan_amount = %terms.loan_amount,
            interest_rate = %terms.interest_rate,
            period = terms.period,
            %monthly_payment,
            %apr,
            "mortgage quote computed"
        );

        Ok(Self {
            total_fees: terms.fee,
            terms,
            monthly_interest_rate,
            monthly_payment,
            monthly_payment_with_fees,
            apr,
        })
    }

    pub fn terms(&self) -> &LoanTerms {
        &self.terms
    }

    pub fn monthly_interest_rate(&self) -> Rate {
        self.monthly_interest_rate
    }

    pub fn monthly_payment(&self) -> Money {
        self.monthly_payment
    }

    pub fn monthly_payment_with_fees(&self) -> Money {
        self.monthly_payment_with_fees
    }

    pub fn apr(&self) -> Rate {
        self.apr
    }

    pub fn total_fees(&self) -> Money {
        self.total_fees
    }
}

/// Monthly payment breakdown for [`calculate_monthly_payment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutput {
    pub monthly_interest_rate: Rate,
    pub monthly_payment: Money,
    /// Sum of all installments.
    pub total_paid: Money,
    /// `total_paid - amount`.
    pub total_interest: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Quote a mortgage: monthly payment, fee-inclusive payment and APR.
pub fn analyze_mortgage(
    input: &LoanTerms,
) -> MortgageCalcResult<ComputationOutput<MortgageQuote>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.loan_amount < Decimal::ZERO {
        warnings.push(format!(
            "Loan amount {} is negative; figures follow the formulas but are not meaningful",
            input.loan_amount
        ));
    }
    if input.fee < Decimal::ZERO {
        warnings.push(format!(
            "Net fee {} is a credit; APR is below the nominal rate",
            input.fee
        ));
    }
    if input.loan_amount > Decimal::ZERO && input.fee > input.loan_amount * HIGH_FEE_RATIO {
        warnings.push(format!(
            "Fees of {} exceed {}% of the loan amount",
            input.fee,
            HIGH_FEE_RATIO * dec!(100)
        ));
    }

    let quote = MortgageQuote::new(input.clone())?;

    // Newton can slide from the nominal rate onto k = 1 when fees are heavy
    // relative to a short term.
    if !quote.monthly_interest_rate.is_zero() && quote.apr.abs() < TRIVIAL_ROOT_APR {
        warnings.push(format!(
            "APR solver converged to the trivial root k = 1 (APR {}%); the figure does not reflect fees",
            quote.apr
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Level-payment amortization with Newton-Raphson APR",
        input,
        warnings,
        elapsed,
        quote,
    ))
}

/// Amortized monthly payment on its own, without any fee handling.
pub fn calculate_monthly_payment(
    input: &PaymentInput,
) -> MortgageCalcResult<ComputationOutput<PaymentOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let monthly_interest_rate = amortization::monthly_rate(input.interest_rate);
    if monthly_interest_rate.is_zero() {
        warnings.push("Zero interest rate: payment is straight-line principal repayment".into());
    } else if monthly_interest_rate < Decimal::ZERO {
        warnings.push(format!(
            "Negative interest rate {}%",
            input.interest_rate
        ));
    }

    let monthly_payment =
        amortization::monthly_payment(input.amount, monthly_interest_rate, input.period)?;
    let total_paid = monthly_payment
        .checked_mul(Decimal::from(input.period))
        .ok_or_else(|| MortgageCalcError::ArithmeticOverflow {
            context: "total of all installments".into(),
        })?;

    let total_interest = total_paid.checked_sub(input.amount).ok_or_else(|| {
        MortgageCalcError::ArithmeticOverflow {
            context: "total interest paid".into(),
        }
    })?;

    let output = PaymentOutput {
        monthly_interest_rate,
        monthly_payment,
        total_paid,
        total_interest,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Level-payment amortization",
        input,
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TOL: Decimal = dec!(0.001);

    fn assert_close(actual: Decimal, expected: Decimal, tol: Decimal, msg: &str) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "{}: expected ~{}, got {} (diff = {})",
            msg,
            expected,
            actual,
            diff
        );
    }

    fn reference_terms() -> LoanTerms {
        LoanTerms::with_points(dec!(100_000), dec!(6.0), dec!(1.25), dec!(1200), 360)
    }

    #[test]
    fn test_reference_quote() {
        let quote = MortgageQuote::new(reference_terms()).unwrap();
        assert_eq!(quote.monthly_interest_rate(), dec!(0.005));
        assert_close(quote.monthly_payment(), dec!(599.55), TOL, "monthly payment");
        assert_close(quote.total_fees(), dec!(2450), TOL, "total fees");
        assert_close(quote.apr(), dec!(6.22726), dec!(0.00001), "APR");
    }

    #[test]
    fn test_fee_stays_out_of_monthly_payment() {
        let with_fee = MortgageQuote::new(reference_terms()).unwrap();
        let without_fee =
            MortgageQuote::new(LoanTerms::new(dec!(100_000), dec!(6.0), Decimal::ZERO, 360))
                .unwrap();
        assert_eq!(with_fee.monthly_payment(), without_fee.monthly_payment());
        assert!(with_fee.monthly_payment_with_fees() > with_fee.monthly_payment());
    }

    #[test]
    fn test_borrowed_fees_stay_out_of_payment_with_fees() {
        let base = LoanTerms::new(dec!(100_000), dec!(6.0), dec!(2000), 360);
        let plain = MortgageQuote::new(base.clone()).unwrap();
        let financed = MortgageQuote::new(base.with_borrowed_fees(dec!(2000))).unwrap();

        assert_eq!(
            plain.monthly_payment_with_fees(),
            financed.monthly_payment_with_fees()
        );
        assert_eq!(plain.apr(), financed.apr());
        assert_close(financed.apr(), dec!(6.1857), dec!(0.00001), "APR");
        assert_close(financed.monthly_payment(), dec!(611.54), dec!(0.002), "payment");
    }

    #[test]
    fn test_repeated_reads_identical() {
        let quote = MortgageQuote::new(reference_terms()).unwrap();
        let first = (quote.apr(), quote.monthly_payment());
        for _ in 0..3 {
            assert_eq!((quote.apr(), quote.monthly_payment()), first);
        }
        let cloned = quote.clone();
        assert_eq!(cloned, quote);
    }

    #[test]
    fn test_quote_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MortgageQuote>();
    }

    #[test]
    fn test_parse_matches_native_terms() {
        let parsed = LoanTerms::parse("100_000", "6.0", "2450", "360").unwrap();
        assert_eq!(parsed, reference_terms());
    }

    #[test]
    fn test_parse_reports_field() {
        let err = LoanTerms::parse("100000", "six", "0", "360").unwrap_err();
        match err {
            MortgageCalcError::InvalidInput { field, .. } => assert_eq!(field, "interest_rate"),
            other => panic!("Expected InvalidInput, got {other}"),
        }
    }

    #[test]
    fn test_parse_with_borrowed_fees_and_default_period() {
        let terms =
            LoanTerms::parse_with_borrowed_fees("100_000", "6.0", "2000", None, Some(" 2_000 "))
                .unwrap();
        assert_eq!(terms.period, DEFAULT_PERIOD);
        assert_eq!(terms.borrowed_fees, dec!(2000));

        let quote = MortgageQuote::new(terms).unwrap();
        assert_close(quote.monthly_payment(), dec!(611.54), dec!(0.002), "payment");
        assert_close(quote.apr(), dec!(6.1857), dec!(0.00001), "APR");
    }

    #[test]
    fn test_parse_reports_borrowed_fees_field() {
        let err = LoanTerms::parse_with_borrowed_fees("100000", "6.0", "0", Some("360"), Some("n/a"))
            .unwrap_err();
        match err {
            MortgageCalcError::InvalidInput { field, .. } => assert_eq!(field, "borrowed_fees"),
            other => panic!("Expected InvalidInput, got {other}"),
        }
    }

    #[test]
    fn test_tiny_principal_with_huge_fee_is_overflow_error() {
        let terms = LoanTerms::new(
            dec!(0.0000000001),
            dec!(6.0),
            dec!(1_000_000_000_000_000_000_000_000),
            360,
        );
        let err = MortgageQuote::new(terms).unwrap_err();
        assert!(matches!(err, MortgageCalcError::ArithmeticOverflow { .. }));
    }

    #[test]
    fn test_fee_sum_overflow_is_an_error() {
        let terms = LoanTerms::new(Decimal::MAX, dec!(6.0), Decimal::MAX, 360);
        let err = terms.financed_with_fee().unwrap_err();
        assert!(matches!(err, MortgageCalcError::ArithmeticOverflow { .. }));
    }

    #[test]
    fn test_single_period_with_fee_warns_about_trivial_root() {
        let out = analyze_mortgage(&LoanTerms::new(dec!(100_000), dec!(6.0), dec!(1000), 1)).unwrap();
        assert!(out.result.apr().abs() < TRIVIAL_ROOT_APR);
        assert!(out.warnings.iter().any(|w| w.contains("trivial root")));
    }

    #[test]
    fn test_zero_period_rejected() {
        let err = MortgageQuote::new(LoanTerms::new(dec!(100_000), dec!(6.0), dec!(0), 0))
            .unwrap_err();
        assert!(matches!(err, MortgageCalcError::InvalidInput { .. }));
    }

    #[test]
    fn test_zero_loan_amount_rejected() {
        let err = MortgageQuote::new(LoanTerms::new(Decimal::ZERO, dec!(6.0), dec!(1000), 360))
            .unwrap_err();
        assert!(matches!(err, MortgageCalcError::DivisionByZero { .. }));
    }

    #[test]
    fn test_deserialize_defaults() {
        let terms: LoanTerms = serde_json::from_value(serde_json::json!({
            "loan_amount": "125000",
            "interest_rate": "6.5",
            "fee": "5000"
        }))
        .unwrap();
        assert_eq!(terms.period, DEFAULT_PERIOD);
        assert_eq!(terms.borrowed_fees, Decimal::ZERO);

        let quote = MortgageQuote::new(terms).unwrap();
        assert_close(quote.apr(), dec!(6.881), dec!(0.001), "APR 125k @ 6.5%");
    }

    #[test]
    fn test_analyze_mortgage_envelope() {
        let out = analyze_mortgage(&reference_terms()).unwrap();
        assert!(out.warnings.is_empty());
        assert_close(out.result.apr(), dec!(6.22726), dec!(0.00001), "APR");
        assert_eq!(out.assumptions["period"], serde_json::json!(360));
    }

    #[test]
    fn test_analyze_mortgage_warns_on_credit_and_high_fees() {
        let credit = LoanTerms::with_points(dec!(100_000), dec!(6.0), dec!(-11.25), dec!(1200), 360);
        let out = analyze_mortgage(&credit).unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("credit"));

        let pricey = LoanTerms::new(dec!(100_000), dec!(6.0), dec!(15_000), 360);
        let out = analyze_mortgage(&pricey).unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("exceed"));
    }

    #[test]
    fn test_quote_serializes_derived_fields_only() {
        let quote = MortgageQuote::new(reference_terms()).unwrap();
        let value = serde_json::to_value(&quote).unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "apr",
                "monthly_interest_rate",
                "monthly_payment",
                "monthly_payment_with_fees",
                "total_fees"
            ]
        );
    }

    #[test]
    fn test_calculate_monthly_payment() {
        let out = calculate_monthly_payment(&PaymentInput {
            amount: dec!(100_000),
            interest_rate: dec!(6.0),
            period: 360,
        })
        .unwrap();
        assert_close(out.result.monthly_payment, dec!(599.55), TOL, "payment");
        assert_eq!(
            out.result.total_paid,
            out.result.monthly_payment * dec!(360)
        );
        assert_eq!(
            out.result.total_interest,
            out.result.total_paid - dec!(100_000)
        );
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_calculate_monthly_payment_zero_rate() {
        let out = calculate_monthly_payment(&PaymentInput {
            amount: dec!(36_000),
            interest_rate: Decimal::ZERO,
            period: 360,
        })
        .unwrap();
        assert_eq!(out.result.monthly_payment, dec!(100));
        assert_eq!(out.result.total_interest, Decimal::ZERO);
        assert_eq!(out.warnings.len(), 1);
    }
}
