use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use mortgage_calc_core::coercion;
use mortgage_calc_core::mortgage::quote::{PaymentInput, DEFAULT_PERIOD};
use mortgage_calc_core::{analyze_mortgage, calculate_monthly_payment, LoanTerms};

use crate::input;

/// Loan terms shared by `quote` and `apr`
#[derive(Args)]
pub struct LoanArgs {
    /// Principal borrowed, excluding fees (e.g. 100000 or 100_000)
    #[arg(long, value_parser = parse_decimal_arg)]
    pub loan_amount: Option<Decimal>,

    /// Nominal annual interest rate in percent (e.g. 6.0 for 6%)
    #[arg(long, alias = "interest-rate", allow_hyphen_values = true, value_parser = parse_decimal_arg)]
    pub rate: Option<Decimal>,

    /// Number of monthly installments
    #[arg(long, default_value_t = DEFAULT_PERIOD, value_parser = parse_period_arg)]
    pub period: u32,

    /// Total up-front fees; negative for a net credit
    #[arg(
        long,
        allow_hyphen_values = true,
        value_parser = parse_decimal_arg,
        conflicts_with_all = ["points", "flat_fee"]
    )]
    pub fee: Option<Decimal>,

    /// Discount points as a percentage of the loan amount; negative for a credit
    #[arg(long, allow_hyphen_values = true, value_parser = parse_decimal_arg)]
    pub points: Option<Decimal>,

    /// Flat fee added to the points
    #[arg(long, allow_hyphen_values = true, value_parser = parse_decimal_arg)]
    pub flat_fee: Option<Decimal>,

    /// Fees financed into the loan (raise the payment, excluded from APR)
    #[arg(long, value_parser = parse_decimal_arg)]
    pub borrowed_fees: Option<Decimal>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a stand-alone monthly payment
#[derive(Args)]
pub struct PaymentArgs {
    /// Amount financed
    #[arg(long, value_parser = parse_decimal_arg)]
    pub amount: Option<Decimal>,

    /// Nominal annual interest rate in percent
    #[arg(long, alias = "interest-rate", allow_hyphen_values = true, value_parser = parse_decimal_arg)]
    pub rate: Option<Decimal>,

    /// Number of monthly installments
    #[arg(long, default_value_t = DEFAULT_PERIOD, value_parser = parse_period_arg)]
    pub period: u32,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

fn parse_decimal_arg(raw: &str) -> Result<Decimal, String> {
    coercion::parse_decimal("value", raw).map_err(|e| e.to_string())
}

fn parse_period_arg(raw: &str) -> Result<u32, String> {
    coercion::parse_period("period", raw).map_err(|e| e.to_string())
}

pub fn run_quote(args: LoanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let terms = load_terms(&args)?;
    let result = analyze_mortgage(&terms)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_apr(args: LoanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let terms = load_terms(&args)?;
    let result = analyze_mortgage(&terms)?;
    Ok(json!({
        "result": { "apr": result.result.apr() },
        "warnings": result.warnings,
    }))
}

pub fn run_payment(args: PaymentArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let payment_input: PaymentInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(amount) = args.amount {
        PaymentInput {
            amount,
            interest_rate: args
                .rate
                .ok_or("--rate is required (or provide --input)")?,
            period: args.period,
        }
    } else if let Some(piped) = input::stdin::read_stdin()? {
        piped
    } else {
        return Err("--amount and --rate, --input <file.json> or stdin required".into());
    };
    let result = calculate_monthly_payment(&payment_input)?;
    Ok(serde_json::to_value(result)?)
}

fn load_terms(args: &LoanArgs) -> Result<LoanTerms, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        return input::file::read_json(path);
    }
    let Some(loan_amount) = args.loan_amount else {
        return match input::stdin::read_stdin()? {
            Some(terms) => Ok(terms),
            None => Err("--loan-amount is required (or provide --input / stdin)".into()),
        };
    };
    terms_from_flags(args, loan_amount)
}

fn terms_from_flags(
    args: &LoanArgs,
    loan_amount: Decimal,
) -> Result<LoanTerms, Box<dyn std::error::Error>> {
    let rate = args.rate.ok_or("--rate is required (or provide --input)")?;

    let terms = match args.fee {
        Some(fee) => LoanTerms::new(loan_amount, rate, fee, args.period),
        None => LoanTerms::with_points(
            loan_amount,
            rate,
            args.points.unwrap_or(Decimal::ZERO),
            args.flat_fee.unwrap_or(Decimal::ZERO),
            args.period,
        ),
    };

    Ok(match args.borrowed_fees {
        Some(borrowed) => terms.with_borrowed_fees(borrowed),
        None => terms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rust_decimal_macros::dec;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        loan: LoanArgs,
    }

    fn parse(args: &[&str]) -> LoanArgs {
        let mut argv = vec!["mcalc"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().loan
    }

    #[test]
    fn test_flags_with_points() {
        let args = parse(&[
            "--loan-amount", "100_000", "--rate", "6.0", "--points", "1.25", "--flat-fee", "1200",
        ]);
        assert_eq!(args.period, 360);
        let terms = terms_from_flags(&args, args.loan_amount.unwrap()).unwrap();
        assert_eq!(terms.fee, dec!(2450));
        assert_eq!(terms.borrowed_fees, Decimal::ZERO);
    }

    #[test]
    fn test_flags_with_negative_fee_and_borrowed_fees() {
        let args = parse(&[
            "--loan-amount", "100000", "--rate", "6", "--fee", "-10050", "--borrowed-fees", "500",
            "--period", "180",
        ]);
        let terms = terms_from_flags(&args, args.loan_amount.unwrap()).unwrap();
        assert_eq!(terms.fee, dec!(-10050));
        assert_eq!(terms.borrowed_fees, dec!(500));
        assert_eq!(terms.period, 180);
    }

    #[test]
    fn test_fee_conflicts_with_points() {
        let result = TestCli::try_parse_from([
            "mcalc", "--loan-amount", "1", "--rate", "1", "--fee", "10", "--points", "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_number_rejected_by_parser() {
        let result = TestCli::try_parse_from(["mcalc", "--loan-amount", "lots"]);
        assert!(result.is_err());
        let result = TestCli::try_parse_from(["mcalc", "--loan-amount", "1", "--period", "360.5"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_rate() {
        let args = parse(&["--loan-amount", "100000"]);
        let err = terms_from_flags(&args, args.loan_amount.unwrap()).unwrap_err();
        assert!(err.to_string().contains("--rate"));
    }
}
