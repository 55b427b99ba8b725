//! Conversion of caller-supplied strings into the typed scalars used by
//! [`LoanTerms`](crate::mortgage::quote::LoanTerms).
//!
//! Accepts the forms people actually type into a loan form: surrounding
//! whitespace, `_` digit separators (`100_000`) and scientific notation for
//! decimal fields. Anything else is an `InvalidInput` naming the field.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::MortgageCalcError;
use crate::MortgageCalcResult;

/// Parse a decimal scalar (amount, rate, fee).
pub fn parse_decimal(field: &str, raw: &str) -> MortgageCalcResult<Decimal> {
    let cleaned = strip_digit_separators(field, raw)?;

    let parsed = if cleaned.contains(['e', 'E']) {
        Decimal::from_scientific(&cleaned)
    } else {
        Decimal::from_str(&cleaned)
    };

    parsed.map_err(|e| MortgageCalcError::InvalidInput {
        field: field.into(),
        reason: format!("'{raw}' is not a valid number ({e})"),
    })
}

/// Parse an installment count. Only plain non-negative integers are accepted.
pub fn parse_period(field: &str, raw: &str) -> MortgageCalcResult<u32> {
    let cleaned = strip_digit_separators(field, raw)?;

    u32::from_str(&cleaned).map_err(|e| MortgageCalcError::InvalidInput {
        field: field.into(),
        reason: format!("'{raw}' is not a whole number of months ({e})"),
    })
}

/// Trim and remove `_` separators, which are only legal between two digits.
fn strip_digit_separators(field: &str, raw: &str) -> MortgageCalcResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MortgageCalcError::InvalidInput {
            field: field.into(),
            reason: "Value is empty".into(),
        });
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let mut cleaned = String::with_capacity(chars.len());
    for (i, c) in chars.iter().enumerate() {
        if *c != '_' {
            cleaned.push(*c);
            continue;
        }
        let between_digits = i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if !between_digits {
            return Err(MortgageCalcError::InvalidInput {
                field: field.into(),
                reason: format!("'{raw}' has a misplaced '_' separator"),
            });
        }
    }

    Ok(cleaned)
}
