use napi::Result as NapiResult;
use napi_derive::napi;

use mortgage_calc_core::mortgage::quote::PaymentInput;
use mortgage_calc_core::LoanTerms;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Full quote (payment, fee-inclusive payment, APR) for JSON-encoded `LoanTerms`.
#[napi]
pub fn mortgage_quote(input_json: String) -> NapiResult<String> {
    let input: LoanTerms = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = mortgage_calc_core::analyze_mortgage(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Monthly payment for a JSON-encoded amount, annual rate and period.
#[napi]
pub fn monthly_payment(input_json: String) -> NapiResult<String> {
    let input: PaymentInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = mortgage_calc_core::calculate_monthly_payment(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
