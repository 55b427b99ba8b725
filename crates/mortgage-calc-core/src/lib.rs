//! Fixed-rate mortgage calculations: the level monthly payment and the APR
//! implied by up-front fees. All money and rate arithmetic is `Decimal`.

pub mod coercion;
pub mod error;
pub mod fees;
pub mod mortgage;
pub mod types;

pub use error::MortgageCalcError;
pub use mortgage::{analyze_mortgage, calculate_monthly_payment, LoanTerms, MortgageQuote};
pub use types::*;

/// Standard result type for all mortgage-calc operations
pub type MortgageCalcResult<T> = Result<T, MortgageCalcError>;
