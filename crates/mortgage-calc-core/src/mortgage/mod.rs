pub mod amortization;
pub mod apr;
pub mod newton;
pub mod quote;

pub use quote::{analyze_mortgage, calculate_monthly_payment, LoanTerms, MortgageQuote};
