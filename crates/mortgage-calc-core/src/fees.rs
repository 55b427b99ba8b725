use rust_decimal_macros::dec;

use crate::types::Money;

/// Total up-front fee: flat fee plus discount points charged on the principal.
///
/// `points` is a percentage of `loan_amount` (1.25 = 1.25%). Negative points
/// are lender credits and may push the total below zero.
pub fn total_fee(loan_amount: Money, points: Money, flat_fee: Money) -> Money {
    flat_fee + loan_amount * points / dec!(100)
}
