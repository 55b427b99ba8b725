//! Newton-Raphson root finder used by the APR solver.
//!
//! Iterates `k_next = k - f(k) / f'(k)` until two consecutive estimates agree
//! to `precision` decimal digits, measured as an offset from 1. The unknown in
//! this crate is always a growth factor `1 + rate`, so comparing `k - 1`
//! compares the rate itself.
//!
//! After `max_iterations` steps the loop gives up with `ConvergenceFailure`.
//! A flat derivative is a `DivisionByZero`.

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::MortgageCalcError;
use crate::MortgageCalcResult;

/// Digits of agreement required between consecutive estimates.
const DEFAULT_PRECISION: u32 = 5;

/// The documented APR cases converge in under ten steps.
const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Largest power of ten that still fits in a `Decimal`.
const MAX_PRECISION: u32 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewtonConfig {
    /// Decimal digits of `k - 1` that must stop changing.
    pub precision: u32,
    /// Upper bound on Newton steps before reporting non-convergence.
    pub max_iterations: u32,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Find a root of `f` starting from `start`.
///
/// `f` and `f_prime` are fallible so that overflow inside an evaluation
/// surfaces as an error instead of a wrapped value.
pub fn newton_raphson<F, G>(
    f: F,
    f_prime: G,
    start: Decimal,
    config: &NewtonConfig,
) -> MortgageCalcResult<Decimal>
where
    F: Fn(Decimal) -> MortgageCalcResult<Decimal>,
    G: Fn(Decimal) -> MortgageCalcResult<Decimal>,
{
    if config.precision > MAX_PRECISION {
        return Err(MortgageCalcError::InvalidInput {
            field: "precision".into(),
            reason: format!("Precision must be at most {MAX_PRECISION} digits"),
        });
    }
    let scale = Decimal::TEN.powu(u64::from(config.precision));

    let mut k = Decimal::ZERO;
    let mut k_next = start;
    let mut iterations: u32 = 0;

    while truncated_offset(k, scale)? != truncated_offset(k_next, scale)? {
        if iterations >= config.max_iterations {
            return Err(MortgageCalcError::ConvergenceFailure {
                function: "Newton-Raphson".into(),
                iterations,
                last_delta: k_next - k,
            });
        }

        k = k_next;
        let slope = f_prime(k)?;
        if slope.is_zero() {
            return Err(MortgageCalcError::DivisionByZero {
                context: format!("Newton-Raphson derivative at k = {k}"),
            });
        }

        let step = f(k)?
            .checked_div(slope)
            .ok_or_else(|| MortgageCalcError::ArithmeticOverflow {
                context: format!("Newton-Raphson step at k = {k}"),
            })?;
        k_next = k
            .checked_sub(step)
            .ok_or_else(|| MortgageCalcError::ArithmeticOverflow {
                context: format!("Newton-Raphson estimate after k = {k}"),
            })?;
        iterations += 1;

        trace!(iteration = iterations, %k, %step, "newton-raphson step");
    }

    Ok(k_next)
}

/// `floor((x - 1) * scale)`: the digits of the offset from 1 that must agree.
fn truncated_offset(x: Decimal, scale: Decimal) -> MortgageCalcResult<Decimal> {
    (x - Decimal::ONE)
        .checked_mul(scale)
        .map(|v| v.floor())
        .ok_or_else(|| MortgageCalcError::ArithmeticOverflow {
            context: format!("Newton-Raphson convergence test at k = {x}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_square_root_of_two() {
        let root = newton_raphson(
            |x| Ok(x * x - dec!(2)),
            |x| Ok(dec!(2) * x),
            dec!(1.5),
            &NewtonConfig::default(),
        )
        .unwrap();
        assert!(
            (root - dec!(1.4142135623730950488)).abs() < dec!(0.0000000001),
            "got {root}"
        );
    }

    #[test]
    fn test_start_on_root_returns_immediately() {
        let root = newton_raphson(
            |x| Ok(x - dec!(1.005)),
            |_| Ok(Decimal::ONE),
            dec!(1.005),
            &NewtonConfig::default(),
        )
        .unwrap();
        assert_eq!(root, dec!(1.005));
    }

    #[test]
    fn test_two_cycle_hits_iteration_cap() {
        // x^3 - 2x + 2 from x = 1 bounces between 1 and 0 forever.
        let config = NewtonConfig {
            precision: 5,
            max_iterations: 25,
        };
        let err = newton_raphson(
            |x| Ok(x * x * x - dec!(2) * x + dec!(2)),
            |x| Ok(dec!(3) * x * x - dec!(2)),
            Decimal::ONE,
            &config,
        )
        .unwrap_err();
        match err {
            MortgageCalcError::ConvergenceFailure { iterations, .. } => assert_eq!(iterations, 25),
            other => panic!("Expected ConvergenceFailure, got {other}"),
        }
    }

    #[test]
    fn test_flat_derivative_is_division_by_zero() {
        let err = newton_raphson(
            |x| Ok((x - dec!(3)) * (x - dec!(3)) + Decimal::ONE),
            |x| Ok(dec!(2) * (x - dec!(3))),
            dec!(3),
            &NewtonConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MortgageCalcError::DivisionByZero { .. }));
    }

    #[test]
    fn test_evaluation_errors_propagate() {
        let err = newton_raphson(
            |_| {
                Err(MortgageCalcError::ArithmeticOverflow {
                    context: "test".into(),
                })
            },
            |_| Ok(Decimal::ONE),
            dec!(2),
            &NewtonConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MortgageCalcError::ArithmeticOverflow { .. }));
    }

    #[test]
    fn test_precision_out_of_range() {
        let config = NewtonConfig {
            precision: 40,
            max_iterations: 10,
        };
        let err = newton_raphson(|x| Ok(x), |_| Ok(Decimal::ONE), dec!(2), &config).unwrap_err();
        assert!(matches!(err, MortgageCalcError::InvalidInput { .. }));
    }

    #[test]
    fn test_default_config() {
        let config = NewtonConfig::default();
        assert_eq!(config.precision, 5);
        assert_eq!(config.max_iterations, 100);
    }
}
