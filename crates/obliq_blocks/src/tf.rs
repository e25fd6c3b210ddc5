//! Continuous-state realization of `transfer_function` blocks.
//!
//! A rational `H(s) = N(s)/D(s)` with `deg(D) = n >= 1` is realized in
//! controllable canonical form: `n` states, one input, one output. The
//! simulator's RK4 stepper calls [`derivative`] at each stage and
//! [`output`] to read `y` from the current state.

use obliq_common::{InternalError, XResult};
use obliq_ir::TransferFunctionParams;

/// A transfer function normalized so its denominator's leading coefficient
/// is `1`, with the numerator zero-padded on the left to line up term by
/// term against the (now `n`-long) remaining denominator coefficients.
pub struct Realization {
    /// Feedback coefficients `a[0..n]`, `a[i]` multiplying `x[n-1-i]`.
    a: Vec<f64>,
    /// Output coefficients `b[0..n]`, `b[i]` multiplying `x[n-1-i]`.
    b: Vec<f64>,
}

impl Realization {
    /// Builds the canonical-form realization of `params`. `params.order()`
    /// gives the state count `n`; a validated model only calls this when
    /// `n >= 1` (order 0 is a pure algebraic gain, handled separately).
    pub fn new(params: &TransferFunctionParams) -> XResult<Self> {
        let n = params.order();
        if n == 0 {
            return Err(InternalError::new(
                "Realization::new called on an order-0 transfer function",
            ));
        }
        let leading = params.denominator[0];
        if leading == 0.0 {
            return Err(InternalError::new("transfer function denominator has a zero leading coefficient"));
        }
        let a: Vec<f64> = params.denominator[1..].iter().map(|c| c / leading).collect();
        let mut b = vec![0.0; n - params.numerator.len()];
        b.extend(params.numerator.iter().map(|c| c / leading));
        Ok(Self { a, b })
    }

    /// State count.
    pub fn order(&self) -> usize {
        self.a.len()
    }

    /// `dx/dt` for the current state `x` and scalar input `u`.
    pub fn derivative(&self, x: &[f64], u: f64) -> Vec<f64> {
        let n = self.order();
        let mut dx = vec![0.0; n];
        for i in 0..n.saturating_sub(1) {
            dx[i] = x[i + 1];
        }
        let feedback: f64 = (0..n).map(|j| self.a[n - 1 - j] * x[j]).sum();
        dx[n - 1] = u - feedback;
        dx
    }

    /// The output `y` read from the current state, `Cx` with no feedthrough
    /// (`deg(N) < deg(D)` guarantees no direct `D` term).
    pub fn output(&self, x: &[f64]) -> f64 {
        let n = self.order();
        (0..n).map(|j| self.b[n - 1 - j] * x[j]).sum()
    }
}

/// The algebraic gain of an order-0 transfer function, `N(s)/D(s)` with both
/// degree `0`.
pub fn static_gain(params: &TransferFunctionParams) -> XResult<f64> {
    if params.order() != 0 {
        return Err(InternalError::new("static_gain called on a stateful transfer function"));
    }
    let denom = params.denominator[0];
    if denom == 0.0 {
        return Err(InternalError::new("transfer function denominator has a zero leading coefficient"));
    }
    let numer = params.numerator.first().copied().unwrap_or(0.0);
    Ok(numer / denom)
}
