use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RootError {
    #[error("Function does not change sign on [{lo}, {hi}]")]
    NoSignChange { lo: f64, hi: f64 },

    #[error("Function is not finite at x = {at}")]
    NonFinite { at: f64 },

    #[error("Root search did not converge in {iterations} iterations")]
    NotConverged { iterations: usize },
}

const BRACKET_GROWTH: f64 = 1.6;

/// Widens `[lo, hi]` until `f` changes sign across it.
///
/// Both endpoints move outward each step, so a function that is flat to rounding
/// across the starting interval is still followed to whichever side holds the root.
/// Terminates for monotone functions once the interval covers the root.
pub fn expand_bracket<F>(
    mut f: F,
    mut lo: f64,
    mut hi: f64,
    max_expansions: usize,
) -> Result<(f64, f64), RootError>
where
    F: FnMut(f64) -> f64,
{
    let mut f_lo = f(lo);
    let mut f_hi = f(hi);
    for _ in 0..=max_expansions {
        if !f_lo.is_finite() {
            return Err(RootError::NonFinite { at: lo });
        }
        if !f_hi.is_finite() {
            return Err(RootError::NonFinite { at: hi });
        }
        if f_lo * f_hi <= 0.0 {
            return Ok((lo, hi));
        }
        let step = BRACKET_GROWTH * (hi - lo);
        lo -= step;
        hi += step;
        f_lo = f(lo);
        f_hi = f(hi);
    }
    Err(RootError::NoSignChange { lo, hi })
}

/// Newton-Raphson iteration safeguarded by bisection.
///
/// `f` returns the value and the derivative. A Newton step is taken whenever it stays
/// inside the current bracket and shrinks the interval fast enough; otherwise the bracket
/// is bisected. Terminates when the last step is smaller than `tolerance`.
pub fn safeguarded_newton<F>(
    mut f: F,
    lo: f64,
    hi: f64,
    tolerance: f64,
    max_iterations: usize,
) -> Result<f64, RootError>
where
    F: FnMut(f64) -> (f64, f64),
{
    let (f_lo, _) = f(lo);
    let (f_hi, _) = f(hi);
    if !f_lo.is_finite() {
        return Err(RootError::NonFinite { at: lo });
    }
    if !f_hi.is_finite() {
        return Err(RootError::NonFinite { at: hi });
    }
    if f_lo == 0.0 {
        return Ok(lo);
    }
    if f_hi == 0.0 {
        return Ok(hi);
    }
    if f_lo.signum() == f_hi.signum() {
        return Err(RootError::NoSignChange { lo, hi });
    }

    // Orient so that f(neg) < 0 < f(pos).
    let (mut neg, mut pos) = if f_lo < 0.0 { (lo, hi) } else { (hi, lo) };
    let mut x = 0.5 * (lo + hi);
    let mut step_before_last = (hi - lo).abs();
    let mut step = step_before_last;
    let (mut fx, mut dfx) = f(x);

    for _ in 0..max_iterations {
        if !fx.is_finite() {
            return Err(RootError::NonFinite { at: x });
        }
        let newton_leaves_bracket = ((x - pos) * dfx - fx) * ((x - neg) * dfx - fx) > 0.0;
        let newton_too_slow = (2.0 * fx).abs() > (step_before_last * dfx).abs();

        step_before_last = step;
        if newton_leaves_bracket || newton_too_slow || dfx == 0.0 || !dfx.is_finite() {
            step = 0.5 * (pos - neg);
            x = neg + step;
        } else {
            step = fx / dfx;
            x -= step;
        }
        if step.abs() < tolerance {
            return Ok(x);
        }

        (fx, dfx) = f(x);
        if fx == 0.0 {
            return Ok(x);
        }
        if fx < 0.0 {
            neg = x;
        } else {
            pos = x;
        }
    }
    Err(RootError::NotConverged {
        iterations: max_iterations,
    })
}
