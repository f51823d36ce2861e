//! The Mott-Schottky relation `r_GB = exp(u) / (2u)` with `u = z Phi0 / kT`.
//!
//! It holds when the space-charge layer is fully depleted of the mobile defect. The
//! right-hand side has its minimum `e/2` at `u = 1` and increases for `u > 1`, which is the
//! branch used by the inversion.

use crate::core::constants::thermal_energy;
use crate::core::utils::roots::safeguarded_newton;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InversionError {
    #[error("No Mott-Schottky root for r_GB = {ratio}: {reason}")]
    NoRootInBracket { ratio: f64, reason: String },
}

/// Upper end of the bracket search in reduced units `u = z Phi0 / kT`.
const MAX_REDUCED_POTENTIAL: f64 = 1.0e4;
const ROOT_TOLERANCE: f64 = 1e-13;
const MAX_ROOT_ITERATIONS: usize = 200;

/// Resistivity ratio predicted for a space-charge potential `phi0` (V).
pub fn resistivity_ratio(phi0: f64, valence: f64, temperature: f64) -> f64 {
    let u = valence * phi0 / thermal_energy(temperature);
    u.exp() / (2.0 * u)
}

/// Space-charge potential (V) reproducing the resistivity ratio `ratio` for a mobile defect
/// of charge `valence` at `temperature` (K).
///
/// The result has the sign of `valence`.
///
/// # Errors
///
/// Returns [`InversionError::NoRootInBracket`] when the ratio is below one, below the branch
/// minimum `e/2`, not finite, when `valence` is zero, or when no bracket is found below
/// `u = 10^4`.
pub fn space_charge_potential(
    ratio: f64,
    valence: f64,
    temperature: f64,
) -> Result<f64, InversionError> {
    let fail = |reason: &str| InversionError::NoRootInBracket {
        ratio,
        reason: reason.to_string(),
    };

    if !ratio.is_finite() {
        return Err(fail("ratio is not finite"));
    }
    if ratio < 1.0 {
        return Err(fail("ratio is below one"));
    }
    if valence == 0.0 || !valence.is_finite() {
        return Err(fail("valence must be non-zero"));
    }
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(fail("temperature must be positive"));
    }

    let target = ratio.ln();
    let residual = |u: f64| (u - (2.0 * u).ln() - target, 1.0 - 1.0 / u);

    let lower = 1.0;
    if residual(lower).0 > 0.0 {
        return Err(fail("ratio is below the Mott-Schottky minimum e/2"));
    }
    let mut upper = 2.0;
    while residual(upper).0 < 0.0 {
        upper *= 2.0;
        if upper > MAX_REDUCED_POTENTIAL {
            return Err(fail("no bracket within the search range"));
        }
    }

    let u = safeguarded_newton(residual, lower, upper, ROOT_TOLERANCE, MAX_ROOT_ITERATIONS)
        .map_err(|e| fail(&e.to_string()))?;
    Ok(u * thermal_energy(temperature) / valence)
}
