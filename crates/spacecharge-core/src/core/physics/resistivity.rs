use crate::core::utils::quadrature::trapezoid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResistivityError {
    #[error(
        "Concentration {concentration:e} at grid index {index} is below the floor {floor:e}; the resistivity diverges"
    )]
    DegenerateIntegration {
        index: usize,
        concentration: f64,
        floor: f64,
    },

    #[error("Integration window contains fewer than two nodes")]
    EmptyWindow,

    #[error("Mobility must be positive and finite, got {0}")]
    InvalidMobility(f64),

    #[error("Invalid integration window: {0}")]
    InvalidWindow(String),
}

/// Region treated as the grain boundary when integrating the resistivity.
///
/// Both variants are anchored on the node with the largest potential magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum IntegrationWindow {
    /// The contiguous region around the peak where `|phi|` is at least this value (V).
    PotentialCutoff(f64),
    /// Nodes within this fraction of the half grid span from the peak.
    HalfWidthFraction(f64),
}

/// A mobile-defect profile sampled on the nodes that host it.
#[derive(Debug, Clone, Copy)]
pub struct MobileProfile<'a> {
    /// Index of each sample in the full grid, for error reporting.
    pub grid_indices: &'a [usize],
    pub x: &'a [f64],
    pub phi: &'a [f64],
    pub mole_fractions: &'a [f64],
    pub bulk_mole_fractions: &'a [f64],
    pub mobility: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResistivityRatio {
    /// `r_GB`: mean local resistivity over the window relative to the bulk resistivity.
    pub ratio: f64,
    /// Positions bounding the integration window.
    pub window: (f64, f64),
    pub nodes: usize,
}

impl IntegrationWindow {
    /// Inclusive node range of the window on a profile.
    fn bounds(self, x: &[f64], phi: &[f64]) -> Result<(usize, usize), ResistivityError> {
        let peak = phi
            .iter()
            .enumerate()
            .fold(0, |best, (i, p)| if p.abs() > phi[best].abs() { i } else { best });

        match self {
            Self::PotentialCutoff(cutoff) => {
                if !(cutoff.is_finite() && cutoff >= 0.0) {
                    return Err(ResistivityError::InvalidWindow(format!(
                        "potential cutoff must be non-negative, got {cutoff}"
                    )));
                }
                if phi[peak].abs() < cutoff {
                    return Err(ResistivityError::EmptyWindow);
                }
                let mut lo = peak;
                while lo > 0 && phi[lo - 1].abs() >= cutoff {
                    lo -= 1;
                }
                let mut hi = peak;
                while hi + 1 < phi.len() && phi[hi + 1].abs() >= cutoff {
                    hi += 1;
                }
                Ok((lo, hi))
            }
            Self::HalfWidthFraction(fraction) => {
                if !(fraction > 0.0 && fraction <= 1.0) {
                    return Err(ResistivityError::InvalidWindow(format!(
                        "half-width fraction must lie in (0, 1], got {fraction}"
                    )));
                }
                let half = fraction * 0.5 * (x[x.len() - 1] - x[0]);
                let lo = x.partition_point(|&v| v < x[peak] - half);
                let hi = x.partition_point(|&v| v <= x[peak] + half) - 1;
                Ok((lo, hi))
            }
        }
    }
}

/// Integrates the local-to-bulk resistivity ratio across the grain-boundary window.
///
/// With `r(x) = 1 / (mobility c(x))` and the bulk reference `r_b(x) = 1 / (mobility c_b(x))`,
/// `r_GB = (1 / L) * integral of r / r_b dx` over the window of length `L`, by the trapezoid
/// rule on the profile's own (non-uniform) positions.
///
/// # Errors
///
/// A local or bulk mole fraction below `floor` inside the window is reported as
/// [`ResistivityError::DegenerateIntegration`] with its grid index; nothing is clamped.
pub fn resistivity_ratio(
    profile: &MobileProfile<'_>,
    window: IntegrationWindow,
    floor: f64,
) -> Result<ResistivityRatio, ResistivityError> {
    let mobility = profile.mobility;
    if !(mobility.is_finite() && mobility > 0.0) {
        return Err(ResistivityError::InvalidMobility(mobility));
    }
    if profile.x.len() < 2 {
        return Err(ResistivityError::EmptyWindow);
    }

    let (lo, hi) = window.bounds(profile.x, profile.phi)?;
    if hi <= lo {
        return Err(ResistivityError::EmptyWindow);
    }

    let mut relative = Vec::with_capacity(hi - lo + 1);
    for k in lo..=hi {
        for concentration in [profile.mole_fractions[k], profile.bulk_mole_fractions[k]] {
            if !(concentration >= floor && concentration > 0.0) {
                return Err(ResistivityError::DegenerateIntegration {
                    index: profile.grid_indices[k],
                    concentration,
                    floor,
                });
            }
        }
        let local = 1.0 / (mobility * profile.mole_fractions[k]);
        let bulk = 1.0 / (mobility * profile.bulk_mole_fractions[k]);
        relative.push(local / bulk);
    }

    let x = &profile.x[lo..=hi];
    let length = x[x.len() - 1] - x[0];
    Ok(ResistivityRatio {
        ratio: trapezoid(x, &relative) / length,
        window: (x[0], x[x.len() - 1]),
        nodes: x.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Samples {
        indices: Vec<usize>,
        x: Vec<f64>,
        phi: Vec<f64>,
        c: Vec<f64>,
        bulk: Vec<f64>,
    }

    impl Samples {
        fn new(phi: Vec<f64>, c: Vec<f64>) -> Self {
            let n = phi.len();
            Self {
                indices: (0..n).map(|i| 2 * i).collect(),
                x: (0..n).map(|i| i as f64 - (n / 2) as f64).collect(),
                phi,
                c,
                bulk: vec![0.01; n],
            }
        }

        fn profile(&self) -> MobileProfile<'_> {
            MobileProfile {
                grid_indices: &self.indices,
                x: &self.x,
                phi: &self.phi,
                mole_fractions: &self.c,
                bulk_mole_fractions: &self.bulk,
                mobility: 2.0,
            }
        }
    }

    #[test]
    fn uniform_depletion_gives_the_depletion_factor() {
        let samples = Samples::new(
            vec![0.0, 0.01, 0.05, 0.1, 0.05, 0.01, 0.0],
            vec![0.0025; 7],
        );
        let result =
            resistivity_ratio(&samples.profile(), IntegrationWindow::PotentialCutoff(0.02), 1e-30)
                .unwrap();
        assert!((result.ratio - 4.0).abs() < 1e-12);
        assert_eq!(result.window, (-1.0, 1.0));
        assert_eq!(result.nodes, 3);
    }

    #[test]
    fn bulk_profile_has_unit_ratio() {
        let samples = Samples::new(vec![0.0, -0.02, -0.3, -0.02, 0.0], vec![0.01; 5]);
        let result = resistivity_ratio(
            &samples.profile(),
            IntegrationWindow::HalfWidthFraction(1.0),
            1e-30,
        )
        .unwrap();
        assert!((result.ratio - 1.0).abs() < 1e-12);
        assert_eq!(result.nodes, 5);
    }

    #[test]
    fn concentration_below_floor_reports_the_grid_index() {
        let samples = Samples::new(
            vec![0.0, 0.05, 0.2, 0.05, 0.0],
            vec![0.01, 1e-3, 1e-40, 1e-3, 0.01],
        );
        let result =
            resistivity_ratio(&samples.profile(), IntegrationWindow::PotentialCutoff(0.02), 1e-30);
        assert_eq!(
            result,
            Err(ResistivityError::DegenerateIntegration {
                index: 4,
                concentration: 1e-40,
                floor: 1e-30
            })
        );
    }

    #[test]
    fn window_must_hold_two_nodes() {
        let samples = Samples::new(vec![0.0, 0.01, 0.1, 0.01, 0.0], vec![0.01; 5]);
        assert_eq!(
            resistivity_ratio(&samples.profile(), IntegrationWindow::PotentialCutoff(0.05), 1e-30),
            Err(ResistivityError::EmptyWindow)
        );
        assert_eq!(
            resistivity_ratio(&samples.profile(), IntegrationWindow::PotentialCutoff(0.5), 1e-30),
            Err(ResistivityError::EmptyWindow)
        );
    }

    #[test]
    fn rejects_invalid_mobility_and_windows() {
        let samples = Samples::new(vec![0.0, 0.1, 0.0], vec![0.01; 3]);
        let mut profile = samples.profile();
        profile.mobility = 0.0;
        assert!(matches!(
            resistivity_ratio(&profile, IntegrationWindow::HalfWidthFraction(0.5), 1e-30),
            Err(ResistivityError::InvalidMobility(_))
        ));
        assert!(matches!(
            resistivity_ratio(&samples.profile(), IntegrationWindow::HalfWidthFraction(1.5), 1e-30),
            Err(ResistivityError::InvalidWindow(_))
        ));
    }
}
