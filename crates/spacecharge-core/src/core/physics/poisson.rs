use crate::core::constants::VACUUM_PERMITTIVITY;
use crate::core::grid::{Grid, Stencil};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryCondition {
    /// The two grid ends are joined: potential and field are continuous across the seam.
    Periodic,
    /// The potential is pinned to zero at both ends.
    Dirichlet,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoissonError {
    #[error("Poisson operator is singular at row {row}")]
    Singular { row: usize },

    #[error("Charge density has {found} entries, expected {expected}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Relative permittivity must be positive and finite, got {0}")]
    InvalidPermittivity(f64),
}

/// LU factors of a tridiagonal matrix (Thomas algorithm).
///
/// Row `i` reads `lower[i] x[i-1] + diag[i] x[i] + upper[i] x[i+1]`. The factorisation is
/// done once; each solve is two O(n) sweeps.
#[derive(Debug, Clone)]
struct TridiagonalFactor {
    lower: Vec<f64>,
    upper_scaled: Vec<f64>,
    pivots: Vec<f64>,
}

impl TridiagonalFactor {
    fn new(lower: Vec<f64>, diag: &[f64], upper: &[f64]) -> Result<Self, PoissonError> {
        let n = diag.len();
        let mut upper_scaled = vec![0.0; n];
        let mut pivots = vec![0.0; n];
        for i in 0..n {
            let pivot = if i == 0 {
                diag[0]
            } else {
                diag[i] - lower[i] * upper_scaled[i - 1]
            };
            let scale = diag[i].abs().max(f64::MIN_POSITIVE);
            if !pivot.is_finite() || pivot.abs() <= 1e-12 * scale {
                return Err(PoissonError::Singular { row: i });
            }
            pivots[i] = pivot;
            upper_scaled[i] = upper[i] / pivot;
        }
        Ok(Self {
            lower,
            upper_scaled,
            pivots,
        })
    }

    fn solve(&self, rhs: &mut [f64]) {
        let n = rhs.len();
        rhs[0] /= self.pivots[0];
        for i in 1..n {
            rhs[i] = (rhs[i] - self.lower[i] * rhs[i - 1]) / self.pivots[i];
        }
        for i in (0..n - 1).rev() {
            rhs[i] -= self.upper_scaled[i] * rhs[i + 1];
        }
    }
}

/// Solver for `d^2 phi / dx^2 = -rho / eps` on a fixed grid.
///
/// * Dirichlet: the end nodes are pinned to zero and the interior forms a tridiagonal system.
/// * Periodic: the operator is singular (constants are in its kernel), so the cell-width
///   weighted mean of `rho` is removed and the gauge `phi[0] = 0` is imposed. The caller is
///   responsible for choosing the physically meaningful constant.
#[derive(Debug, Clone)]
pub struct PoissonSolver {
    boundary: BoundaryCondition,
    permittivity: f64,
    factor: TridiagonalFactor,
    cell_widths: Vec<f64>,
}

impl PoissonSolver {
    pub fn new(
        grid: &Grid<'_>,
        relative_permittivity: f64,
        boundary: BoundaryCondition,
    ) -> Result<Self, PoissonError> {
        if !(relative_permittivity.is_finite() && relative_permittivity > 0.0) {
            return Err(PoissonError::InvalidPermittivity(relative_permittivity));
        }
        let stencils = match boundary {
            BoundaryCondition::Dirichlet => grid.stencils()[1..grid.len() - 1].to_vec(),
            BoundaryCondition::Periodic => {
                let mut stencils = grid.stencils().to_vec();
                let x = grid.x();
                let widths = grid.cell_widths();
                let n = grid.len();
                let seam = grid.wrap_spacing();
                stencils[0] = Stencil::new(widths[0], seam, x[1] - x[0]);
                stencils[n - 1] = Stencil::new(widths[n - 1], x[n - 1] - x[n - 2], seam);
                // The gauge node is removed from the unknowns.
                stencils.split_off(1)
            }
        };

        let m = stencils.len();
        let lower: Vec<f64> = (0..m)
            .map(|i| if i == 0 { 0.0 } else { stencils[i].left })
            .collect();
        let diag: Vec<f64> = stencils.iter().map(|s| s.centre).collect();
        let upper: Vec<f64> = (0..m)
            .map(|i| if i + 1 == m { 0.0 } else { stencils[i].right })
            .collect();

        Ok(Self {
            boundary,
            permittivity: relative_permittivity * VACUUM_PERMITTIVITY,
            factor: TridiagonalFactor::new(lower, &diag, &upper)?,
            cell_widths: grid.cell_widths().to_vec(),
        })
    }

    #[inline]
    pub fn boundary(&self) -> BoundaryCondition {
        self.boundary
    }

    /// Absolute permittivity in F/m.
    #[inline]
    pub fn permittivity(&self) -> f64 {
        self.permittivity
    }

    /// Solves for the potential (V) produced by the charge density `rho` (C/m^3).
    pub fn solve(&self, rho: &[f64]) -> Result<Vec<f64>, PoissonError> {
        let n = self.cell_widths.len();
        if rho.len() != n {
            return Err(PoissonError::LengthMismatch {
                expected: n,
                found: rho.len(),
            });
        }

        let mut phi = vec![0.0; n];
        match self.boundary {
            BoundaryCondition::Dirichlet => {
                let interior = &mut phi[1..n - 1];
                for (value, r) in interior.iter_mut().zip(&rho[1..n - 1]) {
                    *value = -r / self.permittivity;
                }
                self.factor.solve(interior);
            }
            BoundaryCondition::Periodic => {
                let mean = self.weighted_mean(rho);
                let unknowns = &mut phi[1..];
                for (value, r) in unknowns.iter_mut().zip(&rho[1..]) {
                    *value = -(r - mean) / self.permittivity;
                }
                self.factor.solve(unknowns);
            }
        }
        Ok(phi)
    }

    /// Cell-width weighted mean of a nodal quantity.
    pub fn weighted_mean(&self, values: &[f64]) -> f64 {
        let total: f64 = self.cell_widths.iter().sum();
        values
            .iter()
            .zip(&self.cell_widths)
            .map(|(v, w)| v * w)
            .sum::<f64>()
            / total
    }
}
