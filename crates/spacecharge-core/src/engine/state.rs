use crate::core::physics::resistivity::MobileProfile;

/// Lifecycle of a [`crate::engine::solver::Calculation`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SolveState {
    #[default]
    Uninitialized,
    Iterating,
    Converged { iterations: usize, residual: f64 },
    /// The last solve failed; the potential is the one the solve started from.
    Failed,
}

impl SolveState {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }
}

/// Local mole fraction of one defect species on every grid node (zero where not hosted).
#[derive(Debug, Clone, PartialEq)]
pub struct DefectProfile {
    pub label: String,
    pub valence: f64,
    pub mole_fractions: Vec<f64>,
}

/// Converged state of a calculation, detached from the grid it was computed on.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub x: Vec<f64>,
    pub labels: Vec<String>,
    /// Volts.
    pub phi: Vec<f64>,
    /// C/m^3.
    pub charge_density: Vec<f64>,
    pub defects: Vec<DefectProfile>,
    pub iterations: usize,
    pub residual: f64,
}

impl Solution {
    /// Numerical space-charge potential: the maximum of the converged potential.
    pub fn space_charge_potential(&self) -> f64 {
        self.phi.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// The potential value with the largest magnitude, sign included.
    pub fn signed_peak(&self) -> f64 {
        self.phi
            .iter()
            .copied()
            .fold(0.0, |best, p| if p.abs() > best.abs() { p } else { best })
    }

    pub fn defect(&self, label: &str) -> Option<&DefectProfile> {
        self.defects.iter().find(|d| d.label == label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubGridDefect {
    pub label: String,
    pub valence: f64,
    pub mobility: f64,
    pub mole_fractions: Vec<f64>,
    /// Bulk reference on each node; zero where the node does not host the defect.
    pub bulk_mole_fractions: Vec<f64>,
}

/// The converged profiles restricted to one subset of the grid nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct SubGrid {
    pub label: String,
    /// Position of each node in the full grid.
    pub indices: Vec<usize>,
    pub x: Vec<f64>,
    pub phi: Vec<f64>,
    pub defects: Vec<SubGridDefect>,
}

impl SubGrid {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn defect(&self, label: &str) -> Option<&SubGridDefect> {
        self.defects.iter().find(|d| d.label == label)
    }

    pub fn mobile_profile(&self, label: &str) -> Option<MobileProfile<'_>> {
        let defect = self.defect(label)?;
        Some(MobileProfile {
            grid_indices: &self.indices,
            x: &self.x,
            phi: &self.phi,
            mole_fractions: &defect.mole_fractions,
            bulk_mole_fractions: &defect.bulk_mole_fractions,
            mobility: defect.mobility,
        })
    }
}
