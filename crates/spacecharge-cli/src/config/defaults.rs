use spacecharge::core::continuum::ContinuumMesh;
use spacecharge::core::physics::poisson::BoundaryCondition;
use spacecharge::engine::config::{CorrectionConfig, SolverConfig, SystemModel};

/// Values used when neither the command line nor the file sets a parameter.
///
/// The damping factor, the convergence threshold and the integration window have no
/// default: they depend too strongly on the system to guess.
pub struct DefaultsConfig {
    pub boundary: BoundaryCondition,
    pub system: SystemModel,
    pub max_iterations: usize,
    pub site_charges: bool,
    pub core_models: bool,
    pub continuum_points: usize,
    pub continuum_mesh: ContinuumMesh,
    pub correction_tolerance: f64,
    pub correction_max_iterations: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        let correction = CorrectionConfig::default();
        Self {
            boundary: BoundaryCondition::Periodic,
            system: SystemModel::MottSchottky,
            max_iterations: SolverConfig::DEFAULT_MAX_ITERATIONS,
            site_charges: false,
            core_models: false,
            continuum_points: 100,
            continuum_mesh: ContinuumMesh::Uniform,
            correction_tolerance: correction.tolerance,
            correction_max_iterations: correction.max_iterations,
        }
    }
}
