use crate::core::continuum::{self, ContinuumMesh};
use crate::core::models::defect::DefectSpecies;
use crate::core::physics::poisson::BoundaryCondition;
use crate::core::physics::resistivity::IntegrationWindow;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(invalid(name, format!("must be positive and finite, got {value}")))
    }
}

/// Treatment of the compensating defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemModel {
    /// The compensating defect is frozen at its bulk mole fraction.
    MottSchottky,
    /// Every defect redistributes self-consistently.
    GouyChapman,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SiteModel {
    /// One node per site in the input data.
    #[default]
    SiteExplicit,
    /// Each site label is resampled onto `points` nodes.
    Continuum { points: usize, mesh: ContinuumMesh },
}

/// A defect on the sites of one label that the Mott-Schottky model holds at its bulk value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompensatingDefect {
    pub site_label: String,
    pub defect: String,
}

impl CompensatingDefect {
    pub fn new(site_label: impl Into<String>, defect: impl Into<String>) -> Self {
        Self {
            site_label: site_label.into(),
            defect: defect.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Kelvin.
    pub temperature: f64,
    pub relative_permittivity: f64,
    pub boundary: BoundaryCondition,
    /// Damping factor of the fixed-point update, in (0, 1].
    pub alpha: f64,
    /// Convergence threshold on `max |phi_new - phi|` in volts.
    pub convergence: f64,
    pub max_iterations: usize,
    pub site_charges: bool,
    /// Wall-clock budget checked between iterations.
    pub time_budget: Option<Duration>,
}

impl SolverConfig {
    pub const DEFAULT_MAX_ITERATIONS: usize = 1_000_000;

    pub fn builder() -> SolverConfigBuilder {
        SolverConfigBuilder::new()
    }

    pub fn with_temperature(&self, temperature: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            temperature: require_positive("temperature", temperature)?,
            ..self.clone()
        })
    }
}

#[derive(Default)]
pub struct SolverConfigBuilder {
    temperature: Option<f64>,
    relative_permittivity: Option<f64>,
    boundary: Option<BoundaryCondition>,
    alpha: Option<f64>,
    convergence: Option<f64>,
    max_iterations: Option<usize>,
    site_charges: Option<bool>,
    time_budget: Option<Duration>,
}

impl SolverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, kelvin: f64) -> Self {
        self.temperature = Some(kelvin);
        self
    }
    pub fn relative_permittivity(mut self, value: f64) -> Self {
        self.relative_permittivity = Some(value);
        self
    }
    pub fn boundary(mut self, boundary: BoundaryCondition) -> Self {
        self.boundary = Some(boundary);
        self
    }
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }
    pub fn convergence(mut self, threshold: f64) -> Self {
        self.convergence = Some(threshold);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn site_charges(mut self, enabled: bool) -> Self {
        self.site_charges = Some(enabled);
        self
    }
    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn build(self) -> Result<SolverConfig, ConfigError> {
        let temperature = self
            .temperature
            .ok_or(ConfigError::MissingParameter("temperature"))?;
        let relative_permittivity = self
            .relative_permittivity
            .ok_or(ConfigError::MissingParameter("relative_permittivity"))?;
        let alpha = self.alpha.ok_or(ConfigError::MissingParameter("alpha"))?;
        let convergence = self
            .convergence
            .ok_or(ConfigError::MissingParameter("convergence"))?;
        let max_iterations = self
            .max_iterations
            .unwrap_or(SolverConfig::DEFAULT_MAX_ITERATIONS);

        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(invalid("alpha", format!("must lie in (0, 1], got {alpha}")));
        }
        if max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least one"));
        }

        Ok(SolverConfig {
            temperature: require_positive("temperature", temperature)?,
            relative_permittivity: require_positive("relative_permittivity", relative_permittivity)?,
            boundary: self
                .boundary
                .ok_or(ConfigError::MissingParameter("boundary"))?,
            alpha,
            convergence: require_positive("convergence", convergence)?,
            max_iterations,
            site_charges: self.site_charges.unwrap_or(false),
            time_budget: self.time_budget,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    /// Metres.
    pub x_min: f64,
    pub x_max: f64,
    /// Square metres.
    pub cross_section_area: f64,
}

impl GridConfig {
    pub fn new(x_min: f64, x_max: f64, cross_section_area: f64) -> Result<Self, ConfigError> {
        if !(x_min.is_finite() && x_max.is_finite() && x_min < x_max) {
            return Err(invalid(
                "grid limits",
                format!("expected x_min < x_max, got [{x_min}, {x_max}]"),
            ));
        }
        Ok(Self {
            x_min,
            x_max,
            cross_section_area: require_positive("cross_section_area", cross_section_area)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub species: Vec<DefectSpecies>,
    pub system: SystemModel,
    pub site_model: SiteModel,
    pub core_models: bool,
    pub compensating: Vec<CompensatingDefect>,
}

impl ModelConfig {
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder::new()
    }

    pub fn species(&self, label: &str) -> Option<&DefectSpecies> {
        self.species.iter().find(|s| s.label == label)
    }

    /// Copy with the bulk mole fractions of the named species replaced.
    pub fn with_mole_fractions(&self, overrides: &[(String, f64)]) -> Result<Self, ConfigError> {
        let mut model = self.clone();
        for (label, value) in overrides {
            let species = model
                .species
                .iter_mut()
                .find(|s| &s.label == label)
                .ok_or_else(|| invalid("mole_fractions", format!("unknown defect '{label}'")))?;
            species.mole_fraction = *value;
            species
                .validate()
                .map_err(|e| invalid("mole_fractions", e.to_string()))?;
        }
        Ok(model)
    }
}

#[derive(Default)]
pub struct ModelConfigBuilder {
    species: Vec<DefectSpecies>,
    system: Option<SystemModel>,
    site_model: Option<SiteModel>,
    core_models: Option<bool>,
    compensating: Vec<CompensatingDefect>,
}

impl ModelConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn species(mut self, species: DefectSpecies) -> Self {
        self.species.push(species);
        self
    }
    pub fn system(mut self, system: SystemModel) -> Self {
        self.system = Some(system);
        self
    }
    pub fn site_model(mut self, model: SiteModel) -> Self {
        self.site_model = Some(model);
        self
    }
    pub fn core_models(mut self, enabled: bool) -> Self {
        self.core_models = Some(enabled);
        self
    }
    pub fn compensating(mut self, defect: CompensatingDefect) -> Self {
        self.compensating.push(defect);
        self
    }

    pub fn build(self) -> Result<ModelConfig, ConfigError> {
        if self.species.is_empty() {
            return Err(ConfigError::MissingParameter("species"));
        }
        for (i, species) in self.species.iter().enumerate() {
            species
                .validate()
                .map_err(|e| invalid("species", e.to_string()))?;
            if self.species[..i].iter().any(|s| s.label == species.label) {
                return Err(invalid(
                    "species",
                    format!("duplicate defect '{}'", species.label),
                ));
            }
        }
        for c in &self.compensating {
            if !self.species.iter().any(|s| s.label == c.defect) {
                return Err(invalid(
                    "compensating",
                    format!("'{}' is not a configured defect", c.defect),
                ));
            }
        }

        let system = self.system.ok_or(ConfigError::MissingParameter("system"))?;
        if system == SystemModel::MottSchottky && self.compensating.is_empty() {
            return Err(invalid(
                "compensating",
                "the Mott-Schottky model needs at least one compensating defect",
            ));
        }
        if let Some(SiteModel::Continuum { points, mesh }) = self.site_model {
            continuum::validate_mesh(points, mesh)
                .map_err(|e| invalid("continuum", e.to_string()))?;
        }

        Ok(ModelConfig {
            species: self.species,
            system,
            site_model: self.site_model.unwrap_or_default(),
            core_models: self.core_models.unwrap_or(false),
            compensating: self.compensating,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Defect whose profile determines the resistivity ratio.
    pub mobile_defect: String,
    pub window: IntegrationWindow,
    pub concentration_floor: f64,
}

impl AnalysisConfig {
    pub const DEFAULT_CONCENTRATION_FLOOR: f64 = 1e-30;

    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::new()
    }
}

#[derive(Default)]
pub struct AnalysisConfigBuilder {
    mobile_defect: Option<String>,
    window: Option<IntegrationWindow>,
    concentration_floor: Option<f64>,
}

impl AnalysisConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mobile_defect(mut self, label: impl Into<String>) -> Self {
        self.mobile_defect = Some(label.into());
        self
    }
    pub fn window(mut self, window: IntegrationWindow) -> Self {
        self.window = Some(window);
        self
    }
    pub fn concentration_floor(mut self, floor: f64) -> Self {
        self.concentration_floor = Some(floor);
        self
    }

    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        Ok(AnalysisConfig {
            mobile_defect: self
                .mobile_defect
                .ok_or(ConfigError::MissingParameter("mobile_defect"))?,
            window: self.window.ok_or(ConfigError::MissingParameter("window"))?,
            concentration_floor: require_positive(
                "concentration_floor",
                self.concentration_floor
                    .unwrap_or(AnalysisConfig::DEFAULT_CONCENTRATION_FLOOR),
            )?,
        })
    }
}

/// Outer loop that rescales bulk mole fractions until the solved averages hit the targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionConfig {
    /// Relative tolerance on `average / target - 1`.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 50,
        }
    }
}

impl CorrectionConfig {
    pub fn new(tolerance: f64, max_iterations: usize) -> Result<Self, ConfigError> {
        if max_iterations == 0 {
            return Err(invalid("correction max_iterations", "must be at least one"));
        }
        Ok(Self {
            tolerance: require_positive("correction tolerance", tolerance)?,
            max_iterations,
        })
    }
}

/// Everything needed to run one space-charge calculation from site data.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub solver: SolverConfig,
    pub grid: GridConfig,
    pub model: ModelConfig,
    pub analysis: AnalysisConfig,
    /// Only used by the Gouy-Chapman model.
    pub correction: Option<CorrectionConfig>,
}

impl RunConfig {
    pub fn new(
        solver: SolverConfig,
        grid: GridConfig,
        model: ModelConfig,
        analysis: AnalysisConfig,
    ) -> Result<Self, ConfigError> {
        let mobile = model.species(&analysis.mobile_defect).ok_or_else(|| {
            invalid(
                "mobile_defect",
                format!("'{}' is not a configured defect", analysis.mobile_defect),
            )
        })?;
        if mobile.valence == 0.0 {
            return Err(invalid("mobile_defect", "the mobile defect must be charged"));
        }
        Ok(Self {
            solver,
            grid,
            model,
            analysis,
            correction: None,
        })
    }

    pub fn with_correction(mut self, correction: CorrectionConfig) -> Self {
        self.correction = Some(correction);
        self
    }
}
