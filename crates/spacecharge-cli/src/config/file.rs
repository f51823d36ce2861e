use crate::error::{CliError, Result};
use serde::Deserialize;
use spacecharge::core::continuum::ContinuumMesh;
use spacecharge::core::models::defect::DefectSpecies;
use spacecharge::core::physics::poisson::BoundaryCondition;
use spacecharge::core::physics::resistivity::IntegrationWindow;
use spacecharge::engine::config::{CompensatingDefect, SystemModel};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileGridConfig {
    pub x_min: Option<f64>,
    pub x_max: Option<f64>,
    pub cross_section_area: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSolverConfig {
    pub temperature: Option<f64>,
    pub relative_permittivity: Option<f64>,
    pub boundary: Option<BoundaryCondition>,
    pub alpha: Option<f64>,
    pub convergence: Option<f64>,
    pub max_iterations: Option<usize>,
    pub site_charges: Option<bool>,
    pub time_budget_seconds: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileSiteModel {
    SiteExplicit,
    Continuum,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileCompensatingDefect {
    pub site_label: String,
    pub defect: String,
}

impl From<FileCompensatingDefect> for CompensatingDefect {
    fn from(f: FileCompensatingDefect) -> Self {
        CompensatingDefect::new(f.site_label, f.defect)
    }
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileModelConfig {
    pub system: Option<SystemModel>,
    pub site_model: Option<FileSiteModel>,
    pub continuum_points: Option<usize>,
    pub continuum_mesh: Option<ContinuumMesh>,
    pub core_models: Option<bool>,
    pub compensating: Option<Vec<FileCompensatingDefect>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSpecies {
    pub label: String,
    pub valence: f64,
    pub mole_fraction: f64,
    #[serde(default)]
    pub mobility: f64,
}

impl From<FileSpecies> for DefectSpecies {
    fn from(f: FileSpecies) -> Self {
        DefectSpecies::new(f.label, f.valence, f.mole_fraction, f.mobility)
    }
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileAnalysisConfig {
    pub mobile_defect: Option<String>,
    pub window: Option<IntegrationWindow>,
    pub concentration_floor: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileCorrectionConfig {
    pub tolerance: Option<f64>,
    pub max_iterations: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSweepConfig {
    pub temperatures: Option<Vec<f64>>,
    pub mole_fractions: Option<Vec<BTreeMap<String, f64>>>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub grid: Option<FileGridConfig>,
    pub solver: Option<FileSolverConfig>,
    pub model: Option<FileModelConfig>,
    pub species: Option<Vec<FileSpecies>>,
    pub analysis: Option<FileAnalysisConfig>,
    pub correction: Option<FileCorrectionConfig>,
    pub sweep: Option<FileSweepConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        debug!(path = %path.display(), "Loaded configuration file.");
        Ok(config)
    }
}
