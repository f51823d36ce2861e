use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileSiteModel};
use super::models::AppConfig;
use crate::cli::{BoundaryArg, RunArgs, SystemArg};
use crate::error::{CliError, Result};
use clap::ValueEnum;
use spacecharge::engine::config::{
    AnalysisConfig, ConfigError, CorrectionConfig, GridConfig, ModelConfig, RunConfig,
    SiteModel, SolverConfig,
};
use spacecharge::workflows::sweep::sweep_points;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

fn config_error(e: ConfigError) -> CliError {
    CliError::Config(e.to_string())
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| {
        CliError::Config(format!(
            "`{key}` is required either in the config file or via --set."
        ))
    })
}

pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    // --- Grid ---
    let grid_file = file_config.grid.take().unwrap_or_default();
    let grid = GridConfig::new(
        required(grid_file.x_min, "grid.x-min")?,
        required(grid_file.x_max, "grid.x-max")?,
        required(grid_file.cross_section_area, "grid.cross-section-area")?,
    )
    .map_err(config_error)?;

    // --- Temperatures ---
    let solver_file = file_config.solver.take().unwrap_or_default();
    let sweep_file = file_config.sweep.take().unwrap_or_default();
    let temperatures = if !args.temperatures.is_empty() {
        args.temperatures.clone()
    } else if let Some(list) = sweep_file.temperatures.filter(|t| !t.is_empty()) {
        list
    } else {
        vec![required(solver_file.temperature, "solver.temperature")?]
    };

    // --- Solver ---
    let mut solver = SolverConfig::builder()
        .temperature(temperatures[0])
        .boundary(
            args.boundary
                .map(Into::into)
                .or(solver_file.boundary)
                .unwrap_or(defaults.boundary),
        )
        .max_iterations(
            args.max_iterations
                .or(solver_file.max_iterations)
                .unwrap_or(defaults.max_iterations),
        )
        .site_charges(solver_file.site_charges.unwrap_or(defaults.site_charges));
    if let Some(permittivity) = solver_file.relative_permittivity {
        solver = solver.relative_permittivity(permittivity);
    }
    if let Some(alpha) = args.alpha.or(solver_file.alpha) {
        solver = solver.alpha(alpha);
    }
    if let Some(threshold) = args.convergence.or(solver_file.convergence) {
        solver = solver.convergence(threshold);
    }
    if let Some(seconds) = args.time_budget.or(solver_file.time_budget_seconds) {
        let budget = Duration::try_from_secs_f64(seconds).map_err(|e| {
            CliError::Config(format!("Invalid time budget of {seconds} s: {e}"))
        })?;
        solver = solver.time_budget(budget);
    }
    let solver = solver.build().map_err(config_error)?;

    // --- Model ---
    let model_file = file_config.model.take().unwrap_or_default();
    let site_model = match model_file.site_model {
        Some(FileSiteModel::Continuum) => SiteModel::Continuum {
            points: model_file
                .continuum_points
                .unwrap_or(defaults.continuum_points),
            mesh: model_file.continuum_mesh.unwrap_or(defaults.continuum_mesh),
        },
        Some(FileSiteModel::SiteExplicit) | None => SiteModel::SiteExplicit,
    };
    let mut model = ModelConfig::builder()
        .system(
            args.system
                .map(Into::into)
                .or(model_file.system)
                .unwrap_or(defaults.system),
        )
        .site_model(site_model)
        .core_models(model_file.core_models.unwrap_or(defaults.core_models));
    for species in file_config.species.take().unwrap_or_default() {
        model = model.species(species.into());
    }
    for compensating in model_file.compensating.unwrap_or_default() {
        model = model.compensating(compensating.into());
    }
    let model = model.build().map_err(config_error)?;

    // --- Analysis ---
    let analysis_file = file_config.analysis.take().unwrap_or_default();
    let mut analysis = AnalysisConfig::builder();
    if let Some(label) = analysis_file.mobile_defect {
        analysis = analysis.mobile_defect(label);
    }
    if let Some(window) = analysis_file.window {
        analysis = analysis.window(window);
    }
    if let Some(floor) = analysis_file.concentration_floor {
        analysis = analysis.concentration_floor(floor);
    }
    let analysis = analysis.build().map_err(config_error)?;

    let mut base = RunConfig::new(solver, grid, model, analysis).map_err(config_error)?;
    if let Some(correction) = file_config.correction.take() {
        base = base.with_correction(
            CorrectionConfig::new(
                correction
                    .tolerance
                    .unwrap_or(defaults.correction_tolerance),
                correction
                    .max_iterations
                    .unwrap_or(defaults.correction_max_iterations),
            )
            .map_err(config_error)?,
        );
    }

    let compositions: Vec<Vec<(String, f64)>> = sweep_file
        .mole_fractions
        .unwrap_or_default()
        .into_iter()
        .map(|composition| composition.into_iter().collect())
        .collect();
    let points = sweep_points(&temperatures, &compositions);
    debug!(
        runs = points.len(),
        temperatures = temperatures.len(),
        compositions = compositions.len(),
        "Configuration resolved."
    );

    Ok(AppConfig {
        input_path: args.input.clone(),
        output_dir: args.output.clone(),
        base,
        points,
    })
}

fn parse<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {kind} value for {key}: {value}")))
}

fn parse_enum<T: ValueEnum>(key: &str, value: &str) -> Result<T> {
    T::from_str(value, true)
        .map_err(|_| CliError::Config(format!("Invalid value for {key}: {value}")))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
            CliError::Config(format!(
                "Invalid --set format: '{kv_pair}'. Expected KEY=VALUE."
            ))
        })?;

        match key {
            "grid.x-min" => {
                config.grid.get_or_insert_with(Default::default).x_min =
                    Some(parse(key, value, "float")?);
            }
            "grid.x-max" => {
                config.grid.get_or_insert_with(Default::default).x_max =
                    Some(parse(key, value, "float")?);
            }
            "grid.cross-section-area" => {
                config
                    .grid
                    .get_or_insert_with(Default::default)
                    .cross_section_area = Some(parse(key, value, "float")?);
            }
            "solver.temperature" => {
                config.solver.get_or_insert_with(Default::default).temperature =
                    Some(parse(key, value, "float")?);
            }
            "solver.relative-permittivity" => {
                config
                    .solver
                    .get_or_insert_with(Default::default)
                    .relative_permittivity = Some(parse(key, value, "float")?);
            }
            "solver.boundary" => {
                config.solver.get_or_insert_with(Default::default).boundary =
                    Some(parse_enum::<BoundaryArg>(key, value)?.into());
            }
            "solver.alpha" => {
                config.solver.get_or_insert_with(Default::default).alpha =
                    Some(parse(key, value, "float")?);
            }
            "solver.convergence" => {
                config.solver.get_or_insert_with(Default::default).convergence =
                    Some(parse(key, value, "float")?);
            }
            "solver.max-iterations" => {
                config
                    .solver
                    .get_or_insert_with(Default::default)
                    .max_iterations = Some(parse(key, value, "integer")?);
            }
            "solver.site-charges" => {
                config.solver.get_or_insert_with(Default::default).site_charges =
                    Some(parse(key, value, "boolean")?);
            }
            "solver.time-budget-seconds" => {
                config
                    .solver
                    .get_or_insert_with(Default::default)
                    .time_budget_seconds = Some(parse(key, value, "float")?);
            }
            "model.system" => {
                config.model.get_or_insert_with(Default::default).system =
                    Some(parse_enum::<SystemArg>(key, value)?.into());
            }
            "model.site-model" => {
                let site_model = match value {
                    "site-explicit" => FileSiteModel::SiteExplicit,
                    "continuum" => FileSiteModel::Continuum,
                    _ => {
                        return Err(CliError::Config(format!(
                            "Invalid value for {key}: {value}"
                        )));
                    }
                };
                config.model.get_or_insert_with(Default::default).site_model = Some(site_model);
            }
            "model.continuum-points" => {
                config
                    .model
                    .get_or_insert_with(Default::default)
                    .continuum_points = Some(parse(key, value, "integer")?);
            }
            "model.core-models" => {
                config.model.get_or_insert_with(Default::default).core_models =
                    Some(parse(key, value, "boolean")?);
            }
            "analysis.mobile-defect" => {
                config
                    .analysis
                    .get_or_insert_with(Default::default)
                    .mobile_defect = Some(value.to_string());
            }
            "analysis.concentration-floor" => {
                config
                    .analysis
                    .get_or_insert_with(Default::default)
                    .concentration_floor = Some(parse(key, value, "float")?);
            }
            "correction.tolerance" => {
                config.correction.get_or_insert_with(Default::default).tolerance =
                    Some(parse(key, value, "float")?);
            }
            "correction.max-iterations" => {
                config
                    .correction
                    .get_or_insert_with(Default::default)
                    .max_iterations = Some(parse(key, value, "integer")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{key}'"
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use spacecharge::core::physics::poisson::BoundaryCondition;
    use spacecharge::core::physics::resistivity::IntegrationWindow;
    use spacecharge::engine::config::SystemModel;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::{TempDir, tempdir};

    const BASE_CONFIG: &str = r#"
        [grid]
        x-min = -8.05e-9
        x-max = 7.95e-9
        cross-section-area = 1.0e-19

        [solver]
        temperature = 1000.0
        relative-permittivity = 55.0
        alpha = 0.01
        convergence = 1e-7

        [model]
        compensating = [{ site-label = "site_2", defect = "Gd" }]

        [[species]]
        label = "Vo"
        valence = 2.0
        mole-fraction = 0.002
        mobility = 1.0

        [[species]]
        label = "Gd"
        valence = -1.0
        mole-fraction = 0.004

        [analysis]
        mobile-defect = "Vo"
        window = { type = "half-width-fraction", value = 0.5 }
    "#;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, content).unwrap();
        path
    }

    fn run_args(config: &Path, extra: &[&str]) -> RunArgs {
        let mut argv = vec![
            "spacecharge",
            "run",
            "-i",
            "sites.csv",
            "-o",
            "out",
            "-c",
            config.to_str().unwrap(),
        ];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Run(args) => args,
            _ => panic!("expected the run command"),
        }
    }

    #[test]
    fn file_values_are_merged_with_defaults() {
        let dir = tempdir().unwrap();
        let path = write_config(&dir, BASE_CONFIG);
        let config = build_config(&run_args(&path, &[])).unwrap();

        assert_eq!(config.input_path, PathBuf::from("sites.csv"));
        assert_eq!(config.base.solver.temperature, 1000.0);
        assert_eq!(config.base.solver.boundary, BoundaryCondition::Periodic);
        assert_eq!(
            config.base.solver.max_iterations,
            SolverConfig::DEFAULT_MAX_ITERATIONS
        );
        assert_eq!(config.base.model.system, SystemModel::MottSchottky);
        assert_eq!(config.base.model.site_model, SiteModel::SiteExplicit);
        assert_eq!(
            config.base.analysis.window,
            IntegrationWindow::HalfWidthFraction(0.5)
        );
        assert!(config.base.correction.is_none());
        assert_eq!(config.points.len(), 1);
        assert_eq!(config.points[0].temperature, 1000.0);
    }

    #[test]
    fn command_line_overrides_file_values() {
        let dir = tempdir().unwrap();
        let path = write_config(&dir, BASE_CONFIG);
        let args = run_args(
            &path,
            &[
                "-T",
                "800",
                "900",
                "--boundary",
                "dirichlet",
                "--alpha",
                "0.005",
                "--time-budget",
                "2.5",
            ],
        );
        let config = build_config(&args).unwrap();

        assert_eq!(config.base.solver.alpha, 0.005);
        assert_eq!(config.base.solver.boundary, BoundaryCondition::Dirichlet);
        assert_eq!(
            config.base.solver.time_budget,
            Some(Duration::from_millis(2500))
        );
        let temperatures: Vec<f64> = config.points.iter().map(|p| p.temperature).collect();
        assert_eq!(temperatures, vec![800.0, 900.0]);
    }

    #[test]
    fn set_values_override_file_values() {
        let dir = tempdir().unwrap();
        let path = write_config(&dir, BASE_CONFIG);
        let args = run_args(
            &path,
            &[
                "-S",
                "solver.convergence=1e-9",
                "-S",
                "model.system=gouy-chapman",
                "-S",
                "correction.tolerance=1e-6",
            ],
        );
        let config = build_config(&args).unwrap();

        assert_eq!(config.base.solver.convergence, 1e-9);
        assert_eq!(config.base.model.system, SystemModel::GouyChapman);
        let correction = config.base.correction.unwrap();
        assert_eq!(correction.tolerance, 1e-6);
        assert_eq!(
            correction.max_iterations,
            CorrectionConfig::default().max_iterations
        );
    }

    #[test]
    fn sweep_section_expands_into_points() {
        let dir = tempdir().unwrap();
        let content = format!(
            "{BASE_CONFIG}\n[sweep]\ntemperatures = [773.15, 873.15, 973.15]\n\
             mole-fractions = [{{ Vo = 0.001 }}, {{ Vo = 0.003 }}]\n"
        );
        let path = write_config(&dir, &content);
        let config = build_config(&run_args(&path, &[])).unwrap();

        assert_eq!(config.points.len(), 6);
        assert_eq!(config.base.solver.temperature, 773.15);
        assert_eq!(config.points[3].temperature, 773.15);
        assert_eq!(
            config.points[3].mole_fractions,
            vec![("Vo".to_string(), 0.003)]
        );
    }

    #[test]
    fn missing_damping_factor_is_reported() {
        let dir = tempdir().unwrap();
        let path = write_config(&dir, &BASE_CONFIG.replace("alpha = 0.01", ""));
        let result = build_config(&run_args(&path, &[]));
        match result {
            Err(CliError::Config(msg)) => assert!(msg.contains("alpha"), "{msg}"),
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_set_key_is_rejected() {
        let result = apply_set_values(
            FileConfig::default(),
            &["solver.damping=0.1".to_string()],
        );
        assert!(matches!(result, Err(CliError::Config(_))));

        let result = apply_set_values(FileConfig::default(), &["solver.alpha".to_string()]);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn boolean_and_enum_set_values_are_parsed() {
        let config = apply_set_values(
            FileConfig::default(),
            &[
                "solver.site-charges=true".to_string(),
                "solver.boundary=Dirichlet".to_string(),
                "model.site-model=continuum".to_string(),
            ],
        )
        .unwrap();
        let solver = config.solver.unwrap();
        assert_eq!(solver.site_charges, Some(true));
        assert_eq!(solver.boundary, Some(BoundaryCondition::Dirichlet));
        assert_eq!(
            config.model.unwrap().site_model,
            Some(FileSiteModel::Continuum)
        );
    }
}
