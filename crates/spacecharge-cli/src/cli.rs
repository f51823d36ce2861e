use clap::{Args, Parser, Subcommand, ValueEnum};
use spacecharge::core::physics::poisson::BoundaryCondition;
use spacecharge::engine::config::SystemModel;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "spacecharge - Poisson-Boltzmann space-charge calculations for grain boundaries in ionic conductors.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used by sweeps.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve for the space-charge potential over a sweep of temperatures and compositions.
    Run(RunArgs),
    /// Invert the Mott-Schottky relation for a measured resistivity ratio.
    Invert(InvertArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryArg {
    Periodic,
    Dirichlet,
}

impl From<BoundaryArg> for BoundaryCondition {
    fn from(arg: BoundaryArg) -> Self {
        match arg {
            BoundaryArg::Periodic => BoundaryCondition::Periodic,
            BoundaryArg::Dirichlet => BoundaryCondition::Dirichlet,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemArg {
    MottSchottky,
    GouyChapman,
}

impl From<SystemArg> for SystemModel {
    fn from(arg: SystemArg) -> Self {
        match arg {
            SystemArg::MottSchottky => SystemModel::MottSchottky,
            SystemArg::GouyChapman => SystemModel::GouyChapman,
        }
    }
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Site data: comma-separated rows of `label, valence, x, (defect, energy)...`.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory receiving the profile and summary files.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Path to the configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Solver Overrides ---
    /// Temperatures to sweep, in kelvin. Replaces the configured list.
    #[arg(short = 'T', long = "temperature", value_name = "KELVIN", num_args(1..))]
    pub temperatures: Vec<f64>,

    /// Override the boundary condition.
    #[arg(short, long, value_enum)]
    pub boundary: Option<BoundaryArg>,

    /// Override the treatment of the compensating defect.
    #[arg(short, long, value_enum)]
    pub system: Option<SystemArg>,

    /// Override the damping factor of the fixed-point iteration.
    #[arg(short, long, value_name = "FLOAT")]
    pub alpha: Option<f64>,

    /// Override the convergence threshold on the potential, in volts.
    #[arg(long = "conv", value_name = "FLOAT")]
    pub convergence: Option<f64>,

    /// Override the iteration cap of a single solve.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Abort any single solve that runs longer than this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub time_budget: Option<f64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S solver.alpha=0.005
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `invert` subcommand.
#[derive(Args, Debug, Clone, Copy)]
pub struct InvertArgs {
    /// Grain-boundary to bulk resistivity ratio.
    #[arg(short, long, value_name = "FLOAT")]
    pub ratio: f64,

    /// Charge number of the mobile defect.
    #[arg(short = 'z', long, value_name = "FLOAT", allow_negative_numbers = true)]
    pub valence: f64,

    /// Temperature in kelvin.
    #[arg(short = 'T', long, value_name = "KELVIN")]
    pub temperature: f64,
}
