use spacecharge::engine::config::RunConfig;
use spacecharge::workflows::sweep::SweepPoint;
use std::path::PathBuf;

/// Fully resolved settings of a `run` invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Settings shared by every run; each sweep point replaces the temperature and
    /// composition.
    pub base: RunConfig,
    pub points: Vec<SweepPoint>,
}
