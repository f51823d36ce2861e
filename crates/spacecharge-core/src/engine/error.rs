use std::time::Duration;
use thiserror::Error;

use super::config::ConfigError;
use crate::core::grid::GridError;
use crate::core::io::site_data::InputError;
use crate::core::models::error::ModelError;
use crate::core::physics::mott_schottky::InversionError;
use crate::core::physics::poisson::PoissonError;
use crate::core::physics::resistivity::ResistivityError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InputFormat(String),

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error(
        "{stage} did not converge after {iterations} iterations (last residual {residual:e})"
    )]
    ConvergenceFailure {
        stage: &'static str,
        iterations: usize,
        residual: f64,
        /// Potential at the last iteration, for diagnosis only.
        last_iterate: Vec<f64>,
    },

    #[error("Calculation cancelled after {iterations} iterations ({elapsed:?})")]
    Cancelled { iterations: usize, elapsed: Duration },

    #[error("No constant potential shift neutralises the periodic cell: {reason}")]
    ChargeNeutrality { reason: String },

    #[error(
        "Resistivity integral is degenerate at grid index {index}: concentration {concentration:e} is below the floor {floor:e}"
    )]
    DegenerateIntegration {
        index: usize,
        concentration: f64,
        floor: f64,
    },

    #[error("Resistivity integration window is empty: {0}")]
    EmptyIntegrationWindow(String),

    #[error(transparent)]
    NoRootInBracket(#[from] InversionError),

    #[error("The calculation has not converged yet")]
    NotConverged,

    #[error("Unknown defect: {0}")]
    UnknownDefect(String),
}

impl From<ResistivityError> for EngineError {
    fn from(err: ResistivityError) -> Self {
        match err {
            ResistivityError::DegenerateIntegration {
                index,
                concentration,
                floor,
            } => Self::DegenerateIntegration {
                index,
                concentration,
                floor,
            },
            other => Self::EmptyIntegrationWindow(other.to_string()),
        }
    }
}

macro_rules! input_format_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for EngineError {
                fn from(err: $source) -> Self {
                    Self::InputFormat(err.to_string())
                }
            }
        )*
    };
}

input_format_from!(InputError, ModelError, GridError, PoissonError);
