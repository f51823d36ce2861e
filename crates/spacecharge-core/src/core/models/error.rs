use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Site collection is empty")]
    Empty,

    #[error("Site positions must be strictly increasing: x[{index}] = {current} follows {previous}")]
    NonIncreasingPosition {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("Site {index} has a non-finite position")]
    NonFinitePosition { index: usize },

    #[error("Invalid mole fraction {value} for defect '{defect}': {reason}")]
    InvalidMoleFraction {
        defect: String,
        value: f64,
        reason: &'static str,
    },

    #[error("Mole fractions on site {index} ('{label}') sum to {total}, leaving no vacant fraction")]
    OverfilledSite {
        index: usize,
        label: String,
        total: f64,
    },

    #[error("Site {index} has a non-positive weight {weight}")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("Unknown defect species '{0}'")]
    UnknownDefect(String),

    #[error("Segregation energy for defect '{defect}' is not finite")]
    NonFiniteEnergy { defect: String },
}
