use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug)]
pub enum RadTransError {
    #[error("{0}")]
    Error(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot parse quantity '{input}': {reason}")]
    QuantityParse { input: String, reason: String },

    #[error("Wrong dimension for '{input}'. Expected {expected}, got {found}")]
    WrongDimension {
        input: String,
        expected: String,
        found: String,
    },

    #[error("Atomic data error: {0}")]
    AtomicData(String),

    #[error("Plasma property '{property}' requires input '{input}' which has not been added to this plasma")]
    PlasmaMissingModule { property: String, input: String },

    #[error("Plasma output '{output}' is produced by both '{first}' and '{second}'")]
    PlasmaDuplicateOutput {
        output: String,
        first: String,
        second: String,
    },

    #[error("Plasma property graph contains a cycle through '{0}'")]
    PlasmaCycle(String),

    #[error("Plasma value '{name}' has the wrong shape: expected {expected}, got {found}")]
    PlasmaShape {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Plasma value '{0}' is not available")]
    PlasmaValueMissing(String),

    #[error("Ionization balance failed in shell {shell}: {message}")]
    PlasmaIonization { shell: usize, message: String },

    #[error("Monte Carlo error: {0}")]
    MonteCarlo(String),

    #[error("Reference data mismatch in '{field}': {message}")]
    ReferenceMismatch { field: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type for `Result<T, RadTransError>`.
pub type RadTransResult<T> = Result<T, RadTransError>;
