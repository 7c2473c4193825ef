use thiserror::Error;

/// Error types for the spectrafit-rs library.
#[derive(Error, Debug)]
pub enum SpectraFitError {
    /// Invalid or incomplete constraint specification, raised before any solving.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The parameter layout does not add up. Indicates a defect, never bad input.
    #[error("Index consistency error: {0}")]
    Consistency(String),

    /// A single sample did not converge.
    #[error("Solver failed to converge: {0}")]
    ConvergenceFailure(String),

    /// A requested line identifier is not among the active lines.
    #[error("Line not found among active lines: {0}")]
    LineNotFound(String),

    /// Error indicating a mismatch in array dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Non-finite values appeared in residuals, scales or parameters.
    #[error("Numerical error: {0}")]
    NumericalError(String),

    /// Linear algebra error.
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpectraFitError {
    /// Whether this error must abort a whole batch rather than a single sample.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SpectraFitError::Configuration(_) | SpectraFitError::Consistency(_)
        )
    }
}

/// Result type alias for spectrafit-rs operations.
pub type Result<T> = std::result::Result<T, SpectraFitError>;
