use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeostatError>;

#[derive(Error, Debug)]
pub enum GeostatError {
    /// Rejected before any computation (non-positive lag, radius, count, mismatched lengths).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Fewer conditioning samples than required at a point or block.
    #[error("insufficient data: found {found}, required {required}")]
    InsufficientData { found: usize, required: usize },

    /// Kriging matrix could not be solved even after diagonal regularization.
    #[error("singular kriging system of size {size}")]
    SingularSystem { size: usize },

    #[error("invalid variogram model: {0}")]
    ModelInvalid(String),

    #[error("optimizer did not converge within {iterations} iterations")]
    OptimizerNonConvergence { iterations: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl GeostatError {
    /// True for failures local to a single point or block.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            GeostatError::InsufficientData { .. } | GeostatError::SingularSystem { .. }
        )
    }
}
