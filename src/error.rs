/// Errors raised by the numeric preprocessing steps.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    /// An axis that must contain values is empty
    #[error("{0} is empty")]
    EmptyAxis(&'static str),

    /// Data does not match the length of its axis
    #[error("shape mismatch in {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Intensities do not fill the retention time × drift time grid
    #[error("invalid intensity grid: {0}")]
    Grid(#[from] ndarray::ShapeError),

    /// Downsampling factor must be at least 1
    #[error("invalid stride {0}, must be >= 1")]
    InvalidStride(usize),

    #[error("unknown baseline algorithm '{0}', choose Zhang, Modpoly or Imodpoly")]
    UnknownBaseline(String),

    /// Polynomial fit needs more samples than coefficients
    #[error("need at least {needed} points, got {got}")]
    TooFewPoints { needed: usize, got: usize },

    /// Linear system could not be solved
    #[error("singular system in {0}")]
    Singular(&'static str),
}
