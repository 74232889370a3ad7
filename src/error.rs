#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a requested column does not exist in the auxiliary dataset.
    #[error("column '{0}' not found in auxiliary dataset")]
    MissingColumn(String),

    /// Returned when a column is added twice under the same name.
    #[error("column '{0}' already exists in auxiliary dataset")]
    DuplicateColumn(String),

    /// Returned when a new column's length differs from the existing rows.
    #[error("column '{name}' has {got} rows, expected {expected}")]
    ColumnLengthMismatch {
        /// The name of the offending column.
        name: String,
        /// The number of rows already in the dataset.
        expected: usize,
        /// The number of values in the new column.
        got: usize,
    },

    /// Returned when a cell used for fitting is NaN or infinite.
    #[error("non-finite value in column '{column}' at row {row}")]
    NonFiniteData {
        /// The column holding the bad value.
        column: String,
        /// The row index of the bad value.
        row: usize,
    },

    /// Returned when auxiliary data is supplied without naming its target column.
    #[error("auxiliary data supplied but no target variable was set")]
    MissingTargetVariable,

    /// Returned when the auxiliary model is requested without input variables.
    #[error("at least one input variable is required")]
    NoInputVariables,

    /// Returned when the sigmoid scale is not a finite positive number.
    #[error("invalid beta: {0} must be finite and positive")]
    InvalidBeta(f64),

    /// Returned when the sigmoid midpoint is not finite.
    #[error("invalid midpoint: {0} must be finite")]
    InvalidMidpoint(f64),

    /// Returned when the exploration jitter is negative or not finite.
    #[error("invalid jitter: {0} must be finite and non-negative")]
    InvalidJitter(f64),

    /// Returned when a finite-difference step is derived from a bad lengthscale.
    #[error("invalid lengthscale: {0} must be finite and positive")]
    InvalidLengthscale(f64),

    /// Returned when a reporting grid step is not in `(0, 1]`.
    #[error("invalid grid interval: {0} must be in (0, 1]")]
    InvalidGridInterval(f64),

    /// Returned when a kernel hyperparameter is not finite.
    #[error("invalid hyperparameter '{name}': {value}")]
    InvalidHyperparameter {
        /// The hyperparameter name.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Returned when fewer optimizer restarts are requested than the fit needs.
    #[error("too few restarts: got {got}, at least {min} are required")]
    TooFewRestarts {
        /// The requested number of restarts.
        got: usize,
        /// The minimum accepted number of restarts.
        min: usize,
    },

    /// Returned when a candidate batch holds a NaN or infinite coordinate.
    #[error("candidate point {row} has non-finite coordinate {value} in dimension {column}")]
    NonFiniteCandidate {
        /// The row (point) index.
        row: usize,
        /// The column (dimension) index.
        column: usize,
        /// The offending value.
        value: f64,
    },

    /// Returned when a batch or a training set has the wrong number of dimensions.
    #[error("dimension mismatch: expected {expected} dimensions but got {got}")]
    DimensionMismatch {
        /// The dimensionality the model was fitted on.
        expected: usize,
        /// The dimensionality supplied.
        got: usize,
    },

    /// Returned when the regression fit could not produce a usable model.
    #[error("surrogate fit failed: {0}")]
    FitFailed(&'static str),
}

pub type Result<T> = core::result::Result<T, Error>;
