use thiserror::Error;

/// Result alias for `gmm-ic`.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
///
/// Mirrors the usual estimator taxonomy: bad values, bad argument types,
/// inference before fitting, and numerical fitting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value is out of range or not in the recognized vocabulary.
    Value,
    /// An argument has the wrong type or shape.
    Type,
    /// Inference was requested before a successful fit.
    NotFitted,
    /// Expectation-maximization failed numerically.
    Fitting,
}

/// Errors returned by the clustering primitives and the model-selection estimator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// Row length mismatch.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid number of clusters requested.
    #[error("cannot create {requested} clusters from {n_items} items")]
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
        /// Number of items.
        n_items: usize,
    },

    /// A configuration value is out of range, unrecognized, or inconsistent.
    #[error("invalid configuration for '{name}': {message}")]
    InvalidConfiguration {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: String,
    },

    /// A configuration argument has the wrong type or shape.
    #[error("invalid type for '{name}': expected {expected}, found {found}")]
    InvalidArgumentType {
        /// Parameter name.
        name: &'static str,
        /// Expected type description.
        expected: &'static str,
        /// Found type description.
        found: String,
    },

    /// Inference before a successful `fit`.
    #[error("this estimator is not fitted yet; call `fit` first")]
    NotFitted,

    /// A covariance matrix is not positive definite.
    #[error(
        "fitting the mixture model failed because component {component} has an \
         ill-defined empirical covariance; decrease the number of components or \
         increase reg_covar"
    )]
    SingularCovariance {
        /// Offending component (0 for tied covariances).
        component: usize,
    },

    /// A single candidate fit failed.
    #[error("fitting failed: {0}")]
    FittingFailure(String),

    /// Every candidate in the grid failed to fit.
    #[error("all {attempted} candidate models failed to fit")]
    AllCandidatesFailed {
        /// Number of candidates attempted.
        attempted: usize,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidConfiguration`].
    pub(crate) fn config(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            name,
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyInput
            | Error::InvalidClusterCount { .. }
            | Error::InvalidConfiguration { .. } => ErrorKind::Value,
            Error::DimensionMismatch { .. } | Error::InvalidArgumentType { .. } => ErrorKind::Type,
            Error::NotFitted => ErrorKind::NotFitted,
            Error::SingularCovariance { .. }
            | Error::FittingFailure(_)
            | Error::AllCandidatesFailed { .. } => ErrorKind::Fitting,
        }
    }
}
