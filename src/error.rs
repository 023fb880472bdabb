//! Provides [`EpiError`] and wraps other errors.
use std::fmt::{self, Debug, Display};
use std::io;

/// The error type used throughout the crate. I/O and format errors wrap the
/// underlying error; the remaining variants carry a human-readable message
/// describing the violated condition.
#[derive(Debug)]
pub enum EpiError {
    /// Missing or unreadable input file.
    IoError(io::Error),
    /// Invalid JSON in an input or serialized graph file.
    JsonError(serde_json::Error),
    /// Invalid CSV output stream.
    CsvError(csv::Error),
    /// Parse failure in an input file (dates, matrices, population tables).
    MalformedData(String),
    /// A matrix does not match the expected dimensions, e.g. a mobility
    /// matrix whose size differs from the number of graph nodes.
    DimensionMismatch(String),
    /// A population or parameter value violates its admissible interval.
    ConstraintViolation(String),
    /// A threshold, duration or interval that must be positive is not.
    InvalidValue(String),
    /// Sampling a parameter distribution produced a non-finite value.
    SamplingError(String),
    /// The adaptive integrator could not meet its error tolerance.
    IntegratorError(String),
}

impl From<io::Error> for EpiError {
    fn from(error: io::Error) -> Self {
        EpiError::IoError(error)
    }
}

impl From<serde_json::Error> for EpiError {
    fn from(error: serde_json::Error) -> Self {
        EpiError::JsonError(error)
    }
}

impl From<csv::Error> for EpiError {
    fn from(error: csv::Error) -> Self {
        EpiError::CsvError(error)
    }
}

impl std::error::Error for EpiError {}

impl Display for EpiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {self:?}")?;
        Ok(())
    }
}
