//! Error types shared across the seriatim crates.

use thiserror::Error;

/// Result type for seriatim operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the polynomial engine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A value fell outside the representable range: an exponent past the
    /// packing bounds, an integral cast that does not fit, or a degree sum
    /// past `i64` range.
    #[error("overflow: {0}")]
    Overflow(String),

    /// An argument violated a documented precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A task submitted to the thread pool panicked. The payload carries the
    /// panic message when one could be recovered.
    #[error("task failed: {0}")]
    TaskFailure(String),
}

impl Error {
    /// Builds an [`Error::Overflow`] from anything printable.
    pub fn overflow(msg: impl Into<String>) -> Self {
        Error::Overflow(msg.into())
    }

    /// Builds an [`Error::InvalidArgument`] from anything printable.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
