//! Engine error taxonomy
//!
//! Double execution of a script initializer and a class-cache entry that is
//! not actually a class are invariant violations, not runtime conditions:
//! they are asserted (panic), and have no variant here.

use thiserror::Error;

/// VM runtime errors
#[derive(Debug, Error)]
pub enum VmError {
    /// Strict name resolution found no definition.
    #[error("Cannot find property {0}")]
    PropertyNotFound(String),

    /// A unit was loaded into a second domain.
    #[error("Unit {unit:?} is already loaded into another domain")]
    AlreadyLoaded {
        /// The unit name.
        unit: String,
    },

    /// A script initializer failed. The script stays wedged in its
    /// in-progress state; the original failure reaches every later
    /// resolution of the unit's names.
    #[error("Initializer of script {script} failed: {source}")]
    Initializer {
        /// Unit name and script index.
        script: String,
        /// The underlying failure.
        source: Box<VmError>,
    },

    /// A value was invoked that does not support invocation.
    #[error("{0} is not callable")]
    NotCallable(&'static str),

    /// Type error
    #[error("Type error: {0}")]
    TypeError(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;
