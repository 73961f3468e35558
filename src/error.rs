// Error types shared by the estimation core and the file collaborators

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for estimation runs
pub type Result<T> = std::result::Result<T, Error>;

/// Matrix or vector shape as `(rows, cols)`; vectors are `(len, 1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape(pub usize, pub usize);

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.0, self.1)
    }
}

/// Errors that can abort an estimation run
#[derive(Error, Debug)]
pub enum Error {
    /// Argument shape does not match the filter's fixed dimensions
    #[error("Invalid dimension for {name}: expected {expected}, got {actual}")]
    Dimension {
        name: &'static str,
        expected: Shape,
        actual: Shape,
    },

    /// Matrix could not be inverted
    #[error("{name} is singular")]
    SingularMatrix { name: &'static str },

    /// Operation called before the state it depends on exists
    #[error("Precondition failed: {0}")]
    Precondition(&'static str),

    /// File could not be opened, read or written
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed record in a sensor file
    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Configuration value out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
