use std::{fmt, io};

/// The result type used across the whole engine.
pub type Result<T> = std::result::Result<T, NetError>;

/// All errors the training engine can produce.
#[derive(Debug)]
pub enum NetError {
    /// The computed loss is not a number. Training has diverged and the run
    /// must stop before the optimum snapshot gets corrupted.
    NanLoss,

    /// A shape invariant was violated (e.g. mismatched widths between layers).
    ShapeMismatch {
        /// Human-readable context for the mismatch (e.g. "weights", "batch").
        what: &'static str,
        /// Observed value.
        got: usize,
        /// Expected value.
        expected: usize,
    },

    /// The layer sequence cannot form a valid network.
    InvalidArchitecture(&'static str),

    /// A checkpoint could not be encoded or decoded.
    Checkpoint(serde_json::Error),

    /// An underlying I/O error while reading or writing a checkpoint.
    Io(io::Error),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NanLoss => write!(f, "loss is NaN, training diverged"),
            Self::ShapeMismatch { what, got, expected } => {
                write!(f, "shape mismatch for {what}: got {got}, expected {expected}")
            }
            Self::InvalidArchitecture(msg) => write!(f, "invalid architecture: {msg}"),
            Self::Checkpoint(e) => write!(f, "checkpoint codec error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for NetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Checkpoint(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NetError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for NetError {
    fn from(e: serde_json::Error) -> Self {
        Self::Checkpoint(e)
    }
}
