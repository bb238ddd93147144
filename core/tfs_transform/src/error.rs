use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Failures of transform insertion and lookup.
///
/// Every query failure belongs to exactly one kind, which is what travels over the
/// wire. A remote client rebuilds the same variant from `{kind, message}`, so callers
/// match on the same enum whether the buffer is local or remote.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// A frame name was never seen by the graph.
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Frames exist but are not joined by any path, the graph would stop being a
    /// forest, or the client is not connected to a server.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The requested time is outside the available samples and the extrapolation
    /// policy does not cover it.
    #[error("Extrapolation error: {0}")]
    Extrapolation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation did not complete within the caller supplied bound.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A sample was older than what the edge still retains.
    #[error("Out of order sample: {0}")]
    OutOfOrder(String),

    #[error("Transform error: {0}")]
    Other(String),
}

pub type TransformResult<T> = Result<T, TransformError>;

/// Wire level classification of a [`TransformError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum ErrorKind {
    Lookup,
    Connectivity,
    Extrapolation,
    InvalidArgument,
    Timeout,
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Lookup => "lookup",
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::Extrapolation => "extrapolation",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

impl TransformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransformError::Lookup(_) => ErrorKind::Lookup,
            TransformError::Connectivity(_) => ErrorKind::Connectivity,
            TransformError::Extrapolation(_) => ErrorKind::Extrapolation,
            TransformError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            TransformError::Timeout(_) => ErrorKind::Timeout,
            // writer side failure, never produced by a query
            TransformError::OutOfOrder(_) | TransformError::Other(_) => ErrorKind::Other,
        }
    }

    /// The bare message, without the kind prefix added by `Display`.
    pub fn message(&self) -> &str {
        match self {
            TransformError::Lookup(m)
            | TransformError::Connectivity(m)
            | TransformError::Extrapolation(m)
            | TransformError::InvalidArgument(m)
            | TransformError::Timeout(m)
            | TransformError::OutOfOrder(m)
            | TransformError::Other(m) => m,
        }
    }

    /// Rebuilds an error received as structured data.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Lookup => TransformError::Lookup(message),
            ErrorKind::Connectivity => TransformError::Connectivity(message),
            ErrorKind::Extrapolation => TransformError::Extrapolation(message),
            ErrorKind::InvalidArgument => TransformError::InvalidArgument(message),
            ErrorKind::Timeout => TransformError::Timeout(message),
            ErrorKind::Other => TransformError::Other(message),
        }
    }

    /// Appends context to the message, keeping the kind.
    pub fn with_context(self, context: impl Display) -> Self {
        let kind = self.kind();
        let message = format!("{} {}", self.message(), context);
        match self {
            TransformError::OutOfOrder(_) => TransformError::OutOfOrder(message),
            _ => TransformError::from_kind(kind, message),
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, TransformError::InvalidArgument(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransformError::Timeout(_))
    }
}
