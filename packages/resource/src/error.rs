//! Error types for resource trees.

use std::fmt;

use crate::path::PathError;

/// An optional operation a resource may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Readable,
    Writable,
    Listable,
    Manageable,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Readable => "readable",
            Capability::Writable => "writable",
            Capability::Listable => "listable",
            Capability::Manageable => "manageable",
        };
        f.write_str(name)
    }
}

/// Errors produced by resource trees.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Path validation error.
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// The resource does not exist.
    #[error("resource not found: {path}")]
    NotFound { path: String },

    /// A resource with the same name already exists.
    #[error("resource already exists: {path}")]
    AlreadyExists { path: String },

    /// The resource lacks the capability an operation needs.
    #[error("'{path}' is not {capability}")]
    NotCapable { path: String, capability: Capability },

    /// The size of a resource could not be established.
    #[error("can not establish the size of '{path}'")]
    UnknownSize { path: String },

    /// I/O error from the backing storage.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by a tree implementation with its own error type.
    #[error("{0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Shorthand for a capability mismatch.
    pub fn not_capable(path: impl ToString, capability: Capability) -> Self {
        Error::NotCapable {
            path: path.to_string(),
            capability,
        }
    }
}
