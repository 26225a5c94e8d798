use remotefs_resource::{Capability, Error as ResourceError};

use crate::types::Method;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Server response has no body")]
    MissingBody,

    #[error("Malformed listing: {message}")]
    Encoding { message: String },

    /// A failed round trip, with the URL (query included) that was attempted.
    #[error("{method} {url} failed: {source}")]
    Request {
        method: Method,
        url: String,
        #[source]
        source: Box<Error>,
    },

    #[error("'{name}' already exists in '{path}'")]
    AlreadyExists { path: String, name: String },

    #[error("'{path}' is not {capability}")]
    NotCapable { path: String, capability: Capability },

    #[error("'{path}' is detached from its tree root")]
    Detached { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl Error {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
        }
    }

    pub(crate) fn encoding(message: impl ToString) -> Self {
        Error::Encoding {
            message: message.to_string(),
        }
    }

    pub(crate) fn not_capable(path: impl ToString, capability: Capability) -> Self {
        Error::NotCapable {
            path: path.to_string(),
            capability,
        }
    }

    /// HTTP status of the failed response, looking through `Request` wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Request { source, .. } => source.status(),
            _ => None,
        }
    }
}

impl From<Error> for ResourceError {
    fn from(error: Error) -> Self {
        match error {
            Error::NotCapable { path, capability } => ResourceError::NotCapable { path, capability },
            Error::AlreadyExists { path, name } => ResourceError::AlreadyExists {
                path: format!("{}/{}", path.trim_end_matches('/'), name),
            },
            Error::Resource(inner) => inner,
            other => ResourceError::Backend(Box::new(other)),
        }
    }
}
