//! Error types for the load pipeline

use std::fmt;
use std::io;

/// Coarse failure category reported to callers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request or empty decryption key
    InvalidArgument,
    /// File, asset or stream read failure
    Io,
    /// The byte-stream endpoint could not be reached
    Connection,
    /// Failure reported by the rendering collaborator
    Render,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::Io => "IoError",
            ErrorKind::Connection => "ConnectionError",
            ErrorKind::Render => "RenderError",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by resolvers, the cipher, the pipeline and the handoff
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid argument: {detail}")]
    InvalidArgument { detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to read {what}: {source}")]
    Read {
        what: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot connect to {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("renderer: {detail}")]
    Render { detail: String },
}

impl LoadError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument { detail: msg.into() }
    }

    pub fn read(what: impl Into<String>, source: io::Error) -> Self {
        Self::Read {
            what: what.into(),
            source,
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render { detail: msg.into() }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            LoadError::Io(_) | LoadError::Read { .. } => ErrorKind::Io,
            LoadError::Connection { .. } => ErrorKind::Connection,
            LoadError::Render { .. } => ErrorKind::Render,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
