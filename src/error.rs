//! Error types for the session engine.
//!
//! Fatal conditions ([`Error::Connection`], [`Error::Read`], [`Error::Write`])
//! end a session. [`ProtocolError`]s are recoverable: the reader reports them
//! and keeps going.

use std::io;
use thiserror::Error;

/// Convenience alias for results using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not be established. No session exists.
    #[error("could not connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The transport failed or was closed by the peer after registration.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// The writer task could not deliver an outbound line.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// An inbound line could not be framed or parsed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A command was issued on a session that has already ended.
    #[error("session closed")]
    Closed,
}

impl Error {
    /// Whether this error ends the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Protocol(_))
    }
}

/// A framed line that is not a well-formed message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty line")]
    Empty,

    #[error("expected 4 fields, found {found}: {line:?}")]
    FieldCount { found: usize, line: String },

    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong { actual: usize, limit: usize },
}
