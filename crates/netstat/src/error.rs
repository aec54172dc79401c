//! Error types for socket table collection.

use std::io;
use std::path::PathBuf;

use crate::types::SocketEntry;

/// Result type for collection operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding socket tables or resolving
/// processes and namespaces.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A hexadecimal column could not be decoded.
    #[error("malformed hex in {field}: {value:?}")]
    MalformedHex {
        /// The column being decoded.
        field: &'static str,
        /// The offending text.
        value: String,
    },

    /// A decimal column could not be decoded.
    #[error("malformed decimal in {field}: {value:?}")]
    MalformedDecimal {
        /// The column being decoded.
        field: &'static str,
        /// The offending text.
        value: String,
    },

    /// An address field is not `hex8:port` or `hex32:port`.
    #[error("bad endpoint format: {0:?}")]
    BadEndpointFormat(String),

    /// The port half of an address field is not a 16-bit hex value.
    #[error("bad port format: {0:?}")]
    BadPortFormat(String),

    /// A table row does not have the expected token layout.
    #[error("malformed line ({reason}): {line:?}")]
    MalformedLine {
        /// What was wrong with the row.
        reason: String,
        /// The row as read.
        line: String,
    },

    /// A row of a specific table failed to decode.
    #[error("{}: cannot decode {line:?}: {source}", path.display())]
    Table {
        /// The table file.
        path: PathBuf,
        /// The row as read.
        line: String,
        /// The underlying decode error.
        #[source]
        source: Box<Error>,
    },

    /// A socket table could not be opened or read.
    #[error("{} unavailable: {source}", path.display())]
    FileUnavailable {
        /// The table file.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: io::Error,
    },

    /// The namespace registry directory could not be read.
    #[error("namespace registry {} unavailable: {source}", path.display())]
    RegistryUnavailable {
        /// The registry directory.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: io::Error,
    },

    /// None of the requested namespaces matched a running process.
    #[error("no process found in any requested namespace")]
    NoNamespaceMatch,

    /// I/O error from the process filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The operation was cancelled; `partial` holds whatever had been
    /// merged before the signal fired.
    #[error("collection cancelled after {} entries", partial.len())]
    Cancelled {
        /// Entries merged before cancellation.
        partial: Vec<SocketEntry>,
    },
}

impl Error {
    /// Create a cancellation error carrying no entries.
    pub fn cancelled() -> Self {
        Self::Cancelled {
            partial: Vec::new(),
        }
    }

    /// Check if this is a cancellation error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Check if this is a "not found" style error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io(e)
            | Self::FileUnavailable { source: e, .. }
            | Self::RegistryUnavailable { source: e, .. } => e.kind() == io::ErrorKind::NotFound,
            Self::NoNamespaceMatch => true,
            _ => false,
        }
    }

    /// Take the partially merged entries out of a cancellation error.
    pub fn into_partial(self) -> Option<Vec<SocketEntry>> {
        match self {
            Self::Cancelled { partial } => Some(partial),
            _ => None,
        }
    }

    /// The decode error underneath any table context.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Table { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn malformed_line(reason: impl Into<String>, line: &str) -> Self {
        Self::MalformedLine {
            reason: reason.into(),
            line: line.to_string(),
        }
    }
}
