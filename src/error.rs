use std::path::PathBuf;

use thiserror::Error;

use crate::data::SourceError;

/// Errors returned by the clustering engine, the codec and the session layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Requested dendrogram depth is outside `[1, n]`.
    #[error("invalid depth: requested {requested}, but dataset has {n_items} examples")]
    InvalidDepth {
        /// Requested depth (as received, may be negative on the wire).
        requested: i64,
        /// Number of examples in the dataset.
        n_items: usize,
    },

    /// Two examples of different length were compared.
    #[error("size mismatch: expected {expected} values, found {found}")]
    SizeMismatch {
        /// Length of the left-hand example.
        expected: usize,
        /// Length of the right-hand example.
        found: usize,
    },

    /// A level had fewer than two clusters when a merge was requested.
    #[error("cluster set too small to merge: {len} cluster(s)")]
    ClusterSetTooSmall {
        /// Number of clusters in the level.
        len: usize,
    },

    /// A cluster was added to a level that is already at capacity.
    #[error("cluster set full: capacity {capacity}")]
    ClusterSetFull {
        /// Fixed capacity of the level.
        capacity: usize,
    },

    /// The data source could not produce the requested table.
    #[error("no data for table {table:?}")]
    NoData {
        /// Table name that was requested.
        table: String,
        /// Underlying data-source failure.
        #[source]
        source: SourceError,
    },

    /// An operation needs a dataset but none is loaded in the session.
    #[error("no dataset loaded")]
    NoDataset,

    /// An operation needs a dendrogram but the session has none.
    #[error("no dendrogram available; mine or load one first")]
    NoDendrogram,

    /// Example index out of range.
    #[error("invalid example index {index}: dataset has {n_items} examples")]
    InvalidIndex {
        /// Offending index (as received, may be negative on the wire).
        index: i64,
        /// Number of examples in the dataset.
        n_items: usize,
    },

    /// Distance method id not in the supported set.
    #[error("unknown distance method {0}")]
    UnknownLinkage(i32),

    /// Unrecognized request code or malformed payload.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Table or dendrogram name that cannot be mapped to a file.
    #[error("invalid name {0:?}")]
    InvalidName(String),

    /// Reading or writing a persisted dendrogram failed.
    #[error("storage error at {}", path.display())]
    Storage {
        /// File that was accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The remote peer answered a request with an error message.
    #[error("server error: {0}")]
    Remote(String),

    /// A background computation did not complete (panicked or was cancelled).
    #[error("internal error: {0}")]
    Internal(String),

    /// Transport-level I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error ends the session instead of producing an error response.
    ///
    /// Transport failures and framing desyncs leave the stream in an unknown position.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// Whether the underlying transport was closed by the peer.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }

    /// Render this error and its whole cause chain on one line (`outer: cause: cause`).
    pub fn flatten(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_includes_source_chain() {
        let err = Error::NoData {
            table: "iris".to_string(),
            source: SourceError::NonNumeric {
                column: "species".to_string(),
                row: 3,
            },
        };
        let msg = err.flatten();
        assert!(msg.starts_with("no data for table \"iris\": "));
        assert!(msg.contains("species"));
    }

    #[test]
    fn test_disconnect_kinds() {
        let eof = Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(eof.is_transport());
        assert!(eof.is_disconnect());

        let other = Error::Io(std::io::Error::other("boom"));
        assert!(other.is_transport());
        assert!(!other.is_disconnect());

        assert!(!Error::NoDataset.is_transport());
    }
}
