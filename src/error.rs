//! Crate-wide error type.
//!
//! Format-specific errors (`FastaError`, `NewickError`) are folded into
//! [`Error`], which carries an [`ErrorKind`] so that a transport layer can
//! decide between client-error and server-error responses without matching
//! on every variant.

use thiserror::Error;

use crate::formats::fasta::FastaError;
use crate::formats::newick::NewickError;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed Newick or FASTA input
    Parse,
    /// Inconsistent alignment widths, duplicate names
    Format,
    /// Unknown node id, tip, species or dataset
    NotFound,
    /// Coordinate window outside the usable range
    Range,
    /// Search pattern that does not compile
    Pattern,
    /// No data has been loaded into the session
    NotLoaded,
    /// File system failure while loading
    Io,
}

/// Errors produced by the analysis engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Newick error: {0}")]
    Newick(#[from] NewickError),

    #[error("FASTA error: {0}")]
    Fasta(#[from] FastaError),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown node id: {0}")]
    UnknownNode(usize),

    #[error("Tip not found: {0}")]
    UnknownTip(String),

    #[error("Sequence not found in alignment: {0}")]
    MissingSequence(String),

    #[error("Unknown species: {0}")]
    UnknownSpecies(String),

    #[error("Dataset not found: {0}")]
    UnknownDataset(String),

    #[error("No {0} found")]
    MissingInput(&'static str),

    #[error("Invalid range: {0}")]
    Range(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("No data loaded")]
    NotLoaded,
}

impl Error {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Newick(_) => ErrorKind::Parse,
            Error::Fasta(e) if e.is_format_violation() => ErrorKind::Format,
            Error::Fasta(_) | Error::Dataset(_) => ErrorKind::Parse,
            Error::Io { .. } => ErrorKind::Io,
            Error::UnknownNode(_)
            | Error::UnknownTip(_)
            | Error::MissingSequence(_)
            | Error::UnknownSpecies(_)
            | Error::UnknownDataset(_)
            | Error::MissingInput(_) => ErrorKind::NotFound,
            Error::Range(_) => ErrorKind::Range,
            Error::Pattern(_) => ErrorKind::Pattern,
            Error::NotLoaded => ErrorKind::NotLoaded,
        }
    }

    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
