//! Error types for the working-copy engine

use std::path::PathBuf;

/// Result type for working-copy operations
pub type Result<T> = std::result::Result<T, AdminError>;

/// Errors that can occur while reading administrative files, resolving
/// repositories or taking repository locks
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {path:?}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate key in list: {0}")]
    DuplicateKey(String),

    #[error("in directory {dir:?}: there is no version here; do a checkout first")]
    NotCheckedOut { dir: PathBuf },

    #[error("there is a version in {dir:?} already")]
    AlreadyCheckedOut { dir: PathBuf },

    #[error("in directory {dir:?}: CVS directory found without administrative file {file}")]
    MissingAdminFile { dir: PathBuf, file: &'static str },

    #[error("in directory {dir:?}: there is no repository")]
    EmptyRepository { dir: PathBuf },

    #[error("Bad CVSROOT: {root:?}: {reason}")]
    BadRoot { root: String, reason: String },

    #[error("No CVSROOT specified")]
    NoRoot,

    #[error("Root {0} is not allowed")]
    RootNotAllowed(String),

    #[error("Invalid entry line: {0:?}")]
    BadEntry(String),

    #[error("Invalid RCS file {path:?}: {reason}")]
    BadRcs { path: PathBuf, reason: String },

    #[error("{path:?}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Timed out waiting for lock in {0:?}")]
    LockTimeout(PathBuf),

    #[error("Lock in {dir:?} is held by another process ({holder})")]
    LockBusy { dir: PathBuf, holder: String },

    #[error("Lock in {0:?} cannot be promoted")]
    NotPromotable(PathBuf),
}

impl AdminError {
    /// Attach a path to an I/O error.
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AdminError::IoAt {
            path: path.into(),
            source,
        }
    }
}

/// Extension for attaching the offending path to `std::io::Result`.
pub(crate) trait IoContext<T> {
    fn at(self, path: &std::path::Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| AdminError::io_at(path, e))
    }
}
