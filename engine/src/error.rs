//! Error types for the sort engine.
//!
//! `SortError` covers both the validation errors returned by
//! [`create_sorter`](crate::create_sorter) and the per-file / per-directory
//! failures that a run reports to its observer. A running sort never returns
//! a `SortError` to its caller; failures travel as
//! [`SortEvent::Failed`](crate::SortEvent) instead.

use std::error::Error;
use std::io;
use std::path::PathBuf;

/// Errors produced while configuring or running a sort.
#[derive(Debug, thiserror::Error)]
pub enum SortError {
    /// File could not be opened or its metadata could not be decoded.
    ///
    /// Non-fatal: the file is routed as if it had no timestamp.
    #[error("couldn't open image ({})", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },

    /// Relocation failed; the file is left in place.
    #[error("couldn't move image ({})", path.display())]
    MoveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Listing a directory's entries failed.
    #[error("failed to read directory: {}", path.display())]
    DirectoryReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The worker processing a directory panicked.
    #[error("sorting task for {} stopped unexpectedly", path.display())]
    TaskPanicked { path: PathBuf },

    /// Input directory does not exist
    #[error("input directory not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// Input exists but cannot be used
    #[error("invalid path: {} ({reason})", path.display())]
    InvalidInput { path: PathBuf, reason: String },

    /// Date template contains an unsupported specifier
    #[error("invalid date template: {template:?}")]
    InvalidTemplate { template: String },
}

impl SortError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::MoveFailed { source, .. } | Self::DirectoryReadFailed { source, .. } => {
                source.raw_os_error()
            }
            _ => None,
        }
    }

    /// The filesystem path this error is about.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::OpenFailed { path, .. }
            | Self::MoveFailed { path, .. }
            | Self::DirectoryReadFailed { path, .. }
            | Self::TaskPanicked { path }
            | Self::InputNotFound { path }
            | Self::InvalidInput { path, .. } => Some(path),
            Self::InvalidTemplate { .. } => None,
        }
    }

    /// True if the underlying cause was a permission problem.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::MoveFailed { source, .. } | Self::DirectoryReadFailed { source, .. } => {
                source.kind() == io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }
}
