//! Error types for disk-vc.
//!
//! This module defines all error types used throughout disk-vc, using a
//! combination of `thiserror` for ergonomic error definitions and `miette`
//! for rich diagnostic output.
//!
//! # Error Handling Strategy
//!
//! - All errors derive from [`ReclaimError`]
//! - Fatal kinds ([`ReclaimError::Statistics`], [`ReclaimError::Config`])
//!   abort a run before or during the eviction loop
//! - [`ReclaimError::Deletion`] is never returned directly; deletion failures
//!   are collected in the eviction report and the loop moves on
//! - [`ReclaimError::Collection`] is fatal or skipped depending on the
//!   configured [`DirErrorPolicy`](crate::collect::DirErrorPolicy)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use disk_vc::error::{ReclaimError, Result};
//!
//! fn check_root(path: &Path) -> Result<()> {
//!     if !path.is_dir() {
//!         return Err(ReclaimError::Config(format!(
//!             "'{}' is not a directory",
//!             path.display()
//!         )));
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error types that can occur while reclaiming disk space
#[derive(Error, Debug, Diagnostic)]
pub enum ReclaimError {
    /// Free-space statistics could not be read for the reference path.
    ///
    /// Raised when `statvfs` fails (path missing, permission denied, not on a
    /// mounted filesystem) or when the filesystem reports zero capacity. The
    /// stopping condition cannot be evaluated without statistics, so the run
    /// is aborted.
    #[error("Failed to read free-space statistics for '{path}'")]
    #[diagnostic(
        code(disk_vc::probe::statistics),
        help("Check that the space reference path exists and lies on a mounted filesystem.")
    )]
    Statistics {
        /// The reference path that was queried
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A directory or entry could not be read while collecting candidates.
    #[error("Failed to read '{path}' while collecting files")]
    #[diagnostic(
        code(disk_vc::collect::read_error),
        help("Fix the permissions, or pass '--on-dir-error skip' to ignore unreadable subtrees.")
    )]
    Collection {
        /// The path that could not be read
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A candidate file could not be removed.
    ///
    /// Common causes are insufficient permissions or the file vanishing
    /// between collection and deletion.
    #[error("Failed to remove '{path}'")]
    #[diagnostic(code(disk_vc::evict::deletion_error))]
    Deletion {
        /// The file that could not be removed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid arguments detected before any file is touched.
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(disk_vc::config::error),
        help(
            "Every directory must exist and lie inside the space reference path, and the \
             percentage must be between 0 and 100."
        )
    )]
    Config(
        /// Description of the configuration error
        String,
    ),

    /// Candidates ran out before the target was reached and some of them
    /// could not be removed.
    #[error(
        "Free space target of {target}% not reached ({percent_free:.2}% free); {} file(s) could \
         not be removed",
        .failures.len()
    )]
    #[diagnostic(
        code(disk_vc::evict::target_not_reached),
        help("The files listed below were skipped; check their permissions.")
    )]
    TargetNotReached {
        /// The requested free-space percentage
        target: f64,
        /// The free-space percentage measured when the run stopped
        percent_free: f64,
        /// The deletion failures recorded during the run
        #[related]
        failures: Vec<ReclaimError>,
    },
}

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, ReclaimError>;
