//! Command-line interface definitions for disk-vc.
//!
//! This module defines the CLI structure using clap. The main entry point is
//! the [`Cli`] struct; [`Cli::builder`] constructs one without parsing, for
//! library callers and tests.
//!
//! Every flag can also be set through a `DISK_VC_*` environment variable,
//! which is convenient for cron jobs and systemd units.
//!
//! # Example
//!
//! ```no_run
//! use disk_vc::cli::Cli;
//!
//! let cli = Cli::parse_args();
//! println!(
//!     "Freeing space on {:?} until {}% is free",
//!     cli.space_reference_path(),
//!     cli.space_below()
//! );
//! ```

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

use crate::collect::DirErrorPolicy;
use crate::error::{ReclaimError, Result};


/// Main command-line interface for disk-vc.
#[derive(Debug, Parser)]
#[command(
    name = "disk-vc",
    bin_name = "disk-vc",
    author,
    version,
    about = "Remove the oldest files from the given directories until enough disk space is free",
    long_about = None
)]
pub struct Cli {
    /// Path used to check for free space
    space_reference_path: PathBuf,

    /// Percentage of requested free space
    #[arg(value_name = "SPACE_BELOW_%")]
    space_below: f64,

    /// Directories from which old files will be deleted; each must lie in
    /// <SPACE_REFERENCE_PATH>
    #[arg(required = true, num_args = 1..)]
    directories: Vec<PathBuf>,

    #[command(flatten)]
    reclaim_opts: ReclaimOpts,

    #[command(flatten)]
    global_opts: GlobalOpts,
}

/// Command-line values for `--on-dir-error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnDirError {
    /// Log a warning and skip the unreadable subtree
    Skip,
    /// Abort the run
    Abort,
}

impl From<OnDirError> for DirErrorPolicy {
    fn from(value: OnDirError) -> Self {
        match value {
            OnDirError::Skip => DirErrorPolicy::Skip,
            OnDirError::Abort => DirErrorPolicy::Abort,
        }
    }
}

impl From<DirErrorPolicy> for OnDirError {
    fn from(value: DirErrorPolicy) -> Self {
        match value {
            DirErrorPolicy::Skip => OnDirError::Skip,
            DirErrorPolicy::Abort => OnDirError::Abort,
        }
    }
}

/// Options controlling which files are candidates and how they are removed.
#[derive(Debug, Parser)]
pub struct ReclaimOpts {
    /// Print file paths instead of removing them
    #[arg(long, env = "DISK_VC_TEST")]
    test: bool,

    /// Look in subdirectories
    #[arg(long, env = "DISK_VC_RECURSIVE")]
    recursive: bool,

    /// Follow symbolic links
    #[arg(long, env = "DISK_VC_FOLLOW_LINKS")]
    follow_links: bool,

    /// Use total free space instead of space available to unprivileged users
    #[arg(long, env = "DISK_VC_USE_BFREE")]
    use_bfree: bool,

    /// Remove hidden files (names starting with '.')
    #[arg(long, env = "DISK_VC_REMOVE_HIDDEN")]
    remove_hidden: bool,

    /// What to do with directories that cannot be read
    #[arg(
        long,
        value_enum,
        default_value_t = OnDirError::Skip,
        env = "DISK_VC_ON_DIR_ERROR"
    )]
    on_dir_error: OnDirError,

    /// Re-check free space only after every N removals
    #[arg(long, default_value = "1", value_name = "N", env = "DISK_VC_REPROBE_EVERY")]
    reprobe_every: NonZeroUsize,
}

/// Output verbosity options.
#[derive(Debug, Parser)]
pub struct GlobalOpts {
    /// Enable verbose output (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, env = "DISK_VC_VERBOSE")]
    verbose: u8,

    /// Silence all output except for errors
    #[arg(short, long, conflicts_with = "verbose", env = "DISK_VC_QUIET")]
    quiet: bool,
}

impl GlobalOpts {
    /// Get the verbose level
    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

impl ReclaimOpts {
    /// Check if test (dry run) mode is enabled
    pub fn test(&self) -> bool {
        self.test
    }

    /// Check if subdirectories are scanned
    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// Check if symbolic links are followed
    pub fn follow_links(&self) -> bool {
        self.follow_links
    }

    /// Check if total free blocks are used
    pub fn use_bfree(&self) -> bool {
        self.use_bfree
    }

    /// Check if hidden files are candidates
    pub fn remove_hidden(&self) -> bool {
        self.remove_hidden
    }

    /// Get the unreadable directory policy
    pub fn on_dir_error(&self) -> DirErrorPolicy {
        self.on_dir_error.into()
    }

    /// Get the re-probe batch size
    pub fn reprobe_every(&self) -> NonZeroUsize {
        self.reprobe_every
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the space reference path
    pub fn space_reference_path(&self) -> &Path {
        &self.space_reference_path
    }

    /// Get the target free-space percentage
    pub fn space_below(&self) -> f64 {
        self.space_below
    }

    /// Get the directories to clean
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Get the reclaim options
    pub fn reclaim_opts(&self) -> &ReclaimOpts {
        &self.reclaim_opts
    }

    /// Get the global options
    pub fn global_opts(&self) -> &GlobalOpts {
        &self.global_opts
    }

    /// Create a builder for programmatic construction
    pub fn builder() -> CliBuilder {
        CliBuilder::default()
    }
}

/// Builder for [`Cli`]
#[derive(Debug, Default)]
pub struct CliBuilder {
    space_reference_path: Option<PathBuf>,
    space_below: Option<f64>,
    directories: Vec<PathBuf>,
    test: bool,
    recursive: bool,
    follow_links: bool,
    use_bfree: bool,
    remove_hidden: bool,
    on_dir_error: DirErrorPolicy,
    reprobe_every: Option<NonZeroUsize>,
    verbose: u8,
    quiet: bool,
}

impl CliBuilder {
    /// Set the space reference path
    pub fn space_reference_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.space_reference_path = Some(path.into());
        self
    }

    /// Set the target free-space percentage
    pub fn space_below(mut self, percent: f64) -> Self {
        self.space_below = Some(percent);
        self
    }

    /// Add a directory to clean
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directories.push(dir.into());
        self
    }

    /// Enable test (dry run) mode
    pub fn test(mut self, enabled: bool) -> Self {
        self.test = enabled;
        self
    }

    /// Scan subdirectories
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.recursive = enabled;
        self
    }

    /// Follow symbolic links
    pub fn follow_links(mut self, enabled: bool) -> Self {
        self.follow_links = enabled;
        self
    }

    /// Use total free blocks
    pub fn use_bfree(mut self, enabled: bool) -> Self {
        self.use_bfree = enabled;
        self
    }

    /// Include hidden files
    pub fn remove_hidden(mut self, enabled: bool) -> Self {
        self.remove_hidden = enabled;
        self
    }

    /// Set the unreadable directory policy
    pub fn on_dir_error(mut self, policy: DirErrorPolicy) -> Self {
        self.on_dir_error = policy;
        self
    }

    /// Set the re-probe batch size
    pub fn reprobe_every(mut self, n: NonZeroUsize) -> Self {
        self.reprobe_every = Some(n);
        self
    }

    /// Set the verbose level
    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    /// Enable quiet mode
    pub fn quiet(mut self, enabled: bool) -> Self {
        self.quiet = enabled;
        self
    }

    /// Build the Cli instance
    pub fn build(self) -> Result<Cli> {
        let space_reference_path = self.space_reference_path.ok_or_else(|| {
            ReclaimError::Config("space reference path is required".to_string())
        })?;
        let space_below = self
            .space_below
            .ok_or_else(|| ReclaimError::Config("free space percentage is required".to_string()))?;
        if self.directories.is_empty() {
            return Err(ReclaimError::Config(
                "at least one directory is required".to_string(),
            ));
        }

        Ok(Cli {
            space_reference_path,
            space_below,
            directories: self.directories,
            reclaim_opts: ReclaimOpts {
                test: self.test,
                recursive: self.recursive,
                follow_links: self.follow_links,
                use_bfree: self.use_bfree,
                remove_hidden: self.remove_hidden,
                on_dir_error: self.on_dir_error.into(),
                reprobe_every: self.reprobe_every.unwrap_or(NonZeroUsize::MIN),
            },
            global_opts: GlobalOpts {
                verbose: self.verbose,
                quiet: self.quiet,
            },
        })
    }
}
