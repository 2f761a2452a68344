//! # disk-vc
//!
//! Frees disk space by deleting the oldest files from a set of directories
//! until a target free-space percentage is restored on the volume holding a
//! reference path. Meant for unattended, periodic runs (cron, systemd timers)
//! that keep accumulating backups from filling a volume.
//!
//! ## Overview
//!
//! A run has three stages:
//!
//! 1. **Measure** the reference path's volume with `statvfs` ([`probe`])
//! 2. **Collect** regular files beneath the given directories ([`collect`])
//! 3. **Evict** them oldest-first, re-measuring before every removal, until
//!    the target is met or no candidates remain ([`evict`])
//!
//! Free space is measured rather than predicted from file sizes, so the loop
//! stops at the right point on filesystems with compression, copy-on-write,
//! sparse files or hard links.
//!
//! ## Usage
//!
//! ```bash
//! # Keep at least 15% of /srv free by pruning old dumps (preview first)
//! disk-vc /srv 15 /srv/backups/daily /srv/backups/weekly --recursive --test
//! disk-vc /srv 15 /srv/backups/daily /srv/backups/weekly --recursive
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use disk_vc::cli::Cli;
//! use disk_vc::commands;
//!
//! let cli = Cli::builder()
//!     .space_reference_path("/srv")
//!     .space_below(15.0)
//!     .directory("/srv/backups")
//!     .test(true)
//!     .build()?;
//!
//! let report = commands::execute(&cli)?;
//! println!("{} file(s) would be removed", report.evicted.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! The crate uses a combination of:
//! - `thiserror` for strongly-typed errors
//! - `miette` for rich diagnostic output in the CLI
//!
//! Deletion failures are collected in the report instead of aborting the
//! run; see [`error`] for which errors are fatal.

pub mod cli;
pub mod collect;
pub mod commands;
pub mod error;
pub mod evict;
pub mod logging;
pub mod probe;

// Internal modules
mod size;
