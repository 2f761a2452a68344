//! Oldest-first eviction until a free-space target is met.
//!
//! The [`Evictor`] sorts candidates by modification time and consumes them one
//! at a time, asking a [`SpaceSource`] for a fresh reading before every
//! decision. Measuring after each deletion, instead of predicting from file
//! sizes, keeps the loop correct on filesystems where freed space is not the
//! nominal file size (sparse files, compression, copy-on-write, hard links).
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use disk_vc::collect::{CollectOptions, Collector};
//! use disk_vc::evict::{EvictionConfig, Evictor};
//! use disk_vc::probe::Statvfs;
//!
//! let config = EvictionConfig::builder()
//!     .reference("/srv")
//!     .target_percent(15.0)
//!     .test_mode(true)
//!     .build()?;
//!
//! let candidates = Collector::new(CollectOptions::default()).collect(&[PathBuf::from("/srv/backups")])?;
//! let report = Evictor::new(config).run(candidates, &Statvfs)?;
//! for eviction in &report.evicted {
//!     println!("{}", eviction.path.display());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::collect::FileCandidate;
use crate::error::{ReclaimError, Result};
use crate::probe::{FreeSpaceMode, SpaceReading, SpaceSource};
use crate::size::format_size;

#[cfg(test)]
mod tests;

/// Eviction loop configuration
#[derive(Debug, Clone)]
pub struct EvictionConfig {
    /// Path whose volume is measured
    reference: PathBuf,
    /// Which free block count to use
    mode: FreeSpaceMode,
    /// Stop once this percentage of the volume is free
    target_percent: f64,
    /// Report instead of deleting
    test_mode: bool,
    /// Candidates consumed between two measurements
    reprobe_every: NonZeroUsize,
}

impl EvictionConfig {
    /// Creates a new builder for [`EvictionConfig`]
    pub fn builder() -> EvictionConfigBuilder {
        EvictionConfigBuilder::default()
    }

    /// Get the reference path
    pub fn reference(&self) -> &Path {
        &self.reference
    }

    /// Get the free space mode
    pub fn mode(&self) -> FreeSpaceMode {
        self.mode
    }

    /// Get the target free-space percentage
    pub fn target_percent(&self) -> f64 {
        self.target_percent
    }

    /// Check if test (dry run) mode is enabled
    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// Get the re-probe batch size
    pub fn reprobe_every(&self) -> NonZeroUsize {
        self.reprobe_every
    }
}

/// Builder for [`EvictionConfig`]
#[derive(Debug, Default)]
pub struct EvictionConfigBuilder {
    reference: Option<PathBuf>,
    mode: FreeSpaceMode,
    target_percent: Option<f64>,
    test_mode: bool,
    reprobe_every: Option<NonZeroUsize>,
}

impl EvictionConfigBuilder {
    /// Set the reference path
    pub fn reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference = Some(path.into());
        self
    }

    /// Set the free space mode
    pub fn mode(mut self, mode: FreeSpaceMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the target free-space percentage
    pub fn target_percent(mut self, percent: f64) -> Self {
        self.target_percent = Some(percent);
        self
    }

    /// Enable test (dry run) mode
    pub fn test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    /// Measure only after every `n` consumed candidates.
    ///
    /// Values above 1 reduce syscalls on very large candidate sets at the cost
    /// of possibly removing up to `n - 1` files more than necessary.
    pub fn reprobe_every(mut self, n: NonZeroUsize) -> Self {
        self.reprobe_every = Some(n);
        self
    }

    /// Build the [`EvictionConfig`]
    pub fn build(self) -> Result<EvictionConfig> {
        let reference = self
            .reference
            .ok_or_else(|| ReclaimError::Config("space reference path is required".to_string()))?;
        let target_percent = self
            .target_percent
            .ok_or_else(|| ReclaimError::Config("target percentage is required".to_string()))?;

        if !target_percent.is_finite() || !(0.0..=100.0).contains(&target_percent) {
            return Err(ReclaimError::Config(format!(
                "target percentage must be between 0 and 100, got {target_percent}"
            )));
        }

        Ok(EvictionConfig {
            reference,
            mode: self.mode,
            target_percent,
            test_mode: self.test_mode,
            reprobe_every: self.reprobe_every.unwrap_or(NonZeroUsize::MIN),
        })
    }
}

/// What happened to a consumed candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionOutcome {
    /// The file was deleted
    Removed,
    /// Test mode: the file would have been deleted
    WouldRemove,
}

/// A consumed candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
    pub outcome: EvictionOutcome,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The measured free space reached the target
    TargetMet,
    /// Every candidate was consumed before the target was reached
    Exhausted,
}

/// Result of an eviction run
#[derive(Debug)]
pub struct EvictionReport {
    /// Removed (or would-remove) files, in processing order
    pub evicted: Vec<Eviction>,
    /// Deletion failures ([`ReclaimError::Deletion`]), in processing order
    pub failures: Vec<ReclaimError>,
    /// The reading the stopping decision was made on
    pub final_reading: SpaceReading,
    /// Why the loop stopped
    pub stop_reason: StopReason,
    /// Sum of the sizes of the evicted files
    pub bytes_reclaimed: u64,
}

impl EvictionReport {
    fn new(initial: SpaceReading) -> Self {
        Self {
            evicted: Vec::new(),
            failures: Vec::new(),
            final_reading: initial,
            stop_reason: StopReason::Exhausted,
            bytes_reclaimed: 0,
        }
    }

    /// Check if the free-space target was reached
    pub fn target_met(&self) -> bool {
        self.stop_reason == StopReason::TargetMet
    }

    /// Free-space percentage when the loop stopped
    pub fn percent_free(&self) -> f64 {
        self.final_reading.percent_free()
    }
}

/// Runs the eviction loop
#[derive(Debug)]
pub struct Evictor {
    config: EvictionConfig,
}

impl Evictor {
    pub fn new(config: EvictionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvictionConfig {
        &self.config
    }

    /// Consumes candidates oldest-first until the target is met or none
    /// remain.
    ///
    /// A statistics failure aborts the run; a deletion failure is recorded in
    /// the report and the loop moves on to the next candidate.
    pub fn run(
        &self,
        mut candidates: Vec<FileCandidate>,
        source: &dyn SpaceSource,
    ) -> Result<EvictionReport> {
        // Stable: equal timestamps keep collection order
        candidates.sort_by_key(|candidate| candidate.modified);

        let target = self.config.target_percent();
        let batch = self.config.reprobe_every().get();
        let mut remaining = candidates.into_iter().peekable();

        let mut report = EvictionReport::new(self.measure(source, 0)?);

        loop {
            let percent_free = report.final_reading.percent_free();
            debug!("Free space: {percent_free:.2}% (target {target}%)");

            if percent_free >= target {
                report.stop_reason = StopReason::TargetMet;
                break;
            }

            if remaining.peek().is_none() {
                report.stop_reason = StopReason::Exhausted;
                break;
            }

            for candidate in remaining.by_ref().take(batch) {
                self.consume(candidate, &mut report);
            }

            report.final_reading = self.measure(source, report.bytes_reclaimed)?;
        }

        Ok(report)
    }

    fn measure(&self, source: &dyn SpaceSource, reclaimed: u64) -> Result<SpaceReading> {
        let reading = source.measure(self.config.reference(), self.config.mode())?;

        // A dry run deletes nothing, so credit what a real run would have freed
        if self.config.test_mode() {
            Ok(reading.with_freed(reclaimed))
        } else {
            Ok(reading)
        }
    }

    fn consume(&self, candidate: FileCandidate, report: &mut EvictionReport) {
        let FileCandidate {
            path,
            modified,
            size,
        } = candidate;
        let modified_at: DateTime<Local> = modified.into();

        let outcome = if self.config.test_mode() {
            info!(
                "Would remove {} (size={}, modified={})",
                path.display(),
                format_size(size),
                modified_at.format("%Y-%m-%d %H:%M:%S")
            );
            EvictionOutcome::WouldRemove
        } else {
            info!(
                "Removing {} (size={}, modified={})",
                path.display(),
                format_size(size),
                modified_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Err(source) = fs::remove_file(&path) {
                warn!("Failed to remove {}: {source}", path.display());
                report.failures.push(ReclaimError::Deletion { path, source });
                return;
            }
            EvictionOutcome::Removed
        };

        report.bytes_reclaimed = report.bytes_reclaimed.saturating_add(size);
        report.evicted.push(Eviction {
            path,
            modified,
            size,
            outcome,
        });
    }
}
