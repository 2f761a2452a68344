//! Reclaim command: validate, measure, collect, evict.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::collect::{CollectOptions, Collector, DirErrorPolicy};
use crate::error::{ReclaimError, Result};
use crate::evict::{EvictionConfig, EvictionReport, Evictor};
use crate::probe::{FreeSpaceMode, SpaceSource};
use crate::size::format_size;

pub struct Reclaim<'a> {
    reference: &'a Path,
    directories: &'a [PathBuf],
    eviction: EvictionConfig,
    collect: CollectOptions,
}

pub struct ReclaimBuilder<'a> {
    reference: Option<&'a Path>,
    directories: &'a [PathBuf],
    target_percent: Option<f64>,
    test_mode: bool,
    recursive: bool,
    follow_links: bool,
    use_bfree: bool,
    remove_hidden: bool,
    on_dir_error: DirErrorPolicy,
    reprobe_every: NonZeroUsize,
}

impl<'a> Default for ReclaimBuilder<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ReclaimBuilder<'a> {
    pub fn new() -> Self {
        Self {
            reference: None,
            directories: &[],
            target_percent: None,
            test_mode: false,
            recursive: false,
            follow_links: false,
            use_bfree: false,
            remove_hidden: false,
            on_dir_error: DirErrorPolicy::default(),
            reprobe_every: NonZeroUsize::MIN,
        }
    }

    pub fn reference(mut self, path: &'a Path) -> Self {
        self.reference = Some(path);
        self
    }

    pub fn directories(mut self, dirs: &'a [PathBuf]) -> Self {
        self.directories = dirs;
        self
    }

    pub fn target_percent(mut self, percent: f64) -> Self {
        self.target_percent = Some(percent);
        self
    }

    pub fn test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    pub fn recursive(mut self, enabled: bool) -> Self {
        self.recursive = enabled;
        self
    }

    pub fn follow_links(mut self, enabled: bool) -> Self {
        self.follow_links = enabled;
        self
    }

    pub fn use_bfree(mut self, enabled: bool) -> Self {
        self.use_bfree = enabled;
        self
    }

    pub fn remove_hidden(mut self, enabled: bool) -> Self {
        self.remove_hidden = enabled;
        self
    }

    pub fn on_dir_error(mut self, policy: DirErrorPolicy) -> Self {
        self.on_dir_error = policy;
        self
    }

    pub fn reprobe_every(mut self, n: NonZeroUsize) -> Self {
        self.reprobe_every = n;
        self
    }

    pub fn build(self) -> Result<Reclaim<'a>> {
        let reference = self
            .reference
            .ok_or_else(|| ReclaimError::Config("space reference path is required".to_string()))?;
        if self.directories.is_empty() {
            return Err(ReclaimError::Config(
                "at least one directory is required".to_string(),
            ));
        }

        let mode = if self.use_bfree {
            FreeSpaceMode::Total
        } else {
            FreeSpaceMode::Available
        };

        let mut eviction = EvictionConfig::builder()
            .reference(reference)
            .mode(mode)
            .test_mode(self.test_mode)
            .reprobe_every(self.reprobe_every);
        if let Some(percent) = self.target_percent {
            eviction = eviction.target_percent(percent);
        }

        Ok(Reclaim {
            reference,
            directories: self.directories,
            eviction: eviction.build()?,
            collect: CollectOptions::builder()
                .recursive(self.recursive)
                .follow_links(self.follow_links)
                .include_hidden(self.remove_hidden)
                .on_dir_error(self.on_dir_error)
                .build(),
        })
    }
}

impl<'a> Reclaim<'a> {
    pub fn builder<'b>() -> ReclaimBuilder<'b> {
        ReclaimBuilder::new()
    }

    /// Run the reclaim against `source`.
    ///
    /// Statistics are read before the directories are validated, so a missing
    /// reference path reports a statistics error. Nothing is collected when
    /// the target is already met.
    pub fn run(self, source: &dyn SpaceSource) -> Result<EvictionReport> {
        let target = self.eviction.target_percent();
        let initial = source.measure(self.reference, self.eviction.mode())?;

        self.validate_directories()?;

        let evictor = Evictor::new(self.eviction);

        if initial.percent_free() >= target {
            info!(
                "There is more free space ({:.2}% => {} / {}) than the requested {target}%",
                initial.percent_free(),
                format_size(initial.free_bytes),
                format_size(initial.total_bytes)
            );
            return evictor.run(Vec::new(), source);
        }

        info!(
            "Free space {:.2}% ({} / {}) is below {target}%, looking for old files",
            initial.percent_free(),
            format_size(initial.free_bytes),
            format_size(initial.total_bytes)
        );

        let candidates = Collector::new(self.collect).collect(self.directories)?;
        debug!("Found {} candidate file(s)", candidates.len());

        let report = evictor.run(candidates, source)?;

        let verb = if evictor.config().test_mode() {
            "Would remove"
        } else {
            "Removed"
        };
        info!(
            "{verb} {} file(s) ({}); free space now {:.2}% ({} / {})",
            report.evicted.len(),
            format_size(report.bytes_reclaimed),
            report.percent_free(),
            format_size(report.final_reading.free_bytes),
            format_size(report.final_reading.total_bytes)
        );

        Ok(report)
    }

    /// Every directory must exist and lie at or below the reference path.
    fn validate_directories(&self) -> Result<()> {
        let reference = fs::canonicalize(self.reference).map_err(|source| {
            ReclaimError::Config(format!(
                "space reference path '{}' cannot be resolved: {source}",
                self.reference.display()
            ))
        })?;

        let mut errors = Vec::new();
        for dir in self.directories {
            match fs::canonicalize(dir) {
                Ok(resolved) if !resolved.is_dir() => {
                    errors.push(format!("'{}' is not a directory", dir.display()));
                }
                Ok(resolved) if !resolved.starts_with(&reference) => {
                    errors.push(format!(
                        "'{}' does not lie in '{}'",
                        dir.display(),
                        self.reference.display()
                    ));
                }
                Ok(_) => {}
                Err(_) => errors.push(format!("'{}' does not exist", dir.display())),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ReclaimError::Config(errors.join("; ")))
        }
    }
}
