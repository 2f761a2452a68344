//! Free-space measurement for the volume holding a reference path.
//!
//! The eviction loop asks a [`SpaceSource`] for a fresh [`SpaceReading`]
//! before every decision. [`Statvfs`] is the production source; tests drive
//! the loop with scripted sources instead.

use std::path::Path;

use crate::error::{ReclaimError, Result};

/// Which free block count to measure against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FreeSpaceMode {
    /// Blocks available to an unprivileged caller (`f_bavail`)
    #[default]
    Available,
    /// All free blocks, including those reserved for root (`f_bfree`)
    Total,
}

/// A single measurement of a volume's capacity and free space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceReading {
    /// Total capacity in bytes
    pub total_bytes: u64,
    /// Free bytes according to the selected [`FreeSpaceMode`]
    pub free_bytes: u64,
}

impl SpaceReading {
    /// Free space as a percentage of total capacity
    pub fn percent_free(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.free_bytes as f64 * 100.0 / self.total_bytes as f64
    }

    /// Returns a reading with `bytes` added to the free space, capped at the
    /// total capacity.
    pub fn with_freed(self, bytes: u64) -> Self {
        Self {
            total_bytes: self.total_bytes,
            free_bytes: self.free_bytes.saturating_add(bytes).min(self.total_bytes),
        }
    }
}

/// Source of free-space statistics.
pub trait SpaceSource {
    /// Measures the volume containing `reference`.
    ///
    /// Implementations must not cache: the answer changes after every
    /// deletion.
    fn measure(&self, reference: &Path, mode: FreeSpaceMode) -> Result<SpaceReading>;
}

impl FreeSpaceMode {
    /// Picks `f_bavail` or `f_bfree`
    fn free_blocks(self, available: u64, free: u64) -> u64 {
        match self {
            FreeSpaceMode::Available => available,
            FreeSpaceMode::Total => free,
        }
    }
}

/// [`SpaceSource`] backed by the `statvfs` syscall
#[derive(Debug, Clone, Copy, Default)]
pub struct Statvfs;

impl SpaceSource for Statvfs {
    fn measure(&self, reference: &Path, mode: FreeSpaceMode) -> Result<SpaceReading> {
        let stat = nix::sys::statvfs::statvfs(reference).map_err(|errno| {
            ReclaimError::Statistics {
                path: reference.to_path_buf(),
                source: errno.into(),
            }
        })?;

        let fragment_size = u64::from(stat.fragment_size());
        let free_blocks = mode.free_blocks(
            u64::from(stat.blocks_available()),
            u64::from(stat.blocks_free()),
        );

        let reading = SpaceReading {
            total_bytes: u64::from(stat.blocks()).saturating_mul(fragment_size),
            free_bytes: free_blocks.saturating_mul(fragment_size),
        };

        if reading.total_bytes == 0 {
            return Err(ReclaimError::Statistics {
                path: reference.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "filesystem reports zero total capacity",
                ),
            });
        }

        Ok(reading)
    }
}
