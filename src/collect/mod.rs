//! Candidate discovery beneath the configured root directories.
//!
//! The collector walks each root with `walkdir` and returns every regular file
//! that may be evicted. It never modifies the filesystem.
//!
//! # Traversal rules
//!
//! - Regular files are candidates unless hidden (see [`is_hidden`]) and
//!   hidden files were not requested
//! - Directories are descended only when recursion is enabled; they are never
//!   candidates themselves
//! - Symbolic links are ignored, without statting their targets, unless link
//!   following is enabled; then they count as whatever they point to, except
//!   that a linked file's size is the link's own size, since removing the
//!   link leaves the target in place
//! - Each physical directory (device + inode) is descended at most once, which
//!   bounds traversal over cyclic links and deduplicates overlapping roots
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use disk_vc::collect::{CollectOptions, Collector, DirErrorPolicy};
//!
//! let options = CollectOptions::builder()
//!     .recursive(true)
//!     .on_dir_error(DirErrorPolicy::Skip)
//!     .build();
//!
//! let candidates = Collector::new(options).collect(&[PathBuf::from("/backups")])?;
//! println!("{} candidate files", candidates.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ReclaimError, Result};


/// A file eligible for eviction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Location of the file, beneath one of the collected roots
    pub path: PathBuf,
    /// Last modification time
    pub modified: SystemTime,
    /// Bytes released by removing `path`: the file's length, or the link's
    /// own length when `path` is a followed symbolic link
    pub size: u64,
}

/// What to do when a directory or entry cannot be read during traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DirErrorPolicy {
    /// Log a warning, skip the unreadable subtree and keep collecting
    #[default]
    Skip,
    /// Abort the whole run with a collection error
    Abort,
}

/// Traversal options for [`Collector`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectOptions {
    recursive: bool,
    follow_links: bool,
    include_hidden: bool,
    on_dir_error: DirErrorPolicy,
}

impl CollectOptions {
    /// Creates a new builder for [`CollectOptions`]
    pub fn builder() -> CollectOptionsBuilder {
        CollectOptionsBuilder::default()
    }

    /// Check if subdirectories are descended
    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// Check if symbolic links are followed
    pub fn follow_links(&self) -> bool {
        self.follow_links
    }

    /// Check if dot-prefixed files are candidates
    pub fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    /// Get the unreadable directory policy
    pub fn on_dir_error(&self) -> DirErrorPolicy {
        self.on_dir_error
    }
}

/// Builder for [`CollectOptions`]
#[derive(Debug, Default)]
pub struct CollectOptionsBuilder {
    recursive: bool,
    follow_links: bool,
    include_hidden: bool,
    on_dir_error: DirErrorPolicy,
}

impl CollectOptionsBuilder {
    /// Descend into subdirectories
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.recursive = enabled;
        self
    }

    /// Follow symbolic links
    pub fn follow_links(mut self, enabled: bool) -> Self {
        self.follow_links = enabled;
        self
    }

    /// Include dot-prefixed files
    pub fn include_hidden(mut self, enabled: bool) -> Self {
        self.include_hidden = enabled;
        self
    }

    /// Set the unreadable directory policy
    pub fn on_dir_error(mut self, policy: DirErrorPolicy) -> Self {
        self.on_dir_error = policy;
        self
    }

    /// Build the [`CollectOptions`]
    pub fn build(self) -> CollectOptions {
        CollectOptions {
            recursive: self.recursive,
            follow_links: self.follow_links,
            include_hidden: self.include_hidden,
            on_dir_error: self.on_dir_error,
        }
    }
}

/// Returns true when `name` follows the POSIX dot-file convention.
///
/// This is a naming convention only; platform hidden attributes are not
/// consulted.
pub fn is_hidden(name: &OsStr) -> bool {
    name.as_encoded_bytes().first() == Some(&b'.')
}

/// Walks root directories and gathers [`FileCandidate`]s
#[derive(Debug)]
pub struct Collector {
    options: CollectOptions,
}

impl Collector {
    pub fn new(options: CollectOptions) -> Self {
        Self { options }
    }

    /// Collects candidates beneath every root, in root order.
    ///
    /// The order within a root is deterministic (entries sorted by file name)
    /// but carries no meaning; the eviction loop sorts by age.
    pub fn collect(&self, roots: &[PathBuf]) -> Result<Vec<FileCandidate>> {
        let mut candidates = Vec::new();
        let mut visited = HashSet::new();

        for root in roots {
            let before = candidates.len();
            self.collect_root(root, &mut visited, &mut candidates)?;
            debug!(
                "Collected {} candidate(s) under {}",
                candidates.len() - before,
                root.display()
            );
        }

        Ok(candidates)
    }

    fn collect_root(
        &self,
        root: &Path,
        visited: &mut HashSet<(u64, u64)>,
        candidates: &mut Vec<FileCandidate>,
    ) -> Result<()> {
        let root_metadata = match fs::metadata(root) {
            Ok(metadata) => metadata,
            Err(source) => {
                return self.on_error(ReclaimError::Collection {
                    path: root.to_path_buf(),
                    source,
                });
            }
        };

        if !visited.insert(dir_identity(&root_metadata)) {
            debug!("Skipping {}: already traversed", root.display());
            return Ok(());
        }

        let max_depth = if self.options.recursive() {
            usize::MAX
        } else {
            1
        };

        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(self.options.follow_links())
            .sort_by_file_name()
            .into_iter();

        while let Some(next) = walker.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(err) => {
                    self.handle_walk_error(root, err)?;
                    continue;
                }
            };

            let file_type = entry.file_type();

            if file_type.is_dir() {
                if !self.options.recursive() {
                    continue;
                }
                match entry.metadata() {
                    Ok(metadata) => {
                        if !visited.insert(dir_identity(&metadata)) {
                            debug!("Skipping {}: already traversed", entry.path().display());
                            walker.skip_current_dir();
                        }
                    }
                    Err(err) => {
                        walker.skip_current_dir();
                        self.handle_walk_error(root, err)?;
                    }
                }
                continue;
            }

            // Without link following, file_type() describes the link itself
            if !file_type.is_file() {
                continue;
            }

            if !self.options.include_hidden() && is_hidden(entry.file_name()) {
                debug!("Skipping hidden file {}", entry.path().display());
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    self.handle_walk_error(root, err)?;
                    continue;
                }
            };

            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(source) => {
                    self.on_error(ReclaimError::Collection {
                        path: entry.path().to_path_buf(),
                        source,
                    })?;
                    continue;
                }
            };

            let size = if entry.path_is_symlink() {
                match fs::symlink_metadata(entry.path()) {
                    Ok(link) => link.len(),
                    Err(source) => {
                        self.on_error(ReclaimError::Collection {
                            path: entry.path().to_path_buf(),
                            source,
                        })?;
                        continue;
                    }
                }
            } else {
                metadata.len()
            };

            candidates.push(FileCandidate {
                path: entry.into_path(),
                modified,
                size,
            });
        }

        Ok(())
    }

    fn handle_walk_error(&self, root: &Path, err: walkdir::Error) -> Result<()> {
        if let Some(ancestor) = err.loop_ancestor() {
            let at = err.path().unwrap_or(ancestor);
            debug!(
                "Skipping symlink loop at {} back to {}",
                at.display(),
                ancestor.display()
            );
            return Ok(());
        }

        let path = error_path(err.path(), root);

        if is_dangling_link(&path) {
            debug!("Skipping dangling symlink {}", path.display());
            return Ok(());
        }

        self.on_error(ReclaimError::Collection {
            path,
            source: err.into(),
        })
    }

    fn on_error(&self, err: ReclaimError) -> Result<()> {
        match self.options.on_dir_error() {
            DirErrorPolicy::Abort => Err(err),
            DirErrorPolicy::Skip => {
                match &err {
                    ReclaimError::Collection { path, source } => {
                        warn!("Skipping unreadable {}: {source}", path.display());
                    }
                    other => warn!("Skipping: {other}"),
                }
                Ok(())
            }
        }
    }
}

/// Path reported for a walk error; errors without one are attributed to the
/// root being walked
fn error_path(path: Option<&Path>, root: &Path) -> PathBuf {
    path.unwrap_or(root).to_path_buf()
}

fn dir_identity(metadata: &fs::Metadata) -> (u64, u64) {
    (metadata.dev(), metadata.ino())
}

fn is_dangling_link(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink()) && !path.exists()
}
