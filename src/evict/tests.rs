use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use proptest::prelude::*;
use tempfile::TempDir;

use super::{EvictionConfig, EvictionOutcome, EvictionReport, Evictor, StopReason};
use crate::collect::{CollectOptions, Collector, FileCandidate};
use crate::error::{ReclaimError, Result};
use crate::probe::{FreeSpaceMode, SpaceReading, SpaceSource};

// Test sources

/// Replays readings in order, repeating the last one once exhausted
struct ScriptedSource {
    readings: RefCell<VecDeque<SpaceReading>>,
    calls: Cell<usize>,
}

impl ScriptedSource {
    fn new(percents: &[u64]) -> Self {
        Self {
            readings: RefCell::new(
                percents
                    .iter()
                    .map(|p| SpaceReading {
                        total_bytes: 100,
                        free_bytes: *p,
                    })
                    .collect(),
            ),
            calls: Cell::new(0),
        }
    }

    fn constant(percent: u64) -> Self {
        Self::new(&[percent])
    }

    /// A single reading of `free` out of `total` bytes
    fn bytes(total: u64, free: u64) -> Self {
        Self {
            readings: RefCell::new(VecDeque::from([SpaceReading {
                total_bytes: total,
                free_bytes: free,
            }])),
            calls: Cell::new(0),
        }
    }
}

impl SpaceSource for ScriptedSource {
    fn measure(&self, _reference: &Path, _mode: FreeSpaceMode) -> Result<SpaceReading> {
        self.calls.set(self.calls.get() + 1);
        let mut readings = self.readings.borrow_mut();
        if readings.len() > 1 {
            Ok(readings.pop_front().unwrap())
        } else {
            Ok(*readings.front().unwrap())
        }
    }
}

/// Reports free space that grows as files in `dir` are deleted
struct DirUsageSource {
    dir: PathBuf,
    total: u64,
    base_free: u64,
    initial_usage: u64,
}

impl DirUsageSource {
    fn new(dir: &Path, total: u64, base_free: u64) -> Self {
        Self {
            dir: dir.to_path_buf(),
            total,
            base_free,
            initial_usage: dir_usage(dir),
        }
    }
}

impl SpaceSource for DirUsageSource {
    fn measure(&self, _reference: &Path, _mode: FreeSpaceMode) -> Result<SpaceReading> {
        let freed = self.initial_usage - dir_usage(&self.dir);
        Ok(SpaceReading {
            total_bytes: self.total,
            free_bytes: self.base_free + freed,
        })
    }
}

struct FailingSource;

impl SpaceSource for FailingSource {
    fn measure(&self, reference: &Path, _mode: FreeSpaceMode) -> Result<SpaceReading> {
        Err(ReclaimError::Statistics {
            path: reference.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }
}

// Helper functions

fn dir_usage(dir: &Path) -> u64 {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}

fn days_ago(days: u64) -> SystemTime {
    SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60)
}

fn create_file(path: &Path, size: usize, age_days: u64) {
    fs::write(path, vec![b'x'; size]).unwrap();
    filetime::set_file_mtime(path, FileTime::from_system_time(days_ago(age_days))).unwrap();
}

fn candidate(path: impl Into<PathBuf>, modified: SystemTime, size: u64) -> FileCandidate {
    FileCandidate {
        path: path.into(),
        modified,
        size,
    }
}

fn config(target: f64, test_mode: bool) -> EvictionConfig {
    EvictionConfig::builder()
        .reference("/")
        .target_percent(target)
        .test_mode(test_mode)
        .build()
        .unwrap()
}

fn collect_all(dir: &Path) -> Vec<FileCandidate> {
    Collector::new(CollectOptions::default())
        .collect(&[dir.to_path_buf()])
        .unwrap()
}

fn listing(dir: &Path) -> BTreeSet<(PathBuf, u64)> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (e.path(), e.metadata().unwrap().len())
        })
        .collect()
}

// Configuration

#[test]
fn test_config_rejects_invalid_targets() {
    for target in [-1.0, 100.5, f64::NAN, f64::INFINITY] {
        let result = EvictionConfig::builder()
            .reference("/")
            .target_percent(target)
            .build();
        assert!(
            matches!(result, Err(ReclaimError::Config(_))),
            "target {target} should be rejected"
        );
    }

    assert!(matches!(
        EvictionConfig::builder().target_percent(10.0).build(),
        Err(ReclaimError::Config(_))
    ));
    assert!(matches!(
        EvictionConfig::builder().reference("/").build(),
        Err(ReclaimError::Config(_))
    ));
}

#[test]
fn test_config_defaults() {
    let lower = config(0.0, false);
    assert_eq!(lower.mode(), FreeSpaceMode::Available);
    assert_eq!(lower.reprobe_every().get(), 1);
    assert!(!lower.test_mode());
    assert_eq!(lower.target_percent(), 0.0);

    let upper = config(100.0, true);
    assert_eq!(upper.target_percent(), 100.0);
    assert!(upper.test_mode());
}

// Stopping behavior

#[test]
fn test_stops_immediately_when_target_already_met() {
    let source = ScriptedSource::constant(95);
    let candidates = vec![candidate("/nowhere/a", days_ago(3), 10)];

    let report = Evictor::new(config(90.0, true))
        .run(candidates, &source)
        .unwrap();

    assert!(report.evicted.is_empty());
    assert!(report.target_met());
    assert_eq!(report.stop_reason, StopReason::TargetMet);
    assert_eq!(source.calls.get(), 1);
}

#[test]
fn test_target_met_exactly_stops() {
    let source = ScriptedSource::new(&[10, 50]);
    let candidates = vec![
        candidate("/nowhere/a", days_ago(3), 10),
        candidate("/nowhere/b", days_ago(2), 10),
    ];

    let report = Evictor::new(config(50.0, false))
        .run(candidates, &source)
        .unwrap();

    // The only consumed candidate does not exist, so it is a failure
    assert_eq!(report.failures.len(), 1);
    assert!(report.evicted.is_empty());
    assert!(report.target_met());
    assert!(report.percent_free() >= 50.0);
}

#[test]
fn test_exhaustion_consumes_every_candidate() {
    let source = ScriptedSource::constant(10);
    let candidates = vec![
        candidate("/nowhere/new", days_ago(1), 10),
        candidate("/nowhere/old", days_ago(10), 10),
        candidate("/nowhere/mid", days_ago(5), 10),
    ];

    let report = Evictor::new(config(90.0, true))
        .run(candidates, &source)
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert!(!report.target_met());
    let order: Vec<_> = report.evicted.iter().map(|e| e.path.clone()).collect();
    assert_eq!(
        order,
        vec![
            PathBuf::from("/nowhere/old"),
            PathBuf::from("/nowhere/mid"),
            PathBuf::from("/nowhere/new"),
        ]
    );
    assert!(
        report
            .evicted
            .iter()
            .all(|e| e.outcome == EvictionOutcome::WouldRemove)
    );
    // One reading up front and one after every candidate
    assert_eq!(source.calls.get(), 4);
}

#[test]
fn test_equal_timestamps_keep_collection_order() {
    let source = ScriptedSource::constant(0);
    let when = days_ago(2);
    let candidates = vec![
        candidate("/nowhere/c", when, 1),
        candidate("/nowhere/a", when, 1),
        candidate("/nowhere/b", when, 1),
    ];

    let report = Evictor::new(config(50.0, true))
        .run(candidates, &source)
        .unwrap();

    let order: Vec<_> = report.evicted.iter().map(|e| e.path.clone()).collect();
    assert_eq!(
        order,
        vec![
            PathBuf::from("/nowhere/c"),
            PathBuf::from("/nowhere/a"),
            PathBuf::from("/nowhere/b"),
        ]
    );
}

// Dry runs

#[test]
fn test_dry_run_stops_after_one_when_simulated_space_suffices() {
    let temp = TempDir::new().unwrap();
    create_file(&temp.path().join("one-day"), 10, 1);
    create_file(&temp.path().join("five-days"), 10, 5);
    create_file(&temp.path().join("ten-days"), 100, 10);

    // 80% free; virtually removing the 100-byte file reaches 90%
    let source = ScriptedSource::bytes(1000, 800);
    let report = Evictor::new(config(90.0, true))
        .run(collect_all(temp.path()), &source)
        .unwrap();

    assert_eq!(report.evicted.len(), 1);
    assert_eq!(report.evicted[0].path, temp.path().join("ten-days"));
    assert!(report.target_met());
    assert_eq!(report.percent_free(), 90.0);
}

#[test]
fn test_dry_run_continues_when_simulated_space_falls_short() {
    let temp = TempDir::new().unwrap();
    create_file(&temp.path().join("one-day"), 10, 1);
    create_file(&temp.path().join("five-days"), 60, 5);
    create_file(&temp.path().join("ten-days"), 50, 10);

    let source = ScriptedSource::bytes(1000, 800);
    let report = Evictor::new(config(90.0, true))
        .run(collect_all(temp.path()), &source)
        .unwrap();

    let order: Vec<_> = report.evicted.iter().map(|e| e.path.clone()).collect();
    assert_eq!(
        order,
        vec![temp.path().join("ten-days"), temp.path().join("five-days")]
    );
    assert_eq!(report.bytes_reclaimed, 110);
    assert!(report.target_met());
}

#[test]
fn test_dry_run_leaves_files_untouched() {
    let temp = TempDir::new().unwrap();
    for (name, age) in [("a", 1), ("b", 2), ("c", 3)] {
        create_file(&temp.path().join(name), 64, age);
    }
    let before = listing(temp.path());

    let report = Evictor::new(config(100.0, true))
        .run(collect_all(temp.path()), &ScriptedSource::constant(0))
        .unwrap();

    assert_eq!(report.evicted.len(), 3);
    assert!(report.failures.is_empty());
    assert_eq!(listing(temp.path()), before);
}

#[test]
fn test_dry_run_matches_real_run_with_followed_links() {
    let temp = TempDir::new().unwrap();
    create_file(&temp.path().join("data"), 100, 2);
    std::os::unix::fs::symlink("data", temp.path().join("a_link")).unwrap();

    let collector = Collector::new(CollectOptions::builder().follow_links(true).build());
    let paths = |report: &EvictionReport| -> Vec<PathBuf> {
        report.evicted.iter().map(|e| e.path.clone()).collect()
    };

    let dry = Evictor::new(config(90.0, true))
        .run(
            collector.collect(&[temp.path().to_path_buf()]).unwrap(),
            &DirUsageSource::new(temp.path(), 1000, 800),
        )
        .unwrap();
    let real = Evictor::new(config(90.0, false))
        .run(
            collector.collect(&[temp.path().to_path_buf()]).unwrap(),
            &DirUsageSource::new(temp.path(), 1000, 800),
        )
        .unwrap();

    assert_eq!(
        paths(&real),
        vec![temp.path().join("a_link"), temp.path().join("data")]
    );
    assert_eq!(paths(&dry), paths(&real));
    assert!(dry.target_met());
    assert!(real.target_met());
}

// Real deletion

#[test]
fn test_removes_oldest_until_target_met() {
    let temp = TempDir::new().unwrap();
    create_file(&temp.path().join("newest"), 100, 1);
    create_file(&temp.path().join("middle"), 100, 2);
    create_file(&temp.path().join("oldest"), 100, 3);

    let source = DirUsageSource::new(temp.path(), 1000, 750);
    let report = Evictor::new(config(90.0, false))
        .run(collect_all(temp.path()), &source)
        .unwrap();

    assert!(report.target_met());
    assert_eq!(report.evicted.len(), 2);
    assert!(
        report
            .evicted
            .iter()
            .all(|e| e.outcome == EvictionOutcome::Removed)
    );
    assert!(!temp.path().join("oldest").exists());
    assert!(!temp.path().join("middle").exists());
    assert!(temp.path().join("newest").exists());
    assert_eq!(report.percent_free(), 95.0);
}

#[test]
fn test_deletion_failure_does_not_stop_the_loop() {
    let temp = TempDir::new().unwrap();
    let real = temp.path().join("real");
    create_file(&real, 10, 1);
    let ghost = temp.path().join("ghost");

    let candidates = vec![
        candidate(&ghost, days_ago(5), 10),
        candidate(&real, days_ago(1), 10),
    ];

    let report = Evictor::new(config(90.0, false))
        .run(candidates, &ScriptedSource::constant(10))
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        &report.failures[0],
        ReclaimError::Deletion { path, source }
            if path == &ghost && source.kind() == std::io::ErrorKind::NotFound
    ));
    assert_eq!(report.evicted.len(), 1);
    assert_eq!(report.evicted[0].path, real);
    assert!(!real.exists());
    assert_eq!(report.bytes_reclaimed, 10);
}

#[test]
fn test_statistics_failure_aborts_before_touching_files() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("keep");
    create_file(&file, 10, 3);

    let err = Evictor::new(config(90.0, false))
        .run(collect_all(temp.path()), &FailingSource)
        .unwrap_err();

    assert!(matches!(err, ReclaimError::Statistics { .. }));
    assert!(file.exists());
}

// Re-probe batching

#[test]
fn test_reprobe_batching_reduces_measurements() {
    let source = ScriptedSource::constant(0);
    let candidates: Vec<_> = (0..5)
        .map(|i| candidate(format!("/nowhere/{i}"), days_ago(10 - i), 1))
        .collect();

    let config = EvictionConfig::builder()
        .reference("/")
        .target_percent(50.0)
        .test_mode(true)
        .reprobe_every(NonZeroUsize::new(2).unwrap())
        .build()
        .unwrap();
    let report = Evictor::new(config).run(candidates, &source).unwrap();

    assert_eq!(report.evicted.len(), 5);
    // Up front, then after batches of 2, 2 and 1
    assert_eq!(source.calls.get(), 4);
}

#[test]
fn test_reprobe_batching_may_overshoot() {
    let temp = TempDir::new().unwrap();
    for (name, age) in [("a", 4), ("b", 3), ("c", 2), ("d", 1)] {
        create_file(&temp.path().join(name), 100, age);
    }

    let source = DirUsageSource::new(temp.path(), 1000, 750);
    let config = EvictionConfig::builder()
        .reference("/")
        .target_percent(80.0)
        .reprobe_every(NonZeroUsize::new(2).unwrap())
        .build()
        .unwrap();
    let report = Evictor::new(config)
        .run(collect_all(temp.path()), &source)
        .unwrap();

    // One removal would have sufficed; the batch removes two
    assert!(report.target_met());
    assert_eq!(report.evicted.len(), 2);
    assert!(temp.path().join("c").exists());
}

// Property tests

proptest! {
    #[test]
    fn test_evictions_are_oldest_first(ages in prop::collection::vec(0u64..1_000_000, 0..50)) {
        let candidates: Vec<_> = ages
            .iter()
            .enumerate()
            .map(|(i, secs)| {
                candidate(
                    format!("/nowhere/{i}"),
                    SystemTime::UNIX_EPOCH + Duration::from_secs(*secs),
                    1,
                )
            })
            .collect();

        let report = Evictor::new(config(50.0, true))
            .run(candidates, &ScriptedSource::constant(0))
            .unwrap();

        prop_assert_eq!(report.evicted.len(), ages.len());
        prop_assert!(report.evicted.windows(2).all(|w| w[0].modified <= w[1].modified));
    }

    #[test]
    fn test_stop_reading_satisfies_target(
        start in 0u64..100,
        sizes in prop::collection::vec(1u64..20, 1..30),
        target in 0u64..=100,
    ) {
        let candidates: Vec<_> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| candidate(format!("/nowhere/{i}"), days_ago(i as u64), *size))
            .collect();
        let source = ScriptedSource::constant(start);

        let report = Evictor::new(config(target as f64, true))
            .run(candidates, &source)
            .unwrap();

        match report.stop_reason {
            StopReason::TargetMet => prop_assert!(report.percent_free() >= target as f64),
            StopReason::Exhausted => prop_assert_eq!(report.evicted.len(), sizes.len()),
        }
    }
}
