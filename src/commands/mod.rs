//! Entry points that turn a parsed [`Cli`] into a reclaim run.
//!
//! `mod.rs` wires the CLI to [`Reclaim`] and decides how a finished run maps
//! to the process exit status; the run itself lives in `reclaim`.

use tracing::warn;

use crate::cli::Cli;
use crate::error::{ReclaimError, Result};
use crate::evict::{EvictionOutcome, EvictionReport};
use crate::probe::{SpaceSource, Statvfs};

pub(crate) mod reclaim;

pub use reclaim::{Reclaim, ReclaimBuilder};


/// Execute a run based on the parsed CLI arguments.
pub fn execute(cli: &Cli) -> Result<EvictionReport> {
    execute_with_source(cli, &Statvfs)
}

/// Execute a run with an explicit free-space source.
///
/// In test mode every would-remove path is printed to stdout, one per line,
/// in processing order.
pub fn execute_with_source(cli: &Cli, source: &dyn SpaceSource) -> Result<EvictionReport> {
    let opts = cli.reclaim_opts();

    let report = Reclaim::builder()
        .reference(cli.space_reference_path())
        .directories(cli.directories())
        .target_percent(cli.space_below())
        .test_mode(opts.test())
        .recursive(opts.recursive())
        .follow_links(opts.follow_links())
        .use_bfree(opts.use_bfree())
        .remove_hidden(opts.remove_hidden())
        .on_dir_error(opts.on_dir_error())
        .reprobe_every(opts.reprobe_every())
        .build()?
        .run(source)?;

    for eviction in &report.evicted {
        if eviction.outcome == EvictionOutcome::WouldRemove {
            println!("{}", eviction.path.display());
        }
    }

    check_outcome(report, cli.space_below())
}

/// Classify a finished run.
///
/// A run fails only when the target was missed and at least one deletion
/// failed; running out of candidates on its own is reported but succeeds.
pub(crate) fn check_outcome(report: EvictionReport, target: f64) -> Result<EvictionReport> {
    if report.target_met() {
        return Ok(report);
    }

    if report.failures.is_empty() {
        warn!(
            "No files left to remove; free space is {:.2}%, below the requested {target}%",
            report.percent_free()
        );
        return Ok(report);
    }

    Err(ReclaimError::TargetNotReached {
        target,
        percent_free: report.percent_free(),
        failures: report.failures,
    })
}
