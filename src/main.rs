//! # disk-vc CLI
//!
//! Removes the oldest files from the given directories until the volume
//! holding `<space_reference_path>` has at least `<space_below_%>` free.
//!
//! ```bash
//! disk-vc <space_reference_path> <space_below_%> <directories>... \
//!     [--test] [--recursive] [--follow-links] [--use-bfree] [--remove-hidden]
//! ```
//!
//! ## Environment Variables
//!
//! - `DISK_VC_TEST`, `DISK_VC_RECURSIVE`, `DISK_VC_FOLLOW_LINKS`,
//!   `DISK_VC_USE_BFREE`, `DISK_VC_REMOVE_HIDDEN`: same as the flags
//! - `DISK_VC_ON_DIR_ERROR`: `skip` (default) or `abort`
//! - `DISK_VC_REPROBE_EVERY`: re-check free space after every N removals
//! - `DISK_VC_VERBOSE`, `DISK_VC_QUIET`: output verbosity
//! - `RUST_LOG`: overrides the log filter entirely

use std::io::IsTerminal;

use disk_vc::cli::Cli;

fn main() -> miette::Result<()> {
    miette::set_panic_hook();

    // Plain output for cron mail and journald, fancy output on a terminal
    if std::io::stderr().is_terminal() {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::unicode_nocolor())
                    .with_context_lines(3),
            )
        }))?;
    } else {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::none())
                    .with_context_lines(0),
            )
        }))?;
    }

    let cli = Cli::parse_args();
    disk_vc::logging::init(cli.global_opts().verbose(), cli.global_opts().quiet());

    disk_vc::commands::execute(&cli)
        .map(|_| ())
        .map_err(Into::into)
}
