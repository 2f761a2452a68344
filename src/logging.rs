//! Log output setup.
//!
//! The library logs through `tracing`; the binary installs a stderr
//! subscriber whose level follows `-v`/`-q`. `RUST_LOG` overrides both.

use tracing_subscriber::EnvFilter;

/// Level directive for the given verbosity flags
pub fn filter_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "disk_vc=error";
    }

    match verbose {
        0 => "disk_vc=info",
        1 => "disk_vc=debug",
        _ => "disk_vc=trace",
    }
}

/// Install the global subscriber. Calling this twice is a no-op.
pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbose, quiet)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
