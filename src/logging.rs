//! Tracing setup for the CLI.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Check if colored output should be used.
///
/// True only when stdout is a terminal and `NO_COLOR` is unset.
fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` enables debug-level
/// output for this crate. Safe to call more than once (later calls are
/// no-ops), which keeps tests that share a process happy.
pub fn init(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("redgreen=debug,info")
            } else {
                EnvFilter::try_new("redgreen=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(use_color())
        .compact()
        .try_init();
}
