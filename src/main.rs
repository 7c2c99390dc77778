// SPDX-License-Identifier: MIT
//
// rawkey: a raw-mode terminal key session.
//
// Puts the terminal in raw mode and echoes each key on its own line:
//
//   Ctrl-Q / Ctrl-Z  clear the screen and quit (exit 0)
//   Ctrl-K           repaint the screen with one "~" per row
//   Ctrl-C           print a notice instead of dying
//
// Diagnostics go to stderr through `tracing`. They are off unless
// RAWKEY_LOG asks for them (e.g. RAWKEY_LOG=debug), since anything written
// to the terminal while it is in raw mode lands in the middle of the screen.
//
// Exit codes: 0 on quit, 128 + N when ended by signal N, 1 on any terminal
// failure (after the original attributes have been put back).

use std::process;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "RAWKEY_LOG";

/// Filter used when [`LOG_ENV`] is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "warn";

/// Build the log filter from `directive`, falling back to the default.
fn log_filter(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn init_logging() {
    let directive = std::env::var(LOG_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(directive.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(unix)]
fn main() {
    use rawkey_term::session::Session;
    use rawkey_term::tty::StdTty;

    init_logging();
    tracing::info!("starting rawkey v{}", env!("CARGO_PKG_VERSION"));

    let mut session = Session::new(StdTty::new());

    match session.run() {
        Ok(exit) => process::exit(exit.code()),
        Err(e) => {
            eprintln!("rawkey: {e}");
            process::exit(e.exit_code());
        }
    }
}

#[cfg(not(unix))]
fn main() {
    init_logging();
    eprintln!("rawkey: raw terminal mode needs a POSIX terminal");
    process::exit(1);
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_defaults_to_warn() {
        assert_eq!(log_filter(None).to_string(), "warn");
    }

    #[test]
    fn log_filter_uses_directive() {
        assert_eq!(log_filter(Some("debug")).to_string(), "debug");
    }
}
