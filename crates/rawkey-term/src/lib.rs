// SPDX-License-Identifier: MIT
//
// rawkey-term: Terminal session engine for rawkey.
//
// Takes over a text terminal's line discipline, reads keys one byte at a
// time with a 100 ms timeout, and repaints the screen without the cursor
// flickering across it. The substrate a line-oriented editor sits on.
//
// Direct termios and ANSI escape sequences, no TUI framework in between.
// Raw mode is a scoped guard: however the session ends, the terminal goes
// back to exactly the attributes it had before.
//
// The terminal-facing modules are POSIX-only.

pub mod ansi;
pub mod error;
pub mod output;

#[cfg(unix)]
pub mod input;
#[cfg(unix)]
pub mod session;
#[cfg(unix)]
pub mod terminal;
#[cfg(unix)]
pub mod tty;
