// SPDX-License-Identifier: MIT
//
// Session error taxonomy.
//
// Four failure kinds, all session-fatal. None of them is retried: a terminal
// that refuses attribute changes or stops answering reads is detached or not
// interactive, and polling it again would just spin.
//
// Components return these to the session, which is the only place that
// decides to terminate and restore. Nothing below the session restores on
// its own.

use std::io;

/// A session-fatal terminal failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The terminal's line-discipline attributes could not be read.
    #[error("tcgetattr: cannot query terminal attributes: {0}")]
    CannotQuery(#[source] io::Error),

    /// The terminal's line-discipline attributes could not be installed.
    #[error("tcsetattr: cannot set terminal attributes: {0}")]
    CannotSet(#[source] io::Error),

    /// The window-size query failed or reported zero columns.
    #[error("ioctl(TIOCGWINSZ): cannot determine terminal geometry")]
    NoGeometry,

    /// A read or write on the terminal streams failed.
    #[error("{op}: terminal I/O failed: {source}")]
    IoFailure {
        /// The failing operation (`read` or `write`).
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Wrap a failed read on the input stream.
    #[must_use]
    pub const fn read(source: io::Error) -> Self {
        Self::IoFailure { op: "read", source }
    }

    /// Wrap a failed write on the output stream.
    #[must_use]
    pub const fn write(source: io::Error) -> Self {
        Self::IoFailure {
            op: "write",
            source,
        }
    }

    /// Process exit code for this failure. Always non-zero.
    #[inline]
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        1
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

// ─── Tests ───────────────────────────────────────────────────────────────────
