// SPDX-License-Identifier: MIT
//
// Terminal control: attribute snapshot, raw mode, geometry, RAII restore.
//
// The raw attribute set is a pure function of the captured snapshot. It
// clears exactly the line-discipline features an interactive key reader
// needs gone:
//
//   input   ICRNL (CR→NL translation), IXON (Ctrl-S/Ctrl-Q flow control)
//   output  OPOST (post-processing, so "\n" no longer implies "\r")
//   local   ECHO, ICANON (line buffering), IEXTEN (Ctrl-V), ISIG (Ctrl-C/Z)
//
// and turns reads into "at least 0 bytes, give up after 100 ms"
// (VMIN = 0, VTIME = 1). Everything else is copied from the snapshot.
//
// Entering raw mode yields a `RawMode` guard. Its release action is
// restoration: `leave()` restores and reports the error, dropping the guard
// without `leave()` restores best-effort. Either way the snapshot is written
// back exactly once.

use std::fmt;
use std::ops::{Deref, DerefMut};

use bitflags::bitflags;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::tty::Tty;

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

// ─── Geometry Probe ─────────────────────────────────────────────────────────

/// Query the terminal's window size once.
///
/// A terminal reporting zero columns is not a real interactive terminal.
///
/// # Errors
///
/// Returns [`Error::NoGeometry`] if the query fails or reports zero columns.
pub fn probe(tty: &impl Tty) -> Result<Size> {
    match tty.window_size() {
        Ok(size) if size.cols > 0 => {
            debug!(cols = size.cols, rows = size.rows, "probed terminal geometry");
            Ok(size)
        }
        Ok(_) => {
            debug!("window size reports zero columns");
            Err(Error::NoGeometry)
        }
        Err(err) => {
            debug!(%err, "window size query failed");
            Err(Error::NoGeometry)
        }
    }
}

// ─── Line Discipline View ───────────────────────────────────────────────────

bitflags! {
    /// The line-discipline features raw mode turns off.
    ///
    /// A portable view of a termios record, for diagnostics and checks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Discipline: u8 {
        const ECHO              = 0b0000_0001;
        const CANONICAL         = 0b0000_0010;
        const EXTENDED          = 0b0000_0100;
        const SIGNALS           = 0b0000_1000;
        const OUTPUT_PROCESSING = 0b0001_0000;
        const CR_TO_NL          = 0b0010_0000;
        const FLOW_CONTROL      = 0b0100_0000;
    }
}

/// Which raw-mode-relevant features `t` has enabled.
#[must_use]
pub fn discipline_of(t: &libc::termios) -> Discipline {
    let mut d = Discipline::empty();
    d.set(Discipline::ECHO, t.c_lflag & libc::ECHO != 0);
    d.set(Discipline::CANONICAL, t.c_lflag & libc::ICANON != 0);
    d.set(Discipline::EXTENDED, t.c_lflag & libc::IEXTEN != 0);
    d.set(Discipline::SIGNALS, t.c_lflag & libc::ISIG != 0);
    d.set(Discipline::OUTPUT_PROCESSING, t.c_oflag & libc::OPOST != 0);
    d.set(Discipline::CR_TO_NL, t.c_iflag & libc::ICRNL != 0);
    d.set(Discipline::FLOW_CONTROL, t.c_iflag & libc::IXON != 0);
    d
}

// ─── Raw Attribute Set ──────────────────────────────────────────────────────

/// `VMIN` in raw mode: a read may return with no bytes.
pub const RAW_MIN_BYTES: u8 = 0;

/// `VTIME` in raw mode, in tenths of a second (100 ms).
pub const RAW_TIMEOUT_DECISECONDS: u8 = 1;

/// Derive the raw attribute set from `original`.
///
/// Pure: the same input always produces the same output, and `original` is
/// never modified.
#[must_use]
pub fn make_raw(original: &libc::termios) -> libc::termios {
    let mut raw = *original;
    raw.c_iflag &= !(libc::ICRNL | libc::IXON);
    raw.c_oflag &= !libc::OPOST;
    raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);
    raw.c_cc[libc::VMIN] = RAW_MIN_BYTES;
    raw.c_cc[libc::VTIME] = RAW_TIMEOUT_DECISECONDS;
    raw
}

// ─── Snapshot ───────────────────────────────────────────────────────────────

/// The terminal's attributes as captured before any change.
///
/// Immutable once captured: there is no way to modify the record inside,
/// only to derive the raw set from it or write it back.
#[derive(Clone, Copy)]
pub struct Snapshot {
    termios: libc::termios,
}

impl Snapshot {
    /// Read the terminal's current attributes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CannotQuery`] if the attributes cannot be read.
    pub fn capture(tty: &impl Tty) -> Result<Self> {
        let termios = tty.get_attributes().map_err(Error::CannotQuery)?;
        let snapshot = Self { termios };
        debug!(discipline = ?snapshot.discipline(), "captured terminal attributes");
        Ok(snapshot)
    }

    /// Wrap an attribute record obtained elsewhere.
    #[must_use]
    pub const fn from_termios(termios: libc::termios) -> Self {
        Self { termios }
    }

    /// The raw attribute set derived from this snapshot.
    #[must_use]
    pub fn raw(&self) -> Self {
        Self {
            termios: make_raw(&self.termios),
        }
    }

    /// Which raw-mode-relevant features are enabled.
    #[must_use]
    pub fn discipline(&self) -> Discipline {
        discipline_of(&self.termios)
    }

    /// `VMIN`: minimum bytes a read waits for.
    #[must_use]
    pub const fn min_bytes(&self) -> u8 {
        self.termios.c_cc[libc::VMIN]
    }

    /// `VTIME`: read timeout in tenths of a second.
    #[must_use]
    pub const fn timeout_deciseconds(&self) -> u8 {
        self.termios.c_cc[libc::VTIME]
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.termios, &other.termios);
        a.c_iflag == b.c_iflag
            && a.c_oflag == b.c_oflag
            && a.c_cflag == b.c_cflag
            && a.c_lflag == b.c_lflag
            && a.c_cc == b.c_cc
    }
}

impl Eq for Snapshot {}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("discipline", &self.discipline())
            .field("vmin", &self.min_bytes())
            .field("vtime", &self.timeout_deciseconds())
            .finish_non_exhaustive()
    }
}

// ─── Mode Controller ────────────────────────────────────────────────────────

/// Install the raw attribute set derived from `snapshot`.
///
/// Queued input is discarded before the change takes effect, so bytes typed
/// before raw mode never show up as key events.
///
/// # Errors
///
/// Returns [`Error::CannotSet`] if the attributes cannot be installed.
pub fn apply_raw(tty: &mut impl Tty, snapshot: &Snapshot) -> Result<()> {
    tty.set_attributes(&make_raw(&snapshot.termios))
        .map_err(Error::CannotSet)
}

/// Write `snapshot` back, draining pending output first.
///
/// Draining is best-effort: the attributes are written back even when the
/// flush fails, and the flush error is reported only once they are.
///
/// # Errors
///
/// Returns [`Error::CannotSet`] if the attributes cannot be installed, or
/// [`Error::IoFailure`] if they were installed but pending output could not
/// be drained.
pub fn restore(tty: &mut impl Tty, snapshot: &Snapshot) -> Result<()> {
    let drained = tty.flush();
    if let Err(err) = &drained {
        warn!(%err, "pending output not drained before restore");
    }
    tty.set_attributes(&snapshot.termios)
        .map_err(Error::CannotSet)?;
    drained.map_err(Error::write)
}

// ─── RawMode Guard ──────────────────────────────────────────────────────────

/// Raw mode held on a terminal. Restores the original attributes on release.
///
/// Dereferences to the underlying [`Tty`] so the session reads and writes
/// through the guard while it is held.
///
/// # Example
///
/// ```no_run
/// use rawkey_term::terminal::RawMode;
/// use rawkey_term::tty::StdTty;
///
/// let mut tty = StdTty::new();
/// let raw = RawMode::enter(&mut tty)?;
/// // ... read keys, write output ...
/// raw.leave()?;
/// # Ok::<(), rawkey_term::error::Error>(())
/// ```
pub struct RawMode<'a, T: Tty> {
    tty: &'a mut T,
    /// `None` once restored.
    original: Option<Snapshot>,
}

impl<'a, T: Tty> RawMode<'a, T> {
    /// Capture the current attributes and switch to raw mode.
    ///
    /// If the switch fails after the capture succeeded, the captured
    /// attributes are written back before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CannotQuery`] if the capture fails (nothing was
    /// changed), or [`Error::CannotSet`] if raw mode cannot be installed.
    pub fn enter(tty: &'a mut T) -> Result<Self> {
        let snapshot = Snapshot::capture(&*tty)?;
        tty.arm_restore(&snapshot.termios);

        // From here on the guard owns restoration, including on the error path.
        let mut guard = Self {
            tty,
            original: Some(snapshot),
        };

        info!("configuring terminal for raw mode");
        apply_raw(&mut *guard.tty, &snapshot)?;
        Ok(guard)
    }

    /// Restore the original attributes and release the terminal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CannotSet`] if the attributes cannot be written back
    /// (or [`Error::IoFailure`] if pending output cannot be drained).
    pub fn leave(mut self) -> Result<()> {
        self.restore_once()
    }

    fn restore_once(&mut self) -> Result<()> {
        let Some(original) = self.original.take() else {
            return Ok(());
        };
        info!("resetting terminal attributes");
        let result = restore(&mut *self.tty, &original);
        // Attributes are back unless the set itself failed.
        if !matches!(result, Err(Error::CannotSet(_))) {
            self.tty.disarm_restore();
        }
        result
    }
}

impl<T: Tty> Deref for RawMode<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.tty
    }
}

impl<T: Tty> DerefMut for RawMode<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.tty
    }
}

impl<T: Tty> Drop for RawMode<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.restore_once() {
            warn!(%err, "terminal restore on drop failed");
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
