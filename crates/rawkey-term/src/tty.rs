// SPDX-License-Identifier: MIT
//
// Terminal device seam: the OS operations a session needs, and nothing else.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ), poll, read, sigaction and raw fd writes.
// These are the standard POSIX interfaces for terminal control. Each unsafe
// block is minimal.
#![allow(unsafe_code)]
//
// The session never touches a file descriptor directly. It talks to a `Tty`:
// get/set line-discipline attributes, ask for the window size, read one byte
// with a timeout, write bytes. `StdTty` is the real thing (stdin for input and
// attributes, stdout for output and geometry). Tests drive the same session
// code through a scripted in-memory device.
//
// `StdTty` also carries the process-wide safety nets that cannot live on a
// session object:
//
//   - a panic hook that restores the captured termios from a backup slot
//     before the original hook prints, so the panic message lands on a
//     working terminal;
//   - termination signal handlers (SIGTERM, SIGHUP, SIGINT) that only record
//     the signal in an atomic. The loop notices within one read timeout and
//     leaves through the normal restore path.

use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use tracing::warn;

use crate::terminal::Size;

// ─── Device Trait ───────────────────────────────────────────────────────────

/// The terminal operations a session is built from.
///
/// Output goes through the [`Write`] supertrait. Every method maps to a
/// single OS call on the real device.
pub trait Tty: Write {
    /// Read the current line-discipline attributes (`tcgetattr`).
    ///
    /// # Errors
    ///
    /// Returns the OS error if the input stream is not a terminal or the
    /// query fails.
    fn get_attributes(&self) -> io::Result<libc::termios>;

    /// Install `attrs`, discarding queued input and draining pending output
    /// first (`tcsetattr(TCSAFLUSH)`).
    ///
    /// The attributes are installed even if pending output cannot be
    /// drained.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the attributes cannot be installed.
    fn set_attributes(&mut self, attrs: &libc::termios) -> io::Result<()>;

    /// Query the window size (`ioctl(TIOCGWINSZ)`), as reported.
    ///
    /// Zero dimensions are passed through; deciding whether they are usable
    /// is the probe's job.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the query fails.
    fn window_size(&self) -> io::Result<Size>;

    /// Wait up to `timeout` for one input byte.
    ///
    /// `Ok(None)` means nothing arrived in time. End of input is an error
    /// of kind [`io::ErrorKind::UnexpectedEof`].
    ///
    /// # Errors
    ///
    /// Returns the OS error for any failure other than "no data yet".
    fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>>;

    /// Termination signal received since the last call, if any.
    fn take_signal(&mut self) -> Option<i32> {
        None
    }

    /// Remember `original` for emergency restoration (panic path).
    fn arm_restore(&mut self, _original: &libc::termios) {}

    /// Forget the emergency copy once the terminal has been restored.
    fn disarm_restore(&mut self) {}
}

// ─── Timed Read ─────────────────────────────────────────────────────────────

/// Wait up to `timeout` for `fd` to become readable, then read one byte.
///
/// `poll()` bounds the wait even when `fd` is not a terminal (or when the
/// termios read timer is not in effect), so a caller never blocks longer than
/// `timeout` plus scheduling slack. An interrupted wait counts as a timeout
/// so the caller can look at signal flags.
///
/// # Errors
///
/// Returns the OS error from `poll`/`read`, or
/// [`io::ErrorKind::UnexpectedEof`] if the stream is readable but empty.
pub fn read_byte_timeout(fd: RawFd, timeout: Duration) -> io::Result<Option<u8>> {
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

    let ready = unsafe {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        libc::poll(&raw mut pfd, 1, millis)
    };

    if ready < 0 {
        return no_data_or(io::Error::last_os_error());
    }
    if ready == 0 {
        return Ok(None);
    }

    let mut byte = 0u8;
    let n = unsafe { libc::read(fd, (&raw mut byte).cast::<libc::c_void>(), 1) };

    match n {
        1 => Ok(Some(byte)),
        0 => Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
        _ => no_data_or(io::Error::last_os_error()),
    }
}

/// EAGAIN and EINTR are "no data yet"; everything else is a real failure.
fn no_data_or(err: io::Error) -> io::Result<Option<u8>> {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(None),
        _ => Err(err),
    }
}

// ─── Panic-Safe Restore ─────────────────────────────────────────────────────

/// Backup of the original termios for the panic hook, which cannot reach
/// the session's own snapshot.
static TERMIOS_BACKUP: Mutex<Option<(RawFd, libc::termios)>> = Mutex::new(None);

/// Show the cursor again. The refresh protocol hides it between writes.
const EMERGENCY_RESTORE: &[u8] = b"\x1b[?25h";

static PANIC_HOOK_INSTALLED: Once = Once::new();

fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some((fd, ref original)) = *guard {
            unsafe {
                let _ = libc::tcsetattr(fd, libc::TCSAFLUSH, original);
            }
        }
    }
}

/// Install (once per process) a panic hook that restores the terminal and
/// then delegates to the original hook.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            // Straight to fd 1: the panic may have happened under the stdout lock.
            unsafe {
                let _ = libc::write(
                    libc::STDOUT_FILENO,
                    EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
                    EMERGENCY_RESTORE.len(),
                );
            }
            restore_termios_from_backup();
            original(info);
        }));
    });
}

// ─── Termination Signals ────────────────────────────────────────────────────

/// Last termination signal received, or 0.
static TERMINATION_SIGNAL: AtomicI32 = AtomicI32::new(0);

static SIGNAL_HANDLERS_INSTALLED: Once = Once::new();

/// Signals that end the session through the normal restore path.
const TERMINATION_SIGNALS: [libc::c_int; 3] = [libc::SIGTERM, libc::SIGHUP, libc::SIGINT];

extern "C" fn termination_handler(sig: libc::c_int) {
    TERMINATION_SIGNAL.store(sig, Ordering::Relaxed);
}

/// Route termination signals into [`TERMINATION_SIGNAL`].
///
/// No `SA_RESTART`: an interrupted `poll()` returns early so the loop sees
/// the flag without waiting out the full read timeout.
fn install_signal_handlers() {
    SIGNAL_HANDLERS_INSTALLED.call_once(|| unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = termination_handler as *const () as usize;
        sa.sa_flags = 0;
        libc::sigemptyset(&raw mut sa.sa_mask);
        for sig in TERMINATION_SIGNALS {
            libc::sigaction(sig, &raw const sa, std::ptr::null_mut());
        }
    });
}

// ─── StdTty ─────────────────────────────────────────────────────────────────

/// The process's controlling terminal: attributes and input on stdin,
/// output and geometry on stdout.
pub struct StdTty {
    input: RawFd,
    output: RawFd,
    stdout: io::Stdout,
}

impl StdTty {
    /// Open the standard streams and install the process-wide safety nets
    /// (panic hook, termination signal handlers).
    #[must_use]
    pub fn new() -> Self {
        install_panic_hook();
        install_signal_handlers();

        Self {
            input: libc::STDIN_FILENO,
            output: libc::STDOUT_FILENO,
            stdout: io::stdout(),
        }
    }

}

impl Default for StdTty {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for StdTty {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdout.lock().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stdout.lock().write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.lock().flush()
    }
}

impl Tty for StdTty {
    fn get_attributes(&self) -> io::Result<libc::termios> {
        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(self.input, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(termios)
        }
    }

    fn set_attributes(&mut self, attrs: &libc::termios) -> io::Result<()> {
        // Pending output should reach the terminal under the old settings,
        // but a dead stdout must never keep the attributes from changing.
        if let Err(err) = self.stdout.lock().flush() {
            warn!(%err, "pending output not drained before attribute change");
        }
        unsafe {
            if libc::tcsetattr(self.input, libc::TCSAFLUSH, attrs) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    fn window_size(&self) -> io::Result<Size> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::ioctl(self.output, libc::TIOCGWINSZ, &raw mut ws) };

        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    }

    fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
        read_byte_timeout(self.input, timeout)
    }

    fn take_signal(&mut self) -> Option<i32> {
        match TERMINATION_SIGNAL.swap(0, Ordering::Relaxed) {
            0 => None,
            sig => Some(sig),
        }
    }

    fn arm_restore(&mut self, original: &libc::termios) {
        if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
            *guard = Some((self.input, *original));
        }
    }

    fn disarm_restore(&mut self) {
        if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
            *guard = None;
        }
    }
}

// ─── Scripted Device (tests) ────────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────
