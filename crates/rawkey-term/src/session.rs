// SPDX-License-Identifier: MIT
//
// Session lifecycle: probe, raw mode, key loop, restore.
//
//   Uninitialized ──probe + capture + apply──▶ RawModeActive ──▶ Terminated
//         │                                                         ▲
//         └──────────────── probe / capture / apply failed ─────────┘
//
// The session is the only place that decides to stop. Components hand their
// errors up; the session ends the loop and releases the `RawMode` guard,
// whose release is the one and only restore. Geometry is probed before the
// attributes are captured, so a terminal without a usable size is rejected
// without ever being touched.
//
// # The loop
//
// One thread, one suspension point: the timed read. Each iteration either
// times out (check for a termination signal, poll again) or yields exactly
// one key:
//
//   Quit      → clear the screen, leave
//   Refresh   → repaint with the geometry probed at startup
//   Interrupt → print the notice, keep going
//   Char      → echo it on its own line with a fresh prompt
//   Ctrl      → unbound, ignored
//
// Output for the iteration is collected in an `OutputBuffer` and written in
// one go. A failed write is as fatal as a failed read.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::input::{Decoder, Event, Keymap};
use crate::output::{self, OutputBuffer};
use crate::terminal::{self, RawMode, Size};
use crate::tty::Tty;

// ─── Config ──────────────────────────────────────────────────────────────────

/// Session behaviour knobs.
///
/// The defaults match a classic raw-mode key echo: 100 ms reads, Ctrl-Q to
/// quit, Ctrl-K to repaint, Ctrl-Z conflated with quit.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long one read waits for a byte.
    pub read_timeout: Duration,
    /// Control-key bindings.
    pub keymap: Keymap,
    /// Printed when Ctrl-C arrives.
    pub interrupt_notice: String,
    /// Printed at the start of each new input line.
    pub prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            keymap: Keymap::default(),
            interrupt_notice: String::from("lol no"),
            prompt: String::from("> "),
        }
    }
}

// ─── State / Exit ────────────────────────────────────────────────────────────

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Created; the terminal has not been touched.
    Uninitialized,
    /// Raw mode installed, key loop running.
    RawModeActive,
    /// Finished. Original attributes restored if they were ever captured.
    Terminated,
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The user quit.
    Quit,
    /// A termination signal arrived.
    Signal(i32),
}

impl Exit {
    /// Process exit code: 0 for a quit, `128 + signal` otherwise.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Quit => 0,
            Self::Signal(sig) => 128 + sig,
        }
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// One raw-mode key session on a terminal.
///
/// # Example
///
/// ```no_run
/// use rawkey_term::session::Session;
/// use rawkey_term::tty::StdTty;
///
/// let mut session = Session::new(StdTty::new());
/// let code = match session.run() {
///     Ok(exit) => exit.code(),
///     Err(e) => {
///         eprintln!("{e}");
///         e.exit_code()
///     }
/// };
/// std::process::exit(code);
/// ```
pub struct Session<T: Tty> {
    tty: T,
    config: SessionConfig,
    state: State,
    size: Option<Size>,
}

impl<T: Tty> Session<T> {
    /// Create a session with default configuration.
    #[must_use]
    pub fn new(tty: T) -> Self {
        Self::with_config(tty, SessionConfig::default())
    }

    /// Create a session with custom configuration.
    #[must_use]
    pub const fn with_config(tty: T, config: SessionConfig) -> Self {
        Self {
            tty,
            config,
            state: State::Uninitialized,
            size: None,
        }
    }

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Geometry probed at startup. `None` until the probe succeeds.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Option<Size> {
        self.size
    }

    /// The configuration in use.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying terminal.
    #[inline]
    #[must_use]
    pub const fn tty(&self) -> &T {
        &self.tty
    }

    /// Consume the session and hand back the terminal.
    #[must_use]
    pub fn into_tty(self) -> T {
        self.tty
    }

    /// Run the session to completion.
    ///
    /// Sessions are single-use: once terminated, further calls return
    /// `Ok(Exit::Quit)` without touching the terminal.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: [`Error::NoGeometry`] from the probe,
    /// [`Error::CannotQuery`] / [`Error::CannotSet`] from entering or leaving
    /// raw mode, [`Error::IoFailure`] from the loop. The original attributes
    /// have been restored (best-effort) whenever they were captured.
    pub fn run(&mut self) -> Result<Exit> {
        if self.state != State::Uninitialized {
            warn!(state = ?self.state, "session already ran");
            return Ok(Exit::Quit);
        }

        let result = self.run_inner();
        self.state = State::Terminated;

        match &result {
            Ok(exit) => info!(?exit, "session terminated"),
            Err(err) => error!(%err, "session failed"),
        }
        result
    }

    fn run_inner(&mut self) -> Result<Exit> {
        let size = terminal::probe(&self.tty)?;
        self.size = Some(size);

        let Self {
            tty, config, state, ..
        } = self;

        let mut raw = RawMode::enter(tty)?;
        *state = State::RawModeActive;

        let outcome = event_loop(&mut *raw, config, size);

        // Always restore, even if the loop failed. The loop's error wins.
        let restored = raw.leave();
        let exit = outcome?;
        restored?;
        Ok(exit)
    }
}

/// The key loop. Returns on quit, termination signal, or the first error.
fn event_loop(tty: &mut impl Tty, config: &SessionConfig, size: Size) -> Result<Exit> {
    let decoder = Decoder::new(config.keymap, config.read_timeout);
    let mut out = OutputBuffer::new();

    loop {
        if let Some(sig) = tty.take_signal() {
            info!(sig, "termination signal received");
            return Ok(Exit::Signal(sig));
        }

        let Some(event) = decoder.read_event(tty)? else {
            continue;
        };

        let quit = handle(&mut out, event, config, size).map_err(Error::write)?;
        out.flush_to(tty).map_err(Error::write)?;

        if quit {
            return Ok(Exit::Quit);
        }
    }
}

/// Render the response to one key into `out`. Returns `true` on quit.
fn handle(
    out: &mut OutputBuffer,
    event: Event,
    config: &SessionConfig,
    size: Size,
) -> std::io::Result<bool> {
    match event {
        Event::Quit => {
            debug!("quit requested");
            output::clear(out)?;
            return Ok(true);
        }
        Event::Refresh => output::refresh(out, size.rows)?,
        Event::Interrupt => output::notice(out, &config.interrupt_notice, &config.prompt)?,
        Event::Char(byte) => output::echo(out, byte, &config.prompt)?,
        Event::Ctrl(letter) => debug!(%letter, "unbound control combo"),
    }
    Ok(false)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
