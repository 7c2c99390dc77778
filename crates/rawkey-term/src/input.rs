// SPDX-License-Identifier: MIT
//
// Key decoding: one raw byte in, one semantic event out.
//
// Classification is a pure function of the byte and the keymap:
//
//   3  (ETX, Ctrl-C)        → Interrupt. ISIG is off in raw mode, so this
//                              arrives as a byte instead of SIGINT and the
//                              application decides what to do with it.
//   26 (SUB, Ctrl-Z)        → Quit while `suspend_quits` is set, otherwise
//                              the unbound combo Ctrl('z').
//   ctrl(quit letter)       → Quit      (Ctrl-Q by default)
//   ctrl(refresh letter)    → Refresh   (Ctrl-K by default)
//   anything else           → Char(byte)
//
// There is no escape-sequence state: an arrow key arrives as three bytes and
// decodes as three `Char` events. A pending-escape state with its own timer
// can sit in `Decoder` later without changing `read_event`'s contract.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::tty::Tty;

/// ASCII ETX, sent by Ctrl-C.
pub const INTERRUPT: u8 = 3;

/// ASCII SUB, sent by Ctrl-Z.
pub const SUSPEND: u8 = 26;

/// The byte a terminal sends for Ctrl + `letter`.
#[inline]
#[must_use]
pub const fn ctrl(letter: u8) -> u8 {
    letter & 0x1f
}

// ─── Event Types ────────────────────────────────────────────────────────────

/// A decoded key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Any byte without a binding, carried as-is.
    Char(u8),
    /// A control combo with no action bound, carrying its base letter.
    Ctrl(char),
    /// End the session.
    Quit,
    /// Repaint the screen.
    Refresh,
    /// Ctrl-C, delivered as a key rather than a signal.
    Interrupt,
}

// ─── Keymap ─────────────────────────────────────────────────────────────────

/// Control-key bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keymap {
    /// Letter whose control combo quits.
    pub quit: u8,
    /// Letter whose control combo requests a repaint.
    pub refresh: u8,
    /// Whether Ctrl-Z (byte 26) quits as well.
    pub suspend_quits: bool,
}

/// Ctrl-Q quits, Ctrl-K refreshes, Ctrl-Z quits too.
pub const DEFAULT_KEYMAP: Keymap = Keymap {
    quit: b'q',
    refresh: b'k',
    suspend_quits: true,
};

impl Default for Keymap {
    fn default() -> Self {
        DEFAULT_KEYMAP
    }
}

impl Keymap {
    /// Classify a single input byte.
    #[must_use]
    pub const fn classify(&self, byte: u8) -> Event {
        if byte == INTERRUPT {
            Event::Interrupt
        } else if byte == SUSPEND {
            if self.suspend_quits {
                Event::Quit
            } else {
                Event::Ctrl('z')
            }
        } else if byte == ctrl(self.quit) {
            Event::Quit
        } else if byte == ctrl(self.refresh) {
            Event::Refresh
        } else {
            Event::Char(byte)
        }
    }
}

/// Classify `byte` with the default keymap.
#[inline]
#[must_use]
pub const fn classify(byte: u8) -> Event {
    DEFAULT_KEYMAP.classify(byte)
}

// ─── Decoder ────────────────────────────────────────────────────────────────

/// Reads one byte per call and classifies it.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    keymap: Keymap,
    timeout: Duration,
}

impl Decoder {
    /// Create a decoder with the given bindings and read timeout.
    #[must_use]
    pub const fn new(keymap: Keymap, timeout: Duration) -> Self {
        Self { keymap, timeout }
    }

    /// Make exactly one timed read attempt.
    ///
    /// Returns `Ok(None)` when the timeout elapses with no input. That is
    /// not an error; the caller keeps polling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IoFailure`] if the read fails or input has ended.
    pub fn read_event(&self, tty: &mut impl Tty) -> Result<Option<Event>> {
        let byte = tty.read_byte(self.timeout).map_err(Error::read)?;
        Ok(byte.map(|b| self.keymap.classify(b)))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(Keymap::default(), Duration::from_millis(100))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tty::fake::{ScriptedTty, Step};

    // ── Classification ──────────────────────────────────────────────

    #[test]
    fn ctrl_masks_letter() {
        assert_eq!(ctrl(b'q'), 17);
        assert_eq!(ctrl(b'k'), 11);
        assert_eq!(ctrl(b'c'), INTERRUPT);
        assert_eq!(ctrl(b'z'), SUSPEND);
    }

    #[test]
    fn ctrl_q_quits() {
        assert_eq!(classify(17), Event::Quit);
    }

    #[test]
    fn ctrl_k_refreshes() {
        assert_eq!(classify(11), Event::Refresh);
    }

    #[test]
    fn ctrl_c_is_interrupt_notice() {
        assert_eq!(classify(3), Event::Interrupt);
    }

    #[test]
    fn plain_letter_is_char() {
        assert_eq!(classify(97), Event::Char(97));
    }

    #[test]
    fn ctrl_z_quits_by_default() {
        assert_eq!(classify(SUSPEND), Event::Quit);
    }

    #[test]
    fn ctrl_z_is_combo_when_not_conflated() {
        let keymap = Keymap {
            suspend_quits: false,
            ..Keymap::default()
        };
        assert_eq!(keymap.classify(SUSPEND), Event::Ctrl('z'));
    }

    #[test]
    fn escape_bytes_classify_independently() {
        // Up arrow: ESC [ A
        let events: Vec<_> = b"\x1b[A".iter().map(|&b| classify(b)).collect();
        assert_eq!(
            events,
            vec![Event::Char(0x1b), Event::Char(b'['), Event::Char(b'A')]
        );
    }

    #[test]
    fn unbound_control_bytes_pass_through() {
        assert_eq!(classify(b'\r'), Event::Char(b'\r'));
        assert_eq!(classify(b'\t'), Event::Char(b'\t'));
        assert_eq!(classify(ctrl(b's')), Event::Char(19));
    }

    #[test]
    fn rebound_keys() {
        let keymap = Keymap {
            quit: b'x',
            refresh: b'r',
            suspend_quits: true,
        };
        assert_eq!(keymap.classify(ctrl(b'x')), Event::Quit);
        assert_eq!(keymap.classify(ctrl(b'r')), Event::Refresh);
        assert_eq!(keymap.classify(17), Event::Char(17));
    }

    #[test]
    fn classification_is_pure() {
        for b in 0..=u8::MAX {
            assert_eq!(classify(b), classify(b));
            assert_eq!(classify(b), Keymap::default().classify(b));
            assert_eq!(classify(b), DEFAULT_KEYMAP.classify(b));
        }
    }

    // ── Decoder ─────────────────────────────────────────────────────

    #[test]
    fn decoder_defaults() {
        let d = Decoder::default();
        assert_eq!(d.timeout, Duration::from_millis(100));
        assert_eq!(d.keymap, DEFAULT_KEYMAP);
    }

    #[test]
    fn read_event_classifies_and_times_out() {
        let mut tty = ScriptedTty::with_script([Step::Byte(b'h'), Step::Timeout, Step::Byte(17)]);
        let d = Decoder::default();

        assert_eq!(d.read_event(&mut tty).unwrap(), Some(Event::Char(b'h')));
        assert_eq!(d.read_event(&mut tty).unwrap(), None);
        assert_eq!(d.read_event(&mut tty).unwrap(), Some(Event::Quit));
    }

    #[test]
    fn read_event_failure_is_io_failure() {
        let mut tty = ScriptedTty::new(b"a");
        tty.fail.read = true;
        assert!(matches!(
            Decoder::default().read_event(&mut tty),
            Err(Error::IoFailure { op: "read", .. })
        ));
    }

    #[test]
    fn read_event_end_of_input_is_io_failure() {
        let mut tty = ScriptedTty::new(&[]);
        assert!(matches!(
            Decoder::default().read_event(&mut tty),
            Err(Error::IoFailure { .. })
        ));
    }
}
