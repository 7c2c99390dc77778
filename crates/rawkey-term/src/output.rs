// SPDX-License-Identifier: MIT
//
// Output buffering and screen rendering.
//
//   OutputBuffer accumulates every byte of one loop iteration in memory so
//   it reaches the terminal in a single write(). The terminal never sees a
//   half-drawn frame, and a failed write fails the whole frame at once.
//
//   clear / redraw / refresh implement the screen protocol. Refresh is ordered so
//   the cursor is never visible while it travels across a blank screen:
//
//     hide cursor → erase display → cursor home → "~\r\n" × rows
//                 → cursor home → show cursor
//
// Output post-processing is off in raw mode, so every line break here is an
// explicit "\r\n".

use std::io::{self, Write};

use crate::ansi;

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// A byte buffer that accumulates terminal output for a single `write()`.
pub struct OutputBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 4096;

impl OutputBuffer {
    /// Create an empty buffer with default capacity (4 KB).
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Write accumulated output to `w` and clear the buffer.
    ///
    /// The buffer is cleared even if the write fails; a partial frame is
    /// never retried.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let result = w.write_all(&self.buf).and_then(|()| w.flush());
        self.buf.clear();
        result
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // No-op. Real flushing goes through flush_to().
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Placeholder for a row with no content.
pub const EMPTY_ROW: &[u8] = b"~\r\n";

/// Erase the display, then put the cursor home.
///
/// # Errors
///
/// Propagates write errors from `w`.
pub fn clear(w: &mut impl Write) -> io::Result<()> {
    ansi::clear_screen(w)?;
    ansi::cursor_home(w)
}

/// Draw `rows` placeholder rows from the cursor position down.
///
/// # Errors
///
/// Propagates write errors from `w`.
pub fn redraw(w: &mut impl Write, rows: u16) -> io::Result<()> {
    for _ in 0..rows {
        w.write_all(EMPTY_ROW)?;
    }
    Ok(())
}

/// Repaint the whole screen without the cursor visibly jumping.
///
/// # Errors
///
/// Propagates write errors from `w`.
pub fn refresh(w: &mut impl Write, rows: u16) -> io::Result<()> {
    ansi::cursor_hide(w)?;
    clear(w)?;
    redraw(w, rows)?;
    ansi::cursor_home(w)?;
    ansi::cursor_show(w)
}

/// Echo a typed byte, then start a fresh prompt line.
///
/// # Errors
///
/// Propagates write errors from `w`.
pub fn echo(w: &mut impl Write, byte: u8, prompt: &str) -> io::Result<()> {
    w.write_all(&[byte])?;
    w.write_all(b"\r\n")?;
    w.write_all(prompt.as_bytes())
}

/// Print a one-line notice, then start a fresh prompt line.
///
/// # Errors
///
/// Propagates write errors from `w`.
pub fn notice(w: &mut impl Write, text: &str, prompt: &str) -> io::Result<()> {
    w.write_all(b"\r")?;
    w.write_all(text.as_bytes())?;
    w.write_all(b"\r\n")?;
    w.write_all(prompt.as_bytes())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HIDE: &[u8] = b"\x1b[?25l";
    const SHOW: &[u8] = b"\x1b[?25h";
    const ERASE: &[u8] = b"\x1b[2J";
    const HOME: &[u8] = b"\x1b[H";

    fn render<F>(f: F) -> Vec<u8>
    where
        F: FnOnce(&mut OutputBuffer) -> io::Result<()>,
    {
        let mut buf = OutputBuffer::new();
        f(&mut buf).unwrap();
        buf.buf
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).rposition(|w| w == needle)
    }

    // ── OutputBuffer ────────────────────────────────────────────────────

    #[test]
    fn output_buffer_new_is_empty() {
        let buf = OutputBuffer::new();
        assert!(buf.buf.is_empty());
        assert!(buf.buf.capacity() >= DEFAULT_CAPACITY);
    }

    #[test]
    fn output_buffer_write_trait() {
        let mut buf = OutputBuffer::new();
        write!(buf, "hello {}", 42).unwrap();
        assert_eq!(buf.buf, b"hello 42");
    }

    #[test]
    fn output_buffer_flush_keeps_capacity() {
        let mut buf = OutputBuffer::new();
        write!(buf, "some data").unwrap();
        let cap = buf.buf.capacity();
        buf.flush_to(&mut Vec::new()).unwrap();
        assert!(buf.buf.is_empty());
        assert_eq!(buf.buf.capacity(), cap);
    }

    #[test]
    fn output_buffer_flush_to_writer() {
        let mut buf = OutputBuffer::new();
        write!(buf, "frame").unwrap();
        let mut out = Vec::new();
        buf.flush_to(&mut out).unwrap();
        assert_eq!(out, b"frame");
        assert!(buf.buf.is_empty());
    }

    #[test]
    fn output_buffer_flush_empty_writes_nothing() {
        let mut buf = OutputBuffer::new();
        let mut out = Vec::new();
        buf.flush_to(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn output_buffer_failed_flush_discards_frame() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut buf = OutputBuffer::new();
        write!(buf, "frame").unwrap();
        assert!(buf.flush_to(&mut Broken).is_err());
        assert!(buf.buf.is_empty());
    }

    // ── Screen ──────────────────────────────────────────────────────────

    #[test]
    fn clear_erases_then_homes() {
        assert_eq!(render(|w| clear(w)), b"\x1b[2J\x1b[H");
    }

    #[test]
    fn redraw_writes_one_placeholder_per_row() {
        assert_eq!(render(|w| redraw(w, 3)), b"~\r\n~\r\n~\r\n");
    }

    #[test]
    fn redraw_zero_rows_writes_nothing() {
        assert!(render(|w| redraw(w, 0)).is_empty());
    }

    #[test]
    fn refresh_exact_sequence() {
        assert_eq!(
            render(|w| refresh(w, 2)),
            b"\x1b[?25l\x1b[2J\x1b[H~\r\n~\r\n\x1b[H\x1b[?25h".to_vec()
        );
    }

    #[test]
    fn refresh_hides_first_and_shows_after_home() {
        for rows in [0, 1, 24, 200] {
            let out = render(|w| refresh(w, rows));

            let hide = find(&out, HIDE).unwrap();
            let erase = find(&out, ERASE).unwrap();
            let last_home = rfind(&out, HOME).unwrap();
            let show = find(&out, SHOW).unwrap();

            assert_eq!(hide, 0, "rows={rows}");
            assert!(hide < erase, "rows={rows}");
            assert!(last_home < show, "rows={rows}");
            assert_eq!(show + SHOW.len(), out.len(), "rows={rows}");
        }
    }

    #[test]
    fn refresh_24_rows_draws_24_placeholders() {
        let out = render(|w| refresh(w, 24));
        let count = out.windows(EMPTY_ROW.len()).filter(|w| *w == EMPTY_ROW).count();
        assert_eq!(count, 24);
    }

    #[test]
    fn echo_breaks_line_and_prompts() {
        assert_eq!(render(|w| echo(w, b'h', "> ")), b"h\r\n> ");
    }

    #[test]
    fn notice_returns_to_column_zero() {
        assert_eq!(render(|w| notice(w, "nope", "> ")), b"\rnope\r\n> ");
    }
}
