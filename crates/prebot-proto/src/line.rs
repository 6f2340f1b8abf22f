//! Inbound line reassembly.
//!
//! Bytes arrive from the socket in arbitrary chunks. [`LineBuffer`] keeps the
//! unterminated tail between reads and hands out complete lines, accepting
//! both `\r\n` and bare `\n` terminators.

use bytes::BytesMut;

use crate::error::{ProtocolError, Result};

/// Default maximum line length, generous enough for tagged IRCv3 traffic.
pub const DEFAULT_MAX_LINE_LEN: usize = 8191;

/// Growable receive buffer that splits on `\n`.
///
/// ```
/// use prebot_proto::LineBuffer;
///
/// let mut buf = LineBuffer::new();
/// buf.extend(b"PING :a\r\nPI");
/// assert_eq!(buf.next_line().unwrap().as_deref(), Some("PING :a"));
/// assert_eq!(buf.next_line().unwrap(), None);
/// buf.extend(b"NG :b\n");
/// assert_eq!(buf.next_line().unwrap().as_deref(), Some("PING :b"));
/// ```
#[derive(Debug)]
pub struct LineBuffer {
    buf: BytesMut,
    /// Index of next byte to check for newline
    next_index: usize,
    max_len: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    /// Buffer with [`DEFAULT_MAX_LINE_LEN`].
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Buffer with a custom line limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(512),
            next_index: 0,
            max_len,
        }
    }

    /// Append freshly received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.next_index = 0;
    }

    /// Take the next complete line without its terminator.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. A line longer than
    /// the limit is discarded and reported as [`ProtocolError::LineTooLong`];
    /// if no terminator has arrived yet the whole buffer is dropped.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(offset) = self.buf[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = self.buf.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            let mut end = line.len() - 1;
            if end > 0 && line[end - 1] == b'\r' {
                end -= 1;
            }
            if end > self.max_len {
                return Err(ProtocolError::LineTooLong {
                    actual: end,
                    limit: self.max_len,
                });
            }

            Ok(Some(String::from_utf8_lossy(&line[..end]).into_owned()))
        } else {
            self.next_index = self.buf.len();

            if self.buf.len() > self.max_len {
                let actual = self.buf.len();
                self.clear();
                return Err(ProtocolError::LineTooLong {
                    actual,
                    limit: self.max_len,
                });
            }

            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(buf: &mut LineBuffer) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(line) = buf.next_line().unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn test_mixed_terminators() {
        let mut buf = LineBuffer::new();
        buf.extend(b"a\r\nb\nc\r\n");
        assert_eq!(drain(&mut buf), vec!["a", "b", "c"]);
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buf = LineBuffer::new();
        let mut lines = Vec::new();
        for b in b":srv 001 bot :Welcome\r\n" {
            buf.extend(&[*b]);
            lines.extend(drain(&mut buf));
        }
        assert_eq!(lines, vec![":srv 001 bot :Welcome"]);
    }

    #[test]
    fn test_cr_split_from_lf() {
        let mut buf = LineBuffer::new();
        buf.extend(b"PING :x\r");
        assert_eq!(buf.next_line().unwrap(), None);
        buf.extend(b"\n");
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("PING :x"));
    }

    #[test]
    fn test_empty_line() {
        let mut buf = LineBuffer::new();
        buf.extend(b"\r\n");
        assert_eq!(buf.next_line().unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut buf = LineBuffer::new();
        buf.extend(b"caf\xe9\r\n");
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("caf\u{fffd}"));
    }

    #[test]
    fn test_overlong_unterminated_is_dropped() {
        let mut buf = LineBuffer::with_max_len(8);
        buf.extend(b"0123456789");
        assert!(matches!(
            buf.next_line(),
            Err(ProtocolError::LineTooLong { actual: 10, limit: 8 })
        ));
        assert_eq!(buf.pending(), 0);

        buf.extend(b"ok\n");
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("ok"));
    }

    #[test]
    fn test_overlong_terminated_is_skipped() {
        let mut buf = LineBuffer::with_max_len(4);
        buf.extend(b"toolong\nfine\n");
        assert!(buf.next_line().is_err());
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("fine"));
    }
}
