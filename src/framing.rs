//! Reassembly of newline-delimited records from a byte stream.
//!
//! A stream read may return half a record, several records, or a record
//! split at any byte. [`LineFramer`] keeps the trailing partial record in
//! a fixed-capacity buffer and hands out every complete line.
//!
//! Any line longer than the buffer is reported once as
//! [`FrameError::Overflow`], whether it arrived in one read or many, and
//! the rest of that line is skipped; framing resumes cleanly after the
//! next terminator.
//!
//! # Example
//!
//! ```
//! use rc_link::framing::LineFramer;
//!
//! let mut framer = LineFramer::new();
//! let mut lines = Vec::new();
//!
//! framer.feed(b"{\"gear\":\"1\"}\n{\"ge", |line| lines.push(line.unwrap().to_vec()));
//! framer.feed(b"ar\":\"2\"}\n", |line| lines.push(line.unwrap().to_vec()));
//!
//! assert_eq!(lines, vec![b"{\"gear\":\"1\"}".to_vec(), b"{\"gear\":\"2\"}".to_vec()]);
//! assert_eq!(framer.pending(), 0);
//! ```

use heapless::Vec as HVec;

use crate::messages::{FrameError, RECORD_TERMINATOR};

/// Default receive buffer capacity in bytes.
pub const FRAME_BUFFER_CAPACITY: usize = 1024;

/// Line reassembly buffer owned by one session.
#[derive(Debug, Default)]
pub struct LineFramer<const N: usize = FRAME_BUFFER_CAPACITY> {
    partial: HVec<u8, N>,
    skipping: bool,
}

impl LineFramer<FRAME_BUFFER_CAPACITY> {
    /// Framer with the default capacity.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<const N: usize> LineFramer<N> {
    /// Framer with capacity `N`.
    pub fn with_capacity() -> Self {
        Self {
            partial: HVec::new(),
            skipping: false,
        }
    }

    /// Bytes of an incomplete record currently buffered.
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    /// Drop any buffered partial record.
    pub fn clear(&mut self) {
        self.partial.clear();
        self.skipping = false;
    }

    /// Append `data` and call `on_line` for every complete line, in order.
    ///
    /// Lines are passed without their terminator. Blank lines are skipped.
    /// Returns the number of callbacks made.
    pub fn feed<F>(&mut self, data: &[u8], mut on_line: F) -> usize
    where
        F: FnMut(Result<&[u8], FrameError>),
    {
        let mut emitted = 0;

        for piece in data.split_inclusive(|b| *b == RECORD_TERMINATOR) {
            let (body, complete) = match piece.split_last() {
                Some((&RECORD_TERMINATOR, body)) => (body, true),
                _ => (piece, false),
            };

            if self.skipping {
                if complete {
                    self.skipping = false;
                }
                continue;
            }

            if !complete {
                if self.partial.extend_from_slice(body).is_err() {
                    self.partial.clear();
                    self.skipping = true;
                    on_line(Err(FrameError::Overflow { limit: N }));
                    emitted += 1;
                }
                continue;
            }

            if self.partial.is_empty() {
                if body.len() > N {
                    on_line(Err(FrameError::Overflow { limit: N }));
                    emitted += 1;
                } else if !body.is_empty() {
                    on_line(Ok(body));
                    emitted += 1;
                }
                continue;
            }

            if self.partial.extend_from_slice(body).is_err() {
                self.partial.clear();
                on_line(Err(FrameError::Overflow { limit: N }));
                emitted += 1;
                continue;
            }
            on_line(Ok(self.partial.as_slice()));
            emitted += 1;
            self.partial.clear();
        }

        emitted
    }
}
