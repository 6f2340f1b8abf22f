//! Per-socket buffers: the outbound write queue and inbound refills.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use prebot_proto::LineBuffer;

use crate::error::ReactorError;

const READ_CHUNK: usize = 4096;

/// One queued write, possibly partly transmitted.
#[derive(Debug)]
struct WriteAction {
    data: Vec<u8>,
    written: usize,
}

impl WriteAction {
    fn remaining(&self) -> &[u8] {
        &self.data[self.written..]
    }
}

/// Outcome of a flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    /// Every queued byte was accepted.
    Drained,
    /// The socket stopped accepting bytes; the rest waits for writability.
    Blocked,
}

/// FIFO of pending writes. An action leaves the queue only once all of its
/// bytes have been accepted by the writer.
#[derive(Debug, Default)]
pub struct WriteQueue {
    actions: VecDeque<WriteAction>,
}

impl WriteQueue {
    pub fn push(&mut self, data: Vec<u8>) {
        if !data.is_empty() {
            self.actions.push_back(WriteAction { data, written: 0 });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Bytes still waiting to be written.
    pub fn pending_bytes(&self) -> usize {
        self.actions.iter().map(|a| a.remaining().len()).sum()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Write queued actions in order until the queue is empty or the writer
    /// would block.
    pub fn flush_into<W: Write>(&mut self, writer: &mut W) -> io::Result<FlushState> {
        while let Some(action) = self.actions.front_mut() {
            match writer.write(action.remaining()) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    action.written += n;
                    if action.remaining().is_empty() {
                        self.actions.pop_front();
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(FlushState::Blocked),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(FlushState::Drained)
    }
}

/// Read one chunk from `reader` into `buf`.
///
/// Returns `Ok(true)` when bytes were appended and `Ok(false)` when the
/// reader would block. End of stream is [`ReactorError::Closed`].
pub fn fill_from<R: Read>(reader: &mut R, buf: &mut LineBuffer) -> Result<bool, ReactorError> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => return Err(ReactorError::Closed),
            Ok(n) => {
                buf.extend(&chunk[..n]);
                return Ok(true);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
