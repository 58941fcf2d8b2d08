//! A growable, heap-backed byte sink.

use super::{ByteSink, DataView};
use crate::error::{MachCodeError, Result};

/// Owns a growable ordered sequence of bytes.
///
/// This is the sink a caller should build into when emission is not
/// all-or-nothing safe to do directly into executable memory: prepare here,
/// then copy into an [`ExecutableBuffer`](super::ExecutableBuffer) once every
/// instruction has been emitted successfully.
#[derive(Debug, Default, Clone)]
pub struct AppendableBuffer {
    bytes: Vec<u8>,
}

impl AppendableBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Create an empty buffer with room for at least `capacity` bytes
    /// without reallocating.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Discard all bytes written so far; the buffer's capacity is retained.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

impl ByteSink for AppendableBuffer {
    fn append(&mut self, byte: u8) -> Result<()> {
        // `Vec::push` aborts on allocation failure rather than returning an
        // error; we cannot intercept that, so this only ever fails in
        // principle. Kept fallible to satisfy the shared `ByteSink`
        // contract and to leave room for a future fallible-allocation path.
        if self.bytes.len() == self.bytes.capacity() && self.bytes.try_reserve(1).is_err() {
            return Err(MachCodeError::OutOfMemory);
        }
        self.bytes.push(byte);
        Ok(())
    }

    fn append_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.bytes.try_reserve(bytes.len()).is_err() {
            return Err(MachCodeError::OutOfMemory);
        }
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl DataView for AppendableBuffer {
    fn data(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_tracks_appended_bytes() {
        let mut buf = AppendableBuffer::new();
        buf.append(0x11).unwrap();
        buf.append_bytes(&[0x22, 0x33]).unwrap();
        assert_eq!(buf.size(), 3);
        assert_eq!(buf.data(), &[0x11, 0x22, 0x33]);
    }

    #[test]
    fn clear_resets_size_but_not_capacity() {
        let mut buf = AppendableBuffer::with_capacity(16);
        buf.append_bytes(&[1, 2, 3, 4]).unwrap();
        buf.clear();
        assert_eq!(buf.size(), 0);
        assert!(buf.data().is_empty());
        assert!(buf.bytes.capacity() >= 16);
    }
}
