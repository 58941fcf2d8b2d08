//! A byte sink backed by a caller-owned output stream.

use super::ByteSink;
use crate::error::{MachCodeError, Result};
use std::io::{Seek, SeekFrom, Write};

/// Wraps a caller-owned writer; writes go straight through, with no
/// in-memory buffering beyond the stream's own.
///
/// The wrapped stream is never closed or taken ownership of beyond the
/// lifetime of this buffer; `size()` is computed as the stream's current
/// offset minus the offset captured at construction, so a `PersistentBuffer`
/// built partway through a shared stream only reports its own contribution.
pub struct PersistentBuffer<W> {
    stream: W,
    base_offset: u64,
    written: u64,
}

impl<W: Write + Seek> PersistentBuffer<W> {
    /// Wrap `stream`, capturing its current offset as the base for
    /// `size()`.
    pub fn new(mut stream: W) -> Result<Self> {
        let base_offset = stream
            .seek(SeekFrom::Current(0))
            .map_err(MachCodeError::Io)?;
        Ok(Self {
            stream,
            base_offset,
            written: 0,
        })
    }
}

impl<W> PersistentBuffer<W> {
    /// Persistent buffers keep no in-memory copy of what they have written,
    /// so there is nothing to view: this always fails with
    /// [`MachCodeError::LogicError`], per spec §7 ("calling `data()` on a
    /// persistent buffer"). Unlike [`AppendableBuffer`](super::AppendableBuffer)
    /// and [`ExecutableBuffer`](super::ExecutableBuffer), this is not routed
    /// through the [`DataView`](super::DataView) trait, whose `data()` is
    /// infallible — there is no backing slice to hand back here even on the
    /// error path.
    pub fn data(&self) -> Result<&[u8]> {
        Err(MachCodeError::LogicError(
            "PersistentBuffer has no in-memory backing store to view",
        ))
    }
}

impl<W: Write> ByteSink for PersistentBuffer<W> {
    fn append(&mut self, byte: u8) -> Result<()> {
        self.stream.write_all(&[byte]).map_err(MachCodeError::Io)?;
        self.written += 1;
        Ok(())
    }

    fn append_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).map_err(MachCodeError::Io)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn size(&self) -> usize {
        // `written` is tracked directly rather than re-querying the stream
        // offset on every call, since not every `Write` is also `Seek`
        // (e.g. a plain socket); callers that need the stream's own offset
        // delta can still compute `base_offset` themselves.
        self.written as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn size_is_bytes_written_since_construction() {
        let mut cursor = Cursor::new(Vec::new());
        cursor.get_mut().extend_from_slice(&[0xAA; 4]);
        cursor.set_position(4);
        let mut buf = PersistentBuffer::new(cursor).unwrap();
        buf.append(0x11).unwrap();
        buf.append_bytes(&[0x22, 0x33]).unwrap();
        assert_eq!(buf.size(), 3);
    }

    #[test]
    fn data_is_a_logic_error() {
        let buf = PersistentBuffer::new(Cursor::new(Vec::new())).unwrap();
        assert!(matches!(buf.data(), Err(MachCodeError::LogicError(_))));
    }
}
