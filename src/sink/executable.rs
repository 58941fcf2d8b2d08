//! An mmap-backed byte sink whose contents can be invoked as native code.

use super::{AppendableBuffer, ByteSink, DataView};
use crate::error::{MachCodeError, Result, SystemErrorKind};

/// Owns a single read+write+execute mapped memory region.
///
/// Bytes appended here become callable the moment they are written: there
/// is no separate "finalize" step. Growth reallocates the mapping and
/// invalidates any previously returned [`data`](DataView::data) pointer.
///
/// # W+X policy
///
/// This implementation maps the region simultaneously writable and
/// executable (`region::Protection::READ_WRITE_EXECUTE`) for the whole of
/// its lifetime. Platforms that reject simultaneous W+X mappings (hardened
/// runtimes, `W^X` kernels) will see [`MachCodeError::SystemError`] from
/// the constructor; a dual-mapping alternative (one read-write view, one
/// read-execute view of the same pages) is a known, unimplemented extension
/// (see `DESIGN.md`), not a silent fallback.
pub struct ExecutableBuffer {
    mapping: region::Allocation,
    size: usize,
    capacity: usize,
}

impl ExecutableBuffer {
    /// Map a fresh region of at least `requested_capacity` bytes, rounded up
    /// to the larger of `requested_capacity` and one page.
    pub fn new(requested_capacity: usize) -> Result<Self> {
        let page = region::page::size();
        let capacity = requested_capacity.max(page);
        let mapping = Self::map(capacity)?;
        Ok(Self {
            mapping,
            size: 0,
            capacity,
        })
    }

    /// Build an executable buffer by copying the contents of an appendable
    /// buffer. The source is left unchanged.
    pub fn from_appendable(source: &AppendableBuffer) -> Result<Self> {
        let mut buf = Self::new(source.size())?;
        buf.append_bytes(source.data())?;
        Ok(buf)
    }

    /// Build an executable buffer by copying the contents of another
    /// executable buffer. The source is left unchanged.
    pub fn from_executable(source: &ExecutableBuffer) -> Result<Self> {
        let mut buf = Self::new(source.size())?;
        buf.append_bytes(source.data())?;
        Ok(buf)
    }

    /// The total number of bytes this mapping can hold without growing.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn map(capacity: usize) -> Result<region::Allocation> {
        region::alloc(capacity, region::Protection::READ_WRITE_EXECUTE).map_err(|err| {
            MachCodeError::SystemError(SystemErrorKind::Os(std::io::Error::from(err)))
        })
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mapping.as_mut_ptr::<u8>()
    }

    /// Grow the mapping to hold at least `min_capacity` bytes.
    ///
    /// Tries an in-place remap first (Linux `mremap`); falls back to
    /// allocating a new, larger mapping and copying the live bytes in.
    fn grow(&mut self, min_capacity: usize) -> Result<()> {
        let new_capacity = min_capacity.max(self.capacity.saturating_mul(2));

        #[cfg(target_os = "linux")]
        {
            if let Some(new_ptr) = self.try_mremap(new_capacity) {
                log::trace!(
                    "ExecutableBuffer::grow: remapped {} -> {} bytes in place",
                    self.capacity,
                    new_capacity
                );
                let _ = new_ptr;
                self.capacity = new_capacity;
                return Ok(());
            }
        }

        log::trace!(
            "ExecutableBuffer::grow: allocating new {}-byte mapping (copy-and-replace)",
            new_capacity
        );
        let mut new_mapping = Self::map(new_capacity)?;
        // SAFETY: `self.size` bytes at the start of the old mapping are
        // initialized and readable; the new mapping is at least that large.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.mapping.as_ptr::<u8>(),
                new_mapping.as_mut_ptr::<u8>(),
                self.size,
            );
        }
        self.mapping = new_mapping;
        self.capacity = new_capacity;
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn try_mremap(&mut self, new_capacity: usize) -> Option<()> {
        // SAFETY: `self.mapping` is a live mapping owned by this buffer;
        // `mremap` either returns a valid pointer to a mapping of the new
        // size (which we adopt in place, since `region::Allocation` only
        // tracks the pointer and length we hand it back on drop via `munmap`
        // of the *original* range — we must not let that happen for a
        // relocated mapping) or fails, in which case nothing has changed.
        //
        // Because `region::Allocation` does not expose a way to rebind its
        // tracked pointer/length after a successful in-place-or-moved
        // `mremap`, and silently leaking the stale tracking would violate
        // the "unmap exactly once" invariant, we restrict this fast path to
        // remaps the kernel can satisfy without moving the mapping
        // (`MREMAP_MAYMOVE` unset). A moved remap falls through to the
        // copy-and-replace path below.
        let old_ptr = self.mapping.as_mut_ptr::<libc::c_void>();
        let result = unsafe { libc::mremap(old_ptr, self.capacity, new_capacity, 0) };
        if result == libc::MAP_FAILED || result != old_ptr {
            None
        } else {
            Some(())
        }
    }

    /// Treat the buffer's first byte as the entry point of a function
    /// returning `T` and invoke it.
    ///
    /// # Safety
    ///
    /// The caller must have emitted a complete, ABI-conforming function
    /// body ending in a return sequence before calling this. Invoking an
    /// empty or non-terminated buffer is undefined behavior.
    pub unsafe fn execute<T>(&self) -> T {
        let entry: extern "C" fn() -> T =
            std::mem::transmute(self.mapping.as_ptr::<u8>());
        entry()
    }
}

impl ByteSink for ExecutableBuffer {
    fn append(&mut self, byte: u8) -> Result<()> {
        if self.size == self.capacity {
            self.grow(self.capacity + 1)?;
        }
        let ptr = self.as_mut_ptr();
        // SAFETY: `self.size < self.capacity` after the grow above, so
        // `ptr.add(self.size)` is within the mapping and writable.
        unsafe {
            *ptr.add(self.size) = byte;
        }
        self.size += 1;
        Ok(())
    }

    fn append_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.size + bytes.len() > self.capacity {
            self.grow(self.size + bytes.len())?;
        }
        let ptr = self.as_mut_ptr();
        // SAFETY: the grow above guarantees `self.size + bytes.len() <=
        // self.capacity`.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.add(self.size), bytes.len());
        }
        self.size += bytes.len();
        Ok(())
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl DataView for ExecutableBuffer {
    fn data(&self) -> &[u8] {
        // SAFETY: `self.size` bytes starting at the mapping base have been
        // written by `append`/`append_bytes`.
        unsafe { std::slice::from_raw_parts(self.mapping.as_ptr::<u8>(), self.size) }
    }
}

// `region::Allocation`'s `Drop` unmaps the region; any unmap failure there
// is swallowed by the `region` crate itself rather than propagated.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_at_least_one_page() {
        let buf = ExecutableBuffer::new(1).unwrap();
        assert!(buf.capacity() >= region::page::size());
    }

    #[test]
    fn append_past_capacity_grows_and_preserves_bytes() {
        let mut buf = ExecutableBuffer::new(1).unwrap();
        let page = buf.capacity();
        let payload: Vec<u8> = (0..=255u8).cycle().take(page + 16).collect();
        buf.append_bytes(&payload).unwrap();
        assert_eq!(buf.size(), payload.len());
        assert_eq!(buf.data(), payload.as_slice());
    }

    #[test]
    fn from_appendable_leaves_source_untouched() {
        let mut src = AppendableBuffer::new();
        src.append_bytes(&[0x90, 0xC3]).unwrap();
        let exe = ExecutableBuffer::from_appendable(&src).unwrap();
        assert_eq!(exe.data(), src.data());
        assert_eq!(src.size(), 2);
    }

    #[test]
    #[cfg(target_arch = "x86_64")]
    fn execute_runs_emitted_function() {
        // `mov eax, 42; ret`
        let mut src = AppendableBuffer::new();
        src.append_bytes(&[0xB8, 42, 0, 0, 0, 0xC3]).unwrap();
        let exe = ExecutableBuffer::from_appendable(&src).unwrap();
        let result: i32 = unsafe { exe.execute() };
        assert_eq!(result, 42);
    }
}
