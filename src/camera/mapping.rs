//! Process-local memory mappings of frame buffer planes.
//!
//! The capture device exports each frame buffer as a file descriptor; the
//! pool maps every plane read/write once at startup and keeps the mapping for
//! the buffer's entire lifetime. Unmapping happens exactly once, on drop.

use std::io;
use std::os::unix::io::RawFd;
use std::ptr::NonNull;
use std::slice;

/// One `mmap(2)` mapping over a frame buffer plane.
///
/// The mapping is shared with the capture device (`MAP_SHARED`), so the
/// device sees in-place edits and the process sees every fill. Whether the
/// device or the process may touch the memory at a given moment is decided by
/// the pool's slot state, not by this type.
#[derive(Debug)]
pub struct MappedPlane {
    ptr: NonNull<u8>,
    len: usize,
}

// The raw pointer makes this !Send by default; the mapping itself is
// address-space global and the pool is only ever used from one thread at a
// time.
unsafe impl Send for MappedPlane {}

impl MappedPlane {
    /// Map `len` bytes of `fd` starting at `offset` for reading and writing.
    ///
    /// # Errors
    /// Returns the underlying OS error when the mapping syscall fails. The
    /// caller treats any failure as fatal: a pool with a missing mapping is
    /// never constructed.
    pub fn map(fd: RawFd, len: usize, offset: i64) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to map a zero-length plane",
            ));
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                offset as libc::off_t,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let ptr = NonNull::new(ptr as *mut u8).ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping")
        })?;
        Ok(Self { ptr, len })
    }

    /// Length of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow the mapped memory read-only.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Borrow the mapped memory for writing.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MappedPlane {
    fn drop(&mut self) {
        // munmap can only fail on a bogus address/length, which would mean
        // the mapping was never valid to begin with.
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
        }
    }
}
