use core::ptr;
use core::sync::atomic;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

/// An owned raw file descriptor, closed on drop.
///
/// This is distinct from the library's non-owning [`types::Fd`](crate::types::Fd) handle: it is
/// used internally for the ring's own descriptor, never exposed as an operation target.
pub(crate) struct OwnedFd(RawFd);

impl OwnedFd {
    pub(crate) fn try_from_raw(fd: RawFd) -> io::Result<OwnedFd> {
        if fd >= 0 {
            Ok(OwnedFd(fd))
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

impl AsRawFd for OwnedFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl Drop for OwnedFd {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

/// A region of memory mapped using `mmap(2)`.
pub(crate) struct Mmap {
    addr: ptr::NonNull<libc::c_void>,
    len: usize,
}

impl Mmap {
    /// Map `len` bytes starting from `offset` in `fd` into memory.
    pub(crate) fn new(fd: &OwnedFd, offset: libc::off_t, len: usize) -> io::Result<Mmap> {
        unsafe {
            let addr = libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_POPULATE,
                fd.as_raw_fd(),
                offset,
            );

            if addr == libc::MAP_FAILED {
                return Err(io::Error::last_os_error());
            }

            Ok(Mmap {
                addr: ptr::NonNull::new_unchecked(addr),
                len,
            })
        }
    }

    /// Do not make the stored memory accessible to child processes after `fork(2)`.
    pub(crate) fn dontfork(&self) -> io::Result<()> {
        if unsafe { libc::madvise(self.addr.as_ptr(), self.len, libc::MADV_DONTFORK) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&self) -> *mut libc::c_void {
        self.addr.as_ptr()
    }

    #[inline]
    pub(crate) unsafe fn offset(&self, offset: u32) -> *mut libc::c_void {
        self.as_mut_ptr().add(offset as usize)
    }
}

impl Drop for Mmap {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.addr.as_ptr(), self.len);
        }
    }
}

/// Load an atomic without synchronizing: valid only when the caller is the sole producer for
/// this index (the submission-queue tail, or the completion-queue head as seen by its owner).
#[inline(always)]
pub(crate) unsafe fn unsync_load(u: *const atomic::AtomicU32) -> u32 {
    *u.cast::<u32>()
}

#[inline]
pub(crate) const fn cast_ptr<T>(n: &T) -> *const T {
    n
}
