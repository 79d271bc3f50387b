//! File descriptor lifecycle and byte-range I/O: open, close, read, write, and the registered-fd
//! install/update operations.

use std::ffi::CString;
use std::os::unix::io::RawFd;

use crate::error::Error;
use crate::opcode;
use crate::operation::Op;
use crate::squeue::Entry;
use crate::types::sealed::UseFixed;
use crate::types::{DestinationSlot, Fixed, OpenHow, RegisterBatch};

/// `openat(2)`: open `path` relative to `dirfd`.
pub struct OpenAt<D> {
    dirfd: D,
    path: CString,
    flags: i32,
    mode: u32,
}

impl<D: UseFixed + Copy> OpenAt<D> {
    pub fn new(dirfd: D, path: CString, flags: i32, mode: u32) -> Self {
        OpenAt {
            dirfd,
            path,
            flags,
            mode,
        }
    }
}

impl<D: UseFixed + Copy> Op for OpenAt<D> {
    const OPCODE: u8 = opcode::OpenAt::CODE;

    type Output = RawFd;

    fn build(&self, user_data: u64) -> Entry {
        opcode::OpenAt::new(self.dirfd.into_target(), self.path.as_ptr())
            .flags(self.flags)
            .mode(self.mode)
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<RawFd, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(result)
        }
    }
}

/// `openat(2)` installing the new descriptor directly into the registered file table.
pub struct OpenAtDirect<D> {
    dirfd: D,
    path: CString,
    flags: i32,
    mode: u32,
    file_index: DestinationSlot,
}

impl<D: UseFixed + Copy> OpenAtDirect<D> {
    pub fn new(
        dirfd: D,
        path: CString,
        flags: i32,
        mode: u32,
        file_index: DestinationSlot,
    ) -> Self {
        OpenAtDirect {
            dirfd,
            path,
            flags,
            mode,
            file_index,
        }
    }
}

impl<D: UseFixed + Copy> Op for OpenAtDirect<D> {
    const OPCODE: u8 = opcode::OpenAtDirect::CODE;

    type Output = Fixed;

    fn build(&self, user_data: u64) -> Entry {
        opcode::OpenAtDirect::new(
            self.dirfd,
            self.path.as_ptr(),
            self.flags,
            self.mode,
            self.file_index,
        )
        .build()
        .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<Fixed, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(Fixed(result as u32))
        }
    }
}

/// `openat2(2)`: like [`OpenAt`] but configured via the resolve-flags-aware [`OpenHow`].
pub struct OpenAt2<D> {
    dirfd: D,
    path: CString,
    how: OpenHow,
}

impl<D: UseFixed + Copy> OpenAt2<D> {
    pub fn new(dirfd: D, path: CString, how: OpenHow) -> Self {
        OpenAt2 { dirfd, path, how }
    }
}

impl<D: UseFixed + Copy> Op for OpenAt2<D> {
    const OPCODE: u8 = opcode::OpenAt2::CODE;

    type Output = RawFd;

    fn build(&self, user_data: u64) -> Entry {
        opcode::OpenAt2::new(self.dirfd.into_target(), self.path.as_ptr(), &self.how.0)
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<RawFd, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(result)
        }
    }
}

/// `close(2)` on a raw or fixed descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Close<F>(F);

impl<F: UseFixed + Copy> Close<F> {
    pub fn new(fd: F) -> Self {
        Close(fd)
    }
}

impl<F: UseFixed + Copy> Op for Close<F> {
    const OPCODE: u8 = opcode::Close::CODE;

    type Output = ();

    fn build(&self, user_data: u64) -> Entry {
        opcode::Close::new(self.0.into_target())
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<(), Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(())
        }
    }
}

/// `pread(2)`-style buffer read, into a buffer owned by the caller for the operation's lifetime.
pub struct Read<F> {
    fd: F,
    buf: *mut u8,
    len: u32,
    offset: i64,
}

impl<F: UseFixed + Copy> Read<F> {
    /// # Safety
    ///
    /// `buf` must stay valid for `len` bytes until the completion is observed.
    pub unsafe fn new(fd: F, buf: *mut u8, len: u32, offset: i64) -> Self {
        Read {
            fd,
            buf,
            len,
            offset,
        }
    }
}

impl<F: UseFixed + Copy> Op for Read<F> {
    const OPCODE: u8 = opcode::Read::CODE;

    type Output = usize;

    fn build(&self, user_data: u64) -> Entry {
        opcode::Read::new(self.fd.into_target(), self.buf, self.len)
            .offset(self.offset)
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<usize, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(result as usize)
        }
    }
}

/// `pwrite(2)`-style buffer write.
pub struct Write<F> {
    fd: F,
    buf: *const u8,
    len: u32,
    offset: i64,
}

impl<F: UseFixed + Copy> Write<F> {
    /// # Safety
    ///
    /// `buf` must stay valid for `len` bytes until the completion is observed.
    pub unsafe fn new(fd: F, buf: *const u8, len: u32, offset: i64) -> Self {
        Write {
            fd,
            buf,
            len,
            offset,
        }
    }
}

impl<F: UseFixed + Copy> Op for Write<F> {
    const OPCODE: u8 = opcode::Write::CODE;

    type Output = usize;

    fn build(&self, user_data: u64) -> Entry {
        opcode::Write::new(self.fd.into_target(), self.buf, self.len)
            .offset(self.offset)
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<usize, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(result as usize)
        }
    }
}

/// Install a previously-registered fixed file back into the process' ordinary descriptor table.
#[derive(Debug, Clone, Copy)]
pub struct FixedFdInstall(Fixed);

impl FixedFdInstall {
    pub fn new(fd: Fixed) -> Self {
        FixedFdInstall(fd)
    }
}

impl Op for FixedFdInstall {
    const OPCODE: u8 = opcode::FixedFdInstall::CODE;

    type Output = RawFd;

    fn build(&self, user_data: u64) -> Entry {
        opcode::FixedFdInstall::new(self.0)
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<RawFd, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(result)
        }
    }
}

/// Replace a contiguous range of the registered file table, starting at `offset`, without idling
/// the ring. The async counterpart of
/// [`Submitter::register_files_update`](crate::submit::Submitter::register_files_update).
pub struct FilesUpdateBatch {
    fds: *const RawFd,
    len: u32,
    offset: i32,
}

impl FilesUpdateBatch {
    /// # Safety
    ///
    /// `fds` must stay valid and unchanged until the completion is observed.
    pub unsafe fn new(fds: &[RawFd], offset: u32) -> Self {
        FilesUpdateBatch {
            fds: fds.as_ptr(),
            len: fds.len() as u32,
            offset: offset as i32,
        }
    }
}

impl Op for FilesUpdateBatch {
    const OPCODE: u8 = opcode::FilesUpdate::CODE;

    type Output = RegisterBatch;

    fn build(&self, user_data: u64) -> Entry {
        opcode::FilesUpdate::new(self.fds, self.len, self.offset)
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<RegisterBatch, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            let count = result as u32;
            let offset = self.offset as u32;
            Ok(RegisterBatch {
                count,
                slot_indices: (offset..offset + count).collect(),
            })
        }
    }
}
