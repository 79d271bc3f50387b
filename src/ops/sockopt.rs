//! Typed `setsockopt(2)`/`getsockopt(2)`/`getsockname(2)`/`getpeername(2)` via
//! `IORING_OP_URING_CMD`, so option and address queries join the same submission batch as
//! everything else instead of taking a synchronous syscall detour.

use crate::addr::PeerInfo;
use crate::error::Error;
use crate::opcode;
use crate::operation::Op;
use crate::squeue::Entry;
use crate::types::sealed::UseFixed;

/// Set a socket option. `T` is read and copied at submission time, so the caller does not need
/// to keep it alive past [`build`](crate::operation::Op::build).
pub struct SetSockOpt<F, T> {
    fd: F,
    level: i32,
    optname: i32,
    value: T,
}

impl<F: UseFixed + Copy, T: Copy> SetSockOpt<F, T> {
    pub fn new(fd: F, level: i32, optname: i32, value: T) -> Self {
        SetSockOpt {
            fd,
            level,
            optname,
            value,
        }
    }
}

impl<F: UseFixed + Copy, T: Copy> Op for SetSockOpt<F, T> {
    const OPCODE: u8 = opcode::SetSockOpt::CODE;

    type Output = ();

    fn build(&self, user_data: u64) -> Entry {
        opcode::SetSockOpt::new(
            self.fd,
            self.level,
            self.optname,
            &self.value as *const T as *const libc::c_void,
            std::mem::size_of::<T>() as u32,
        )
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

/// Read a socket option into a caller-owned `T`-shaped buffer.
///
/// # Safety
///
/// `buf` must stay valid and exclusively borrowed for `size_of::<T>()` bytes until the
/// completion is observed.
pub struct GetSockOpt<F, T> {
    fd: F,
    level: i32,
    optname: i32,
    buf: *mut T,
}

impl<F: UseFixed + Copy, T> GetSockOpt<F, T> {
    /// # Safety
    ///
    /// `buf` must stay valid and exclusively borrowed for `size_of::<T>()` bytes until the
    /// completion is observed.
    pub unsafe fn new(fd: F, level: i32, optname: i32, buf: *mut T) -> Self {
        GetSockOpt {
            fd,
            level,
            optname,
            buf,
        }
    }
}

impl<F: UseFixed + Copy, T> Op for GetSockOpt<F, T> {
    const OPCODE: u8 = opcode::GetSockOpt::CODE;

    /// Number of bytes the kernel actually wrote back.
    type Output = u32;

    fn build(&self, user_data: u64) -> Entry {
        opcode::GetSockOpt::new(
            self.fd,
            self.level,
            self.optname,
            self.buf as *mut libc::c_void,
            std::mem::size_of::<T>() as u32,
        )
        .build()
        .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<u32, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(result as u32)
        }
    }
}

/// `getsockname(2)`: the local address a socket is bound to.
pub struct GetSockName<F> {
    fd: F,
    addr_buf: std::cell::UnsafeCell<(libc::sockaddr_storage, libc::socklen_t)>,
}

impl<F: UseFixed + Copy> GetSockName<F> {
    pub fn new(fd: F) -> Self {
        GetSockName {
            fd,
            addr_buf: std::cell::UnsafeCell::new((
                unsafe { std::mem::zeroed() },
                std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t,
            )),
        }
    }
}

impl<F: UseFixed + Copy> Op for GetSockName<F> {
    const OPCODE: u8 = opcode::GetSockName::CODE;

    type Output = PeerInfo;

    fn build(&self, user_data: u64) -> Entry {
        let (storage, len) = unsafe { &mut *self.addr_buf.get() };
        opcode::GetSockName::new(
            self.fd,
            storage as *mut _ as *mut libc::sockaddr,
            len as *mut libc::socklen_t,
        )
        .build()
        .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<PeerInfo, Error> {
        if result < 0 {
            return Err(Error::from_errno(result));
        }
        let (storage, len) = unsafe { &*self.addr_buf.get() };
        Ok(PeerInfo::from_raw(storage, *len))
    }
}

/// `getpeername(2)`: the remote address a connected socket is talking to.
pub struct GetPeerName<F> {
    fd: F,
    addr_buf: std::cell::UnsafeCell<(libc::sockaddr_storage, libc::socklen_t)>,
}

impl<F: UseFixed + Copy> GetPeerName<F> {
    pub fn new(fd: F) -> Self {
        GetPeerName {
            fd,
            addr_buf: std::cell::UnsafeCell::new((
                unsafe { std::mem::zeroed() },
                std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t,
            )),
        }
    }
}

impl<F: UseFixed + Copy> Op for GetPeerName<F> {
    const OPCODE: u8 = opcode::GetPeerName::CODE;

    type Output = PeerInfo;

    fn build(&self, user_data: u64) -> Entry {
        let (storage, len) = unsafe { &mut *self.addr_buf.get() };
        opcode::GetPeerName::new(
            self.fd,
            storage as *mut _ as *mut libc::sockaddr,
            len as *mut libc::socklen_t,
        )
        .build()
        .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<PeerInfo, Error> {
        if result < 0 {
            return Err(Error::from_errno(result));
        }
        let (storage, len) = unsafe { &*self.addr_buf.get() };
        Ok(PeerInfo::from_raw(storage, *len))
    }
}
