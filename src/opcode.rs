//! Typed submission builders, one per supported opcode.
//!
//! Each type mirrors one `IORING_OP_*` kernel opcode: a `new` constructor takes the operation's
//! required arguments, optional chained setters configure the rest, and [`build`](macro@self)
//! produces a [`squeue::Entry`](crate::squeue::Entry) ready to push onto the ring.

#![allow(clippy::new_without_default)]

use std::os::unix::io::RawFd;

use crate::squeue::Entry;
use crate::sys;
use crate::types::sealed::{Target, UseFixed};
use crate::types::DestinationSlot;

pub use crate::types::{Fd, Fixed, FixedSocket};

macro_rules! assign_fd {
    ($sqe:ident . fd = $target:expr) => {
        match $target {
            Target::Fd(fd) => $sqe.fd = fd,
            Target::Fixed(i) => {
                $sqe.fd = i as _;
                $sqe.flags |= sys::IOSQE_FIXED_FILE;
            }
        }
    };
}

macro_rules! opcode {
    (
        $(#[$outer:meta])*
        pub struct $name:ident {
            $(#[$new_meta:meta])*
            $($field:ident : $tname:ty),* $(,)?
            ;;
            $($(#[$opt_meta:meta])* $opt_field:ident : $opt_tname:ty = $default:expr),* $(,)?
        }
    ) => {
        $(#[$outer])*
        pub struct $name {
            $($field: $tname,)*
            $($opt_field: $opt_tname,)*
        }

        impl $name {
            $(#[$new_meta])*
            pub fn new($($field: $tname),*) -> Self {
                $name {
                    $($field,)*
                    $($opt_field: $default,)*
                }
            }

            $(
                $(#[$opt_meta])*
                pub const fn $opt_field(mut self, $opt_field: $opt_tname) -> Self {
                    self.$opt_field = $opt_field;
                    self
                }
            )*
        }
    };
}

fn zeroed_sqe() -> sys::io_uring_sqe {
    unsafe { std::mem::zeroed() }
}

/// No-op. Useful for exercising the ring's submit/complete path without touching the kernel's
/// I/O subsystems, and as a building block for cheap latency probes.
#[derive(Debug)]
pub struct Nop {}

impl Nop {
    pub const CODE: u8 = sys::IORING_OP_NOP;

    pub fn new() -> Self {
        Nop {}
    }

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        Entry(sqe)
    }
}

opcode!(
    /// Vectored read, like `preadv2(2)`.
    #[derive(Debug)]
    pub struct Readv {
        fd: Target,
        iovec: *mut libc::iovec,
        len: u32,
        ;;
        ioprio: u16 = 0,
        offset: i64 = 0,
        rw_flags: i32 = 0
    }
);

impl Readv {
    pub const CODE: u8 = sys::IORING_OP_READV;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.ioprio = self.ioprio;
        sqe.off_or_addr2.off = self.offset as u64;
        sqe.addr_or_splice_off_in.addr = self.iovec as u64;
        sqe.len = self.len;
        sqe.op_flags.rw_flags = self.rw_flags;
        Entry(sqe)
    }
}

opcode!(
    /// Vectored write, like `pwritev2(2)`.
    #[derive(Debug)]
    pub struct Writev {
        fd: Target,
        iovec: *const libc::iovec,
        len: u32,
        ;;
        ioprio: u16 = 0,
        offset: i64 = 0,
        rw_flags: i32 = 0
    }
);

impl Writev {
    pub const CODE: u8 = sys::IORING_OP_WRITEV;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.ioprio = self.ioprio;
        sqe.off_or_addr2.off = self.offset as u64;
        sqe.addr_or_splice_off_in.addr = self.iovec as u64;
        sqe.len = self.len;
        sqe.op_flags.rw_flags = self.rw_flags;
        Entry(sqe)
    }
}

opcode!(
    /// Buffer read, like `pread(2)`.
    #[derive(Debug)]
    pub struct Read {
        fd: Target,
        buf: *mut u8,
        len: u32,
        ;;
        ioprio: u16 = 0,
        offset: i64 = 0,
        rw_flags: i32 = 0,
        buf_group: u16 = 0
    }
);

impl Read {
    pub const CODE: u8 = sys::IORING_OP_READ;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.ioprio = self.ioprio;
        sqe.off_or_addr2.off = self.offset as u64;
        sqe.addr_or_splice_off_in.addr = self.buf as u64;
        sqe.len = self.len;
        sqe.op_flags.rw_flags = self.rw_flags;
        sqe.buf.buf_group = self.buf_group;
        Entry(sqe)
    }
}

opcode!(
    /// Buffer write, like `pwrite(2)`.
    #[derive(Debug)]
    pub struct Write {
        fd: Target,
        buf: *const u8,
        len: u32,
        ;;
        ioprio: u16 = 0,
        offset: i64 = 0,
        rw_flags: i32 = 0
    }
);

impl Write {
    pub const CODE: u8 = sys::IORING_OP_WRITE;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.ioprio = self.ioprio;
        sqe.off_or_addr2.off = self.offset as u64;
        sqe.addr_or_splice_off_in.addr = self.buf as u64;
        sqe.len = self.len;
        sqe.op_flags.rw_flags = self.rw_flags;
        Entry(sqe)
    }
}

opcode!(
    /// Read into a registered (fixed) buffer by index, skipping the page-pin cost `Read` pays
    /// on every call.
    #[derive(Debug)]
    pub struct ReadFixed {
        fd: Target,
        buf: *mut u8,
        len: u32,
        buf_index: u16,
        ;;
        ioprio: u16 = 0,
        offset: i64 = 0,
        rw_flags: i32 = 0
    }
);

impl ReadFixed {
    pub const CODE: u8 = sys::IORING_OP_READ_FIXED;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.ioprio = self.ioprio;
        sqe.off_or_addr2.off = self.offset as u64;
        sqe.addr_or_splice_off_in.addr = self.buf as u64;
        sqe.len = self.len;
        sqe.op_flags.rw_flags = self.rw_flags;
        sqe.buf.buf_index = self.buf_index;
        Entry(sqe)
    }
}

opcode!(
    /// Write from a registered (fixed) buffer by index.
    #[derive(Debug)]
    pub struct WriteFixed {
        fd: Target,
        buf: *const u8,
        len: u32,
        buf_index: u16,
        ;;
        ioprio: u16 = 0,
        offset: i64 = 0,
        rw_flags: i32 = 0
    }
);

impl WriteFixed {
    pub const CODE: u8 = sys::IORING_OP_WRITE_FIXED;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.ioprio = self.ioprio;
        sqe.off_or_addr2.off = self.offset as u64;
        sqe.addr_or_splice_off_in.addr = self.buf as u64;
        sqe.len = self.len;
        sqe.op_flags.rw_flags = self.rw_flags;
        sqe.buf.buf_index = self.buf_index;
        Entry(sqe)
    }
}

opcode!(
    /// `fsync(2)` / `fdatasync(2)`, selected by [`flags`](crate::types::FsyncFlags).
    #[derive(Debug)]
    pub struct Fsync {
        fd: Target,
        ;;
        flags: u32 = 0
    }
);

impl Fsync {
    pub const CODE: u8 = sys::IORING_OP_FSYNC;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.op_flags.fsync_flags = self.flags;
        Entry(sqe)
    }
}

opcode!(
    /// `openat(2)`.
    #[derive(Debug)]
    pub struct OpenAt {
        dirfd: Target,
        pathname: *const libc::c_char,
        ;;
        flags: i32 = 0,
        mode: u32 = 0
    }
);

impl OpenAt {
    pub const CODE: u8 = sys::IORING_OP_OPENAT;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.dirfd);
        sqe.addr_or_splice_off_in.addr = self.pathname as u64;
        sqe.len = self.mode;
        sqe.op_flags.open_flags = self.flags as u32;
        Entry(sqe)
    }
}

opcode!(
    /// `openat2(2)`, the resolve-flags-aware successor to `openat`.
    #[derive(Debug)]
    pub struct OpenAt2 {
        dirfd: Target,
        pathname: *const libc::c_char,
        how: *const sys::open_how,
        ;;
    }
);

impl OpenAt2 {
    pub const CODE: u8 = sys::IORING_OP_OPENAT2;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.dirfd);
        sqe.addr_or_splice_off_in.addr = self.pathname as u64;
        sqe.len = std::mem::size_of::<sys::open_how>() as u32;
        sqe.off_or_addr2.off = self.how as u64;
        Entry(sqe)
    }
}

/// `openat` targeting a slot in the registered file table rather than a plain fd.
#[derive(Debug)]
pub struct OpenAtDirect {
    inner: OpenAt,
    file_index: DestinationSlot,
}

impl OpenAtDirect {
    pub const CODE: u8 = OpenAt::CODE;

    pub fn new(
        dirfd: impl UseFixed,
        pathname: *const libc::c_char,
        flags: i32,
        mode: u32,
        file_index: DestinationSlot,
    ) -> Self {
        OpenAtDirect {
            inner: OpenAt::new(dirfd.into_target(), pathname).flags(flags).mode(mode),
            file_index,
        }
    }

    pub fn build(self) -> Entry {
        let mut entry = self.inner.build();
        entry.0.splice_fd_in.file_index = self.file_index.kernel_index_arg();
        entry.0.flags |= sys::IOSQE_FIXED_FILE;
        entry
    }
}

opcode!(
    /// `close(2)`.
    #[derive(Debug)]
    pub struct Close {
        fd: Target,
        ;;
    }
);

impl Close {
    pub const CODE: u8 = sys::IORING_OP_CLOSE;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        match self.fd {
            Target::Fd(fd) => sqe.fd = fd,
            Target::Fixed(i) => sqe.splice_fd_in.file_index = i,
        }
        Entry(sqe)
    }
}

opcode!(
    /// Replace a range of the registered file table without idling the ring; the async
    /// counterpart of [`Submitter::register_files_update`](crate::submit::Submitter::register_files_update).
    #[derive(Debug)]
    pub struct FilesUpdate {
        fds: *const RawFd,
        len: u32,
        offset: i32,
        ;;
    }
);

impl FilesUpdate {
    pub const CODE: u8 = sys::IORING_OP_FILES_UPDATE;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        sqe.fd = -1;
        sqe.off_or_addr2.off = self.offset as u64;
        sqe.addr_or_splice_off_in.addr = self.fds as u64;
        sqe.len = self.len;
        Entry(sqe)
    }
}

/// Install a previously-registered fixed file back into the process' ordinary descriptor table.
#[derive(Debug)]
pub struct FixedFdInstall {
    fd: Fixed,
    flags: u32,
}

impl FixedFdInstall {
    pub const CODE: u8 = sys::IORING_OP_FIXED_FD_INSTALL;

    pub fn new(fd: Fixed) -> Self {
        FixedFdInstall { fd, flags: 0 }
    }

    pub const fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        sqe.fd = self.fd.0 as i32;
        sqe.flags |= sys::IOSQE_FIXED_FILE;
        sqe.op_flags.install_fd_flags = self.flags;
        Entry(sqe)
    }
}

opcode!(
    /// One-shot timer, relative or absolute depending on
    /// [`TimeoutFlags::ABS`](crate::types::TimeoutFlags).
    ///
    /// Completes with success when the deadline elapses (`timer_elapsed` is not surfaced as an
    /// error for a bare timeout), or earlier with `operation_canceled` if canceled.
    #[derive(Debug)]
    pub struct Timeout {
        timespec: *const sys::__kernel_timespec,
        ;;
        count: u32 = 0,
        flags: u32 = 0
    }
);

impl Timeout {
    pub const CODE: u8 = sys::IORING_OP_TIMEOUT;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        sqe.fd = -1;
        sqe.addr_or_splice_off_in.addr = self.timespec as u64;
        sqe.len = 1;
        sqe.off_or_addr2.off = self.count as u64;
        sqe.op_flags.timeout_flags = self.flags;
        Entry(sqe)
    }
}

/// A repeating timer: one completion every period, `more = true` on all but the last.
#[derive(Debug)]
pub struct TimeoutMultishot {
    inner: Timeout,
}

impl TimeoutMultishot {
    pub const CODE: u8 = Timeout::CODE;

    /// `repeat_count == 0` means fire forever, until canceled.
    pub fn new(timespec: *const sys::__kernel_timespec, repeat_count: u32) -> Self {
        TimeoutMultishot {
            inner: Timeout::new(timespec)
                .count(repeat_count)
                .flags(sys::IORING_TIMEOUT_MULTISHOT),
        }
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.inner = self.inner.flags(flags | sys::IORING_TIMEOUT_MULTISHOT);
        self
    }

    pub fn build(self) -> Entry {
        self.inner.build()
    }
}

opcode!(
    /// Cancel a previously-submitted [`Timeout`] by its user-data identifier.
    #[derive(Debug)]
    pub struct TimeoutRemove {
        user_data: u64,
        ;;
        flags: u32 = 0
    }
);

impl TimeoutRemove {
    pub const CODE: u8 = sys::IORING_OP_TIMEOUT_REMOVE;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        sqe.fd = -1;
        sqe.addr_or_splice_off_in.addr = self.user_data;
        sqe.op_flags.timeout_flags = self.flags;
        Entry(sqe)
    }
}

opcode!(
    /// Attach a timeout to the request immediately preceding it in an `IO_LINK` chain; when the
    /// timeout fires first the linked request is canceled.
    #[derive(Debug)]
    pub struct LinkTimeout {
        timespec: *const sys::__kernel_timespec,
        ;;
        flags: u32 = 0
    }
);

impl LinkTimeout {
    pub const CODE: u8 = sys::IORING_OP_LINK_TIMEOUT;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        sqe.fd = -1;
        sqe.addr_or_splice_off_in.addr = self.timespec as u64;
        sqe.len = 1;
        sqe.op_flags.timeout_flags = self.flags;
        Entry(sqe)
    }
}

/// Cancel requests by their identifier or originating descriptor; see
/// [`crate::types::CancelBuilder`] for the synchronous equivalent.
#[derive(Debug)]
pub struct AsyncCancel {
    user_data: Option<u64>,
    fd: Option<Target>,
    flags: u32,
}

impl AsyncCancel {
    pub const CODE: u8 = sys::IORING_OP_ASYNC_CANCEL;

    /// Cancel the single operation identified by `user_data`.
    pub fn new(user_data: u64) -> Self {
        AsyncCancel {
            user_data: Some(user_data),
            fd: None,
            flags: 0,
        }
    }

    /// Cancel every pending operation issued against `fd`.
    pub fn from_fd(fd: impl UseFixed) -> Self {
        let target = fd.into_target();
        let flags = match target {
            Target::Fixed(_) => sys::IORING_ASYNC_CANCEL_FD | sys::IORING_ASYNC_CANCEL_FD_FIXED,
            Target::Fd(_) => sys::IORING_ASYNC_CANCEL_FD,
        };
        AsyncCancel {
            user_data: None,
            fd: Some(target),
            flags,
        }
    }

    /// Cancel every request matching, instead of stopping at the first.
    pub const fn all(mut self) -> Self {
        self.flags |= sys::IORING_ASYNC_CANCEL_ALL;
        self
    }

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        sqe.fd = -1;
        match self.fd {
            Some(target) => assign_fd!(sqe.fd = target),
            None => sqe.addr_or_splice_off_in.addr = self.user_data.unwrap_or(0),
        }
        sqe.op_flags.cancel_flags = self.flags;
        Entry(sqe)
    }
}

opcode!(
    /// `socket(2)`, yielding a plain socket descriptor.
    #[derive(Debug)]
    pub struct Socket {
        domain: i32,
        socket_type: i32,
        protocol: i32,
        ;;
        flags: u32 = 0
    }
);

impl Socket {
    pub const CODE: u8 = sys::IORING_OP_SOCKET;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        sqe.fd = self.domain;
        sqe.off_or_addr2.off = self.socket_type as u64;
        sqe.len = self.protocol as u32;
        sqe.op_flags.rw_flags = self.flags as i32;
        Entry(sqe)
    }
}

/// `socket(2)` installed directly into the registered file table.
#[derive(Debug)]
pub struct SocketDirect {
    inner: Socket,
    file_index: DestinationSlot,
}

impl SocketDirect {
    pub const CODE: u8 = Socket::CODE;

    pub fn new(domain: i32, socket_type: i32, protocol: i32, file_index: DestinationSlot) -> Self {
        SocketDirect {
            inner: Socket::new(domain, socket_type, protocol),
            file_index,
        }
    }

    pub fn build(self) -> Entry {
        let mut entry = self.inner.build();
        entry.0.splice_fd_in.file_index = self.file_index.kernel_index_arg();
        entry
    }
}

opcode!(
    /// `bind(2)`.
    #[derive(Debug)]
    pub struct Bind {
        fd: Target,
        addr: *const libc::sockaddr,
        addrlen: libc::socklen_t,
        ;;
    }
);

impl Bind {
    pub const CODE: u8 = sys::IORING_OP_BIND;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.addr_or_splice_off_in.addr = self.addr as u64;
        sqe.off_or_addr2.off = self.addrlen as u64;
        Entry(sqe)
    }
}

opcode!(
    /// `listen(2)`.
    #[derive(Debug)]
    pub struct Listen {
        fd: Target,
        backlog: i32,
        ;;
    }
);

impl Listen {
    pub const CODE: u8 = sys::IORING_OP_LISTEN;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.len = self.backlog as u32;
        Entry(sqe)
    }
}

opcode!(
    /// `connect(2)`.
    #[derive(Debug)]
    pub struct Connect {
        fd: Target,
        addr: *const libc::sockaddr,
        addrlen: libc::socklen_t,
        ;;
    }
);

impl Connect {
    pub const CODE: u8 = sys::IORING_OP_CONNECT;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.addr_or_splice_off_in.addr = self.addr as u64;
        sqe.off_or_addr2.off = self.addrlen as u64;
        Entry(sqe)
    }
}

opcode!(
    /// `accept4(2)`.
    #[derive(Debug)]
    pub struct Accept {
        fd: Target,
        addr: *mut libc::sockaddr,
        addrlen: *mut libc::socklen_t,
        ;;
        flags: i32 = 0
    }
);

impl Accept {
    pub const CODE: u8 = sys::IORING_OP_ACCEPT;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.addr_or_splice_off_in.addr = self.addr as u64;
        sqe.off_or_addr2.off = self.addrlen as u64;
        sqe.op_flags.accept_flags = self.flags as u32;
        Entry(sqe)
    }
}

/// Repeated `accept4(2)`: a new completion for every incoming connection until canceled.
#[derive(Debug)]
pub struct AcceptMulti {
    inner: Accept,
}

impl AcceptMulti {
    pub const CODE: u8 = Accept::CODE;

    pub fn new(fd: impl UseFixed) -> Self {
        AcceptMulti {
            inner: Accept::new(fd.into_target(), std::ptr::null_mut(), std::ptr::null_mut())
                .flags(sys::IORING_ACCEPT_MULTISHOT as i32),
        }
    }

    pub fn build(self) -> Entry {
        self.inner.build()
    }
}

/// `accept4(2)` installing the accepted connection directly into the registered file table.
#[derive(Debug)]
pub struct AcceptDirect {
    inner: Accept,
    file_index: DestinationSlot,
}

impl AcceptDirect {
    pub const CODE: u8 = Accept::CODE;

    pub fn new(fd: impl UseFixed, file_index: DestinationSlot) -> Self {
        AcceptDirect {
            inner: Accept::new(fd.into_target(), std::ptr::null_mut(), std::ptr::null_mut()),
            file_index,
        }
    }

    pub fn build(self) -> Entry {
        let mut entry = self.inner.build();
        entry.0.splice_fd_in.file_index = self.file_index.kernel_index_arg();
        entry
    }
}

opcode!(
    /// `send(2)`.
    #[derive(Debug)]
    pub struct Send {
        fd: Target,
        buf: *const u8,
        len: u32,
        ;;
        flags: i32 = 0
    }
);

impl Send {
    pub const CODE: u8 = sys::IORING_OP_SEND;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.addr_or_splice_off_in.addr = self.buf as u64;
        sqe.len = self.len;
        sqe.op_flags.msg_flags = self.flags as u32;
        Entry(sqe)
    }
}

opcode!(
    /// Zero-copy `send(2)`: the kernel retains a reference to `buf` until the matching
    /// `notif`-flagged completion, rather than copying it up front.
    #[derive(Debug)]
    pub struct SendZc {
        fd: Target,
        buf: *const u8,
        len: u32,
        ;;
        flags: i32 = 0,
        buf_index: Option<u16> = None
    }
);

impl SendZc {
    pub const CODE: u8 = sys::IORING_OP_SEND_ZC;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.addr_or_splice_off_in.addr = self.buf as u64;
        sqe.len = self.len;
        sqe.op_flags.msg_flags = self.flags as u32;
        if let Some(buf_index) = self.buf_index {
            unsafe {
                sqe.op_flags.msg_flags |= sys::IORING_RECVSEND_FIXED_BUF as u32;
            }
            sqe.buf.buf_index = buf_index;
        }
        Entry(sqe)
    }
}

opcode!(
    /// `sendmsg(2)`.
    #[derive(Debug)]
    pub struct SendMsg {
        fd: Target,
        msg: *const libc::msghdr,
        ;;
        ioprio: u16 = 0,
        flags: u32 = 0
    }
);

impl SendMsg {
    pub const CODE: u8 = sys::IORING_OP_SENDMSG;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.ioprio = self.ioprio;
        sqe.addr_or_splice_off_in.addr = self.msg as u64;
        sqe.len = 1;
        sqe.op_flags.msg_flags = self.flags;
        Entry(sqe)
    }
}

opcode!(
    /// Zero-copy `sendmsg(2)`.
    #[derive(Debug)]
    pub struct SendMsgZc {
        fd: Target,
        msg: *const libc::msghdr,
        ;;
        ioprio: u16 = 0,
        flags: u32 = 0
    }
);

impl SendMsgZc {
    pub const CODE: u8 = sys::IORING_OP_SENDMSG_ZC;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.ioprio = self.ioprio;
        sqe.addr_or_splice_off_in.addr = self.msg as u64;
        sqe.len = 1;
        sqe.op_flags.msg_flags = self.flags;
        Entry(sqe)
    }
}

opcode!(
    /// `recv(2)`.
    #[derive(Debug)]
    pub struct Recv {
        fd: Target,
        buf: *mut u8,
        len: u32,
        ;;
        flags: i32 = 0,
        buf_group: u16 = 0
    }
);

impl Recv {
    pub const CODE: u8 = sys::IORING_OP_RECV;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.addr_or_splice_off_in.addr = self.buf as u64;
        sqe.len = self.len;
        sqe.op_flags.msg_flags = self.flags as u32;
        sqe.buf.buf_group = self.buf_group;
        Entry(sqe)
    }
}

/// Repeated `recv(2)` against a provided-buffer group: one completion per inbound datagram or
/// buffer-fill, `more = true` on all but the last.
#[derive(Debug)]
pub struct RecvMulti {
    fd: Target,
    flags: i32,
    buf_group: u16,
}

impl RecvMulti {
    pub const CODE: u8 = Recv::CODE;

    pub fn new(fd: impl UseFixed, buf_group: u16) -> Self {
        RecvMulti {
            fd: fd.into_target(),
            flags: 0,
            buf_group,
        }
    }

    pub const fn flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.op_flags.msg_flags = self.flags as u32 | sys::IORING_RECV_MULTISHOT as u32;
        sqe.buf.buf_group = self.buf_group;
        sqe.flags |= sys::IOSQE_BUFFER_SELECT;
        Entry(sqe)
    }
}

opcode!(
    /// `recvmsg(2)`.
    #[derive(Debug)]
    pub struct RecvMsg {
        fd: Target,
        msg: *mut libc::msghdr,
        ;;
        ioprio: u16 = 0,
        flags: u32 = 0
    }
);

impl RecvMsg {
    pub const CODE: u8 = sys::IORING_OP_RECVMSG;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.ioprio = self.ioprio;
        sqe.addr_or_splice_off_in.addr = self.msg as u64;
        sqe.len = 1;
        sqe.op_flags.msg_flags = self.flags;
        Entry(sqe)
    }
}

opcode!(
    /// `shutdown(2)`.
    #[derive(Debug)]
    pub struct Shutdown {
        fd: Target,
        how: i32,
        ;;
    }
);

impl Shutdown {
    pub const CODE: u8 = sys::IORING_OP_SHUTDOWN;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.len = self.how as u32;
        Entry(sqe)
    }
}

opcode!(
    /// Wait for `events` to become ready on `fd`, like a single-shot `poll(2)`.
    #[derive(Debug)]
    pub struct PollAdd {
        fd: Target,
        events: u32,
        ;;
    }
);

impl PollAdd {
    pub const CODE: u8 = sys::IORING_OP_POLL_ADD;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        #[cfg(target_endian = "little")]
        {
            sqe.op_flags.poll32_events = self.events;
        }
        #[cfg(target_endian = "big")]
        {
            sqe.op_flags.poll32_events = self.events.rotate_left(16);
        }
        Entry(sqe)
    }
}

/// Repeated poll: a fresh completion every time `events` become ready, until removed.
#[derive(Debug)]
pub struct PollAddMulti {
    inner: PollAdd,
}

impl PollAddMulti {
    pub const CODE: u8 = PollAdd::CODE;

    pub fn new(fd: impl UseFixed, events: u32) -> Self {
        PollAddMulti {
            inner: PollAdd::new(fd.into_target(), events),
        }
    }

    pub fn build(self) -> Entry {
        let mut entry = self.inner.build();
        entry.0.len = sys::IORING_POLL_ADD_MULTI;
        entry
    }
}

opcode!(
    /// Remove a previously-submitted poll request by its user-data identifier.
    #[derive(Debug)]
    pub struct PollRemove {
        user_data: u64,
        ;;
    }
);

impl PollRemove {
    pub const CODE: u8 = sys::IORING_OP_POLL_REMOVE;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        sqe.fd = -1;
        sqe.addr_or_splice_off_in.addr = self.user_data;
        Entry(sqe)
    }
}

opcode!(
    /// `FUTEX_WAIT`, the wait half of the fast userspace mutex primitive.
    #[derive(Debug)]
    pub struct FutexWait {
        addr: *const u32,
        val: u64,
        mask: u64,
        ;;
        futex_flags: u32 = 0
    }
);

impl FutexWait {
    pub const CODE: u8 = sys::IORING_OP_FUTEX_WAIT;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        sqe.fd = self.futex_flags as i32;
        sqe.addr_or_splice_off_in.addr = self.addr as u64;
        sqe.off_or_addr2.off = self.val;
        sqe.len = sys::FUTEX_32;
        sqe.addr3.addr3_optval.addr3 = self.mask;
        Entry(sqe)
    }
}

opcode!(
    /// `FUTEX_WAKE`.
    #[derive(Debug)]
    pub struct FutexWake {
        addr: *const u32,
        val: u64,
        mask: u64,
        ;;
        futex_flags: u32 = 0
    }
);

impl FutexWake {
    pub const CODE: u8 = sys::IORING_OP_FUTEX_WAKE;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        sqe.fd = self.futex_flags as i32;
        sqe.addr_or_splice_off_in.addr = self.addr as u64;
        sqe.off_or_addr2.off = self.val;
        sqe.len = sys::FUTEX_32;
        sqe.addr3.addr3_optval.addr3 = self.mask;
        Entry(sqe)
    }
}

opcode!(
    /// `FUTEX_WAITV`: wait on several futexes at once, waking on the first that matches.
    #[derive(Debug)]
    pub struct FutexWaitV {
        futexv: *const sys::futex_waitv,
        nr_futex: u32,
        ;;
    }
);

impl FutexWaitV {
    pub const CODE: u8 = sys::IORING_OP_FUTEX_WAITV;

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        sqe.fd = 0;
        sqe.addr_or_splice_off_in.addr = self.futexv as u64;
        sqe.len = self.nr_futex;
        Entry(sqe)
    }
}

/// A single-entry `setsockopt(2)`.
#[derive(Debug)]
pub struct SetSockOpt {
    fd: Target,
    level: i32,
    optname: i32,
    optval: *const libc::c_void,
    optlen: u32,
}

impl SetSockOpt {
    pub const CODE: u8 = sys::IORING_OP_URING_CMD;
    const SOCKET_URING_OP_SETSOCKOPT: u32 = 1;

    pub fn new(
        fd: impl UseFixed,
        level: i32,
        optname: i32,
        optval: *const libc::c_void,
        optlen: u32,
    ) -> Self {
        SetSockOpt {
            fd: fd.into_target(),
            level,
            optname,
            optval,
            optlen,
        }
    }

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.off_or_addr2.cmd_op_splice_fd_in = Self::SOCKET_URING_OP_SETSOCKOPT as u64;
        sqe.addr_or_splice_off_in.addr = self.optval as u64;
        sqe.splice_fd_in.optlen = self.optlen;
        sqe.op_flags.uring_cmd_flags = ((self.level as u32) << 16) | (self.optname as u32 & 0xffff);
        Entry(sqe)
    }
}

/// A single-entry `getsockopt(2)`.
#[derive(Debug)]
pub struct GetSockOpt {
    fd: Target,
    level: i32,
    optname: i32,
    optval: *mut libc::c_void,
    optlen: u32,
}

impl GetSockOpt {
    pub const CODE: u8 = sys::IORING_OP_URING_CMD;
    const SOCKET_URING_OP_GETSOCKOPT: u32 = 0;

    pub fn new(
        fd: impl UseFixed,
        level: i32,
        optname: i32,
        optval: *mut libc::c_void,
        optlen: u32,
    ) -> Self {
        GetSockOpt {
            fd: fd.into_target(),
            level,
            optname,
            optval,
            optlen,
        }
    }

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.off_or_addr2.cmd_op_splice_fd_in = Self::SOCKET_URING_OP_GETSOCKOPT as u64;
        sqe.addr_or_splice_off_in.addr = self.optval as u64;
        sqe.splice_fd_in.optlen = self.optlen;
        sqe.op_flags.uring_cmd_flags = ((self.level as u32) << 16) | (self.optname as u32 & 0xffff);
        Entry(sqe)
    }
}

/// A single-entry `getsockname(2)`.
#[derive(Debug)]
pub struct GetSockName {
    fd: Target,
    addr: *mut libc::sockaddr,
    addrlen: *mut libc::socklen_t,
}

impl GetSockName {
    pub const CODE: u8 = sys::IORING_OP_URING_CMD;
    const SOCKET_URING_OP_GETSOCKNAME: u32 = 2;

    pub fn new(fd: impl UseFixed, addr: *mut libc::sockaddr, addrlen: *mut libc::socklen_t) -> Self {
        GetSockName {
            fd: fd.into_target(),
            addr,
            addrlen,
        }
    }

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.op_flags.uring_cmd_flags = Self::SOCKET_URING_OP_GETSOCKNAME;
        sqe.addr_or_splice_off_in.addr = self.addr as u64;
        sqe.off_or_addr2.off = self.addrlen as u64;
        Entry(sqe)
    }
}

/// A single-entry `getpeername(2)`.
#[derive(Debug)]
pub struct GetPeerName {
    fd: Target,
    addr: *mut libc::sockaddr,
    addrlen: *mut libc::socklen_t,
}

impl GetPeerName {
    pub const CODE: u8 = sys::IORING_OP_URING_CMD;
    const SOCKET_URING_OP_GETPEERNAME: u32 = 3;

    pub fn new(fd: impl UseFixed, addr: *mut libc::sockaddr, addrlen: *mut libc::socklen_t) -> Self {
        GetPeerName {
            fd: fd.into_target(),
            addr,
            addrlen,
        }
    }

    pub fn build(self) -> Entry {
        let mut sqe = zeroed_sqe();
        sqe.opcode = Self::CODE;
        assign_fd!(sqe.fd = self.fd);
        sqe.op_flags.uring_cmd_flags = Self::SOCKET_URING_OP_GETPEERNAME;
        sqe.addr_or_splice_off_in.addr = self.addr as u64;
        sqe.off_or_addr2.off = self.addrlen as u64;
        Entry(sqe)
    }
}
