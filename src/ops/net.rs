//! Socket lifecycle, address-carrying operations, and the byte-stream send/recv family
//! (including zero-copy send and multi-shot accept/recv).

use std::os::unix::io::RawFd;

use crate::addr::PeerInfo;
use crate::error::Error;
use crate::opcode;
use crate::operation::Op;
use crate::squeue::Entry;
use crate::sys;
use crate::types::sealed::UseFixed;
use crate::types::{Connection, DestinationSlot, FixedConnection, FixedSocket, Multi};

/// `socket(2)`.
#[derive(Debug, Clone, Copy)]
pub struct Socket {
    domain: i32,
    socket_type: i32,
    protocol: i32,
}

impl Socket {
    pub fn new(domain: i32, socket_type: i32, protocol: i32) -> Self {
        Socket {
            domain,
            socket_type,
            protocol,
        }
    }
}

impl Op for Socket {
    const OPCODE: u8 = opcode::Socket::CODE;

    type Output = RawFd;

    fn build(&self, user_data: u64) -> Entry {
        opcode::Socket::new(self.domain, self.socket_type, self.protocol)
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

/// `socket(2)` installed directly into the registered file table.
#[derive(Debug, Clone, Copy)]
pub struct SocketDirect {
    domain: i32,
    socket_type: i32,
    protocol: i32,
    file_index: DestinationSlot,
}

impl SocketDirect {
    pub fn new(domain: i32, socket_type: i32, protocol: i32, file_index: DestinationSlot) -> Self {
        SocketDirect {
            domain,
            socket_type,
            protocol,
            file_index,
        }
    }
}

impl Op for SocketDirect {
    const OPCODE: u8 = opcode::SocketDirect::CODE;

    type Output = FixedSocket;

    fn build(&self, user_data: u64) -> Entry {
        opcode::SocketDirect::new(self.domain, self.socket_type, self.protocol, self.file_index)
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<FixedSocket, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(FixedSocket(result as u32))
        }
    }
}

/// `bind(2)`. `peer`'s family must match the socket's own family; checked by
/// [`crate::ring::Ring`] before submission.
pub struct Bind<F> {
    fd: F,
    peer: PeerInfo,
    storage: (libc::sockaddr_storage, libc::socklen_t),
}

impl<F: UseFixed + Copy> Bind<F> {
    pub fn new(fd: F, peer: PeerInfo) -> Self {
        let storage = peer.to_raw();
        Bind { fd, peer, storage }
    }

    pub fn family(&self) -> i32 {
        self.peer.family()
    }
}

impl<F: UseFixed + Copy> Op for Bind<F> {
    const OPCODE: u8 = opcode::Bind::CODE;

    type Output = ();

    fn build(&self, user_data: u64) -> Entry {
        let (addr, len) = &self.storage;
        opcode::Bind::new(self.fd.into_target(), addr as *const _ as *const libc::sockaddr, *len)
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

/// `listen(2)`. `backlog` is capped at 4096 to match the kernel's own clamp.
#[derive(Debug, Clone, Copy)]
pub struct Listen<F> {
    fd: F,
    backlog: i32,
}

impl<F: UseFixed + Copy> Listen<F> {
    pub fn new(fd: F, backlog: i32) -> Self {
        Listen {
            fd,
            backlog: backlog.min(4096),
        }
    }
}

impl<F: UseFixed + Copy> Op for Listen<F> {
    const OPCODE: u8 = opcode::Listen::CODE;

    type Output = ();

    fn build(&self, user_data: u64) -> Entry {
        opcode::Listen::new(self.fd.into_target(), self.backlog)
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

/// `connect(2)`.
pub struct Connect<F> {
    fd: F,
    storage: (libc::sockaddr_storage, libc::socklen_t),
}

impl<F: UseFixed + Copy> Connect<F> {
    pub fn new(fd: F, peer: PeerInfo) -> Self {
        Connect {
            fd,
            storage: peer.to_raw(),
        }
    }
}

impl<F: UseFixed + Copy> Op for Connect<F> {
    const OPCODE: u8 = opcode::Connect::CODE;

    type Output = ();

    fn build(&self, user_data: u64) -> Entry {
        let (addr, len) = &self.storage;
        opcode::Connect::new(self.fd.into_target(), addr as *const _ as *const libc::sockaddr, *len)
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

/// `accept4(2)`. Peer address capture is the caller's responsibility (pass `None` to skip it).
pub struct Accept<F> {
    fd: F,
    addr_buf: Option<std::cell::UnsafeCell<(libc::sockaddr_storage, libc::socklen_t)>>,
    flags: i32,
}

impl<F: UseFixed + Copy> Accept<F> {
    pub fn new(fd: F) -> Self {
        Accept {
            fd,
            addr_buf: None,
            flags: 0,
        }
    }

    pub fn capture_peer(mut self) -> Self {
        self.addr_buf = Some(std::cell::UnsafeCell::new((
            unsafe { std::mem::zeroed() },
            std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t,
        )));
        self
    }

    pub fn flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }

    /// The captured peer address, if [`capture_peer`](Self::capture_peer) was requested and the
    /// accept already completed successfully.
    pub fn peer(&self) -> Option<PeerInfo> {
        let cell = self.addr_buf.as_ref()?;
        let (storage, len) = unsafe { &*cell.get() };
        Some(PeerInfo::from_raw(storage, *len))
    }
}

impl<F: UseFixed + Copy> Op for Accept<F> {
    const OPCODE: u8 = opcode::Accept::CODE;

    type Output = Connection<F>;

    fn build(&self, user_data: u64) -> Entry {
        let (addr_ptr, len_ptr) = match &self.addr_buf {
            Some(cell) => {
                let (storage, len) = unsafe { &mut *cell.get() };
                (
                    storage as *mut _ as *mut libc::sockaddr,
                    len as *mut libc::socklen_t,
                )
            }
            None => (std::ptr::null_mut(), std::ptr::null_mut()),
        };
        opcode::Accept::new(self.fd.into_target(), addr_ptr, len_ptr)
            .flags(self.flags)
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<Connection<F>, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(Connection {
                listener: self.fd,
                accepted: result,
            })
        }
    }
}

/// Repeated `accept4(2)`: a completion for every new connection until cancelled.
#[derive(Debug, Clone, Copy)]
pub struct AcceptMulti<F>(F);

impl<F: UseFixed + Copy> AcceptMulti<F> {
    pub fn new(fd: F) -> Self {
        AcceptMulti(fd)
    }
}

impl<F: UseFixed + Copy> Op for AcceptMulti<F> {
    const OPCODE: u8 = opcode::AcceptMulti::CODE;

    type Output = Multi<Connection<F>>;

    fn build(&self, user_data: u64) -> Entry {
        opcode::AcceptMulti::new(self.0).build().user_data(user_data)
    }

    fn decode(&self, result: i32, flags: u32) -> Result<Multi<Connection<F>>, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(Multi {
                item: Connection {
                    listener: self.0,
                    accepted: result,
                },
                more: self.more(flags),
            })
        }
    }

    fn more(&self, flags: u32) -> bool {
        flags & sys::IORING_CQE_F_MORE != 0
    }
}

/// `accept4(2)` installing the accepted connection directly into the registered file table.
#[derive(Debug, Clone, Copy)]
pub struct AcceptDirect<F> {
    fd: F,
    file_index: DestinationSlot,
}

impl<F: UseFixed + Copy> AcceptDirect<F> {
    pub fn new(fd: F, file_index: DestinationSlot) -> Self {
        AcceptDirect { fd, file_index }
    }
}

impl<F: UseFixed + Copy> Op for AcceptDirect<F> {
    const OPCODE: u8 = opcode::AcceptDirect::CODE;

    type Output = FixedConnection<F>;

    fn build(&self, user_data: u64) -> Entry {
        opcode::AcceptDirect::new(self.fd, self.file_index)
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<FixedConnection<F>, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(FixedConnection {
                listener: self.fd,
                accepted: FixedSocket(result as u32),
            })
        }
    }
}

/// `send(2)`.
pub struct Send<F> {
    fd: F,
    buf: *const u8,
    len: u32,
    flags: i32,
}

impl<F: UseFixed + Copy> Send<F> {
    /// # Safety
    ///
    /// `buf` must stay valid for `len` bytes until the completion is observed.
    pub unsafe fn new(fd: F, buf: *const u8, len: u32, flags: i32) -> Self {
        Send { fd, buf, len, flags }
    }
}

impl<F: UseFixed + Copy> Op for Send<F> {
    const OPCODE: u8 = opcode::Send::CODE;

    type Output = usize;

    fn build(&self, user_data: u64) -> Entry {
        opcode::Send::new(self.fd.into_target(), self.buf, self.len)
            .flags(self.flags)
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

/// One event of a zero-copy send's interleaved completion stream (see
/// [`crate::operation::Op::more`] and the `notif` completion-flag bit).
#[derive(Debug, Clone, Copy)]
pub enum SendZcEvent {
    More(usize),
    NoMore(usize),
    BufferFreed,
}

/// Zero-copy `send(2)`: the kernel retains a reference to `buf` until the buffer-free
/// notification arrives. Produces an interleaved stream: zero or more `More`, exactly one
/// `NoMore`, then exactly one `BufferFreed`.
pub struct SendZc<F> {
    fd: F,
    buf: *const u8,
    len: u32,
    flags: i32,
    buf_index: Option<u16>,
}

impl<F: UseFixed + Copy> SendZc<F> {
    /// # Safety
    ///
    /// `buf` must stay valid for `len` bytes until the buffer-free notification is observed.
    pub unsafe fn new(fd: F, buf: *const u8, len: u32, flags: i32) -> Self {
        SendZc {
            fd,
            buf,
            len,
            flags,
            buf_index: None,
        }
    }

    pub fn fixed_buf(mut self, index: u16) -> Self {
        self.buf_index = Some(index);
        self
    }
}

impl<F: UseFixed + Copy> Op for SendZc<F> {
    const OPCODE: u8 = opcode::SendZc::CODE;

    type Output = SendZcEvent;

    fn build(&self, user_data: u64) -> Entry {
        let mut op = opcode::SendZc::new(self.fd.into_target(), self.buf, self.len).flags(self.flags);
        if let Some(idx) = self.buf_index {
            op = op.buf_index(Some(idx));
        }
        op.build().user_data(user_data)
    }

    fn decode(&self, result: i32, flags: u32) -> Result<SendZcEvent, Error> {
        if flags & sys::IORING_CQE_F_NOTIF != 0 {
            return Ok(SendZcEvent::BufferFreed);
        }
        if result < 0 {
            return Err(Error::from_errno(result));
        }
        if flags & sys::IORING_CQE_F_MORE != 0 {
            Ok(SendZcEvent::More(result as usize))
        } else {
            Ok(SendZcEvent::NoMore(result as usize))
        }
    }

    fn more(&self, flags: u32) -> bool {
        flags & sys::IORING_CQE_F_MORE != 0 || flags & sys::IORING_CQE_F_NOTIF == 0
    }
}

/// `recv(2)`.
pub struct Recv<F> {
    fd: F,
    buf: *mut u8,
    len: u32,
    flags: i32,
}

impl<F: UseFixed + Copy> Recv<F> {
    /// # Safety
    ///
    /// `buf` must stay valid for `len` bytes until the completion is observed.
    pub unsafe fn new(fd: F, buf: *mut u8, len: u32, flags: i32) -> Self {
        Recv { fd, buf, len, flags }
    }
}

impl<F: UseFixed + Copy> Op for Recv<F> {
    const OPCODE: u8 = opcode::Recv::CODE;

    type Output = usize;

    fn build(&self, user_data: u64) -> Entry {
        opcode::Recv::new(self.fd.into_target(), self.buf, self.len)
            .flags(self.flags)
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

/// Repeated `recv(2)` against a registered provided-buffer group: a completion per inbound
/// buffer-fill, `more = true` on all but the last.
#[derive(Debug, Clone, Copy)]
pub struct RecvMulti<F> {
    fd: F,
    buf_group: u16,
}

impl<F: UseFixed + Copy> RecvMulti<F> {
    pub fn new(fd: F, buf_group: u16) -> Self {
        RecvMulti { fd, buf_group }
    }
}

impl<F: UseFixed + Copy> Op for RecvMulti<F> {
    const OPCODE: u8 = opcode::RecvMulti::CODE;

    /// Bytes received and the provided-buffer id they landed in, plus whether the stream
    /// continues.
    type Output = Multi<(usize, u16)>;

    fn build(&self, user_data: u64) -> Entry {
        opcode::RecvMulti::new(self.fd, self.buf_group)
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, flags: u32) -> Result<Multi<(usize, u16)>, Error> {
        if result < 0 {
            return Err(Error::from_errno(result));
        }
        let buf_id = if flags & sys::IORING_CQE_F_BUFFER != 0 {
            (flags >> sys::IORING_CQE_BUFFER_SHIFT) as u16
        } else {
            0
        };
        Ok(Multi {
            item: (result as usize, buf_id),
            more: self.more(flags),
        })
    }

    fn more(&self, flags: u32) -> bool {
        flags & sys::IORING_CQE_F_MORE != 0
    }
}

/// `shutdown(2)`.
#[derive(Debug, Clone, Copy)]
pub struct Shutdown<F> {
    fd: F,
    how: i32,
}

impl<F: UseFixed + Copy> Shutdown<F> {
    pub fn new(fd: F, how: i32) -> Self {
        Shutdown { fd, how }
    }
}

impl<F: UseFixed + Copy> Op for Shutdown<F> {
    const OPCODE: u8 = opcode::Shutdown::CODE;

    type Output = ();

    fn build(&self, user_data: u64) -> Entry {
        opcode::Shutdown::new(self.fd.into_target(), self.how)
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
