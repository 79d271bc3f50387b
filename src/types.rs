//! Common types used across the operation library: non-owning descriptor handles, timeouts, and
//! small opcode-specific configuration structs.

pub(crate) mod sealed {
    use super::{Fd, Fixed};
    use std::os::unix::io::RawFd;

    /// The two ways a submission can name a destination: a raw fd, or an index into the ring's
    /// registered file table.
    #[derive(Debug, Clone, Copy)]
    pub enum Target {
        Fd(RawFd),
        Fixed(u32),
    }

    /// Sealed: only [`Fd`] and [`Fixed`] may be used as an operation's descriptor argument.
    pub trait UseFixed: Sized {
        fn into_target(self) -> Target;
    }

    impl UseFixed for Fd {
        #[inline]
        fn into_target(self) -> Target {
            Target::Fd(self.0)
        }
    }

    impl UseFixed for Fixed {
        #[inline]
        fn into_target(self) -> Target {
            Target::Fixed(self.0)
        }
    }
}

use std::num::NonZeroU32;
use std::os::unix::io::RawFd;

use bitflags::bitflags;

use crate::sys;

/// An ordinary, non-owning raw file descriptor.
///
/// `Fd` never closes the descriptor it wraps; the caller remains responsible for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Fd(pub RawFd);

/// A non-owning index into the ring's registered ("fixed") file table.
///
/// Using a fixed file in place of a raw [`Fd`] skips a per-submission file-table lookup in the
/// kernel; the index is only meaningful while the corresponding table slot stays occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Fixed(pub u32);

/// A non-owning index into the ring's registered ("fixed") socket table. Distinct from
/// [`Fixed`] only at the type level, so APIs that accept sockets cannot be handed a registered
/// plain file by mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct FixedSocket(pub u32);

impl sealed::UseFixed for FixedSocket {
    #[inline]
    fn into_target(self) -> sealed::Target {
        sealed::Target::Fixed(self.0)
    }
}

/// One event of a multi-shot completion stream: the decoded item, and whether the kernel will
/// produce further completions for this same submission.
#[derive(Debug, Clone, Copy)]
pub struct Multi<T> {
    pub item: T,
    pub more: bool,
}

/// A listening socket paired with the descriptor `accept` handed back for its new peer.
#[derive(Debug, Clone, Copy)]
pub struct Connection<F> {
    pub listener: F,
    pub accepted: RawFd,
}

/// Like [`Connection`], but the accepted peer was installed directly into the registered file
/// table rather than returned as a plain descriptor.
#[derive(Debug, Clone, Copy)]
pub struct FixedConnection<F> {
    pub listener: F,
    pub accepted: FixedSocket,
}

/// Result of a batched fixed-fd registration: how many of the requested slots the kernel filled,
/// and which table indices they landed in.
#[derive(Debug, Clone)]
pub struct RegisterBatch {
    pub count: u32,
    pub slot_indices: Vec<u32>,
}

bitflags! {
    /// Options for [`opcode::Timeout`](crate::opcode::Timeout) and
    /// [`opcode::TimeoutMultishot`](crate::opcode::TimeoutMultishot).
    pub struct TimeoutFlags: u32 {
        /// Interpret the timespec as an absolute deadline rather than a relative duration.
        const ABS = sys::IORING_TIMEOUT_ABS;
        /// Update an already-linked timeout instead of installing a new one.
        const UPDATE = sys::IORING_TIMEOUT_UPDATE;
        /// Measure the deadline against `CLOCK_BOOTTIME` instead of the default
        /// `CLOCK_MONOTONIC`.
        const BOOTTIME = sys::IORING_TIMEOUT_BOOTTIME;
        /// Measure the deadline against `CLOCK_REALTIME` instead of the default
        /// `CLOCK_MONOTONIC`.
        const REALTIME = sys::IORING_TIMEOUT_REALTIME;
        /// Complete with success once the timer elapses, instead of `operation_canceled`-style
        /// `ETIME`. Used by the pure one-shot timeout.
        const ETIME_SUCCESS = sys::IORING_TIMEOUT_ETIME_SUCCESS;
        /// Arm a repeating, multi-shot timer rather than a single completion.
        const MULTISHOT = sys::IORING_TIMEOUT_MULTISHOT;
    }
}

bitflags! {
    /// Options for [`opcode::Fsync`](crate::opcode::Fsync).
    pub struct FsyncFlags: u32 {
        /// Data-integrity sync only (`fdatasync`-style), rather than a full metadata sync.
        const DATASYNC = sys::IORING_FSYNC_DATASYNC;
    }
}

bitflags! {
    /// Mode for [`opcode::AsyncCancel`](crate::opcode::AsyncCancel) and
    /// [`Submitter::register_sync_cancel`](crate::submit::Submitter::register_sync_cancel).
    #[derive(Default)]
    pub struct CancelFlags: u32 {
        /// Cancel every matching request instead of just the first one found.
        const ALL = sys::IORING_ASYNC_CANCEL_ALL;
        /// Match by originating file descriptor rather than by user-data identifier.
        const FD = sys::IORING_ASYNC_CANCEL_FD;
        /// Match any pending request (used with shutdown's cancel-everything call).
        const ANY = sys::IORING_ASYNC_CANCEL_ANY;
        /// The descriptor given alongside `FD` is a fixed file index, not a raw fd.
        const FD_FIXED = sys::IORING_ASYNC_CANCEL_FD_FIXED;
    }
}

/// The monotonic clock used by the kernel default; see [`Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// `CLOCK_MONOTONIC` (the kernel default).
    Monotonic,
    /// `CLOCK_REALTIME`, the wall-clock.
    Realtime,
    /// `CLOCK_BOOTTIME`, monotonic but continues across suspend.
    Boottime,
}

impl Clock {
    pub(crate) fn timeout_flags(self) -> TimeoutFlags {
        match self {
            Clock::Monotonic => TimeoutFlags::empty(),
            Clock::Realtime => TimeoutFlags::REALTIME,
            Clock::Boottime => TimeoutFlags::BOOTTIME,
        }
    }
}

/// Wrapper around `open_how`, as used by `openat2(2)`.
#[derive(Default, Debug, Clone, Copy)]
#[repr(transparent)]
pub struct OpenHow(pub(crate) sys::open_how);

impl OpenHow {
    pub const fn new() -> Self {
        OpenHow(sys::open_how {
            flags: 0,
            mode: 0,
            resolve: 0,
        })
    }

    pub const fn flags(mut self, flags: u64) -> Self {
        self.0.flags = flags;
        self
    }

    pub const fn mode(mut self, mode: u64) -> Self {
        self.0.mode = mode;
        self
    }

    pub const fn resolve(mut self, resolve: u64) -> Self {
        self.0.resolve = resolve;
        self
    }
}

/// A kernel `__kernel_timespec`, used by the timeout family of operations.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Timespec(pub(crate) sys::__kernel_timespec);

impl Timespec {
    #[inline]
    pub const fn new() -> Self {
        Timespec(sys::__kernel_timespec {
            tv_sec: 0,
            tv_nsec: 0,
        })
    }

    #[inline]
    pub const fn sec(mut self, sec: u64) -> Self {
        self.0.tv_sec = sec as _;
        self
    }

    #[inline]
    pub const fn nsec(mut self, nsec: u32) -> Self {
        self.0.tv_nsec = nsec as _;
        self
    }
}

impl From<std::time::Duration> for Timespec {
    fn from(dur: std::time::Duration) -> Timespec {
        Timespec::new().sec(dur.as_secs()).nsec(dur.subsec_nanos())
    }
}

/// A destination slot for a fixed-descriptor-producing operation (accept-direct, socket-direct,
/// fixed-fd install).
#[derive(Debug, Clone, Copy)]
pub struct DestinationSlot {
    dest: NonZeroU32,
}

impl DestinationSlot {
    const AUTO_ALLOC: NonZeroU32 = match NonZeroU32::new(sys::IORING_FILE_INDEX_ALLOC as u32) {
        Some(v) => v,
        None => panic!("IORING_FILE_INDEX_ALLOC must be nonzero"),
    };

    /// Ask the kernel to allocate a free slot automatically; the resulting index is reported in
    /// the completion.
    pub const fn auto_target() -> Self {
        Self {
            dest: DestinationSlot::AUTO_ALLOC,
        }
    }

    /// Target a specific table slot. Valid slots are `0..=u32::MAX - 2`.
    pub fn try_from_slot_target(target: u32) -> Result<Self, u32> {
        let max_index = DestinationSlot::AUTO_ALLOC.get() - 2;
        if target > max_index {
            return Err(target);
        }
        let kernel_index = target.saturating_add(1);
        Ok(Self {
            dest: NonZeroU32::new(kernel_index).unwrap(),
        })
    }

    pub(crate) fn kernel_index_arg(&self) -> u32 {
        self.dest.get()
    }
}

/// Describes the match criteria for [`Submitter::register_sync_cancel`](crate::submit::Submitter::register_sync_cancel)
/// and is the non-async counterpart to [`opcode::AsyncCancel`](crate::opcode::AsyncCancel).
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelBuilder {
    pub(crate) user_data: Option<u64>,
    pub(crate) fd: Option<sealed::Target>,
    pub(crate) flags: CancelFlags,
}

impl CancelBuilder {
    pub fn user_data(user_data: u64) -> Self {
        CancelBuilder {
            user_data: Some(user_data),
            fd: None,
            flags: CancelFlags::empty(),
        }
    }

    pub fn fd(fd: impl sealed::UseFixed) -> Self {
        let target = fd.into_target();
        let flags = match target {
            sealed::Target::Fixed(_) => CancelFlags::FD | CancelFlags::FD_FIXED,
            sealed::Target::Fd(_) => CancelFlags::FD,
        };
        CancelBuilder {
            user_data: None,
            fd: Some(target),
            flags,
        }
    }

    pub fn any() -> Self {
        CancelBuilder {
            user_data: None,
            fd: None,
            flags: CancelFlags::ANY | CancelFlags::ALL,
        }
    }

    pub fn all(mut self) -> Self {
        self.flags |= CancelFlags::ALL;
        self
    }

    pub(crate) fn to_fd(self) -> i32 {
        match self.fd {
            Some(sealed::Target::Fd(fd)) => fd,
            Some(sealed::Target::Fixed(idx)) => idx as i32,
            None => -1,
        }
    }
}

/// Helper for parsing the buffered result of a multishot
/// [`opcode::RecvMsgMulti`](crate::opcode::RecvMsgMulti).
#[derive(Debug)]
pub struct RecvMsgOut<'buf> {
    header: sys::io_uring_recvmsg_out,
    msghdr_name_len: usize,
    msghdr_control_len: usize,
    name_data: &'buf [u8],
    control_data: &'buf [u8],
    payload_data: &'buf [u8],
}

impl<'buf> RecvMsgOut<'buf> {
    const DATA_START: usize = std::mem::size_of::<sys::io_uring_recvmsg_out>();

    /// Parse the buffer that was previously handed to the ring, using the same `msghdr` fields
    /// (`msg_namelen`, `msg_controllen`) that were set on the submission.
    pub fn parse(buffer: &'buf [u8], msghdr: &libc::msghdr) -> Result<Self, ()> {
        if buffer.len() < Self::DATA_START {
            return Err(());
        }
        let header: sys::io_uring_recvmsg_out =
            unsafe { std::ptr::read_unaligned(buffer.as_ptr() as _) };

        let msghdr_name_len = msghdr.msg_namelen as usize;
        let msghdr_control_len = msghdr.msg_controllen as usize;

        let total_len = Self::DATA_START
            .checked_add(msghdr_name_len)
            .and_then(|v| v.checked_add(msghdr_control_len))
            .and_then(|v| v.checked_add(header.payloadlen as usize));
        if total_len.map(|v| v > buffer.len()).unwrap_or(true) {
            return Err(());
        }

        let name_start = Self::DATA_START;
        let name_size = usize::min(header.namelen as usize, msghdr_name_len);
        let name_data = &buffer[name_start..name_start + name_size];
        let control_start = name_start + msghdr_name_len;

        let control_size = usize::min(header.controllen as usize, msghdr_control_len);
        let control_data = &buffer[control_start..control_start + control_size];
        let payload_start = control_start + msghdr_control_len;
        let payload_data = &buffer[payload_start..payload_start + header.payloadlen as usize];

        Ok(Self {
            header,
            msghdr_name_len,
            msghdr_control_len,
            name_data,
            control_data,
            payload_data,
        })
    }

    pub fn incoming_name_len(&self) -> u32 {
        self.header.namelen
    }

    pub fn is_name_data_truncated(&self) -> bool {
        self.header.namelen as usize > self.msghdr_name_len
    }

    pub fn name_data(&self) -> &[u8] {
        self.name_data
    }

    pub fn incoming_control_len(&self) -> u32 {
        self.header.controllen
    }

    pub fn is_control_data_truncated(&self) -> bool {
        self.header.controllen as usize > self.msghdr_control_len
    }

    pub fn control_data(&self) -> &[u8] {
        self.control_data
    }

    pub fn is_payload_truncated(&self) -> bool {
        self.header.flags & (libc::MSG_TRUNC as u32) != 0
    }

    pub fn payload_data(&self) -> &[u8] {
        self.payload_data
    }

    pub fn flags(&self) -> u32 {
        self.header.flags
    }
}

/// Extra arguments for [`Submitter::submit_with_args`](crate::submit::Submitter::submit_with_args):
/// a wait timeout and/or a signal mask to apply for the duration of the wait.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitArgs<'a, 'b> {
    pub(crate) args: sys::io_uring_getevents_arg,
    pub(crate) timespec: std::marker::PhantomData<&'a Timespec>,
    pub(crate) sigmask: std::marker::PhantomData<&'b libc::sigset_t>,
}

impl<'a, 'b> SubmitArgs<'a, 'b> {
    pub fn new() -> Self {
        SubmitArgs {
            args: sys::io_uring_getevents_arg {
                sigmask: 0,
                sigmask_sz: 0,
                pad: 0,
                ts: 0,
            },
            timespec: std::marker::PhantomData,
            sigmask: std::marker::PhantomData,
        }
    }

    /// Wait no longer than `timeout` before returning, even with fewer than the requested
    /// completions available.
    pub fn timespec(mut self, timeout: &'a Timespec) -> Self {
        self.args.ts = &timeout.0 as *const _ as u64;
        self
    }

    /// Apply `sigmask` for the duration of the wait, as with `ppoll`'s signal mask argument.
    pub fn sigmask(mut self, sigmask: &'b libc::sigset_t) -> Self {
        self.args.sigmask = sigmask as *const _ as u64;
        self.args.sigmask_sz = std::mem::size_of::<libc::sigset_t>() as u32;
        self
    }
}
