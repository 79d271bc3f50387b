//! Submitting work to the kernel and registering resources with a ring instance.

use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic;
use std::{io, mem, ptr};

use crate::register::{execute, Probe, Restriction};
use crate::sys;
use crate::types::{self, CancelBuilder, Timespec};
use crate::util::{cast_ptr, OwnedFd};
use crate::Parameters;

/// Interface for submitting queued requests to the kernel, and for registering buffers, files,
/// and other resources with a ring instance ahead of time.
///
/// io_uring supports both performing I/O directly against buffers and file descriptors and
/// registering them beforehand. Registration is comparatively slow, a one-time cost, but it
/// removes per-request bookkeeping from the kernel's hot path.
pub struct Submitter<'a> {
    fd: &'a OwnedFd,
    params: &'a Parameters,

    sq_head: *const atomic::AtomicU32,
    sq_tail: *const atomic::AtomicU32,
    sq_flags: *const atomic::AtomicU32,
}

impl<'a> Submitter<'a> {
    #[inline]
    pub(crate) const fn new(
        fd: &'a OwnedFd,
        params: &'a Parameters,
        sq_head: *const atomic::AtomicU32,
        sq_tail: *const atomic::AtomicU32,
        sq_flags: *const atomic::AtomicU32,
    ) -> Submitter<'a> {
        Submitter {
            fd,
            params,
            sq_head,
            sq_tail,
            sq_flags,
        }
    }

    #[inline]
    fn sq_len(&self) -> usize {
        unsafe {
            let head = (*self.sq_head).load(atomic::Ordering::Acquire);
            let tail = (*self.sq_tail).load(atomic::Ordering::Acquire);
            tail.wrapping_sub(head) as usize
        }
    }

    /// Whether the SQPOLL kernel thread has gone to sleep and needs an `enter` call to wake it.
    #[inline]
    fn sq_need_wakeup(&self) -> bool {
        unsafe {
            (*self.sq_flags).load(atomic::Ordering::Relaxed) & sys::IORING_SQ_NEED_WAKEUP != 0
        }
    }

    fn sq_cq_overflow(&self) -> bool {
        unsafe {
            (*self.sq_flags).load(atomic::Ordering::Relaxed) & sys::IORING_SQ_CQ_OVERFLOW != 0
        }
    }

    /// Initiate and/or complete asynchronous I/O, the raw wrapper around `io_uring_enter(2)`.
    ///
    /// Prefer [`submit`](Self::submit) or [`submit_and_wait`](Self::submit_and_wait).
    ///
    /// # Safety
    ///
    /// The caller must ensure `to_submit`, `min_complete`, `flag` and `arg` form a valid
    /// `io_uring_enter` invocation for the ring's current configuration.
    pub unsafe fn enter<T: Sized>(
        &self,
        to_submit: u32,
        min_complete: u32,
        flag: u32,
        arg: Option<&T>,
    ) -> io::Result<usize> {
        let arg_ptr = arg.map(|arg| cast_ptr(arg).cast()).unwrap_or(ptr::null());
        let size = mem::size_of::<T>();
        let ret = sys::io_uring_enter(
            self.fd.as_raw_fd(),
            to_submit,
            min_complete,
            flag,
            arg_ptr,
            size,
        );
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    }

    /// Submit all queued requests to the kernel, without waiting for any of them to complete.
    #[inline]
    pub fn submit(&self) -> io::Result<usize> {
        self.submit_and_wait(0)
    }

    /// Submit all queued requests and block until at least `want` of them have completed.
    pub fn submit_and_wait(&self, want: usize) -> io::Result<usize> {
        let len = self.sq_len();
        let mut flags = 0;

        if want > 0 || self.params.is_setup_iopoll() || self.sq_cq_overflow() {
            flags |= sys::IORING_ENTER_GETEVENTS;
        }

        if self.params.is_setup_sqpoll() {
            atomic::fence(atomic::Ordering::SeqCst);
            if self.sq_need_wakeup() {
                flags |= sys::IORING_ENTER_SQ_WAKEUP;
            } else if want == 0 {
                return Ok(len);
            }
        }

        unsafe { self.enter::<libc::sigset_t>(len as _, want as _, flags, None) }
    }

    /// Like [`submit_and_wait`](Self::submit_and_wait), but accepts a timeout and signal mask
    /// via [`types::SubmitArgs`].
    pub fn submit_with_args(
        &self,
        want: usize,
        args: &types::SubmitArgs<'_, '_>,
    ) -> io::Result<usize> {
        let len = self.sq_len();
        let mut flags = sys::IORING_ENTER_EXT_ARG;

        if want > 0 || self.params.is_setup_iopoll() || self.sq_cq_overflow() {
            flags |= sys::IORING_ENTER_GETEVENTS;
        }

        if self.params.is_setup_sqpoll() {
            atomic::fence(atomic::Ordering::SeqCst);
            if self.sq_need_wakeup() {
                flags |= sys::IORING_ENTER_SQ_WAKEUP;
            } else if want == 0 {
                return Ok(len);
            }
        }

        unsafe { self.enter(len as _, want as _, flags, Some(&args.args)) }
    }

    /// Block until the submission queue has free entries.
    pub fn squeue_wait(&self) -> io::Result<usize> {
        unsafe { self.enter::<libc::sigset_t>(0, 0, sys::IORING_ENTER_SQ_WAIT, None) }
    }

    /// Register fixed in-memory buffers for [`ReadFixed`](crate::opcode::ReadFixed) and
    /// [`WriteFixed`](crate::opcode::WriteFixed).
    ///
    /// # Safety
    ///
    /// `bufs`' `iov_base`/`iov_len` pairs must stay valid until unregistered or the ring is
    /// dropped.
    pub unsafe fn register_buffers(&self, bufs: &[libc::iovec]) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_BUFFERS,
            bufs.as_ptr().cast(),
            bufs.len() as _,
        )
        .map(drop)
    }

    /// Register an empty, sparse file table of `nr` slots. A prerequisite for operations that
    /// target [`Fixed`](crate::types::Fixed) descriptors.
    pub fn register_files_sparse(&self, nr: u32) -> io::Result<()> {
        let rr = sys::io_uring_rsrc_register {
            nr,
            flags: sys::IORING_RSRC_REGISTER_SPARSE,
            resv2: 0,
            data: 0,
            tags: 0,
        };
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_FILES2,
            cast_ptr::<sys::io_uring_rsrc_register>(&rr).cast(),
            mem::size_of::<sys::io_uring_rsrc_register>() as _,
        )
        .map(drop)
    }

    /// Register files for use with [`Fixed`](crate::types::Fixed).
    ///
    /// A descriptor of `-1` registers a sparse slot, to be filled in later with
    /// [`register_files_update`](Self::register_files_update). Registration briefly idles the
    /// ring: it only returns once all in-flight requests have completed.
    pub fn register_files(&self, fds: &[RawFd]) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_FILES,
            fds.as_ptr().cast(),
            fds.len() as _,
        )
        .map(drop)
    }

    /// Register files for use with [`Fixed`](crate::types::Fixed), tagging each slot with a
    /// caller-chosen 64-bit value. When a tagged slot is later replaced or the table torn down,
    /// the kernel posts a completion carrying that tag back as its `user_data`, once the slot is
    /// safe to release. `tags` must be the same length as `fds`.
    pub fn register_files_tagged(&self, fds: &[RawFd], tags: &[u64]) -> io::Result<()> {
        debug_assert_eq!(fds.len(), tags.len());
        let rr = sys::io_uring_rsrc_register {
            nr: fds.len() as u32,
            flags: 0,
            resv2: 0,
            data: fds.as_ptr() as u64,
            tags: tags.as_ptr() as u64,
        };
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_FILES2,
            cast_ptr::<sys::io_uring_rsrc_register>(&rr).cast(),
            mem::size_of::<sys::io_uring_rsrc_register>() as _,
        )
        .map(drop)
    }

    /// Like [`register_files_tagged`](Self::register_files_tagged), but for fixed in-memory
    /// buffers.
    ///
    /// # Safety
    ///
    /// `bufs`' `iov_base`/`iov_len` pairs must stay valid until unregistered or the ring is
    /// dropped.
    pub unsafe fn register_buffers_tagged(
        &self,
        bufs: &[libc::iovec],
        tags: &[u64],
    ) -> io::Result<()> {
        debug_assert_eq!(bufs.len(), tags.len());
        let rr = sys::io_uring_rsrc_register {
            nr: bufs.len() as u32,
            flags: 0,
            resv2: 0,
            data: bufs.as_ptr() as u64,
            tags: tags.as_ptr() as u64,
        };
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_BUFFERS2,
            cast_ptr::<sys::io_uring_rsrc_register>(&rr).cast(),
            mem::size_of::<sys::io_uring_rsrc_register>() as _,
        )
        .map(drop)
    }

    /// Register an empty, sparse buffer table of `nr` slots, tagged or not filled in until
    /// [`register_buffers_update_tagged`](Self::register_buffers_update_tagged) replaces a slot.
    /// Mirrors [`register_files_sparse`](Self::register_files_sparse) for buffers.
    pub fn register_buffers_sparse(&self, nr: u32) -> io::Result<()> {
        let rr = sys::io_uring_rsrc_register {
            nr,
            flags: sys::IORING_RSRC_REGISTER_SPARSE,
            resv2: 0,
            data: 0,
            tags: 0,
        };
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_BUFFERS2,
            cast_ptr::<sys::io_uring_rsrc_register>(&rr).cast(),
            mem::size_of::<sys::io_uring_rsrc_register>() as _,
        )
        .map(drop)
    }

    /// Replace entries in the registered file table starting at `offset`, tagging each
    /// replacement slot. See [`register_files_tagged`](Self::register_files_tagged).
    pub fn register_files_update_tagged(
        &self,
        offset: u32,
        fds: &[RawFd],
        tags: &[u64],
    ) -> io::Result<()> {
        debug_assert_eq!(fds.len(), tags.len());
        let ru = sys::io_uring_rsrc_update2 {
            offset,
            resv: 0,
            data: fds.as_ptr() as u64,
            tags: tags.as_ptr() as u64,
            nr: fds.len() as u32,
            resv2: 0,
        };
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_FILES_UPDATE2,
            cast_ptr::<sys::io_uring_rsrc_update2>(&ru).cast(),
            mem::size_of::<sys::io_uring_rsrc_update2>() as _,
        )
        .map(drop)
    }

    /// Like [`register_files_update_tagged`](Self::register_files_update_tagged), but for fixed
    /// in-memory buffers.
    ///
    /// # Safety
    ///
    /// `bufs`' `iov_base`/`iov_len` pairs must stay valid until unregistered or the ring is
    /// dropped.
    pub unsafe fn register_buffers_update_tagged(
        &self,
        offset: u32,
        bufs: &[libc::iovec],
        tags: &[u64],
    ) -> io::Result<()> {
        debug_assert_eq!(bufs.len(), tags.len());
        let ru = sys::io_uring_rsrc_update2 {
            offset,
            resv: 0,
            data: bufs.as_ptr() as u64,
            tags: tags.as_ptr() as u64,
            nr: bufs.len() as u32,
            resv2: 0,
        };
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_BUFFERS_UPDATE,
            cast_ptr::<sys::io_uring_rsrc_update2>(&ru).cast(),
            mem::size_of::<sys::io_uring_rsrc_update2>() as _,
        )
        .map(drop)
    }

    /// Like [`register_buffers_update_tagged`](Self::register_buffers_update_tagged), without
    /// tagging the replaced slots.
    ///
    /// # Safety
    ///
    /// `bufs`' `iov_base`/`iov_len` pairs must stay valid until unregistered or the ring is
    /// dropped.
    pub unsafe fn register_buffers_update(&self, offset: u32, bufs: &[libc::iovec]) -> io::Result<()> {
        let ru = sys::io_uring_rsrc_update2 {
            offset,
            resv: 0,
            data: bufs.as_ptr() as u64,
            tags: 0,
            nr: bufs.len() as u32,
            resv2: 0,
        };
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_BUFFERS_UPDATE,
            cast_ptr::<sys::io_uring_rsrc_update2>(&ru).cast(),
            mem::size_of::<sys::io_uring_rsrc_update2>() as _,
        )
        .map(drop)
    }

    /// Replace entries in the registered file table starting at `offset`, without idling the
    /// ring. Also available asynchronously as [`FilesUpdate`](crate::opcode::FilesUpdate).
    pub fn register_files_update(&self, offset: u32, fds: &[RawFd]) -> io::Result<usize> {
        let fu = sys::io_uring_files_update {
            offset,
            resv: 0,
            fds: fds.as_ptr() as _,
        };
        let ret = execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_FILES_UPDATE,
            cast_ptr::<sys::io_uring_files_update>(&fu).cast(),
            fds.len() as _,
        )?;
        Ok(ret as _)
    }

    /// Register an eventfd that the kernel signals on every completion.
    pub fn register_eventfd(&self, eventfd: RawFd) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_EVENTFD,
            cast_ptr::<RawFd>(&eventfd).cast(),
            1,
        )
        .map(drop)
    }

    /// Like [`register_eventfd`](Self::register_eventfd), but only signals for completions of
    /// requests that finished asynchronously rather than inline.
    pub fn register_eventfd_async(&self, eventfd: RawFd) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_EVENTFD_ASYNC,
            cast_ptr::<RawFd>(&eventfd).cast(),
            1,
        )
        .map(drop)
    }

    /// Fill `probe` in with the set of opcodes the running kernel supports.
    pub fn register_probe(&self, probe: &mut Probe) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_PROBE,
            probe.as_mut_ptr() as *const _,
            Probe::COUNT as _,
        )
        .map(drop)
    }

    /// Register the calling process' credentials, returning an id that can be attached to a
    /// request with [`Entry::personality`](crate::squeue::Entry::personality) to issue it under
    /// those credentials.
    pub fn register_personality(&self) -> io::Result<u16> {
        let id = execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_PERSONALITY,
            ptr::null(),
            0,
        )?;
        Ok(id as u16)
    }

    /// Unregister all previously registered buffers. Not required before dropping the ring; the
    /// kernel cleans these up on its own.
    pub fn unregister_buffers(&self) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_UNREGISTER_BUFFERS,
            ptr::null(),
            0,
        )
        .map(drop)
    }

    /// Unregister all previously registered files.
    pub fn unregister_files(&self) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_UNREGISTER_FILES,
            ptr::null(),
            0,
        )
        .map(drop)
    }

    /// Stop eventfd notifications.
    pub fn unregister_eventfd(&self) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_UNREGISTER_EVENTFD,
            ptr::null(),
            0,
        )
        .map(drop)
    }

    /// Unregister a previously registered personality.
    pub fn unregister_personality(&self, personality: u16) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_UNREGISTER_PERSONALITY,
            ptr::null(),
            personality as _,
        )
        .map(drop)
    }

    /// Permanently install a feature allowlist. After this call, any operation or register call
    /// not on the list fails with `EACCES`. Callable only once.
    pub fn register_restrictions(&self, res: &mut [Restriction]) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_RESTRICTIONS,
            res.as_mut_ptr().cast(),
            res.len() as _,
        )
        .map(drop)
    }

    /// Enable the ring if it was created with a deferred-start option.
    pub fn register_enable_rings(&self) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_ENABLE_RINGS,
            ptr::null(),
            0,
        )
        .map(drop)
    }

    /// Restrict the CPUs that io_uring's async worker threads may run on.
    pub fn register_iowq_aff(&self, cpu_set: &libc::cpu_set_t) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_IOWQ_AFF,
            cpu_set as *const _ as *const libc::c_void,
            mem::size_of::<libc::cpu_set_t>() as u32,
        )
        .map(drop)
    }

    /// Undo a previous [`register_iowq_aff`](Self::register_iowq_aff).
    pub fn unregister_iowq_aff(&self) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_UNREGISTER_IOWQ_AFF,
            ptr::null(),
            0,
        )
        .map(drop)
    }

    /// Get and/or set the per-NUMA-node worker thread limits (`max[0]` bounded, `max[1]`
    /// unbounded); `0` leaves a limit unchanged. Returns the previous limits.
    pub fn register_iowq_max_workers(&self, max: &mut [u32; 2]) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_IOWQ_MAX_WORKERS,
            max.as_mut_ptr().cast(),
            max.len() as _,
        )
        .map(drop)
    }

    /// Register a provided-buffer ring. Available since kernel 5.19.
    ///
    /// # Safety
    ///
    /// `ring_addr` must point at `ring_entries` valid, live `io_uring_buf` slots until the group
    /// is unregistered or the ring is dropped.
    pub unsafe fn register_buf_ring(
        &self,
        ring_addr: u64,
        ring_entries: u16,
        bgid: u16,
    ) -> io::Result<()> {
        let arg = sys::io_uring_buf_reg {
            ring_addr,
            ring_entries: ring_entries as _,
            bgid,
            ..Default::default()
        };
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_PBUF_RING,
            cast_ptr::<sys::io_uring_buf_reg>(&arg).cast(),
            1,
        )
        .map(drop)
    }

    /// Unregister a previously registered buffer ring.
    pub fn unregister_buf_ring(&self, bgid: u16) -> io::Result<()> {
        let arg = sys::io_uring_buf_reg {
            ring_addr: 0,
            ring_entries: 0,
            bgid,
            ..Default::default()
        };
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_UNREGISTER_PBUF_RING,
            cast_ptr::<sys::io_uring_buf_reg>(&arg).cast(),
            1,
        )
        .map(drop)
    }

    /// Synchronously cancel one or more in-flight requests, matching by the criteria described in
    /// `builder`. Unlike [`AsyncCancel`](crate::opcode::AsyncCancel), this call itself blocks
    /// until the match (or timeout) resolves, rather than posting a completion.
    ///
    /// With no `timeout`, waits indefinitely. Returns `NotFound` if nothing matched, or an
    /// `ETIME`-mapped error if the timeout elapsed before every match was canceled.
    ///
    /// Only requests already submitted to the kernel are eligible; anything still sitting
    /// unsubmitted in the local submission queue is not considered. Available since kernel 6.0.
    pub fn register_sync_cancel(
        &self,
        timeout: Option<Timespec>,
        builder: CancelBuilder,
    ) -> io::Result<()> {
        let timespec = timeout.map(|ts| ts.0).unwrap_or(sys::__kernel_timespec {
            tv_sec: -1,
            tv_nsec: -1,
        });

        let arg = sys::io_uring_sync_cancel_reg {
            addr: builder.user_data.unwrap_or(0),
            fd: builder.to_fd(),
            flags: builder.flags.bits(),
            timeout: timespec,
            opcode: 0,
            pad: [0; 7],
            pad2: [0; 3],
        };
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_SYNC_CANCEL,
            cast_ptr::<sys::io_uring_sync_cancel_reg>(&arg).cast(),
            1,
        )
        .map(drop)
    }

    /// Configure the kernel's NAPI busy-poll timeout for network completions. Only meaningful on
    /// a ring set up with `IOPOLL`.
    pub fn register_napi(&self, napi: &mut sys::io_uring_napi) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_REGISTER_NAPI,
            cast_ptr::<sys::io_uring_napi>(napi).cast(),
            1,
        )
        .map(drop)
    }

    /// Undo a previous [`register_napi`](Self::register_napi).
    pub fn unregister_napi(&self) -> io::Result<()> {
        execute(
            self.fd.as_raw_fd(),
            sys::IORING_UNREGISTER_NAPI,
            ptr::null(),
            0,
        )
        .map(drop)
    }
}
