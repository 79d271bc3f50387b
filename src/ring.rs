//! The ring facade: kernel ring lifecycle, submission/completion pumping, resource-tag routing,
//! fixed-table registration, and the three operation factories.

use std::mem::ManuallyDrop;
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::Duration;
use std::{cmp, io, mem};

use crate::cqueue::CompletionQueue;
use crate::error::Error;
use crate::fixed::FixedTables;
use crate::operation::{Handle, Identifier, Op, Slot, Tag};
use crate::register::Probe;
use crate::sink::{AwaitSlot, Completion, Sink, SyncSlot};
use crate::squeue::SubmissionQueue;
use crate::sys;
use crate::types::{CancelBuilder, SubmitArgs, Timespec};
use crate::util::{Mmap, OwnedFd};

/// The kernel ring instance: submission queue, completion queue, and the bookkeeping needed to
/// route completions back to the operation (or unregister callback) that produced them.
pub struct Ring {
    fd: OwnedFd,
    params: Parameters,
    memory: ManuallyDrop<MemoryMap>,
    sq: SubmissionQueue,
    cq: CompletionQueue,
    probe: Option<Probe>,
    fixed: FixedTables,
}

#[allow(dead_code)]
struct MemoryMap {
    sq_mmap: Mmap,
    sqe_mmap: Mmap,
    cq_mmap: Option<Mmap>,
}

/// Options accepted by [`Ring::builder`], mirroring the kernel's `IORING_SETUP_*` flags.
#[derive(Clone, Default)]
pub struct Builder {
    dontfork: bool,
    params: sys::io_uring_params,
}

/// The negotiated parameters of a live ring: the feature bits the kernel actually granted, plus
/// the flags the caller asked to set up with.
#[derive(Clone)]
pub struct Parameters(sys::io_uring_params);

impl Ring {
    /// Create a ring with `entries` submission-queue slots and default options.
    pub fn new(entries: u32) -> io::Result<Ring> {
        Builder::new().build(entries)
    }

    fn with_params(entries: u32, mut p: sys::io_uring_params) -> io::Result<Ring> {
        unsafe fn setup_queue(
            fd: &OwnedFd,
            p: &sys::io_uring_params,
        ) -> io::Result<(MemoryMap, SubmissionQueue, CompletionQueue)> {
            let sq_len = p.sq_off.array as usize + p.sq_entries as usize * mem::size_of::<u32>();
            let cq_len = p.cq_off.cqes as usize
                + p.cq_entries as usize * mem::size_of::<sys::io_uring_cqe>();
            let sqe_len = p.sq_entries as usize * mem::size_of::<sys::io_uring_sqe>();
            let sqe_mmap = Mmap::new(fd, sys::IORING_OFF_SQES as _, sqe_len)?;

            if p.features & sys::IORING_FEAT_SINGLE_MMAP != 0 {
                let scq_mmap =
                    Mmap::new(fd, sys::IORING_OFF_SQ_RING as _, cmp::max(sq_len, cq_len))?;
                let sq = SubmissionQueue::new(&scq_mmap, &sqe_mmap, p);
                let cq = CompletionQueue::new(&scq_mmap, p);
                let mm = MemoryMap {
                    sq_mmap: scq_mmap,
                    cq_mmap: None,
                    sqe_mmap,
                };
                Ok((mm, sq, cq))
            } else {
                let sq_mmap = Mmap::new(fd, sys::IORING_OFF_SQ_RING as _, sq_len)?;
                let cq_mmap = Mmap::new(fd, sys::IORING_OFF_CQ_RING as _, cq_len)?;
                let sq = SubmissionQueue::new(&sq_mmap, &sqe_mmap, p);
                let cq = CompletionQueue::new(&cq_mmap, p);
                let mm = MemoryMap {
                    cq_mmap: Some(cq_mmap),
                    sq_mmap,
                    sqe_mmap,
                };
                Ok((mm, sq, cq))
            }
        }

        let fd = OwnedFd::try_from_raw(unsafe { sys::io_uring_setup(entries, &mut p) })?;

        let (mm, sq, cq) = unsafe { setup_queue(&fd, &p)? };

        let mut ring = Ring {
            fd,
            sq,
            cq,
            params: Parameters(p),
            memory: ManuallyDrop::new(mm),
            probe: None,
            fixed: FixedTables::new(),
        };

        let mut probe = Probe::new();
        if ring.submitter().register_probe(&mut probe).is_ok() {
            ring.probe = Some(probe);
        }

        Ok(ring)
    }

    fn submitter(&self) -> crate::submit::Submitter<'_> {
        let (head, tail, flags) = self.sq.raw_parts();
        crate::submit::Submitter::new(&self.fd, &self.params, head, tail, flags)
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// The cached opcode feature probe, if the kernel supported registering it.
    pub fn probe(&self) -> Option<&Probe> {
        self.probe.as_ref()
    }

    /// Whether the cached probe, if any, reports `O`'s opcode as unsupported.
    fn check_supported<O: Op>(&self) -> Result<(), Error> {
        match &self.probe {
            Some(probe) if !probe.is_supported(O::OPCODE) => Err(Error::function_not_supported()),
            _ => Ok(()),
        }
    }

    fn push_or_resource_unavailable(&mut self, entry: crate::squeue::Entry) -> Result<(), Error> {
        let mut avail = self.sq.available();
        match unsafe { avail.push(entry) } {
            Ok(()) => Ok(()),
            Err(_) => Err(Error::resource_unavailable()),
        }
    }

    /// Build `op` with a callback sink: `callback` runs once per completion (repeatedly, for a
    /// multi-shot operation) once [`submit`](Self::submit) and completion consumption have run.
    pub fn make<O: Op>(
        &mut self,
        op: O,
        callback: impl FnMut(Result<O::Output, Error>) + 'static,
    ) -> Result<Handle<O::Output>, Error> {
        self.check_supported::<O>()?;
        let sink = Sink::callback(callback);
        let (id, entry) = Slot::into_submission(op, sink);
        self.push_or_resource_unavailable(entry)?;
        Ok(Handle::new(id))
    }

    /// Build `op` with a no-op callback sink: useful for pure side-effecting requests (a
    /// standalone timeout, a fire-and-forget cancel) whose result nobody reads.
    pub fn make_probe<O: Op>(&mut self, op: O) -> Result<Handle<O::Output>, Error> {
        self.make(op, |_| {})
    }

    /// Build `op` with a sync-wait sink. Only legal for single-completion operations; this is not
    /// enforced statically, but a multi-shot operation's extra completions after the first are
    /// silently discarded since nothing polls the slot again.
    pub fn make_sync<O: Op>(&mut self, op: O) -> Result<SyncOperation<O::Output>, Error> {
        self.check_supported::<O>()?;
        let slot = SyncSlot::new();
        let sink = Sink::Sync(Rc::clone(&slot));
        let (id, entry) = Slot::into_submission(op, sink);
        self.push_or_resource_unavailable(entry)?;
        Ok(SyncOperation {
            handle: Handle::new(id),
            slot,
        })
    }

    /// Build `op` with a task-await sink, returning the identifier alongside a
    /// [`Completion`] future. A multi-shot operation is awaited once per event.
    pub fn make_await<O: Op>(
        &mut self,
        op: O,
    ) -> Result<(Handle<O::Output>, Completion<O::Output>), Error> {
        self.check_supported::<O>()?;
        let slot = AwaitSlot::new();
        let sink = Sink::Await(Rc::clone(&slot));
        let (id, entry) = Slot::into_submission(op, sink);
        self.push_or_resource_unavailable(entry)?;
        Ok((Handle::new(id), Completion::new(slot)))
    }

    /// Submit all queued requests, without waiting for any of them to complete.
    pub fn submit(&self) -> io::Result<usize> {
        self.submitter().submit()
    }

    /// Submit all queued requests and block until at least `want` of them have completed.
    pub fn submit_and_wait(&self, want: usize) -> io::Result<usize> {
        self.submitter().submit_and_wait(want)
    }

    /// Dispatch every completion currently available without blocking, routing each to its
    /// operation's sink or the matching fixed-table unregister callback.
    pub fn try_fetch(&mut self) -> usize {
        let mut n = 0;
        let entries: Vec<_> = self.cq.available().collect();
        for entry in entries {
            self.route(entry.user_data(), entry.result(), entry.flags());
            n += 1;
        }
        n
    }

    /// Submit, then block until at least `want` completions have arrived, dispatching every
    /// completion currently available (which may be more than `want`).
    pub fn wait_for_result(&mut self, want: usize, timeout: Option<Duration>) -> io::Result<usize> {
        match timeout {
            None => self.submit_and_wait(want)?,
            Some(dur) => {
                let ts = Timespec::from(dur);
                let args = SubmitArgs::new().timespec(&ts);
                self.submitter().submit_with_args(want, &args)?
            }
        };
        Ok(self.try_fetch())
    }

    /// Route one raw completion by its tagged user-data word: kind 0 reaches the operation it
    /// points at, kinds 1/2 reach the fd/buffer unregister callbacks.
    fn route(&mut self, user_data: u64, result: i32, flags: u32) {
        match Tag::from_bits(user_data) {
            Some(Tag::Operation) | None => {
                unsafe {
                    crate::operation::dispatch_opaque(user_data, result, flags);
                }
            }
            Some(Tag::FdUnregister) => {
                let tag = (user_data >> 3) as u32;
                self.fixed.files.notify(tag);
            }
            Some(Tag::BufferUnregister) => {
                let tag = (user_data >> 3) as u32;
                self.fixed.buffers.notify(tag);
            }
        }
    }

    /// Register an empty, sparse fixed-file table of `nr` slots.
    pub fn register_fd_table(&self, nr: u32) -> io::Result<()> {
        self.submitter().register_files_sparse(nr)
    }

    /// Register an empty, sparse fixed-buffer table of `nr` slots, to be filled in later with
    /// [`update_buffer_table`](Self::update_buffer_table).
    pub fn register_buffer_table(&self, nr: u32) -> io::Result<()> {
        self.submitter().register_buffers_sparse(nr)
    }

    /// Replace the fixed-file table wholesale. `tags`, if given, must be the same length as
    /// `fds`; each tag is echoed back to the fd-unregister callback when its slot is later
    /// replaced or the table torn down.
    pub fn register_fds(&mut self, fds: &[RawFd], tags: Option<&[u32]>) -> io::Result<()> {
        match tags {
            Some(tags) => {
                let packed: Vec<u64> = tags
                    .iter()
                    .map(|&tag| Tag::FdUnregister.pack((tag as u64) << 3))
                    .collect();
                self.submitter().register_files_tagged(fds, &packed)?;
            }
            None => self.submitter().register_files(fds)?,
        }
        Ok(())
    }

    /// Register fixed in-memory buffers.
    ///
    /// # Safety
    ///
    /// `bufs`' `iov_base`/`iov_len` pairs must stay valid until unregistered or the ring is
    /// dropped.
    pub unsafe fn register_buffers(
        &mut self,
        bufs: &[libc::iovec],
        tags: Option<&[u32]>,
    ) -> io::Result<()> {
        match tags {
            Some(tags) => {
                let packed: Vec<u64> = tags
                    .iter()
                    .map(|&tag| Tag::BufferUnregister.pack((tag as u64) << 3))
                    .collect();
                self.submitter().register_buffers_tagged(bufs, &packed)?;
            }
            None => self.submitter().register_buffers(bufs)?,
        }
        Ok(())
    }

    /// Replace entries in the fixed-file table starting at `offset`, without idling the ring.
    pub fn update_fd_table(
        &mut self,
        offset: u32,
        fds: &[RawFd],
        tags: Option<&[u32]>,
    ) -> io::Result<usize> {
        match tags {
            Some(tags) => {
                let packed: Vec<u64> = tags
                    .iter()
                    .map(|&tag| Tag::FdUnregister.pack((tag as u64) << 3))
                    .collect();
                self.submitter()
                    .register_files_update_tagged(offset, fds, &packed)?;
                Ok(fds.len())
            }
            None => self.submitter().register_files_update(offset, fds),
        }
    }

    /// Replace entries in the fixed-buffer table starting at `offset`, without idling the ring.
    ///
    /// # Safety
    ///
    /// `bufs`' `iov_base`/`iov_len` pairs must stay valid until unregistered or the ring is
    /// dropped.
    pub unsafe fn update_buffer_table(
        &mut self,
        offset: u32,
        bufs: &[libc::iovec],
        tags: Option<&[u32]>,
    ) -> io::Result<()> {
        match tags {
            Some(tags) => {
                let packed: Vec<u64> = tags
                    .iter()
                    .map(|&tag| Tag::BufferUnregister.pack((tag as u64) << 3))
                    .collect();
                self.submitter()
                    .register_buffers_update_tagged(offset, bufs, &packed)?;
            }
            None => self.submitter().register_buffers_update(offset, bufs)?,
        }
        Ok(())
    }

    /// Register a callback invoked with the resource tag whenever a fixed-file slot is
    /// unregistered or replaced.
    pub fn register_fd_unregistration_callback(&mut self, callback: impl FnMut(u32) + 'static) {
        self.fixed.files.set_callback(callback);
    }

    /// Register a callback invoked with the resource tag whenever a fixed-buffer slot is
    /// unregistered or replaced.
    pub fn register_buffer_unregistration_callback(
        &mut self,
        callback: impl FnMut(u32) + 'static,
    ) {
        self.fixed.buffers.set_callback(callback);
    }

    /// Configure the kernel's NAPI busy-poll timeout for network completions. Only meaningful on
    /// a ring set up with [`Builder::iopoll`].
    pub fn register_napi(&self, timeout: Duration, prefer_busy_poll: bool) -> io::Result<sys::io_uring_napi> {
        if !self.params.is_setup_iopoll() {
            return Err(io::Error::from(Error::invalid_argument()));
        }
        let mut napi = sys::io_uring_napi {
            busy_poll_to: timeout.as_micros() as u32,
            prefer_busy_poll: prefer_busy_poll as u8,
            pad: [0; 3],
            resv: 0,
        };
        self.submitter().register_napi(&mut napi)?;
        Ok(napi)
    }

    pub fn unregister_napi(&self) -> io::Result<()> {
        self.submitter().unregister_napi()
    }

    /// Cancel the operation identified by `target` (or, with `all`, every pending operation
    /// sharing it), blocking until the kernel confirms the match or `timeout` elapses.
    pub fn cancel_sync(&self, target: Identifier, all: bool, timeout: Option<Timespec>) -> io::Result<()> {
        let mut builder = CancelBuilder::user_data(target.raw());
        if all {
            builder = builder.all();
        }
        self.submitter().register_sync_cancel(timeout, builder)
    }

    /// Synchronously cancel every pending operation on this ring, then wait (up to `timeout`)
    /// for the kernel to confirm. Callers must still drain the completion queue afterward: every
    /// previously submitted operation observes a completion (normally `operation_canceled`)
    /// before the ring itself is dropped.
    pub fn shutdown(&mut self, timeout: Option<Timespec>) -> io::Result<()> {
        let builder = CancelBuilder::any();
        match self.submitter().register_sync_cancel(timeout, builder) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::ENOENT) => {}
            Err(e) => return Err(e),
        }
        self.submit_and_wait(0)?;
        self.try_fetch();
        Ok(())
    }

    /// This library's interface version, independent of any particular ring instance.
    pub fn version(&self) -> crate::version::Version {
        crate::version::Version::CURRENT
    }

    /// Whether this library's version satisfies `req`.
    pub fn check_version(&self, req: crate::version::Version) -> bool {
        self.version().is_at_least(req)
    }

    /// Whether the running kernel granted this ring a negotiated feature bit
    /// (`IORING_FEAT_*`).
    pub fn test_feature(&self, feature: u32) -> bool {
        self.params.0.features & feature != 0
    }

    /// Whether this ring was set up with a given option (`IORING_SETUP_*`).
    pub fn test_flag(&self, flag: u32) -> bool {
        self.params.0.flags & flag != 0
    }
}

/// A pending sync-wait operation: submitted, but not yet waited on.
pub struct SyncOperation<T> {
    handle: Handle<T>,
    slot: Rc<SyncSlot<T>>,
}

impl<T> SyncOperation<T> {
    pub fn identifier(&self) -> Identifier {
        self.handle.identifier()
    }

    /// Submit (if not already) and drain completions on the current thread until this
    /// operation's result arrives.
    pub fn wait(self, ring: &mut Ring) -> Result<T, Error> {
        ring.submit().map_err(Error::from)?;
        loop {
            if let Some(result) = self.slot.take() {
                return result;
            }
            ring.wait_for_result(1, None).map_err(Error::from)?;
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Builder::default()
    }

    pub fn dontfork(&mut self) -> &mut Self {
        self.dontfork = true;
        self
    }

    /// Busy-wait for completions instead of relying on interrupt-driven notification.
    pub fn iopoll(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_IOPOLL;
        self
    }

    pub fn clamp(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_CLAMP;
        self
    }

    /// Create the ring disabled; [`Ring::enable`] must be called before it accepts submissions.
    pub fn start_disabled(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_R_DISABLED;
        self
    }

    pub fn submit_all(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_SUBMIT_ALL;
        self
    }

    pub fn coop_taskrun(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_COOP_TASKRUN;
        self
    }

    pub fn taskrun_flag(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_TASKRUN_FLAG;
        self
    }

    pub fn sqe128(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_SQE128;
        self
    }

    pub fn cqe32(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_CQE32;
        self
    }

    pub fn single_issuer(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_SINGLE_ISSUER;
        self
    }

    pub fn defer_taskrun(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_DEFER_TASKRUN;
        self
    }

    pub fn no_mmap(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_NO_MMAP;
        self
    }

    pub fn registered_fd_only(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_REGISTERED_FD_ONLY;
        self
    }

    pub fn no_sqarray(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_NO_SQARRAY;
        self
    }

    pub fn hybrid_iopoll(&mut self) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_HYBRID_IOPOLL;
        self
    }

    /// Start a kernel thread that polls the submission queue, letting the application submit
    /// without ever entering the kernel. `idle` is how long (in milliseconds) the poll thread
    /// waits for new work before going to sleep.
    pub fn sqpoll(&mut self, cpu_affinity: Option<u32>, idle: u32) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_SQPOLL;
        self.params.sq_thread_idle = idle;
        if let Some(cpu) = cpu_affinity {
            self.params.flags |= sys::IORING_SETUP_SQ_AFF;
            self.params.sq_thread_cpu = cpu;
        }
        self
    }

    /// Size the completion queue independently of the submission queue's entry count.
    pub fn cqsize(&mut self, entries: u32) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_CQSIZE;
        self.params.cq_entries = entries;
        self
    }

    /// Share `existing`'s async worker pool rather than creating a new one.
    pub fn attach(&mut self, existing: &Ring) -> &mut Self {
        self.params.flags |= sys::IORING_SETUP_ATTACH_WQ;
        self.params.wq_fd = existing.fd.as_raw_fd() as _;
        self
    }

    pub fn build(&self, entries: u32) -> io::Result<Ring> {
        let ring = Ring::with_params(entries, self.params)?;
        if self.dontfork {
            ring.memory.sq_mmap.dontfork()?;
            ring.memory.sqe_mmap.dontfork()?;
            if let Some(cq_mmap) = ring.memory.cq_mmap.as_ref() {
                cq_mmap.dontfork()?;
            }
        }
        Ok(ring)
    }
}

impl Parameters {
    pub fn is_setup_sqpoll(&self) -> bool {
        self.0.flags & sys::IORING_SETUP_SQPOLL != 0
    }

    pub fn is_setup_iopoll(&self) -> bool {
        self.0.flags & sys::IORING_SETUP_IOPOLL != 0
    }

    pub fn is_feature_single_mmap(&self) -> bool {
        self.0.features & sys::IORING_FEAT_SINGLE_MMAP != 0
    }

    pub fn is_feature_nodrop(&self) -> bool {
        self.0.features & sys::IORING_FEAT_NODROP != 0
    }

    pub fn is_feature_submit_stable(&self) -> bool {
        self.0.features & sys::IORING_FEAT_SUBMIT_STABLE != 0
    }

    pub fn is_feature_ext_arg(&self) -> bool {
        self.0.features & sys::IORING_FEAT_EXT_ARG != 0
    }

    pub fn sq_entries(&self) -> u32 {
        self.0.sq_entries
    }

    pub fn cq_entries(&self) -> u32 {
        self.0.cq_entries
    }
}

impl AsRawFd for Ring {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl Drop for Ring {
    fn drop(&mut self) {
        unsafe {
            ManuallyDrop::drop(&mut self.memory);
        }
    }
}
