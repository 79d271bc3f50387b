//! Submission Queue

use core::fmt::{self, Debug, Formatter};
use core::mem;
use core::sync::atomic;

use bitflags::bitflags;

use crate::sys;
use crate::util::{unsync_load, Mmap};

bitflags! {
    /// Submission-queue entry modifiers, set with [`Entry::flags`].
    pub struct Flags: u8 {
        /// Issue the operation against a [fixed file](crate::types::Fixed) rather than a raw fd.
        const FIXED_FILE = sys::IOSQE_FIXED_FILE;
        /// Do not start this request until previous requests in the submission queue have
        /// completed.
        const IO_DRAIN = sys::IOSQE_IO_DRAIN;
        /// Chain this request to the one after it; the next entry will not start until this one
        /// completes.
        const IO_LINK = sys::IOSQE_IO_LINK;
        /// Like `IO_LINK`, but the chain is not broken if this request fails.
        const IO_HARDLINK = sys::IOSQE_IO_HARDLINK;
        /// Always issue this request out-of-line, on an io_uring worker thread.
        const ASYNC = sys::IOSQE_ASYNC;
        /// Select the destination buffer for this request from a registered provided-buffer
        /// group rather than the address given in the entry.
        const BUFFER_SELECT = sys::IOSQE_BUFFER_SELECT;
        /// Do not post a completion queue entry if this request succeeds.
        const CQE_SKIP_SUCCESS = sys::IOSQE_CQE_SKIP_SUCCESS;
    }
}

pub(crate) struct Inner {
    head: *const atomic::AtomicU32,
    tail: *const atomic::AtomicU32,
    ring_mask: u32,
    ring_entries: u32,
    flags: *const atomic::AtomicU32,
    dropped: *const atomic::AtomicU32,
    sqes: *mut sys::io_uring_sqe,
}

/// An io_uring instance's submission queue. This is used to send I/O requests to the kernel.
pub struct SubmissionQueue {
    inner: Inner,
}

/// A view of the [`SubmissionQueue`] that borrows it exclusively for pushing entries; flushed to
/// the shared ring on drop.
pub struct AvailableQueue<'a> {
    head: u32,
    tail: u32,
    queue: &'a Inner,
}

/// A single 64-byte submission queue entry (SQE), representing one request for an I/O operation.
///
/// These are produced by the builders in [`opcode`](crate::opcode).
#[repr(transparent)]
pub struct Entry(pub(crate) sys::io_uring_sqe);

impl SubmissionQueue {
    #[rustfmt::skip]
    pub(crate) unsafe fn new(sq_mmap: &Mmap, sqe_mmap: &Mmap, p: &sys::io_uring_params) -> Self {
        let head         = sq_mmap.offset(p.sq_off.head        ) as *const atomic::AtomicU32;
        let tail         = sq_mmap.offset(p.sq_off.tail        ) as *const atomic::AtomicU32;
        let ring_mask    = sq_mmap.offset(p.sq_off.ring_mask   ).cast::<u32>().read();
        let ring_entries = sq_mmap.offset(p.sq_off.ring_entries).cast::<u32>().read();
        let flags        = sq_mmap.offset(p.sq_off.flags       ) as *const atomic::AtomicU32;
        let dropped      = sq_mmap.offset(p.sq_off.dropped     ) as *const atomic::AtomicU32;
        let array        = sq_mmap.offset(p.sq_off.array       ) as *mut u32;

        let sqes = sqe_mmap.as_mut_ptr() as *mut sys::io_uring_sqe;

        for i in 0..ring_entries {
            array.add(i as usize).write_volatile(i);
        }

        SubmissionQueue {
            inner: Inner {
                head,
                tail,
                ring_mask,
                ring_entries,
                flags,
                dropped,
                sqes,
            },
        }
    }

    /// Borrow this queue for pushing new entries. Flushed to the kernel-visible tail on drop.
    pub fn available(&mut self) -> AvailableQueue<'_> {
        AvailableQueue {
            head: unsafe { (*self.inner.head).load(atomic::Ordering::Acquire) },
            tail: unsafe { unsync_load(self.inner.tail) },
            queue: &self.inner,
        }
    }

    /// When [`Parameters::is_setup_sqpoll`](crate::Parameters::is_setup_sqpoll) is set, whether
    /// the kernel's polling thread has gone to sleep and requires a syscall to wake it up.
    pub fn need_wakeup(&self) -> bool {
        unsafe {
            (*self.inner.flags).load(atomic::Ordering::Acquire) & sys::IORING_SQ_NEED_WAKEUP != 0
        }
    }

    /// The number of invalid submission queue entries encountered since the ring was created.
    pub fn dropped(&self) -> u32 {
        unsafe { (*self.inner.dropped).load(atomic::Ordering::Acquire) }
    }

    /// Raw head/tail/flags pointers, for [`Submitter`](crate::submit::Submitter)'s wakeup and
    /// overflow checks.
    pub(crate) fn raw_parts(
        &self,
    ) -> (
        *const atomic::AtomicU32,
        *const atomic::AtomicU32,
        *const atomic::AtomicU32,
    ) {
        (self.inner.head, self.inner.tail, self.inner.flags)
    }
}

impl AvailableQueue<'_> {
    /// Synchronize with the shared ring: flush pushed entries, refresh the observed head.
    pub fn sync(&mut self) {
        unsafe {
            (*self.queue.tail).store(self.tail, atomic::Ordering::Release);
            self.head = (*self.queue.head).load(atomic::Ordering::Acquire);
        }
    }

    /// Total number of slots in the submission queue ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.ring_entries as usize
    }

    /// Number of entries currently queued but not yet consumed by the kernel.
    #[inline]
    pub fn len(&self) -> usize {
        self.tail.wrapping_sub(self.head) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Attempt to push a single entry. Returns the entry back on failure if the queue is full.
    ///
    /// # Safety
    ///
    /// The caller must ensure that every pointer embedded in `entry` (buffers, iovecs, addresses)
    /// remains valid until the matching completion has been observed.
    #[inline]
    pub unsafe fn push(&mut self, entry: Entry) -> Result<(), Entry> {
        if self.is_full() {
            return Err(entry);
        }
        self.push_unchecked(entry);
        Ok(())
    }

    #[inline]
    unsafe fn push_unchecked(&mut self, entry: Entry) {
        *self.queue.sqes.add((self.tail & self.queue.ring_mask) as usize) = entry.0;
        self.tail = self.tail.wrapping_add(1);
    }
}

impl Drop for AvailableQueue<'_> {
    #[inline]
    fn drop(&mut self) {
        unsafe { &*self.queue.tail }.store(self.tail, atomic::Ordering::Release);
    }
}

impl Entry {
    /// Set this entry's [flags](Flags).
    #[inline]
    pub fn flags(mut self, flags: Flags) -> Entry {
        self.0.flags |= flags.bits();
        self
    }

    /// Set the user-data word, round-tripped unchanged into the matching completion.
    #[inline]
    pub fn user_data(mut self, user_data: u64) -> Entry {
        self.0.user_data = user_data;
        self
    }

    /// Set the personality this request is issued under, obtained from
    /// [`Submitter::register_personality`](crate::submit::Submitter::register_personality).
    #[inline]
    pub fn personality(mut self, personality: u16) -> Entry {
        self.0.personality = personality;
        self
    }

    #[inline]
    pub(crate) fn raw_flags(&self) -> u8 {
        self.0.flags
    }
}

impl Clone for Entry {
    fn clone(&self) -> Entry {
        Entry(unsafe { mem::transmute_copy(&self.0) })
    }
}

impl Debug for Entry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("opcode", &self.0.opcode)
            .field("flags", &self.0.flags)
            .field("user_data", &self.0.user_data)
            .finish()
    }
}

#[test]
fn entry_is_one_sqe() {
    assert_eq!(mem::size_of::<Entry>(), mem::size_of::<sys::io_uring_sqe>());
}
