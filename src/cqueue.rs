//! Completion Queue

use core::sync::atomic;

use crate::sys;
use crate::util::{unsync_load, Mmap};

/// An io_uring instance's completion queue: every I/O operation that has finished shows up here
/// exactly once (twice, for multi-shot and zero-copy operations — see [`Entry::flags`]).
pub struct CompletionQueue {
    head: *const atomic::AtomicU32,
    tail: *const atomic::AtomicU32,
    ring_mask: u32,
    ring_entries: u32,
    overflow: *const atomic::AtomicU32,
    cqes: *const sys::io_uring_cqe,
}

/// An entry in the completion queue, representing one finished (or partially finished, for
/// multi-shot/zero-copy operations) I/O operation.
#[derive(Clone, Copy)]
pub struct Entry(pub(crate) sys::io_uring_cqe);

impl CompletionQueue {
    #[rustfmt::skip]
    pub(crate) unsafe fn new(cq_mmap: &Mmap, p: &sys::io_uring_params) -> CompletionQueue {
        let head         = cq_mmap.offset(p.cq_off.head         ) as *const atomic::AtomicU32;
        let tail         = cq_mmap.offset(p.cq_off.tail         ) as *const atomic::AtomicU32;
        let ring_mask    = cq_mmap.offset(p.cq_off.ring_mask    ).cast::<u32>().read();
        let ring_entries = cq_mmap.offset(p.cq_off.ring_entries ).cast::<u32>().read();
        let overflow     = cq_mmap.offset(p.cq_off.overflow     ) as *const atomic::AtomicU32;
        let cqes         = cq_mmap.offset(p.cq_off.cqes         ) as *const sys::io_uring_cqe;

        CompletionQueue {
            head,
            tail,
            ring_mask,
            ring_entries,
            overflow,
            cqes,
        }
    }

    /// Number of completions dropped because the completion ring overflowed while the kernel's
    /// "no drop" feature was unavailable or disabled.
    pub fn overflow(&self) -> u32 {
        unsafe { (*self.overflow).load(atomic::Ordering::Acquire) }
    }

    /// Total number of slots in the completion queue ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring_entries as usize
    }

    /// Number of unread completion entries currently in the ring.
    #[inline]
    pub fn len(&self) -> usize {
        unsafe {
            let head = unsync_load(self.head);
            let tail = (*self.tail).load(atomic::Ordering::Acquire);
            tail.wrapping_sub(head) as usize
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Borrow an iterator over the completions currently available without blocking; each
    /// consumed entry advances the shared head so it is not seen twice.
    pub fn available(&mut self) -> Available<'_> {
        Available { queue: self }
    }
}

/// Iterator over the completion entries currently in the ring.
pub struct Available<'a> {
    queue: &'a CompletionQueue,
}

impl Iterator for Available<'_> {
    type Item = Entry;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        unsafe {
            let head = unsync_load(self.queue.head);
            let tail = (*self.queue.tail).load(atomic::Ordering::Acquire);

            if head == tail {
                return None;
            }

            let entry = *self.queue.cqes.add((head & self.queue.ring_mask) as usize);
            (*self.queue.head).store(head.wrapping_add(1), atomic::Ordering::Release);
            Some(Entry(entry))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.queue.len();
        (len, Some(len))
    }
}

impl Entry {
    /// The operation's raw, signed kernel result — the return value of the underlying syscall,
    /// or its negated errno on failure.
    #[inline]
    pub fn result(&self) -> i32 {
        self.0.res
    }

    /// The raw 64-bit user-data word, as stamped on the matching
    /// [`Entry::user_data`](crate::squeue::Entry::user_data).
    #[inline]
    pub fn user_data(&self) -> u64 {
        self.0.user_data
    }

    /// Completion-specific metadata flags.
    ///
    /// Two bits matter to the multi-shot/zero-copy protocol: [`is_more`](Entry::is_more) and
    /// [`is_notif`](Entry::is_notif).
    #[inline]
    pub fn flags(&self) -> u32 {
        self.0.flags
    }

    /// `true` if this is not the final completion of a multi-shot or zero-copy submission —
    /// more completions for the same request are still to come.
    #[inline]
    pub fn is_more(&self) -> bool {
        self.0.flags & sys::IORING_CQE_F_MORE != 0
    }

    /// `true` if this completion is a zero-copy send's buffer-release notification.
    #[inline]
    pub fn is_notif(&self) -> bool {
        self.0.flags & sys::IORING_CQE_F_NOTIF != 0
    }

    /// The selected provided-buffer id, if this completion used [`Flags::BUFFER_SELECT`](crate::squeue::Flags::BUFFER_SELECT).
    #[inline]
    pub fn buffer_id(&self) -> Option<u16> {
        if self.0.flags & sys::IORING_CQE_F_BUFFER != 0 {
            Some((self.0.flags >> sys::IORING_CQE_BUFFER_SHIFT) as u16)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("result", &self.0.res)
            .field("user_data", &self.0.user_data)
            .field("flags", &self.0.flags)
            .finish()
    }
}
