//! The operation object: a pinned, heap-allocated value that owns one in-flight request's
//! configuration and completion sink from submission through its last completion.
//!
//! Every operation is reached by two independent paths: the value returned to the caller (a
//! [`Handle`]), and the raw `user_data` word round-tripped through the kernel ring. The low three
//! bits of that word are reserved to distinguish an ordinary operation completion (kind 0) from
//! the two unregistration-notification kinds the fixed-resource tables use; see
//! [`crate::fixed`]. `Slot<O>` is over-aligned to guarantee those bits are free on every pointer
//! this module hands the kernel.

use std::marker::PhantomData;

use crate::error::Error;
use crate::sink::Sink;
use crate::squeue::Entry;

/// A submission opcode plus its completion decoding: the minimal contract every operation in
/// [`crate::ops`] implements over a builder from [`crate::opcode`].
pub trait Op: Sized {
    /// The value delivered to the sink on success.
    type Output;

    /// The kernel opcode this operation submits as, used to consult the ring's cached feature
    /// probe before submission.
    const OPCODE: u8;

    /// Write this operation's configuration into a fresh submission entry. Deterministic: called
    /// once per ring round-trip (repeatedly, unchanged, for a multi-shot operation that the
    /// kernel re-arms on its own needs no further `build` calls — multi-shot entries are built
    /// once and then produce many completions).
    fn build(&self, user_data: u64) -> Entry;

    /// Translate one completion's signed result and flags bitset into this operation's output.
    /// Most operations treat negative results as errors and defer to
    /// [`Error::from_errno`]; the few exceptions (pure timeout, cancel) override this.
    fn decode(&self, result: i32, flags: u32) -> Result<Self::Output, Error>;

    /// Whether a multi-shot stream continues after this completion. Single-completion operations
    /// never override the default.
    fn more(&self, _flags: u32) -> bool {
        false
    }
}

/// Low three bits of every `user_data` word: discriminates ordinary operation completions from
/// the two unregistration-notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub(crate) enum Tag {
    Operation = 0,
    FdUnregister = 1,
    BufferUnregister = 2,
}

pub(crate) const TAG_MASK: u64 = 0b111;

impl Tag {
    pub(crate) fn from_bits(bits: u64) -> Option<Tag> {
        match bits & TAG_MASK {
            0 => Some(Tag::Operation),
            1 => Some(Tag::FdUnregister),
            2 => Some(Tag::BufferUnregister),
            _ => None,
        }
    }

    pub(crate) fn pack(self, payload: u64) -> u64 {
        debug_assert_eq!(payload & TAG_MASK, 0, "payload overlaps the tag bits");
        payload | (self as u64)
    }
}

/// An operation's stable identifier: the pointer stamped into the kernel's user-data field,
/// reported back so cancellation can target exactly this operation. Two concurrently live
/// operations never share one; an identifier may be reused once its operation has retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier(u64);

impl Identifier {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Identifier(raw)
    }

    pub(crate) fn raw(self) -> u64 {
        self.0
    }
}

/// Every `Slot<O>`'s layout begins with this header, so a completion can be routed back to the
/// right `dispatch` instantiation without the ring ever naming `O`. Both structs are `repr(C)`,
/// which guarantees the header's fields sit at the same offsets in each.
#[repr(C)]
struct Header {
    dispatch: unsafe fn(u64, i32, u32) -> bool,
}

/// The heap-allocated operation object: `O`'s configuration plus its sink, addressable by a
/// stable, 8-byte-aligned pointer for as long as it has completions outstanding.
#[repr(C, align(8))]
pub(crate) struct Slot<O: Op> {
    header: Header,
    op: O,
    sink: Sink<O::Output>,
}

impl<O: Op> Slot<O> {
    /// Box the operation, returning its stable identifier and the entry to submit.
    pub(crate) fn into_submission(op: O, sink: Sink<O::Output>) -> (Identifier, Entry) {
        let boxed = Box::new(Slot {
            header: Header {
                dispatch: Self::dispatch,
            },
            op,
            sink,
        });
        let ptr = Box::into_raw(boxed);
        let raw = Tag::Operation.pack(ptr as u64);
        let entry = unsafe { &*ptr }.op.build(raw);
        (Identifier::from_raw(raw), entry)
    }

    /// Reconstruct the operation from its tagged pointer and deliver one completion. Returns
    /// `true` if the kernel will produce further completions for this same submission (the
    /// pointer must not be reclaimed in that case).
    ///
    /// # Safety
    ///
    /// `raw` must be a pointer previously produced by [`into_submission`](Self::into_submission)
    /// for this exact `O`, not already reclaimed.
    unsafe fn dispatch(raw: u64, result: i32, flags: u32) -> bool {
        let ptr = (raw & !TAG_MASK) as *mut Slot<O>;
        let keep_alive = {
            let slot = &mut *ptr;
            let more = slot.op.more(flags);
            let decoded = slot.op.decode(result, flags);
            slot.sink.deliver(decoded, more);
            more
        };
        if !keep_alive {
            drop(Box::from_raw(ptr));
        }
        keep_alive
    }
}

/// Dispatch a completion whose operation type has been erased, via the function pointer stored
/// in its [`Header`].
///
/// # Safety
///
/// `raw` must be a tagged pointer previously produced by `Slot::<O>::into_submission` for some
/// `O`, not already reclaimed.
pub(crate) unsafe fn dispatch_opaque(raw: u64, result: i32, flags: u32) -> bool {
    let header = &*((raw & !TAG_MASK) as *const Header);
    (header.dispatch)(raw, result, flags)
}

/// A non-owning, type-erased marker returned alongside the stable identifier, so callers can
/// request cancellation without naming the operation's concrete type.
#[derive(Debug, Clone, Copy)]
pub struct Handle<T> {
    id: Identifier,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(id: Identifier) -> Self {
        Handle {
            id,
            _marker: PhantomData,
        }
    }

    pub fn identifier(&self) -> Identifier {
        self.id
    }
}
