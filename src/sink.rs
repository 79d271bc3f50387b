//! The three completion disciplines an operation can be built with: fire-and-forget callback,
//! blocking synchronous wait, and task suspension.
//!
//! All three assume the single-threaded, one-submitter-one-completer model described for the
//! ring (no request is ever dispatched from a thread other than the one driving the ring), so
//! none of the shared state here needs to be `Sync`.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::Error;

/// A hook on an awaiting task's state, invoked instead of normal resumption when its operation is
/// cancelled mid-await. Task runtimes that want cooperative cancellation implement this on their
/// task handle and pass it to [`Sink::await_with_cancel`].
pub trait CancellationLandingPad {
    fn on_cancelled(&self);
}

/// The selected completion discipline for one operation. Constructed by the `ops` factory
/// functions, never directly.
pub(crate) enum Sink<T> {
    Callback(Box<dyn FnMut(Result<T, Error>)>),
    Sync(Rc<SyncSlot<T>>),
    Await(Rc<AwaitSlot<T>>),
}

impl<T> Sink<T> {
    pub(crate) fn callback(f: impl FnMut(Result<T, Error>) + 'static) -> Self {
        Sink::Callback(Box::new(f))
    }

    /// Deliver one completion. `more` is `true` for every completion but the last of a
    /// multi-shot stream; non-multi-shot sinks ignore it.
    pub(crate) fn deliver(&mut self, result: Result<T, Error>, more: bool) {
        match self {
            Sink::Callback(f) => f(result),
            Sink::Sync(slot) => slot.fill(result),
            Sink::Await(slot) => slot.fill(result, more),
        }
    }
}

/// Storage for the sync-wait discipline: at most one result, filled once by the ring's dispatch
/// and read back by [`SyncOperation::wait`](crate::ring::SyncOperation::wait).
pub(crate) struct SyncSlot<T> {
    result: Cell<Option<Result<T, Error>>>,
}

impl<T> SyncSlot<T> {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(SyncSlot {
            result: Cell::new(None),
        })
    }

    fn fill(&self, result: Result<T, Error>) {
        self.result.set(Some(result));
    }

    pub(crate) fn take(&self) -> Option<Result<T, Error>> {
        self.result.take()
    }
}

/// Storage for the task-await discipline: a result cell plus the waker to resume once it's
/// filled. Multi-shot streams buffer completions the task hasn't yet polled for.
pub(crate) struct AwaitSlot<T> {
    queue: RefCell<std::collections::VecDeque<Result<T, Error>>>,
    waker: RefCell<Option<Waker>>,
    done: Cell<bool>,
    landing_pad: RefCell<Option<Rc<dyn CancellationLandingPad>>>,
}

impl<T> AwaitSlot<T> {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(AwaitSlot {
            queue: RefCell::new(std::collections::VecDeque::new()),
            waker: RefCell::new(None),
            done: Cell::new(false),
            landing_pad: RefCell::new(None),
        })
    }

    pub(crate) fn set_landing_pad(&self, pad: Rc<dyn CancellationLandingPad>) {
        *self.landing_pad.borrow_mut() = Some(pad);
    }

    fn fill(&self, result: Result<T, Error>, more: bool) {
        let cancelled = matches!(&result, Err(e) if e.is_canceled());
        if cancelled {
            if let Some(pad) = self.landing_pad.borrow().as_ref() {
                pad.on_cancelled();
                self.done.set(true);
                self.wake();
                return;
            }
        }
        self.queue.borrow_mut().push_back(result);
        if !more {
            self.done.set(true);
        }
        self.wake();
    }

    fn wake(&self) {
        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }
}

/// A future resolving to the next completion of an await-sink operation. A multi-shot operation
/// is awaited once per event; the caller loops until `more` drops off.
pub struct Completion<T> {
    slot: Rc<AwaitSlot<T>>,
}

impl<T> Completion<T> {
    pub(crate) fn new(slot: Rc<AwaitSlot<T>>) -> Self {
        Completion { slot }
    }

    /// Attach a cancellation landing pad: invoked instead of normal resumption if this operation
    /// is cancelled while the future is pending.
    pub fn with_cancel(self, pad: Rc<dyn CancellationLandingPad>) -> Self {
        self.slot.set_landing_pad(pad);
        self
    }
}

impl<T> Future for Completion<T> {
    type Output = Option<Result<T, Error>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(result) = self.slot.queue.borrow_mut().pop_front() {
            return Poll::Ready(Some(result));
        }
        if self.slot.done.get() {
            return Poll::Ready(None);
        }
        *self.slot.waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}
