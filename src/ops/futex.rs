//! `FUTEX_WAIT` / `FUTEX_WAKE` / `FUTEX_WAITV`: the fast userspace mutex primitives exposed
//! straight through the ring rather than via the `futex(2)` syscall.

use crate::error::Error;
use crate::opcode;
use crate::operation::Op;
use crate::squeue::Entry;
use crate::sys;

/// Wait until `*addr != expected` is no longer true, or until woken by a matching
/// [`FutexWake`]/[`FutexWaitV`].
pub struct FutexWait {
    addr: *const u32,
    expected: u64,
    mask: u64,
    private: bool,
}

impl FutexWait {
    /// # Safety
    ///
    /// `addr` must stay valid until the completion is observed.
    pub unsafe fn new(addr: *const u32, expected: u32) -> Self {
        FutexWait {
            addr,
            expected: expected as u64,
            mask: u64::MAX,
            private: false,
        }
    }

    pub fn mask(mut self, mask: u64) -> Self {
        self.mask = mask;
        self
    }

    /// Restrict the wait to futexes private to this process (`FUTEX_PRIVATE_FLAG`-equivalent).
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    fn flags(&self) -> u32 {
        if self.private {
            sys::FUTEX2_PRIVATE
        } else {
            0
        }
    }
}

impl Op for FutexWait {
    const OPCODE: u8 = opcode::FutexWait::CODE;

    type Output = ();

    fn build(&self, user_data: u64) -> Entry {
        opcode::FutexWait::new(self.addr, self.expected, self.mask)
            .futex_flags(self.flags())
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

/// Wake up to `count` waiters blocked in [`FutexWait`]/[`FutexWaitV`] on `addr`.
pub struct FutexWake {
    addr: *const u32,
    count: u64,
    mask: u64,
    private: bool,
}

impl FutexWake {
    /// # Safety
    ///
    /// `addr` must stay valid until the completion is observed.
    pub unsafe fn new(addr: *const u32, count: u32) -> Self {
        FutexWake {
            addr,
            count: count as u64,
            mask: u64::MAX,
            private: false,
        }
    }

    pub fn mask(mut self, mask: u64) -> Self {
        self.mask = mask;
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    fn flags(&self) -> u32 {
        if self.private {
            sys::FUTEX2_PRIVATE
        } else {
            0
        }
    }
}

impl Op for FutexWake {
    const OPCODE: u8 = opcode::FutexWake::CODE;

    /// Number of waiters actually woken.
    type Output = u32;

    fn build(&self, user_data: u64) -> Entry {
        opcode::FutexWake::new(self.addr, self.count, self.mask)
            .futex_flags(self.flags())
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

/// Wait on several futexes at once, waking on the first whose condition matches.
pub struct FutexWaitV {
    futexv: *const sys::futex_waitv,
    nr_futex: u32,
}

impl FutexWaitV {
    /// # Safety
    ///
    /// `futexv` must point to `nr_futex` valid, live entries until the completion is observed.
    pub unsafe fn new(futexv: *const sys::futex_waitv, nr_futex: u32) -> Self {
        FutexWaitV { futexv, nr_futex }
    }
}

impl Op for FutexWaitV {
    const OPCODE: u8 = opcode::FutexWaitV::CODE;

    /// Index of the futex entry that woke the wait.
    type Output = u32;

    fn build(&self, user_data: u64) -> Entry {
        opcode::FutexWaitV::new(self.futexv, self.nr_futex)
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
