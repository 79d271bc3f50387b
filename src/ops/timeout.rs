//! One-shot and multi-shot timers, and timeout cancellation.

use crate::error::Error;
use crate::opcode;
use crate::operation::Op;
use crate::squeue::Entry;
use crate::sys;
use crate::types::{Clock, Multi, Timespec};

/// A one-shot timer, relative or absolute against one of the three kernel clocks. The timer
/// elapsing is success, not an error — only cancellation surfaces as one.
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    timespec: Timespec,
    absolute: bool,
    clock: Clock,
}

impl Timeout {
    pub fn after(duration: std::time::Duration) -> Self {
        Timeout {
            timespec: duration.into(),
            absolute: false,
            clock: Clock::Monotonic,
        }
    }

    pub fn at(deadline: Timespec) -> Self {
        Timeout {
            timespec: deadline,
            absolute: true,
            clock: Clock::Monotonic,
        }
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn flags(&self) -> u32 {
        let mut flags = self.clock.timeout_flags();
        if self.absolute {
            flags |= crate::types::TimeoutFlags::ABS;
        }
        flags.bits()
    }
}

impl Op for Timeout {
    const OPCODE: u8 = opcode::Timeout::CODE;

    type Output = ();

    fn build(&self, user_data: u64) -> Entry {
        opcode::Timeout::new(&self.timespec.0)
            .flags(self.flags())
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<(), Error> {
        match result {
            r if r >= 0 => Ok(()),
            r if -r == libc::ETIME => Ok(()),
            r => Err(Error::from_errno(r)),
        }
    }
}

/// A repeating timer. `repeat_count == 0` fires forever, until cancelled. `wait_until`-style
/// absolute deadlines are not offered here: the kernel's repeat semantics are only meaningful
/// against a relative period.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutMultishot {
    timespec: Timespec,
    repeat_count: u32,
    clock: Clock,
}

impl TimeoutMultishot {
    pub fn every(period: std::time::Duration, repeat_count: u32) -> Self {
        TimeoutMultishot {
            timespec: period.into(),
            repeat_count,
            clock: Clock::Monotonic,
        }
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

impl Op for TimeoutMultishot {
    const OPCODE: u8 = opcode::TimeoutMultishot::CODE;

    type Output = Multi<()>;

    fn build(&self, user_data: u64) -> Entry {
        opcode::TimeoutMultishot::new(&self.timespec.0, self.repeat_count)
            .flags(self.clock.timeout_flags().bits())
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, flags: u32) -> Result<Multi<()>, Error> {
        match result {
            r if r >= 0 => Ok(Multi { item: (), more: self.more(flags) }),
            r if -r == libc::ETIME => Ok(Multi { item: (), more: self.more(flags) }),
            r => Err(Error::from_errno(r)),
        }
    }

    fn more(&self, flags: u32) -> bool {
        flags & sys::IORING_CQE_F_MORE != 0
    }
}

/// Cancel a previously-submitted [`Timeout`] or [`TimeoutMultishot`] by its identifier.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutRemove {
    target: u64,
}

impl TimeoutRemove {
    pub fn new(target: crate::operation::Identifier) -> Self {
        TimeoutRemove {
            target: target.raw(),
        }
    }
}

impl Op for TimeoutRemove {
    const OPCODE: u8 = opcode::TimeoutRemove::CODE;

    type Output = ();

    fn build(&self, user_data: u64) -> Entry {
        opcode::TimeoutRemove::new(self.target)
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
