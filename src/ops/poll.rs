//! Single-shot and multi-shot `poll(2)`-style readiness waits.

use crate::error::Error;
use crate::opcode;
use crate::operation::{Identifier, Op};
use crate::squeue::Entry;
use crate::sys;
use crate::types::sealed::UseFixed;
use crate::types::Multi;

/// Wait once for `events` to become ready on `fd`.
#[derive(Debug, Clone, Copy)]
pub struct PollAdd<F> {
    fd: F,
    events: u32,
}

impl<F: UseFixed + Copy> PollAdd<F> {
    pub fn new(fd: F, events: u32) -> Self {
        PollAdd { fd, events }
    }
}

impl<F: UseFixed + Copy> Op for PollAdd<F> {
    const OPCODE: u8 = opcode::PollAdd::CODE;

    type Output = u32;

    fn build(&self, user_data: u64) -> Entry {
        opcode::PollAdd::new(self.fd.into_target(), self.events)
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

/// Repeated poll: a fresh completion every time `events` become ready, until removed with
/// [`PollRemove`].
#[derive(Debug, Clone, Copy)]
pub struct PollAddMulti<F> {
    fd: F,
    events: u32,
}

impl<F: UseFixed + Copy> PollAddMulti<F> {
    pub fn new(fd: F, events: u32) -> Self {
        PollAddMulti { fd, events }
    }
}

impl<F: UseFixed + Copy> Op for PollAddMulti<F> {
    const OPCODE: u8 = opcode::PollAddMulti::CODE;

    type Output = Multi<u32>;

    fn build(&self, user_data: u64) -> Entry {
        opcode::PollAddMulti::new(self.fd, self.events)
            .build()
            .user_data(user_data)
    }

    fn decode(&self, result: i32, flags: u32) -> Result<Multi<u32>, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(Multi {
                item: result as u32,
                more: self.more(flags),
            })
        }
    }

    fn more(&self, flags: u32) -> bool {
        flags & sys::IORING_CQE_F_MORE != 0
    }
}

/// Remove a previously-submitted poll request by its identifier.
#[derive(Debug, Clone, Copy)]
pub struct PollRemove(u64);

impl PollRemove {
    pub fn new(target: Identifier) -> Self {
        PollRemove(target.raw())
    }
}

impl Op for PollRemove {
    const OPCODE: u8 = opcode::PollRemove::CODE;

    type Output = ();

    fn build(&self, user_data: u64) -> Entry {
        opcode::PollRemove::new(self.0).build().user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<(), Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(())
        }
    }
}
