//! Cancellation by operation identifier or by originating descriptor.

use crate::error::Error;
use crate::opcode;
use crate::operation::{Identifier, Op};
use crate::squeue::Entry;
use crate::types::sealed::UseFixed;

/// Cancel the operation identified by `target`, or (with [`all`](Self::all)) every operation
/// sharing it — in practice always zero or one, since identifiers are unique per live operation.
#[derive(Debug, Clone, Copy)]
pub struct Cancel {
    id: u64,
    all: bool,
}

impl Cancel {
    pub fn by_id(target: Identifier) -> Self {
        Cancel {
            id: target.raw(),
            all: false,
        }
    }

    pub fn all(mut self) -> Self {
        self.all = true;
        self
    }
}

impl Op for Cancel {
    const OPCODE: u8 = opcode::AsyncCancel::CODE;

    type Output = u32;

    fn build(&self, user_data: u64) -> Entry {
        let mut c = opcode::AsyncCancel::new(self.id);
        if self.all {
            c = c.all();
        }
        c.build().user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<u32, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else if self.all {
            Ok(result as u32)
        } else {
            Ok(1)
        }
    }
}

/// Cancel every request pending against `fd`.
#[derive(Debug, Clone, Copy)]
pub struct CancelByFd<F> {
    fd: F,
    all: bool,
}

impl<F: UseFixed + Copy> CancelByFd<F> {
    pub fn new(fd: F) -> Self {
        CancelByFd { fd, all: false }
    }

    pub fn all(mut self) -> Self {
        self.all = true;
        self
    }
}

impl<F: UseFixed + Copy> Op for CancelByFd<F> {
    const OPCODE: u8 = opcode::AsyncCancel::CODE;

    type Output = u32;

    fn build(&self, user_data: u64) -> Entry {
        let mut c = opcode::AsyncCancel::from_fd(self.fd);
        if self.all {
            c = c.all();
        }
        c.build().user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<u32, Error> {
        if result < 0 {
            Err(Error::from_errno(result))
        } else if self.all {
            Ok(result as u32)
        } else {
            Ok(1)
        }
    }
}
