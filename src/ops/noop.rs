//! The no-op probe: exercises submit/complete without touching the kernel's I/O subsystems.

use crate::error::Error;
use crate::opcode;
use crate::operation::Op;
use crate::squeue::Entry;

/// A no-op, optionally configured to complete with an injected error instead of success — useful
/// for exercising a completion discipline's error path without a real failing syscall.
#[derive(Debug, Default, Clone, Copy)]
pub struct Noop {
    inject_error: Option<i32>,
}

impl Noop {
    pub fn new() -> Self {
        Noop::default()
    }

    /// Complete with this errno instead of success.
    pub fn inject_error(mut self, errno: i32) -> Self {
        self.inject_error = Some(errno);
        self
    }
}

impl Op for Noop {
    const OPCODE: u8 = opcode::Nop::CODE;

    type Output = ();

    fn build(&self, user_data: u64) -> Entry {
        opcode::Nop::new().build().user_data(user_data)
    }

    fn decode(&self, result: i32, _flags: u32) -> Result<(), Error> {
        if let Some(errno) = self.inject_error {
            return Err(Error::from_errno(errno));
        }
        if result < 0 {
            Err(Error::from_errno(result))
        } else {
            Ok(())
        }
    }
}
