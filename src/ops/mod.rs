//! The typed operation library: one type per opcode contract from the kernel ring, each
//! implementing [`crate::operation::Op`] over a builder from [`crate::opcode`].
//!
//! These are the types [`crate::ring::Ring::make`] and friends are generic over. Nothing here
//! talks to the kernel directly — `build`/`decode` are pure functions of the operation's
//! configured state, called by the ring at submission and completion time respectively.

pub mod cancel;
pub mod file;
pub mod futex;
pub mod net;
pub mod noop;
pub mod poll;
pub mod sockopt;
pub mod timeout;
