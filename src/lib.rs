//! A typed, composable asynchronous I/O framework built on the Linux `io_uring` interface.
//!
//! The crate only provides a summary of the parameters. For the authoritative behavior of any
//! given opcode, see the kernel's `io_uring_enter(2)`/`io_uring_register(2)` manpages.
//!
//! The [`Ring`] is the entry point: it owns the kernel ring, the cached opcode feature probe, and
//! the fixed-file/fixed-buffer tables. Operations are built from [`ops`] (one type per opcode
//! family) and submitted through one of three completion disciplines — a callback
//! ([`Ring::make`]), a blocking wait ([`Ring::make_sync`]), or a task-suspending future
//! ([`Ring::make_await`]).

pub mod addr;
pub mod cqueue;
pub mod error;
mod fixed;
pub mod opcode;
pub mod operation;
pub mod ops;
pub mod protodb;
mod register;
mod ring;
mod sink;
pub mod squeue;
mod submit;
mod sys;
pub mod types;
mod util;
pub mod version;

pub use addr::{AddressV4, AddressV6, PeerInfo};
pub use cqueue::CompletionQueue;
pub use error::{Error, Kind};
pub use operation::{Handle, Identifier};
pub use register::Probe;
pub use ring::{Builder, Parameters, Ring, SyncOperation};
pub use sink::{CancellationLandingPad, Completion};
pub use squeue::SubmissionQueue;
pub use types::{
    CancelBuilder, CancelFlags, Clock, DestinationSlot, Fd, Fixed, FixedSocket, FsyncFlags,
    OpenHow, RecvMsgOut, SubmitArgs, Timespec, TimeoutFlags,
};
pub use version::Version;
