//! Types and helpers for the `io_uring_register(2)` family of calls: feature probing and the
//! one-time restriction allowlist.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::os::unix::io::RawFd;
use std::{fmt, io, mem, ptr};

use crate::sys;

pub(crate) fn execute(
    fd: RawFd,
    opcode: u32,
    arg: *const libc::c_void,
    len: u32,
) -> io::Result<u32> {
    let ret = unsafe { sys::io_uring_register(fd, opcode, arg, len) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as u32)
    }
}

/// Information about which `io_uring` opcodes the running kernel supports.
///
/// Fill this in with [`Submitter::register_probe`](crate::submit::Submitter::register_probe).
pub struct Probe(ptr::NonNull<sys::io_uring_probe>);

impl Probe {
    pub(crate) const COUNT: usize = 256;
    pub(crate) const SIZE: usize = mem::size_of::<sys::io_uring_probe>()
        + Self::COUNT * mem::size_of::<sys::io_uring_probe_op>();

    /// Create a new probe with no opcodes marked as supported yet.
    #[allow(clippy::cast_ptr_alignment)]
    pub fn new() -> Probe {
        let align = Layout::new::<sys::io_uring_probe>().align();
        let ptr = unsafe {
            let layout = Layout::from_size_align_unchecked(Probe::SIZE, align);
            alloc_zeroed(layout)
        };

        ptr::NonNull::new(ptr)
            .map(ptr::NonNull::cast)
            .map(Probe)
            .expect("Probe allocation failed")
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut sys::io_uring_probe {
        self.0.as_ptr()
    }

    /// Whether `opcode` (an `IORING_OP_*` constant) is supported by the running kernel.
    pub fn is_supported(&self, opcode: u8) -> bool {
        unsafe {
            let probe = &*self.0.as_ptr();
            if opcode as usize > probe.last_op as usize {
                return false;
            }
            let ops = self.ops_slice(Self::COUNT);
            ops[opcode as usize].flags & sys::IO_URING_OP_SUPPORTED != 0
        }
    }

    unsafe fn ops_slice(&self, len: usize) -> &[sys::io_uring_probe_op] {
        let base = (self.0.as_ptr() as *const u8).add(mem::size_of::<sys::io_uring_probe>());
        std::slice::from_raw_parts(base as *const sys::io_uring_probe_op, len)
    }
}

impl Default for Probe {
    #[inline]
    fn default() -> Probe {
        Probe::new()
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Op(sys::io_uring_probe_op);

        impl fmt::Debug for Op {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct("Op").field("code", &self.0.op).finish()
            }
        }

        let probe = unsafe { &*self.0.as_ptr() };
        let list = unsafe { self.ops_slice(probe.last_op as usize + 1) };
        let list = list
            .iter()
            .filter(|op| op.flags & sys::IO_URING_OP_SUPPORTED != 0)
            .map(|&op| Op(op));

        f.debug_set().entries(list).finish()
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        let align = Layout::new::<sys::io_uring_probe>().align();
        unsafe {
            let layout = Layout::from_size_align_unchecked(Probe::SIZE, align);
            dealloc(self.0.as_ptr() as *mut _, layout);
        }
    }
}

/// One allowed feature in a permanent restriction allowlist, set with
/// [`Submitter::register_restrictions`](crate::submit::Submitter::register_restrictions).
#[repr(transparent)]
pub struct Restriction(sys::io_uring_restriction);

#[inline(always)]
fn res_zeroed() -> sys::io_uring_restriction {
    unsafe { mem::zeroed() }
}

impl Restriction {
    /// Allow an `io_uring_register` opcode (an `IORING_REGISTER_*` constant).
    pub fn register_op(op: u8) -> Restriction {
        let mut res = res_zeroed();
        res.opcode = sys::IORING_RESTRICTION_REGISTER_OP;
        res.register_or_sqe_op_or_sqe_flags.register_op = op;
        Restriction(res)
    }

    /// Allow a submission opcode (an `IORING_OP_*` constant).
    pub fn sqe_op(op: u8) -> Restriction {
        let mut res = res_zeroed();
        res.opcode = sys::IORING_RESTRICTION_SQE_OP;
        res.register_or_sqe_op_or_sqe_flags.sqe_op = op;
        Restriction(res)
    }

    /// Allow the given [submission flags](crate::squeue::Flags) to be set on a request.
    pub fn sqe_flags_allowed(flags: crate::squeue::Flags) -> Restriction {
        let mut res = res_zeroed();
        res.opcode = sys::IORING_RESTRICTION_SQE_FLAGS_ALLOWED;
        res.register_or_sqe_op_or_sqe_flags.sqe_flags = flags.bits();
        Restriction(res)
    }

    /// Require the given [submission flags](crate::squeue::Flags) on every request.
    pub fn sqe_flags_required(flags: crate::squeue::Flags) -> Restriction {
        let mut res = res_zeroed();
        res.opcode = sys::IORING_RESTRICTION_SQE_FLAGS_REQUIRED;
        res.register_or_sqe_op_or_sqe_flags.sqe_flags = flags.bits();
        Restriction(res)
    }
}

/// A sentinel fd value for [`Submitter::register_files_update`](crate::submit::Submitter::register_files_update):
/// leaves the existing entry at that slot untouched.
pub const SKIP_FILE: RawFd = sys::IORING_REGISTER_FILES_SKIP;
