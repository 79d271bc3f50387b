//! The crate's error taxonomy: kernel-errno-backed completion errors, feature-gate errors, and
//! programmer-error assertions that abort rather than return in debug builds.

use std::fmt;
use std::io;

/// Kernel errno codes this crate gives a dedicated variant to, because callers routinely need to
/// branch on them rather than treat every failure alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// `ECANCELED` — the request was cancelled before it completed.
    OperationCanceled,
    /// `ETIME` — a linked timeout fired, or a timeout request's own deadline elapsed.
    TimerElapsed,
    /// `EAGAIN` — the non-blocking op would have blocked; retry later.
    TryAgain,
    /// `EINVAL` — malformed argument, rejected before or during submission.
    InvalidArgument,
    /// `ENOBUFS` / `ENOMEM`-class transient resource exhaustion.
    ResourceUnavailable,
    /// Any other kernel errno not given its own variant.
    Other(i32),
}

impl Kind {
    fn from_errno(errno: i32) -> Self {
        match errno {
            libc::ECANCELED => Kind::OperationCanceled,
            libc::ETIME => Kind::TimerElapsed,
            libc::EAGAIN => Kind::TryAgain,
            libc::EINVAL => Kind::InvalidArgument,
            libc::ENOBUFS | libc::ENOMEM => Kind::ResourceUnavailable,
            other => Kind::Other(other),
        }
    }
}

/// The crate's unified error type. A completion's negative result is mapped into this through
/// [`Error::from_errno`]; `invalid_argument`/`function_not_supported` are also raised directly
/// by address parsing and capability checks before a request ever reaches the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    kind: Kind,
}

impl Error {
    pub(crate) fn from_errno(errno: i32) -> Self {
        Error {
            kind: Kind::from_errno(errno.unsigned_abs() as i32),
        }
    }

    pub fn invalid_argument() -> Self {
        Error {
            kind: Kind::InvalidArgument,
        }
    }

    /// Raised when a caller requests an opcode or sqe flag the cached
    /// [`Probe`](crate::register::Probe) says the running kernel lacks.
    pub fn function_not_supported() -> Self {
        Error {
            kind: Kind::Other(libc::EOPNOTSUPP),
        }
    }

    pub fn would_block() -> Self {
        Error {
            kind: Kind::TryAgain,
        }
    }

    pub fn resource_unavailable() -> Self {
        Error {
            kind: Kind::ResourceUnavailable,
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self.kind, Kind::OperationCanceled)
    }

    pub fn is_timer_elapsed(&self) -> bool {
        matches!(self.kind, Kind::TimerElapsed)
    }

    pub fn is_would_block(&self) -> bool {
        matches!(self.kind, Kind::TryAgain)
    }

    pub fn raw_os_error(&self) -> Option<i32> {
        match self.kind {
            Kind::OperationCanceled => Some(libc::ECANCELED),
            Kind::TimerElapsed => Some(libc::ETIME),
            Kind::TryAgain => Some(libc::EAGAIN),
            Kind::InvalidArgument => Some(libc::EINVAL),
            Kind::ResourceUnavailable => Some(libc::ENOBUFS),
            Kind::Other(errno) => Some(errno),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw_os_error() {
            Some(errno) => write!(f, "{}", io::Error::from_raw_os_error(errno)),
            None => write!(f, "unknown io_uring error"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(errno) => Error::from_errno(errno),
            None => Error {
                kind: Kind::Other(libc::EIO),
            },
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err.raw_os_error() {
            Some(errno) => io::Error::from_raw_os_error(errno),
            None => io::Error::new(io::ErrorKind::Other, err),
        }
    }
}

/// Aborts the process with a diagnostic message. Used for contract violations a caller cannot
/// recover from, such as submitting through a descriptor slot that was never registered.
#[track_caller]
pub(crate) fn programmer_error(msg: &str) -> ! {
    if cfg!(debug_assertions) {
        panic!("programmer error: {msg}");
    } else {
        eprintln!("programmer error: {msg}");
        std::process::abort();
    }
}
