//! Kernel `io_uring` interface version, as reported by `io_uring_get_probe` / the `params`
//! struct's `features` field translated into a comparable `major.minor` pair.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A `major.minor` version pair, used to gate newer opcodes and flags behind a minimum kernel
/// interface version rather than a raw uname check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Version { major, minor }
    }

    /// The version this crate was grounded against at the time its newest opcode wrappers were
    /// added.
    pub const CURRENT: Version = Version::new(6, 1);

    pub fn is_at_least(&self, required: Version) -> bool {
        *self >= required
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let (major, minor) = s.split_once('.').ok_or_else(Error::invalid_argument)?;
        let major = major.parse().map_err(|_| Error::invalid_argument())?;
        let minor = minor.parse().map_err(|_| Error::invalid_argument())?;
        Ok(Version { major, minor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_major_minor() {
        assert_eq!("5.15".parse::<Version>().unwrap(), Version::new(5, 15));
        assert!("bogus".parse::<Version>().is_err());
    }

    #[test]
    fn orders_lexicographically() {
        assert!(Version::new(5, 19).is_at_least(Version::new(5, 4)));
        assert!(!Version::new(5, 4).is_at_least(Version::new(5, 19)));
        assert!(Version::new(6, 0).is_at_least(Version::new(5, 19)));
    }
}
