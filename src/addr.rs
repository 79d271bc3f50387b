//! IPv4/IPv6 literal parsing and RFC 5952 formatting, plus the `peer_info` address sum type
//! used by every address-carrying operation (bind, connect, accept, sockname).

use std::ffi::OsString;
use std::fmt;
use std::fmt::Write as _;
use std::os::unix::ffi::{OsStrExt, OsStringExt};

use crate::error::Error;

/// A 32-bit IPv4 address, stored in network byte order.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct AddressV4 {
    octets: [u8; 4],
}

impl AddressV4 {
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        AddressV4 {
            octets: [a, b, c, d],
        }
    }

    pub const fn loopback() -> Self {
        AddressV4::new(127, 0, 0, 1)
    }

    pub const fn any() -> Self {
        AddressV4::new(0, 0, 0, 0)
    }

    pub const fn broadcast() -> Self {
        AddressV4::new(255, 255, 255, 255)
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.octets
    }

    pub(crate) const fn from_be_u32(bits: u32) -> Self {
        AddressV4::new(
            (bits >> 24) as u8,
            (bits >> 16) as u8,
            (bits >> 8) as u8,
            bits as u8,
        )
    }

    pub(crate) const fn to_be_u32(self) -> u32 {
        u32::from_be_bytes(self.octets)
    }

    /// Parse a dotted-quad literal. Rejects leading zeros and out-of-range octets, matching the
    /// canonical textual form this same type formats back to.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s.is_empty() || s.len() > 15 {
            return Err(Error::invalid_argument());
        }
        let mut octets = [0u8; 4];
        let mut count = 0;
        for part in s.split('.') {
            if count >= 4 {
                return Err(Error::invalid_argument());
            }
            if part.is_empty() || part.len() > 3 {
                return Err(Error::invalid_argument());
            }
            if part.len() > 1 && part.as_bytes()[0] == b'0' {
                return Err(Error::invalid_argument());
            }
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::invalid_argument());
            }
            octets[count] = part.parse::<u8>().map_err(|_| Error::invalid_argument())?;
            count += 1;
        }
        if count != 4 {
            return Err(Error::invalid_argument());
        }
        Ok(AddressV4 { octets })
    }
}

impl fmt::Display for AddressV4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets;
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

impl fmt::Debug for AddressV4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A 128-bit IPv6 address, stored as eight network-order 16-bit groups.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct AddressV6 {
    groups: [u16; 8],
}

impl AddressV6 {
    pub const fn new(groups: [u16; 8]) -> Self {
        AddressV6 { groups }
    }

    pub const fn any() -> Self {
        AddressV6 { groups: [0; 8] }
    }

    pub const fn loopback() -> Self {
        AddressV6 {
            groups: [0, 0, 0, 0, 0, 0, 0, 1],
        }
    }

    pub const fn groups(&self) -> [u16; 8] {
        self.groups
    }

    /// `true` for `::d.d.d.d` (IPv4-compatible) or `::ffff:d.d.d.d` (IPv4-mapped) — the two
    /// forms the recommended formatter renders with an embedded dotted-quad tail.
    fn is_v4_embeddable(&self) -> bool {
        let g = self.groups;
        let prefix_zero = g[0..5].iter().all(|&x| x == 0);
        if !prefix_zero {
            return false;
        }
        let compatible = g[5] == 0 && g[6] != 0;
        let mapped = g[5] == 0xffff;
        compatible || mapped
    }

    fn v4_tail(&self) -> AddressV4 {
        let [hi, lo] = [self.groups[6], self.groups[7]];
        AddressV4::new((hi >> 8) as u8, hi as u8, (lo >> 8) as u8, lo as u8)
    }

    /// Parse an IPv6 literal: full, `::`-compressed, or with a trailing embedded IPv4 tail.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s.is_empty() || s.len() > 45 {
            return Err(Error::invalid_argument());
        }
        let halves: Vec<&str> = s.splitn(2, "::").collect();
        let (before, after, has_double_colon) = match s.matches("::").count() {
            0 => (s, "", false),
            1 => (halves[0], halves[1], true),
            _ => return Err(Error::invalid_argument()),
        };

        let mut groups = [0u16; 8];
        let mut seen_v4 = false;

        let parse_side =
            |side: &str, groups: &mut [u16; 8], count: &mut usize, seen_v4: &mut bool| -> Result<(), Error> {
                if side.is_empty() {
                    return Ok(());
                }
                for part in side.split(':') {
                    if part.is_empty() {
                        return Err(Error::invalid_argument());
                    }
                    if part.contains('.') {
                        if *seen_v4 || *count > 6 {
                            return Err(Error::invalid_argument());
                        }
                        let v4 = AddressV4::parse(part)?;
                        let [a, b, c, d] = v4.octets();
                        groups[*count] = u16::from_be_bytes([a, b]);
                        groups[*count + 1] = u16::from_be_bytes([c, d]);
                        *count += 2;
                        *seen_v4 = true;
                    } else {
                        if *seen_v4 || *count >= 8 || part.len() > 4 {
                            return Err(Error::invalid_argument());
                        }
                        groups[*count] =
                            u16::from_str_radix(part, 16).map_err(|_| Error::invalid_argument())?;
                        *count += 1;
                    }
                }
                Ok(())
            };

        let mut before_count = 0usize;
        parse_side(before, &mut groups, &mut before_count, &mut seen_v4)?;

        if !has_double_colon {
            if before_count != 8 {
                return Err(Error::invalid_argument());
            }
            return Ok(AddressV6 { groups });
        }

        let mut tail = [0u16; 8];
        let mut after_count = 0usize;
        let mut after_seen_v4 = false;
        parse_side(after, &mut tail, &mut after_count, &mut after_seen_v4)?;

        if before_count + after_count >= 8 {
            return Err(Error::invalid_argument());
        }

        let mut result = [0u16; 8];
        result[..before_count].copy_from_slice(&groups[..before_count]);
        let tail_start = 8 - after_count;
        result[tail_start..].copy_from_slice(&tail[..after_count]);

        Ok(AddressV6 { groups: result })
    }

    /// Format with an explicit [`V6FormatSpec`].
    pub fn format(&self, spec: V6FormatSpec) -> String {
        let mut out = String::with_capacity(45);
        spec.write(self, &mut out);
        out
    }

    /// RFC 5952's single recommended textual form.
    pub fn format_recommended(&self) -> String {
        self.format(V6FormatSpec::recommended())
    }
}

impl fmt::Display for AddressV6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_recommended())
    }
}

impl fmt::Debug for AddressV6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A parsed `{r|f|z|m|n|u}` formatting spec for [`AddressV6::format`].
///
/// `r` selects the RFC 5952 recommended form (compressed, leading zeros stripped, lowercase, and
/// an embedded IPv4 tail only for the compatible/mapped forms) and cannot combine with `f`, `z`,
/// or `m`. Without `r`, `f` forces the uncompressed form, `z` keeps leading zeros, `m`/`n` force
/// or forbid an embedded IPv4 tail (mutually exclusive), and `u` uppercases hex digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct V6FormatSpec {
    recommended: bool,
    full: bool,
    keep_leading_zeros: bool,
    mixed: Option<bool>,
    uppercase: bool,
}

impl V6FormatSpec {
    pub const fn recommended() -> Self {
        V6FormatSpec {
            recommended: true,
            full: false,
            keep_leading_zeros: false,
            mixed: None,
            uppercase: false,
        }
    }

    /// Parse the brace-free spec body, e.g. `"fzmu"` as extracted from a `"{:fzmu}"` template.
    pub fn parse(spec: &str) -> Result<Self, Error> {
        if spec.is_empty() {
            return Ok(Self::recommended());
        }
        let mut s = V6FormatSpec {
            recommended: false,
            full: false,
            keep_leading_zeros: false,
            mixed: None,
            uppercase: false,
        };
        let mut seen_r = false;
        let mut seen_m = false;
        let mut seen_n = false;
        for c in spec.chars() {
            match c.to_ascii_lowercase() {
                'r' => {
                    if seen_r {
                        return Err(Error::invalid_argument());
                    }
                    seen_r = true;
                    s.recommended = true;
                }
                'f' => {
                    if s.full {
                        return Err(Error::invalid_argument());
                    }
                    s.full = true;
                }
                'z' => {
                    if s.keep_leading_zeros {
                        return Err(Error::invalid_argument());
                    }
                    s.keep_leading_zeros = true;
                }
                'm' => {
                    if seen_m {
                        return Err(Error::invalid_argument());
                    }
                    seen_m = true;
                }
                'n' => {
                    if seen_n {
                        return Err(Error::invalid_argument());
                    }
                    seen_n = true;
                }
                'u' => {
                    if s.uppercase {
                        return Err(Error::invalid_argument());
                    }
                    s.uppercase = true;
                }
                _ => return Err(Error::invalid_argument()),
            }
        }
        if seen_r && (s.full || s.keep_leading_zeros || seen_m) {
            return Err(Error::invalid_argument());
        }
        if !seen_r && seen_m && seen_n {
            return Err(Error::invalid_argument());
        }
        s.mixed = if seen_m {
            Some(true)
        } else if seen_n {
            Some(false)
        } else {
            None
        };
        Ok(s)
    }

    fn write(&self, addr: &AddressV6, out: &mut String) {
        let removed = !self.keep_leading_zeros;
        let mixed = if self.recommended {
            self.mixed != Some(false) && addr.is_v4_embeddable()
        } else {
            self.mixed.unwrap_or(false)
        };

        if self.full {
            if mixed {
                write_full(out, &addr.groups[..6], removed, self.uppercase);
                out.push(':');
                write!(out, "{}", addr.v4_tail()).unwrap();
            } else {
                write_full(out, &addr.groups, removed, self.uppercase);
            }
        } else {
            write_compressed(out, addr, removed, mixed, self.uppercase);
        }
    }
}

fn write_group(out: &mut String, v: u16, removed: bool, uppercase: bool) {
    use std::fmt::Write;
    match (removed, uppercase) {
        (true, false) => write!(out, "{v:x}").unwrap(),
        (false, false) => write!(out, "{v:04x}").unwrap(),
        (true, true) => write!(out, "{v:X}").unwrap(),
        (false, true) => write!(out, "{v:04X}").unwrap(),
    }
}

fn write_full(out: &mut String, groups: &[u16], removed: bool, uppercase: bool) {
    for (i, &g) in groups.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        write_group(out, g, removed, uppercase);
    }
}

fn write_compressed(out: &mut String, addr: &AddressV6, removed: bool, mixed: bool, uppercase: bool) {
    let limit = if mixed { 6 } else { 8 };
    let groups = &addr.groups[..limit];

    let (mut best_start, mut best_len) = (0usize, 0usize);
    let (mut cur_start, mut cur_len) = (0usize, 0usize);
    for (i, &g) in groups.iter().enumerate() {
        if g == 0 {
            if cur_len == 0 {
                cur_start = i;
            }
            cur_len += 1;
            if cur_len > best_len {
                best_len = cur_len;
                best_start = cur_start;
            }
        } else {
            cur_len = 0;
        }
    }

    if best_len < 2 {
        write_full(out, groups, removed, uppercase);
    } else if best_start == 0 && best_len == limit {
        out.push_str("::");
    } else {
        for &g in &groups[..best_start] {
            write_group(out, g, removed, uppercase);
            out.push(':');
        }
        if best_start == 0 {
            out.push(':');
        }
        for &g in &groups[best_start + best_len..limit] {
            out.push(':');
            write_group(out, g, removed, uppercase);
        }
        if best_start + best_len == limit || mixed {
            out.push(':');
        }
    }

    if mixed {
        use std::fmt::Write;
        write!(out, "{}", addr.v4_tail()).unwrap();
    }
}

/// An IPv4 socket address: address plus port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketV4Info {
    pub address: AddressV4,
    pub port: u16,
}

/// An IPv6 socket address: address, port, and the two rarely-used v6 routing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketV6Info {
    pub address: AddressV6,
    pub port: u16,
    pub flowinfo: u32,
    pub scope_id: u32,
}

/// The neutral "no peer" value, used for e.g. a `getsockname` on a socket that was never bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnspecifiedInfo;

/// A uniform address carrier for every socket family the ring supports: bind, connect, accept,
/// and sockname all speak this type rather than raw `sockaddr` buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerInfo {
    V4(SocketV4Info),
    V6(SocketV6Info),
    UnixPath(std::path::PathBuf),
    Unspecified(UnspecifiedInfo),
}

impl PeerInfo {
    pub fn v4(address: AddressV4, port: u16) -> Self {
        PeerInfo::V4(SocketV4Info { address, port })
    }

    pub fn v6(address: AddressV6, port: u16) -> Self {
        PeerInfo::V6(SocketV6Info {
            address,
            port,
            flowinfo: 0,
            scope_id: 0,
        })
    }

    /// The address family this variant requires a socket to have been created with.
    pub fn family(&self) -> i32 {
        match self {
            PeerInfo::V4(_) => libc::AF_INET,
            PeerInfo::V6(_) => libc::AF_INET6,
            PeerInfo::UnixPath(_) => libc::AF_UNIX,
            PeerInfo::Unspecified(_) => libc::AF_UNSPEC,
        }
    }

    /// Render as a `libc::sockaddr_storage` plus the length the kernel expects, for bind/connect.
    pub(crate) fn to_raw(&self) -> (libc::sockaddr_storage, libc::socklen_t) {
        let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        let len = match self {
            PeerInfo::V4(info) => {
                let sa = libc::sockaddr_in {
                    sin_family: libc::AF_INET as libc::sa_family_t,
                    sin_port: info.port.to_be(),
                    sin_addr: libc::in_addr {
                        s_addr: info.address.to_be_u32().to_be(),
                    },
                    sin_zero: [0; 8],
                };
                unsafe {
                    std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_in, sa);
                }
                std::mem::size_of::<libc::sockaddr_in>()
            }
            PeerInfo::V6(info) => {
                let sa = libc::sockaddr_in6 {
                    sin6_family: libc::AF_INET6 as libc::sa_family_t,
                    sin6_port: info.port.to_be(),
                    sin6_flowinfo: info.flowinfo,
                    sin6_addr: libc::in6_addr {
                        s6_addr: unsafe {
                            std::mem::transmute::<[u16; 8], [u8; 16]>(info.address.groups())
                        },
                    },
                    sin6_scope_id: info.scope_id,
                };
                unsafe {
                    std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_in6, sa);
                }
                std::mem::size_of::<libc::sockaddr_in6>()
            }
            PeerInfo::UnixPath(path) => {
                let bytes = path.as_os_str().as_bytes();
                // sun_path has no room for a trailing NUL plus the full path; abstract-namespace
                // sockets (leading NUL) are not supported by this carrier.
                assert!(
                    bytes.len() < std::mem::size_of::<libc::sockaddr_un>()
                        - std::mem::size_of::<libc::sa_family_t>(),
                    "unix socket path too long"
                );
                let mut sa: libc::sockaddr_un = unsafe { std::mem::zeroed() };
                sa.sun_family = libc::AF_UNIX as libc::sa_family_t;
                for (dst, &src) in sa.sun_path.iter_mut().zip(bytes) {
                    *dst = src as libc::c_char;
                }
                let len = std::mem::size_of::<libc::sa_family_t>() + bytes.len() + 1;
                unsafe {
                    std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_un, sa);
                }
                len
            }
            PeerInfo::Unspecified(_) => 0,
        };
        (storage, len as libc::socklen_t)
    }

    /// Reverse of [`to_raw`](Self::to_raw), used to interpret an accept/sockname result.
    pub(crate) fn from_raw(storage: &libc::sockaddr_storage, len: libc::socklen_t) -> Self {
        match storage.ss_family as i32 {
            libc::AF_INET if len as usize >= std::mem::size_of::<libc::sockaddr_in>() => {
                let sa = unsafe { &*(storage as *const _ as *const libc::sockaddr_in) };
                PeerInfo::v4(
                    AddressV4::from_be_u32(u32::from_be(sa.sin_addr.s_addr)),
                    u16::from_be(sa.sin_port),
                )
            }
            libc::AF_INET6 if len as usize >= std::mem::size_of::<libc::sockaddr_in6>() => {
                let sa = unsafe { &*(storage as *const _ as *const libc::sockaddr_in6) };
                let groups =
                    unsafe { std::mem::transmute::<[u8; 16], [u16; 8]>(sa.sin6_addr.s6_addr) };
                PeerInfo::V6(SocketV6Info {
                    address: AddressV6::new(groups.map(u16::from_be)),
                    port: u16::from_be(sa.sin6_port),
                    flowinfo: sa.sin6_flowinfo,
                    scope_id: sa.sin6_scope_id,
                })
            }
            libc::AF_UNIX if len as usize > std::mem::size_of::<libc::sa_family_t>() => {
                let sa = unsafe { &*(storage as *const _ as *const libc::sockaddr_un) };
                let path_len = len as usize - std::mem::size_of::<libc::sa_family_t>();
                let bytes: Vec<u8> = sa.sun_path[..path_len]
                    .iter()
                    .take_while(|&&c| c != 0)
                    .map(|&c| c as u8)
                    .collect();
                PeerInfo::UnixPath(std::path::PathBuf::from(OsString::from_vec(bytes)))
            }
            _ => PeerInfo::Unspecified(UnspecifiedInfo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(addr: &str, spec: &str) -> String {
        let parsed = AddressV6::parse(addr).unwrap();
        let spec = V6FormatSpec::parse(spec).unwrap();
        parsed.format(spec)
    }

    #[test]
    fn full_zero_padded_uppercase() {
        assert_eq!(
            fmt("2001:db8::1", "fzmu"),
            "2001:0DB8:0000:0000:0000:0000:0000:0001"
        );
    }

    #[test]
    fn recommended_keeps_v4_mapped_tail() {
        assert_eq!(fmt("::ffff:192.168.0.1", "r"), "::ffff:192.168.0.1");
    }

    #[test]
    fn recommended_is_the_display_impl() {
        let addr = AddressV6::parse("2001:0db8:0000:0000:0000:0000:0000:0001").unwrap();
        assert_eq!(addr.to_string(), "2001:db8::1");
    }

    #[test]
    fn conflicting_recommended_and_full_is_rejected() {
        assert!(V6FormatSpec::parse("rf").is_err());
    }

    #[test]
    fn unix_path_round_trips_through_raw_sockaddr() {
        let peer = PeerInfo::UnixPath(std::path::PathBuf::from("/tmp/uring-test.sock"));
        let (storage, len) = peer.to_raw();
        match PeerInfo::from_raw(&storage, len) {
            PeerInfo::UnixPath(path) => {
                assert_eq!(path, std::path::PathBuf::from("/tmp/uring-test.sock"))
            }
            other => panic!("expected UnixPath, got {other:?}"),
        }
    }
}
