//! A process-wide, read-only protocol name <-> number index, built once on first use.
//!
//! Parsing `/etc/protocols` is the C library's job, not ours: lookups are done through
//! `getprotobyname(3)`/`getprotobynumber(3)` and the results cached so repeated sockopt and
//! socket-family lookups in the same process don't repeat the underlying NSS round-trip. Failure
//! to open the system database yields an empty index rather than aborting the caller.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::sync::{Mutex, OnceLock};

struct ProtocolDb {
    by_name: Mutex<HashMap<String, i32>>,
    by_number: Mutex<HashMap<i32, String>>,
}

fn db() -> &'static ProtocolDb {
    static DB: OnceLock<ProtocolDb> = OnceLock::new();
    DB.get_or_init(|| ProtocolDb {
        by_name: Mutex::new(HashMap::new()),
        by_number: Mutex::new(HashMap::new()),
    })
}

/// Resolve a protocol name (e.g. `"tcp"`) to its number, as `getprotobyname(3)` would.
/// Returns `None` if the name is unknown or the system database is unavailable.
pub fn protocol_by_name(name: &str) -> Option<i32> {
    let db = db();
    if let Some(&n) = db.by_name.lock().unwrap().get(name) {
        return Some(n);
    }
    let cname = CString::new(name).ok()?;
    let number = unsafe {
        let entry = libc::getprotobyname(cname.as_ptr());
        if entry.is_null() {
            None
        } else {
            Some((*entry).p_proto)
        }
    }?;
    db.by_name.lock().unwrap().insert(name.to_owned(), number);
    Some(number)
}

/// Resolve a protocol number to its canonical name, as `getprotobynumber(3)` would.
pub fn protocol_by_number(number: i32) -> Option<String> {
    let db = db();
    if let Some(name) = db.by_number.lock().unwrap().get(&number) {
        return Some(name.clone());
    }
    let name = unsafe {
        let entry = libc::getprotobynumber(number);
        if entry.is_null() {
            None
        } else {
            Some(CStr::from_ptr((*entry).p_name).to_string_lossy().into_owned())
        }
    }?;
    db.by_number
        .lock()
        .unwrap()
        .insert(number, name.clone());
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_tcp_both_ways() {
        let Some(num) = protocol_by_name("tcp") else {
            return; // system has no /etc/protocols, e.g. minimal containers
        };
        assert_eq!(protocol_by_number(num).as_deref(), Some("tcp"));
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(protocol_by_name("not-a-real-protocol-name"), None);
    }
}
