//! Unix account and host lookups used when addressing notification mail.

use std::ffi::CStr;

/// Effective uid of the current process.
pub fn current_uid() -> u32 {
    unsafe { libc::getuid() }
}

/// Login name for a uid from the passwd database, if any.
pub fn username_for_uid(uid: u32) -> Option<String> {
    unsafe {
        // getpwuid returns a pointer into static storage; copy out of it
        // immediately and never retain the pointer.
        let passwd = libc::getpwuid(uid as libc::uid_t);
        if passwd.is_null() {
            return None;
        }
        let name = (*passwd).pw_name;
        if name.is_null() {
            return None;
        }
        CStr::from_ptr(name).to_str().ok().map(str::to_string)
    }
}

/// Local host name, falling back to "localhost".
pub fn local_hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return "localhost".to_string();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    if end == 0 {
        return "localhost".to_string();
    }
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_user_resolves() {
        // Whatever account runs the tests must exist in passwd.
        let name = username_for_uid(current_uid()).unwrap();
        assert!(!name.is_empty());
    }

    #[test]
    fn test_unknown_uid_is_none() {
        // Near the uid_t maximum; no sane passwd database maps it.
        assert_eq!(username_for_uid(u32::MAX - 3), None);
    }

    #[test]
    fn test_hostname_nonempty() {
        assert!(!local_hostname().is_empty());
    }
}
