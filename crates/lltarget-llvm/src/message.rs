//! Marshalling between Rust strings and LLVM's C strings.

use std::ffi::{CStr, CString, c_char};
use std::path::Path;

use llvm_sys::core::LLVMDisposeMessage;

use crate::errors::TargetResult;

/// Copy a message allocated by LLVM into a `String` and release the
/// native buffer. A null pointer yields an empty string.
///
/// # Safety
///
/// `message` must be null or a pointer returned by an LLVM entry point
/// documented as "dispose with `LLVMDisposeMessage`", not yet disposed.
pub(crate) unsafe fn take_message(message: *mut c_char) -> String {
    if message.is_null() {
        return String::new();
    }
    let owned = unsafe { CStr::from_ptr(message) }
        .to_string_lossy()
        .into_owned();
    unsafe { LLVMDisposeMessage(message) };
    owned
}

/// Copy a string that LLVM keeps ownership of.
///
/// # Safety
///
/// `ptr` must be null or a valid NUL-terminated string for the duration of
/// the call.
pub(crate) unsafe fn borrowed_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_string_lossy()
        .into_owned()
}

pub(crate) fn to_cstring(s: &str) -> TargetResult<CString> {
    Ok(CString::new(s)?)
}

/// The path's bytes as LLVM will see them, without lossy re-encoding.
#[cfg(unix)]
pub(crate) fn path_to_cstring(path: &Path) -> TargetResult<CString> {
    use std::os::unix::ffi::OsStrExt;
    Ok(CString::new(path.as_os_str().as_bytes())?)
}

#[cfg(not(unix))]
pub(crate) fn path_to_cstring(path: &Path) -> TargetResult<CString> {
    let path = path.to_str().ok_or_else(|| crate::errors::TargetError::invalid_path(path))?;
    to_cstring(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_pointers_become_empty_strings() {
        assert_eq!(unsafe { take_message(std::ptr::null_mut()) }, "");
        assert_eq!(unsafe { borrowed_str(std::ptr::null()) }, "");
    }

    #[cfg(unix)]
    #[test]
    fn paths_keep_non_utf8_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/tmp/out\xff.o"));
        assert_eq!(path_to_cstring(path).unwrap().as_bytes(), b"/tmp/out\xff.o");
    }

    #[test]
    fn rejects_interior_nul() {
        assert!(to_cstring("x86_64\0").is_err());
        assert_eq!(to_cstring("x86-64").unwrap().as_bytes(), b"x86-64");
    }
}
