mod cbox;
mod copy;
mod driver;
mod extract;
mod prepared;
mod session;

use libsqlite3_sys::{sqlite3, sqlite3_errmsg};
use std::{
    ffi::{CStr, c_char},
    ptr,
};

pub(crate) use cbox::*;
pub use driver::*;
pub(crate) use prepared::*;
pub use session::*;

pub(crate) fn error_message_from_ptr(ptr: &'_ *const c_char) -> &'_ str {
    unsafe {
        if *ptr != ptr::null() {
            CStr::from_ptr(*ptr)
                .to_str()
                .unwrap_or("Unknown error (the error message was not a valid C string)")
        } else {
            "Unknown error (could not extract the error message)"
        }
    }
}

/// Message of the last failed call on `db`.
pub(crate) fn last_error(db: *mut sqlite3) -> String {
    unsafe { error_message_from_ptr(&sqlite3_errmsg(db)).to_string() }
}
