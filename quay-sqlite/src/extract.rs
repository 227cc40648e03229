use libsqlite3_sys::*;
use quay_core::{Error, ErrorContext, Result, Value, oid};
use std::{
    ffi::{CStr, c_int},
    slice,
};

unsafe fn column_bytes(data: *const u8, len: c_int) -> Vec<u8> {
    if data.is_null() || len <= 0 {
        return Vec::new();
    }
    unsafe { slice::from_raw_parts(data, len as usize).to_vec() }
}

pub(crate) fn extract_value(statement: *mut sqlite3_stmt, index: c_int) -> Result<Value> {
    unsafe {
        let column_type = sqlite3_column_type(statement, index);
        Ok(match column_type {
            SQLITE_NULL => Value::null(oid::UNKNOWN),
            SQLITE_INTEGER => Value::binary(
                oid::INT8,
                sqlite3_column_int64(statement, index).to_be_bytes(),
            ),
            SQLITE_FLOAT => Value::binary(
                oid::FLOAT8,
                sqlite3_column_double(statement, index).to_be_bytes(),
            ),
            SQLITE_BLOB => {
                let data = sqlite3_column_blob(statement, index) as *const u8;
                let len = sqlite3_column_bytes(statement, index);
                Value::binary(oid::BYTEA, column_bytes(data, len))
            }
            SQLITE_TEXT => {
                let data = sqlite3_column_text(statement, index);
                let len = sqlite3_column_bytes(statement, index);
                Value::text(oid::TEXT, column_bytes(data, len))
            }
            _ => {
                return Err(Error::msg(format!(
                    "Unexpected column type {}",
                    column_type
                )));
            }
        })
    }
}

pub(crate) fn extract_name(statement: *mut sqlite3_stmt, index: c_int) -> Result<String> {
    unsafe {
        let name = sqlite3_column_name(statement, index);
        if name.is_null() {
            return Err(Error::msg(format!(
                "Could not read the name of column {}",
                index
            )));
        }
        Ok(CStr::from_ptr(name)
            .to_str()
            .with_context(|| format!("The name of column {} is not valid UTF-8", index))?
            .into())
    }
}
