use crate::{
    CBox,
    extract::{extract_name, extract_value},
    last_error,
};
use libsqlite3_sys::*;
use quay_core::{
    Error, ExecutionError, Format, FromValue, QueryResult, Result, Row, RowLabeled, RowNames,
    RowsAffected, Value, oid, truncate_long,
};
use std::{
    borrow::Cow,
    error,
    ffi::{CStr, CString, c_char, c_int, c_void},
    fmt::{self, Display},
    ptr,
};

/// A compiled statement, reusable after each run.
pub(crate) struct SqlitePrepared {
    pub(crate) statement: CBox<*mut sqlite3_stmt>,
}

/// Compile the first statement of `sql`, returning it together with the text that follows.
///
/// The statement is `None` when `sql` starts with only whitespace or comments. Failures are
/// reported with the error type built by `kind`.
pub(crate) fn prepare_statement<'s, E>(
    db: *mut sqlite3,
    sql: &'s str,
    kind: fn(String) -> E,
) -> Result<(Option<SqlitePrepared>, &'s str)>
where
    E: error::Error + Send + Sync + 'static,
{
    let mut statement = CBox::new(ptr::null_mut(), |p| unsafe {
        sqlite3_finalize(p);
    });
    let mut tail: *const c_char = ptr::null();
    let rc = unsafe {
        sqlite3_prepare_v2(
            db,
            sql.as_ptr() as *const c_char,
            sql.len() as c_int,
            &mut *statement,
            &mut tail,
        )
    };
    if rc != SQLITE_OK {
        let error = Error::new(kind(last_error(db))).context(format!(
            "While preparing the statement:\n{}",
            truncate_long!(sql)
        ));
        log::error!("{:#}", error);
        return Err(error);
    }
    let consumed = if tail.is_null() {
        sql.len()
    } else {
        (tail as usize).saturating_sub(sql.as_ptr() as usize).min(sql.len())
    };
    let rest = sql.get(consumed..).unwrap_or_default();
    if statement.is_null() {
        return Ok((None, rest));
    }
    Ok((Some(SqlitePrepared { statement }), rest))
}

fn bind_error(statement: *mut sqlite3_stmt, message: String) -> Error {
    let sql = unsafe { sqlite3_sql(statement) };
    let sql = if sql.is_null() {
        Cow::Borrowed("")
    } else {
        unsafe { CStr::from_ptr(sql) }.to_string_lossy()
    };
    let error = Error::new(ExecutionError(message)).context(format!(
        "While binding the parameters of:\n{}",
        truncate_long!(sql)
    ));
    log::error!("{:#}", error);
    error
}

impl SqlitePrepared {
    /// Reset the statement and bind `parameters` as `$1`, `$2`, ...
    pub(crate) fn bind(&mut self, parameters: &[Value]) -> Result<()> {
        let statement = *self.statement;
        let expected = unsafe {
            sqlite3_reset(statement);
            sqlite3_clear_bindings(statement);
            sqlite3_bind_parameter_count(statement)
        };
        if expected as usize != parameters.len() {
            return Err(bind_error(
                statement,
                format!(
                    "The statement expects {} parameters, {} were provided",
                    expected,
                    parameters.len()
                ),
            ));
        }
        for (i, value) in parameters.iter().enumerate() {
            let position = i as c_int + 1;
            let name = CString::new(format!("${}", position))?;
            let index = match unsafe { sqlite3_bind_parameter_index(statement, name.as_ptr()) } {
                0 => position,
                index => index,
            };
            self.bind_index(index, value)?;
        }
        Ok(())
    }

    fn bind_index(&mut self, index: c_int, value: &Value) -> Result<()> {
        let statement = *self.statement;
        let convert = |e: Error| {
            bind_error(
                statement,
                format!("Cannot bind parameter {}: {:#}", index, e),
            )
        };
        let Some(data) = &value.data else {
            return self.check(index, unsafe { sqlite3_bind_null(statement, index) });
        };
        let rc = unsafe {
            match value.type_id {
                oid::BOOL => sqlite3_bind_int(
                    statement,
                    index,
                    bool::from_value(value).map_err(convert)? as c_int,
                ),
                oid::INT2 | oid::INT4 | oid::INT8 => sqlite3_bind_int64(
                    statement,
                    index,
                    i64::from_value(value).map_err(convert)?,
                ),
                oid::FLOAT4 | oid::FLOAT8 => sqlite3_bind_double(
                    statement,
                    index,
                    f64::from_value(value).map_err(convert)?,
                ),
                _ if value.format == Format::Binary => sqlite3_bind_blob(
                    statement,
                    index,
                    data.as_ptr() as *const c_void,
                    data.len() as c_int,
                    SQLITE_TRANSIENT(),
                ),
                oid::BYTEA => {
                    let bytes = Vec::<u8>::from_value(value).map_err(convert)?;
                    sqlite3_bind_blob(
                        statement,
                        index,
                        bytes.as_ptr() as *const c_void,
                        bytes.len() as c_int,
                        SQLITE_TRANSIENT(),
                    )
                }
                _ => sqlite3_bind_text(
                    statement,
                    index,
                    data.as_ptr() as *const c_char,
                    data.len() as c_int,
                    SQLITE_TRANSIENT(),
                ),
            }
        };
        self.check(index, rc)
    }

    fn check(&self, index: c_int, rc: c_int) -> Result<()> {
        if rc != SQLITE_OK {
            let statement = *self.statement;
            let message = last_error(unsafe { sqlite3_db_handle(statement) });
            return Err(bind_error(
                statement,
                format!("Cannot bind parameter {}: {}", index, message),
            ));
        }
        Ok(())
    }

    /// Step through the statement collecting every row.
    pub(crate) fn run(&mut self) -> Result<QueryResult> {
        let statement = *self.statement;
        let db = unsafe { sqlite3_db_handle(statement) };
        let columns = unsafe { sqlite3_column_count(statement) };
        let labels: RowNames = (0..columns)
            .map(|i| extract_name(statement, i))
            .collect::<Result<Vec<_>>>()?
            .into();
        let changes = unsafe { sqlite3_total_changes64(db) };
        let mut rows = Vec::new();
        loop {
            match unsafe { sqlite3_step(statement) } {
                SQLITE_ROW => {
                    let values = (0..columns)
                        .map(|i| extract_value(statement, i))
                        .collect::<Result<Row>>()?;
                    rows.push(RowLabeled::new(labels.clone(), values));
                }
                SQLITE_DONE => break,
                _ => {
                    let error = Error::new(ExecutionError(last_error(db))).context(format!(
                        "While executing:\n{}",
                        truncate_long!(self.to_string())
                    ));
                    unsafe {
                        sqlite3_reset(statement);
                    }
                    log::error!("{:#}", error);
                    return Err(error);
                }
            }
        }
        let changed = unsafe {
            sqlite3_reset(statement);
            (sqlite3_total_changes64(db) - changes).max(0) as u64
        };
        let affected = RowsAffected {
            rows_affected: if columns > 0 {
                rows.len() as u64
            } else {
                changed
            },
            last_affected_id: if changed > 0 {
                Some(unsafe { sqlite3_last_insert_rowid(db) })
            } else {
                None
            },
        };
        Ok(QueryResult::new(labels, rows, affected))
    }
}

impl Display for SqlitePrepared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sql = unsafe { sqlite3_sql(*self.statement) };
        if sql.is_null() {
            return write!(f, "{:p}", *self.statement);
        }
        f.write_str(&unsafe { CStr::from_ptr(sql) }.to_string_lossy())
    }
}
