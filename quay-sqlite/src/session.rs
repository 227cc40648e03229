use crate::{
    CBox, SqliteDriver, SqlitePrepared,
    copy::{COPY_SAVEPOINT, CopyIn, parse_copy},
    error_message_from_ptr, last_error, prepare_statement,
};
use libsqlite3_sys::{
    SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI, sqlite3,
    sqlite3_busy_timeout, sqlite3_close, sqlite3_errstr, sqlite3_open_v2,
};
use quay_core::{
    ConnectionError, Driver, Error, ErrorContext, ExecutionError, QueryResult, Result, Session,
    StatementError, Value, truncate_long,
};
use std::{borrow::Cow, collections::BTreeMap, ffi::CString, ptr};

/// Milliseconds a statement waits for a lock held by another connection.
const BUSY_TIMEOUT: i32 = 5_000;

/// One open SQLite database.
pub struct SqliteSession {
    prepared: BTreeMap<String, SqlitePrepared>,
    copy: Option<CopyIn>,
    connection: CBox<*mut sqlite3>,
}

fn closed_connection() -> CBox<*mut sqlite3> {
    CBox::new(ptr::null_mut(), |p| unsafe {
        sqlite3_close(p);
    })
}

/// SQLite has no `START TRANSACTION` and its transactions are always serializable.
fn translate(statement: &str) -> Cow<'_, str> {
    let trimmed = statement.trim_start();
    let Some(rest) = trimmed
        .get(..17)
        .filter(|v| v.eq_ignore_ascii_case("START TRANSACTION"))
        .map(|_| trimmed[17..].trim())
    else {
        return Cow::Borrowed(statement);
    };
    let isolation = rest
        .get(..15)
        .is_some_and(|v| v.eq_ignore_ascii_case("ISOLATION LEVEL"));
    if rest.is_empty() || rest == ";" || isolation {
        if isolation {
            log::debug!("Ignoring `{}`, SQLite is always serializable", rest);
        }
        return Cow::Borrowed("BEGIN");
    }
    Cow::Borrowed(statement)
}

impl SqliteSession {
    /// Open the database named by a `sqlite://` URL.
    pub fn open(url: &str) -> Result<Self> {
        let prefix = format!("{}://", SqliteDriver::NAME);
        let Some(location) = url.strip_prefix(&prefix) else {
            let error = Error::new(ConnectionError(format!(
                "Expected a connection URL starting with `{}`, found `{}`",
                prefix, url
            )));
            log::error!("{:#}", error);
            return Err(error);
        };
        let filename = CString::new(format!("file:{}", location))
            .map_err(|e| Error::new(ConnectionError(e.to_string())))
            .with_context(|| format!("While decoding the connection URL `{}`", url))?;
        let mut connection = closed_connection();
        let rc = unsafe {
            sqlite3_open_v2(
                filename.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_URI | SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE,
                ptr::null(),
            )
        };
        if rc != SQLITE_OK {
            let message = if connection.is_null() {
                unsafe { error_message_from_ptr(&sqlite3_errstr(rc)).to_string() }
            } else {
                last_error(*connection)
            };
            let error = Error::new(ConnectionError(message))
                .context(format!("While opening `{}`", url));
            log::error!("{:#}", error);
            return Err(error);
        }
        unsafe {
            sqlite3_busy_timeout(*connection, BUSY_TIMEOUT);
        }
        log::debug!("Opened the SQLite database `{}`", location);
        Ok(Self {
            prepared: Default::default(),
            copy: None,
            connection,
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.connection.is_null() {
            let error = Error::new(ConnectionError("The database is closed".into()));
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(())
    }

    /// Run every statement in `sql`, the result is the one of the last statement.
    ///
    /// Parameters can only be bound when `sql` holds a single statement.
    fn run_unprepared(&mut self, sql: &str, parameters: &[Value]) -> Result<QueryResult> {
        self.check_open()?;
        let sql = translate(sql);
        let mut rest: &str = &sql;
        let mut result = QueryResult::default();
        while !rest.trim().is_empty() {
            let (statement, tail) = prepare_statement(*self.connection, rest, ExecutionError)?;
            if tail.len() == rest.len() {
                break;
            }
            rest = tail;
            let Some(mut statement) = statement else {
                continue;
            };
            let last = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
            if !last.is_empty() && !parameters.is_empty() {
                let error = Error::new(ExecutionError(
                    "Parameters cannot be bound to multiple statements".into(),
                ))
                .context(format!("While executing:\n{}", truncate_long!(sql)));
                log::error!("{:#}", error);
                return Err(error);
            }
            statement.bind(parameters)?;
            result = statement.run()?;
        }
        Ok(result)
    }
}

impl Session for SqliteSession {
    fn is_open(&self) -> bool {
        !self.connection.is_null()
    }

    fn send_query(&mut self, statement: &str, parameters: &[Value]) -> Result<QueryResult> {
        self.run_unprepared(statement, parameters)
    }

    fn send_prepared(&mut self, name: &str, parameters: &[Value]) -> Result<QueryResult> {
        self.check_open()?;
        let Some(prepared) = self.prepared.get_mut(name) else {
            let error = Error::new(ExecutionError(format!(
                "No statement is prepared as `{}`",
                name
            )));
            log::error!("{:#}", error);
            return Err(error);
        };
        prepared.bind(parameters)?;
        prepared.run()
    }

    fn prepare(&mut self, name: &str, statement: &str) -> Result<()> {
        self.check_open()?;
        let sql = translate(statement);
        let (prepared, tail) = prepare_statement(*self.connection, &sql, StatementError)?;
        let Some(prepared) = prepared else {
            let error = Error::new(StatementError(format!(
                "`{}` does not contain any statement",
                truncate_long!(statement)
            )));
            log::error!("{:#}", error);
            return Err(error);
        };
        if !tail
            .trim_start_matches(|c: char| c.is_whitespace() || c == ';')
            .is_empty()
        {
            let error = Error::new(StatementError(
                "Cannot prepare more than one statement at a time".into(),
            ))
            .context(format!("While preparing `{}`", name));
            log::error!("{:#}", error);
            return Err(error);
        }
        self.prepared.insert(name.into(), prepared);
        Ok(())
    }

    fn deallocate(&mut self, name: &str) -> Result<()> {
        self.prepared.remove(name);
        Ok(())
    }

    fn close(&mut self) {
        self.copy = None;
        self.prepared.clear();
        self.connection = closed_connection();
    }

    fn copy_in(&mut self, statement: &str) -> Result<()> {
        self.check_open()?;
        if self.copy.is_some() {
            return Err(Error::new(ExecutionError(
                "A copy is already in progress".into(),
            )));
        }
        let target = parse_copy(statement)?;
        self.run_unprepared(&format!("SAVEPOINT {}", COPY_SAVEPOINT), &[])?;
        match CopyIn::new(*self.connection, &target) {
            Ok(copy) => {
                self.copy = Some(copy);
                Ok(())
            }
            Err(e) => {
                self.discard_copy();
                Err(e)
            }
        }
    }

    fn put_copy_data(&mut self, data: &[u8]) -> Result<()> {
        let Some(copy) = &mut self.copy else {
            return Err(Error::new(ExecutionError("No copy in progress".into())));
        };
        copy.write(data)
    }

    fn put_copy_end(&mut self) -> Result<u64> {
        let Some(copy) = self.copy.take() else {
            return Err(Error::new(ExecutionError("No copy in progress".into())));
        };
        match copy.finish() {
            Ok(rows) => {
                self.run_unprepared(&format!("RELEASE SAVEPOINT {}", COPY_SAVEPOINT), &[])?;
                Ok(rows)
            }
            Err(e) => {
                self.discard_copy();
                Err(e)
            }
        }
    }

    fn put_copy_fail(&mut self, reason: &str) -> Result<()> {
        if self.copy.take().is_none() {
            return Ok(());
        }
        log::debug!("Aborting the copy: {}", reason);
        self.discard_copy();
        Ok(())
    }
}

impl SqliteSession {
    /// Undo whatever the copy wrote.
    fn discard_copy(&mut self) {
        self.copy = None;
        for statement in [
            format!("ROLLBACK TO {}", COPY_SAVEPOINT),
            format!("RELEASE SAVEPOINT {}", COPY_SAVEPOINT),
        ] {
            if let Err(e) = self.run_unprepared(&statement, &[]) {
                log::warn!("Could not discard the copy, ignoring it: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::translate;

    #[test]
    fn control_statements() {
        assert_eq!(translate("START TRANSACTION"), "BEGIN");
        assert_eq!(
            translate("START TRANSACTION ISOLATION LEVEL READ COMMITTED"),
            "BEGIN"
        );
        assert_eq!(translate("start transaction;"), "BEGIN");
        assert_eq!(translate("COMMIT TRANSACTION"), "COMMIT TRANSACTION");
        assert_eq!(
            translate("SAVEPOINT \"QUAY_3\""),
            "SAVEPOINT \"QUAY_3\""
        );
        assert_eq!(translate("START TRANSACTIONS"), "START TRANSACTIONS");
    }
}
