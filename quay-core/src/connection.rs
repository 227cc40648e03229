use crate::{
    AsValue, ConnectionError, Driver, Error, ErrorContext, IsolationLevel, OrderError,
    QueryResult, Result, Session, StatementError, Transaction, Value, is_identifier,
    truncate_long,
};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    fmt::{self, Debug},
    sync::Arc,
};

/// A session with the database server.
///
/// Connections are shared through `Arc`: every [`Transaction`] keeps its connection alive.
/// The connection in turn only remembers which transaction is the current one, the only
/// transaction allowed to run statements.
///
/// A connection must not be used by two threads at the same time, share a
/// [`crate::ConnectionPool`] instead.
pub struct Connection {
    state: Mutex<ConnectionState>,
}

struct ConnectionState {
    session: Box<dyn Session>,
    prepared: BTreeMap<String, String>,
    current: Option<u64>,
    copying: bool,
}

fn order_error(message: &str) -> Error {
    let error = Error::new(OrderError(message.into()));
    log::error!("{:#}", error);
    error
}

fn closed_error() -> Error {
    let error = Error::new(ConnectionError("The connection is closed".into()));
    log::error!("{:#}", error);
    error
}

fn check_prepared_name(name: &str) -> Result<()> {
    if !is_identifier(name) {
        let error = Error::new(StatementError(format!(
            "Invalid prepared statement name `{}`",
            truncate_long!(name)
        )));
        log::error!("{:#}", error);
        return Err(error);
    }
    Ok(())
}

impl Connection {
    /// Open a connection through `driver`.
    pub fn open<D: Driver>(driver: &D, url: &str) -> Result<Arc<Self>> {
        let session = driver
            .connect(url)
            .with_context(|| format!("While opening a {} connection", D::NAME))?;
        log::debug!("Opened a {} connection", D::NAME);
        Ok(Arc::new(Self::new(Box::new(session))))
    }

    /// Wrap an already established session.
    pub fn new(session: Box<dyn Session>) -> Self {
        Self {
            state: Mutex::new(ConnectionState {
                session,
                prepared: Default::default(),
                current: None,
                copying: false,
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().session.is_open()
    }

    /// Terminate the session. Transactions still referencing the connection fail from now on.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.session.is_open() {
            state.session.close();
            log::debug!("Closed the connection");
        }
        state.prepared.clear();
        state.copying = false;
    }

    /// Register `statement` under `name`, later executions can use the name in place of the text.
    ///
    /// Preparing again the same text under the same name does nothing, a different text is an error.
    pub fn prepare(&self, name: &str, statement: &str) -> Result<()> {
        check_prepared_name(name)?;
        let mut state = self.state.lock();
        if !state.session.is_open() {
            return Err(closed_error());
        }
        match state.prepared.get(name) {
            Some(existing) if existing == statement => return Ok(()),
            Some(..) => {
                let error = Error::new(StatementError(format!(
                    "A different statement is already prepared as `{}`",
                    name
                )));
                log::error!("{:#}", error);
                return Err(error);
            }
            None => {}
        }
        state.session.prepare(name, statement).with_context(|| {
            format!(
                "While preparing `{}` as:\n{}",
                name,
                truncate_long!(statement)
            )
        })?;
        state.prepared.insert(name.into(), statement.into());
        Ok(())
    }

    /// Remove a prepared statement, unknown names are ignored.
    pub fn deallocate(&self, name: &str) -> Result<()> {
        check_prepared_name(name)?;
        let mut state = self.state.lock();
        if !state.prepared.contains_key(name) {
            return Ok(());
        }
        if !state.session.is_open() {
            return Err(closed_error());
        }
        state
            .session
            .deallocate(name)
            .with_context(|| format!("While deallocating `{}`", name))?;
        state.prepared.remove(name);
        Ok(())
    }

    pub fn is_prepared(&self, name: &str) -> bool {
        self.state.lock().prepared.contains_key(name)
    }

    /// Whether some transaction is currently bound to this connection.
    pub fn has_active_transaction(&self) -> bool {
        self.state.lock().current.is_some()
    }

    /// Start an autocommit transaction: every statement is committed on its own.
    pub fn direct(self: &Arc<Self>) -> Result<Transaction> {
        Transaction::direct(self)
    }

    /// Start a top level transaction.
    pub fn begin(self: &Arc<Self>, isolation: IsolationLevel) -> Result<Transaction> {
        Transaction::begin(self, isolation)
    }

    /// Execute a single statement in autocommit mode.
    pub fn execute(
        self: &Arc<Self>,
        statement: &str,
        parameters: &[&dyn AsValue],
    ) -> Result<QueryResult> {
        self.direct()?.execute(statement, parameters)
    }

    pub(crate) fn execute_params(&self, statement: &str, parameters: &[Value]) -> Result<QueryResult> {
        let mut state = self.state.lock();
        if !state.session.is_open() {
            return Err(closed_error());
        }
        if state.copying {
            return Err(order_error(
                "Cannot execute a statement while a bulk copy is in progress",
            ));
        }
        log::trace!("{}", truncate_long!(statement));
        let result = if state.prepared.contains_key(statement) {
            state.session.send_prepared(statement, parameters)
        } else {
            state.session.send_query(statement, parameters)
        };
        result.with_context(|| format!("While executing:\n{}", truncate_long!(statement)))
    }

    /// Fails while a bulk copy holds the connection.
    pub(crate) fn check_not_copying(&self) -> Result<()> {
        if self.state.lock().copying {
            return Err(order_error(
                "Cannot end a transaction while a bulk copy is in progress",
            ));
        }
        Ok(())
    }

    pub(crate) fn current(&self) -> Option<u64> {
        self.state.lock().current
    }

    /// Make `id` the current transaction, provided that `expected` is the current one.
    pub(crate) fn push_current(&self, expected: Option<u64>, id: u64) -> Result<()> {
        let mut state = self.state.lock();
        if state.current != expected {
            return Err(order_error(match expected {
                None => "Another transaction is already active on this connection",
                Some(..) => "Only the current transaction can start a subtransaction",
            }));
        }
        state.current = Some(id);
        Ok(())
    }

    /// Give back the current role to `previous`, provided that `id` holds it.
    pub(crate) fn pop_current(&self, id: u64, previous: Option<u64>) {
        let mut state = self.state.lock();
        if state.current == Some(id) {
            state.current = previous;
        }
    }

    pub(crate) fn copy_in(&self, statement: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.session.is_open() {
            return Err(closed_error());
        }
        if state.copying {
            return Err(order_error("A bulk copy is already in progress"));
        }
        state
            .session
            .copy_in(statement)
            .with_context(|| format!("While starting the copy:\n{}", truncate_long!(statement)))?;
        state.copying = true;
        Ok(())
    }

    pub(crate) fn put_copy_data(&self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if !state.copying {
            return Err(order_error("No bulk copy in progress"));
        }
        if let Err(e) = state.session.put_copy_data(data) {
            state.copying = false;
            if let Err(abort) = state.session.put_copy_fail(&format!("{:#}", e)) {
                log::warn!("Could not abort the failed copy, ignoring it: {:#}", abort);
            }
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn put_copy_end(&self) -> Result<u64> {
        let mut state = self.state.lock();
        if !state.copying {
            return Err(order_error("No bulk copy in progress"));
        }
        state.copying = false;
        state.session.put_copy_end()
    }

    pub(crate) fn put_copy_fail(&self, reason: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.copying {
            return Ok(());
        }
        state.copying = false;
        state.session.put_copy_fail(reason)
    }
}

impl Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Connection")
            .field("open", &state.session.is_open())
            .field("current", &state.current)
            .field("prepared", &state.prepared.keys().collect::<Vec<_>>())
            .finish()
    }
}
