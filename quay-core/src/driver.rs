use crate::{Connection, ConnectionPool, Error, QueryResult, Result, StatementError, Value};
use std::sync::Arc;

/// A database backend: it knows how to open a [`Session`] from a connection URL.
pub trait Driver: Send + Sync + Sized + 'static {
    type Session: Session + 'static;

    /// URL scheme accepted by [`Driver::connect`], `"sqlite"` for `sqlite://...`.
    const NAME: &'static str;

    /// Open a new session. Failures must be reported as [`crate::ConnectionError`].
    fn connect(&self, url: &str) -> Result<Self::Session>;

    /// Open a new [`Connection`].
    fn open(&self, url: &str) -> Result<Arc<Connection>> {
        Connection::open(self, url)
    }

    /// Create a pool of connections opened by this driver.
    fn pool(self, url: impl Into<String>) -> Arc<ConnectionPool<Self>> {
        ConnectionPool::new(self, url)
    }
}

/// One physical session with the server.
///
/// This is the boundary with the wire protocol. The core sends statements verbatim (the
/// transaction control statements included) and only relies on the errors being tagged
/// with the right kind: [`crate::ConnectionError`] when the session is unusable,
/// [`crate::ExecutionError`] when the server rejects a statement, [`StatementError`] when
/// preparing fails.
///
/// Parameters bind by position, the first value is `$1`.
pub trait Session: Send {
    /// Live session status, without side effects.
    fn is_open(&self) -> bool;

    fn send_query(&mut self, statement: &str, parameters: &[Value]) -> Result<QueryResult>;

    /// Execute the statement previously registered under `name`.
    fn send_prepared(&mut self, name: &str, parameters: &[Value]) -> Result<QueryResult>;

    fn prepare(&mut self, name: &str, statement: &str) -> Result<()>;

    fn deallocate(&mut self, name: &str) -> Result<()>;

    /// Terminate the session, afterwards [`Session::is_open`] returns false.
    fn close(&mut self);

    /// Start a bulk copy into a table.
    fn copy_in(&mut self, statement: &str) -> Result<()> {
        let _ = statement;
        Err(Error::new(StatementError(
            "The driver does not support bulk copy".into(),
        )))
    }

    /// Send a chunk of copy data, in text format.
    fn put_copy_data(&mut self, data: &[u8]) -> Result<()> {
        let _ = data;
        Err(Error::new(StatementError("No bulk copy in progress".into())))
    }

    /// Complete the copy and return the number of rows written.
    fn put_copy_end(&mut self) -> Result<u64> {
        Err(Error::new(StatementError("No bulk copy in progress".into())))
    }

    /// Abort the copy.
    fn put_copy_fail(&mut self, reason: &str) -> Result<()> {
        let _ = reason;
        Ok(())
    }
}
