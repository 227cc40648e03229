use crate::{AsValue, Connection, Driver, ErrorContext, PoolError, QueryResult, Result};
use parking_lot::Mutex;
use std::{
    fmt::{self, Debug},
    ops::Deref,
    sync::{Arc, Weak},
};

/// Reuses connections opened through a driver.
///
/// Connections are handed out as [`PooledConnection`], which go back to the pool when dropped
/// unless they were closed or are still referenced by a transaction.
pub struct ConnectionPool<D: Driver> {
    driver: D,
    url: String,
    idle: Mutex<Vec<Arc<Connection>>>,
}

impl<D: Driver> ConnectionPool<D> {
    pub fn new(driver: D, url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            driver,
            url: url.into(),
            idle: Default::default(),
        })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Take an idle open connection, or open a new one.
    pub fn acquire(self: &Arc<Self>) -> Result<PooledConnection<D>> {
        let connection = loop {
            let Some(connection) = self.idle.lock().pop() else {
                break Connection::open(&self.driver, &self.url).with_context(|| {
                    PoolError(format!("Could not open a new {} connection", D::NAME))
                })?;
            };
            if connection.is_open() {
                log::trace!("Reusing an idle {} connection", D::NAME);
                break connection;
            }
            log::debug!("Discarding a closed {} connection", D::NAME);
        };
        Ok(PooledConnection {
            connection: Some(connection),
            pool: Arc::downgrade(self),
        })
    }

    /// Execute a single statement in autocommit mode on a pooled connection.
    pub fn execute(
        self: &Arc<Self>,
        statement: &str,
        parameters: &[&dyn AsValue],
    ) -> Result<QueryResult> {
        self.acquire()?.execute(statement, parameters)
    }

    /// Number of connections waiting to be reused.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    fn recycle(&self, connection: Arc<Connection>) {
        if connection.is_open()
            && !connection.has_active_transaction()
            && Arc::strong_count(&connection) == 1
        {
            self.idle.lock().push(connection);
        } else {
            log::debug!("Not returning a {} connection to the pool", D::NAME);
        }
    }
}

impl<D: Driver> Debug for ConnectionPool<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("driver", &D::NAME)
            .field("idle", &self.idle())
            .finish()
    }
}

/// A connection borrowed from a [`ConnectionPool`].
pub struct PooledConnection<D: Driver> {
    connection: Option<Arc<Connection>>,
    pool: Weak<ConnectionPool<D>>,
}

impl<D: Driver> Deref for PooledConnection<D> {
    type Target = Arc<Connection>;
    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .unwrap_or_else(|| unreachable!("The connection is only taken when dropping"))
    }
}

impl<D: Driver> Drop for PooledConnection<D> {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        if let Some(pool) = self.pool.upgrade() {
            pool.recycle(connection);
        }
    }
}

impl<D: Driver> Debug for PooledConnection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PooledConnection")
            .field(&self.connection)
            .finish()
    }
}
