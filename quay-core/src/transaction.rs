use crate::{AsValue, Connection, Error, ErrorContext, OrderError, QueryResult, Result, Value};
use parking_lot::Mutex;
use std::{
    borrow::Cow,
    fmt::{self, Debug},
    mem,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Isolation level requested when starting a top level transaction.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    /// Whatever the server is configured with.
    #[default]
    Default,
    Serializable,
    RepeatableRead,
    ReadCommitted,
    ReadUncommitted,
}

impl IsolationLevel {
    pub fn begin_statement(&self) -> &'static str {
        match self {
            IsolationLevel::Default => "START TRANSACTION",
            IsolationLevel::Serializable => "START TRANSACTION ISOLATION LEVEL SERIALIZABLE",
            IsolationLevel::RepeatableRead => "START TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            IsolationLevel::ReadCommitted => "START TRANSACTION ISOLATION LEVEL READ COMMITTED",
            IsolationLevel::ReadUncommitted => {
                "START TRANSACTION ISOLATION LEVEL READ UNCOMMITTED"
            }
        }
    }
}

/// How a transaction maps onto the server, it decides the control statements it sends.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// No control statements, every statement commits on its own.
    Autocommit,
    /// `START TRANSACTION` ... `COMMIT TRANSACTION`.
    TopLevel(IsolationLevel),
    /// Top level transaction started as a subtransaction of an autocommit one.
    TopLevelNested,
    /// Savepoint inside an enclosing transaction, holding the savepoint name.
    Savepoint(String),
}

impl TransactionKind {
    pub fn is_direct(&self) -> bool {
        matches!(self, TransactionKind::Autocommit)
    }

    pub fn begin_statement(&self) -> Option<Cow<'static, str>> {
        match self {
            TransactionKind::Autocommit => None,
            TransactionKind::TopLevel(isolation) => Some(isolation.begin_statement().into()),
            TransactionKind::TopLevelNested => Some("START TRANSACTION".into()),
            TransactionKind::Savepoint(name) => Some(format!("SAVEPOINT \"{}\"", name).into()),
        }
    }

    pub fn commit_statement(&self) -> Option<Cow<'static, str>> {
        match self {
            TransactionKind::Autocommit => None,
            TransactionKind::TopLevel(..) | TransactionKind::TopLevelNested => {
                Some("COMMIT TRANSACTION".into())
            }
            TransactionKind::Savepoint(name) => {
                Some(format!("RELEASE SAVEPOINT \"{}\"", name).into())
            }
        }
    }

    pub fn rollback_statement(&self) -> Option<Cow<'static, str>> {
        match self {
            TransactionKind::Autocommit => None,
            TransactionKind::TopLevel(..) | TransactionKind::TopLevelNested => {
                Some("ROLLBACK TRANSACTION".into())
            }
            TransactionKind::Savepoint(name) => Some(format!("ROLLBACK TO \"{}\"", name).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

enum Stage {
    Active {
        connection: Arc<Connection>,
        /// Enclosing transaction, current again once this one ends.
        previous: Option<Arc<Inner>>,
    },
    Finished(TransactionState),
}

struct Inner {
    id: u64,
    kind: TransactionKind,
    stage: Mutex<Stage>,
}

impl Inner {
    fn connection(&self) -> Option<Arc<Connection>> {
        match &*self.stage.lock() {
            Stage::Active { connection, .. } => Some(connection.clone()),
            Stage::Finished(..) => None,
        }
    }

    fn state(&self) -> TransactionState {
        match &*self.stage.lock() {
            Stage::Active { .. } => TransactionState::Active,
            Stage::Finished(state) => *state,
        }
    }

    /// The connection, provided that this transaction is its current one.
    fn current_connection(&self) -> Result<Arc<Connection>> {
        let Some(connection) = self.connection() else {
            let error = Error::new(OrderError("The transaction has already ended".into()));
            log::error!("{:#}", error);
            return Err(error);
        };
        if connection.current() != Some(self.id) {
            let error = Error::new(OrderError(
                "The transaction is not the current one of its connection".into(),
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(connection)
    }

    /// Detach from the connection, the enclosing transaction becomes the current one again.
    fn finish(&self, state: TransactionState) {
        let previous = {
            let mut stage = self.stage.lock();
            match mem::replace(&mut *stage, Stage::Finished(state)) {
                Stage::Active {
                    connection,
                    previous,
                } => {
                    connection.pop_current(self.id, previous.as_ref().map(|v| v.id));
                    previous
                }
                finished => {
                    *stage = finished;
                    None
                }
            }
        };
        // The enclosing transaction might end here, if nobody else holds it
        drop(previous);
    }

    fn end(&self, commit: bool) -> Result<()> {
        let connection = self.current_connection()?;
        // Nothing can reach the server until the copy ends
        connection.check_not_copying()?;
        let statement = if commit {
            self.kind.commit_statement()
        } else {
            self.kind.rollback_statement()
        };
        let result = match statement {
            Some(statement) => connection.execute_params(&statement, &[]).map(|_| ()),
            None => Ok(()),
        };
        drop(connection);
        self.finish(if commit && result.is_ok() {
            TransactionState::Committed
        } else {
            TransactionState::RolledBack
        });
        if result.is_ok() {
            log::debug!(
                "Transaction {} {}",
                self.id,
                if commit { "committed" } else { "rolled back" }
            );
        }
        result.with_context(|| {
            format!(
                "While {} transaction {}",
                if commit { "committing" } else { "rolling back" },
                self.id
            )
        })
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let connection = match self.stage.get_mut() {
            Stage::Active { connection, .. } => connection.clone(),
            Stage::Finished(..) => return,
        };
        if !self.kind.is_direct() && connection.is_open() {
            if let Err(e) = self.end(false) {
                log::warn!(
                    "Implicit rollback of transaction {} failed, ignoring it: {:#}",
                    self.id,
                    e
                );
            }
        }
        drop(connection);
        self.finish(TransactionState::RolledBack);
    }
}

/// A unit of work on a [`Connection`].
///
/// At most one transaction is current on each connection, only the current one can execute
/// statements, start a subtransaction, commit or roll back. Starting a subtransaction makes it
/// the current one until it ends.
///
/// A transaction still active when dropped is rolled back, failures doing so are logged and
/// otherwise ignored. A subtransaction keeps the enclosing transaction alive until it ends.
pub struct Transaction {
    inner: Arc<Inner>,
}

impl Transaction {
    fn start(
        connection: &Arc<Connection>,
        kind: TransactionKind,
        previous: Option<Arc<Inner>>,
        id: u64,
    ) -> Result<Self> {
        connection.push_current(previous.as_ref().map(|v| v.id), id)?;
        let begin = kind.begin_statement();
        let transaction = Transaction {
            inner: Arc::new(Inner {
                id,
                kind,
                stage: Mutex::new(Stage::Active {
                    connection: connection.clone(),
                    previous,
                }),
            }),
        };
        if let Some(statement) = begin {
            if let Err(e) = connection.execute_params(&statement, &[]) {
                // Nothing started on the server, there is nothing to roll back
                transaction.inner.finish(TransactionState::RolledBack);
                return Err(e.context(format!("While starting transaction {}", id)));
            }
        }
        log::debug!("Started transaction {} ({:?})", id, transaction.inner.kind);
        Ok(transaction)
    }

    /// Start an autocommit transaction on `connection`.
    pub fn direct(connection: &Arc<Connection>) -> Result<Self> {
        Self::start(connection, TransactionKind::Autocommit, None, next_id())
    }

    /// Start a top level transaction on `connection`.
    pub fn begin(connection: &Arc<Connection>, isolation: IsolationLevel) -> Result<Self> {
        Self::start(connection, TransactionKind::TopLevel(isolation), None, next_id())
    }

    /// Start a nested transaction, it becomes the current one of the connection.
    ///
    /// Inside an autocommit transaction this starts a real transaction, otherwise a savepoint.
    pub fn subtransaction(&self) -> Result<Transaction> {
        let connection = self.inner.current_connection()?;
        let id = next_id();
        let kind = if self.inner.kind.is_direct() {
            TransactionKind::TopLevelNested
        } else {
            TransactionKind::Savepoint(format!("QUAY_{}", id))
        };
        Self::start(&connection, kind, Some(self.inner.clone()), id)
    }

    /// Execute a statement (or the name of a prepared statement) binding `parameters` as `$1`, `$2`, ...
    pub fn execute(&self, statement: &str, parameters: &[&dyn AsValue]) -> Result<QueryResult> {
        let values = parameters.iter().map(|v| v.as_value()).collect::<Vec<_>>();
        self.execute_params(statement, &values)
    }

    /// Execute with parameters already in their wire representation.
    pub fn execute_params(&self, statement: &str, parameters: &[Value]) -> Result<QueryResult> {
        let connection = self.inner.current_connection()?;
        connection.execute_params(statement, parameters)
    }

    /// Commit the transaction.
    ///
    /// The transaction ends whatever the outcome, on failure the server discarded it.
    pub fn commit(&self) -> Result<()> {
        self.inner.end(true)
    }

    /// Roll back the transaction, it ends whatever the outcome.
    pub fn rollback(&self) -> Result<()> {
        self.inner.end(false)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn kind(&self) -> &TransactionKind {
        &self.inner.kind
    }

    pub fn is_direct(&self) -> bool {
        self.inner.kind.is_direct()
    }

    pub fn state(&self) -> TransactionState {
        self.inner.state()
    }

    /// Whether the transaction is active and current on its connection.
    pub fn is_current(&self) -> bool {
        self.inner
            .connection()
            .is_some_and(|c| c.current() == Some(self.inner.id))
    }

    /// The connection, until the transaction ends.
    pub fn connection(&self) -> Option<Arc<Connection>> {
        self.inner.connection()
    }

    pub(crate) fn current_connection(&self) -> Result<Arc<Connection>> {
        self.inner.current_connection()
    }
}

impl Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("state", &self.inner.state())
            .finish()
    }
}
