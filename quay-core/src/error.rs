use thiserror::Error;

/// The session could not be opened, or it was lost.
///
/// Fatal to the connection that raised it. Nothing is retried internally.
#[derive(Debug, Error)]
#[error("connection error: {0}")]
pub struct ConnectionError(pub String);

/// A transaction operation was attempted out of sequence.
///
/// Raised when the transaction is not the current one of its connection, when it already
/// finished, or when a top level transaction is started while another one is active. It
/// always signals a bug in the caller.
#[derive(Debug, Error)]
#[error("transaction order error: {0}")]
pub struct OrderError(pub String);

/// Preparing or deallocating a named statement failed.
#[derive(Debug, Error)]
#[error("statement error: {0}")]
pub struct StatementError(pub String);

/// The server rejected a statement, the message is the diagnostic it returned.
#[derive(Debug, Error)]
#[error("execution error: {0}")]
pub struct ExecutionError(pub String);

/// No connection could be obtained from the pool.
#[derive(Debug, Error)]
#[error("pool error: {0}")]
pub struct PoolError(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, ErrorContext, Result};

    #[test]
    fn kind_survives_context() {
        let result: Result<()> = Err(Error::new(OrderError("not current".into())));
        let error = result.context("While committing").unwrap_err();
        assert!(error.is::<OrderError>());
        assert!(!error.is::<ExecutionError>());
        assert_eq!(
            format!("{:#}", error),
            "While committing: transaction order error: not current"
        );
    }

    #[test]
    fn context_kind_is_visible() {
        let error = Error::new(ConnectionError("refused".into()))
            .context(PoolError("cannot open a new connection".into()));
        assert!(error.is::<PoolError>());
        assert!(error.is::<ConnectionError>());
    }
}
