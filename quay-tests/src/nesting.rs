use crate::silent_logs;
use quay::{Connection, Driver, IsolationLevel, OrderError, Transaction, TransactionState};
use std::sync::{Arc, Mutex};

static MUTEX: Mutex<()> = Mutex::new(());

fn count(transaction: &Transaction) -> i64 {
    transaction
        .execute("SELECT COUNT(*) FROM quay_nesting", &[])
        .expect("Could not count the rows")
        .scalar()
        .expect("Could not decode the count")
}

fn setup(connection: &Arc<Connection>) {
    connection
        .execute("DROP TABLE IF EXISTS quay_nesting", &[])
        .expect("Could not drop quay_nesting");
    connection
        .execute("CREATE TABLE quay_nesting (depth INTEGER NOT NULL)", &[])
        .expect("Could not create quay_nesting");
}

pub fn order_errors<D: Driver>(driver: &D, url: &str) {
    let _lock = MUTEX.lock().unwrap();
    let connection = driver.open(url).expect("Could not open the connection");
    setup(&connection);

    let transaction = connection
        .begin(IsolationLevel::Default)
        .expect("Could not begin a transaction");
    let child = transaction
        .subtransaction()
        .expect("Could not start a subtransaction");
    silent_logs! {
        let error = transaction.commit().unwrap_err();
        assert!(error.is::<OrderError>(), "{:#}", error);
        let error = transaction.rollback().unwrap_err();
        assert!(error.is::<OrderError>(), "{:#}", error);
        let error = transaction
            .execute("INSERT INTO quay_nesting VALUES (0)", &[])
            .unwrap_err();
        assert!(error.is::<OrderError>(), "{:#}", error);
    }
    assert!(child.is_current());
    assert!(!transaction.is_current());
    assert_eq!(transaction.state(), TransactionState::Active);

    child
        .execute("INSERT INTO quay_nesting VALUES ($1)", &[&1])
        .expect("Could not insert in the subtransaction");
    child.commit().expect("Could not release the savepoint");
    silent_logs! {
        let error = child.commit().unwrap_err();
        assert!(error.is::<OrderError>(), "{:#}", error);
    }
    assert!(transaction.is_current());
    assert_eq!(count(&transaction), 1);
    transaction.commit().expect("Could not commit");
    assert!(!connection.has_active_transaction());
}

pub fn deep_nesting<D: Driver>(driver: &D, url: &str) {
    let _lock = MUTEX.lock().unwrap();
    let connection = driver.open(url).expect("Could not open the connection");
    setup(&connection);

    for depth in 1..=6 {
        let top = connection
            .begin(IsolationLevel::Default)
            .expect("Could not begin a transaction");
        let mut stack = Vec::new();
        for level in 1..=depth {
            let transaction = stack
                .last()
                .unwrap_or(&top)
                .subtransaction()
                .expect("Could not start a subtransaction");
            transaction
                .execute("INSERT INTO quay_nesting VALUES ($1)", &[&level])
                .expect("Could not insert");
            stack.push(transaction);
        }
        // Odd levels roll back, dropping every row inserted from there on
        while let Some(transaction) = stack.pop() {
            assert!(transaction.is_current());
            let level = stack.len() + 1;
            if level % 2 == 1 {
                transaction.rollback().expect("Could not roll back");
            } else {
                transaction.commit().expect("Could not commit");
            }
        }
        assert!(top.is_current());
        assert_eq!(count(&top), 0);
        top.rollback().expect("Could not roll back");
        assert!(!connection.has_active_transaction());
    }

    let direct = connection.direct().expect("Could not start a direct transaction");
    let nested = direct
        .subtransaction()
        .expect("Could not start a transaction from the direct one");
    let savepoint = nested
        .subtransaction()
        .expect("Could not start a savepoint");
    savepoint
        .execute("INSERT INTO quay_nesting VALUES (10)", &[])
        .unwrap();
    savepoint.commit().unwrap();
    nested.commit().unwrap();
    assert!(direct.is_current());
    assert_eq!(count(&direct), 1);
}
