use quay::{Connection, Driver, Error, IsolationLevel, Result};
use std::sync::{Arc, Mutex};

static MUTEX: Mutex<()> = Mutex::new(());

fn values(connection: &Arc<Connection>, table: &str) -> Vec<i64> {
    connection
        .execute(&format!("SELECT a FROM {} ORDER BY a", table), &[])
        .expect("Could not read the table")
        .collect::<(i64,)>()
        .expect("Could not decode the rows")
        .into_iter()
        .map(|(v,)| v)
        .collect()
}

fn insert_then_fail(connection: &Arc<Connection>) -> Result<()> {
    let transaction = connection.begin(IsolationLevel::Default)?;
    transaction.execute("INSERT INTO quay_rollback VALUES ($1)", &[&20])?;
    Err(Error::msg("Something went wrong after the insert"))
}

pub fn implicit_rollback<D: Driver>(driver: &D, url: &str) {
    let _lock = MUTEX.lock().unwrap();
    let connection = driver.open(url).expect("Could not open the connection");
    connection
        .execute("DROP TABLE IF EXISTS quay_rollback", &[])
        .unwrap();
    connection
        .execute("CREATE TABLE quay_rollback (a INTEGER PRIMARY KEY)", &[])
        .unwrap();

    {
        let transaction = connection.begin(IsolationLevel::Default).unwrap();
        transaction
            .execute("INSERT INTO quay_rollback VALUES ($1)", &[&10])
            .unwrap();
        let rows = transaction
            .execute("SELECT a FROM quay_rollback", &[])
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
    assert!(!connection.has_active_transaction());
    assert!(values(&connection, "quay_rollback").is_empty());

    assert!(insert_then_fail(&connection).is_err());
    assert!(!connection.has_active_transaction());
    assert!(values(&connection, "quay_rollback").is_empty());

    {
        let transaction = connection.begin(IsolationLevel::Default).unwrap();
        transaction
            .execute("INSERT INTO quay_rollback VALUES (1)", &[])
            .unwrap();
        {
            let savepoint = transaction.subtransaction().unwrap();
            savepoint
                .execute("INSERT INTO quay_rollback VALUES (2)", &[])
                .unwrap();
        }
        assert!(transaction.is_current());
        transaction.commit().unwrap();
    }
    assert_eq!(values(&connection, "quay_rollback"), [1]);
}

pub fn end_to_end<D: Driver>(driver: &D, url: &str) {
    let _lock = MUTEX.lock().unwrap();
    let connection = driver.open(url).expect("Could not open the connection");
    connection.execute("DROP TABLE IF EXISTS quay_t", &[]).unwrap();
    connection
        .execute("CREATE TABLE quay_t (a INT PRIMARY KEY)", &[])
        .unwrap();
    let transaction = connection.begin(IsolationLevel::Default).unwrap();
    transaction
        .execute("INSERT INTO quay_t VALUES (1)", &[])
        .unwrap();
    let nested = transaction.subtransaction().unwrap();
    nested
        .execute("INSERT INTO quay_t VALUES (2)", &[])
        .unwrap();
    nested.rollback().unwrap();
    transaction.commit().unwrap();
    assert_eq!(values(&connection, "quay_t"), [1]);
    connection.close();
    assert!(!connection.is_open());

    let connection = driver.open(url).expect("Could not reopen the connection");
    assert_eq!(values(&connection, "quay_t"), [1]);
}
