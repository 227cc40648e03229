use crate::silent_logs;
use quay::{Driver, IsolationLevel, StatementError};
use std::sync::Mutex;

static MUTEX: Mutex<()> = Mutex::new(());

pub fn prepared<D: Driver>(driver: &D, url: &str) {
    let _lock = MUTEX.lock().unwrap();
    let connection = driver.open(url).expect("Could not open the connection");
    connection
        .execute("DROP TABLE IF EXISTS quay_prepared", &[])
        .expect("Could not drop quay_prepared");
    connection
        .execute(
            "CREATE TABLE quay_prepared (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            &[],
        )
        .expect("Could not create quay_prepared");

    const INSERT: &str = "INSERT INTO quay_prepared (id, name) VALUES ($1, $2)";
    const SELECT: &str = "SELECT name FROM quay_prepared WHERE id = $1";
    connection.prepare("insert_row", INSERT).unwrap();
    connection.prepare("insert_row", INSERT).unwrap();
    connection.prepare("select_row", SELECT).unwrap();
    assert!(connection.is_prepared("insert_row"));
    silent_logs! {
        let error = connection.prepare("insert_row", SELECT).unwrap_err();
        assert!(error.is::<StatementError>(), "{:#}", error);
        let error = connection.prepare("select row", SELECT).unwrap_err();
        assert!(error.is::<StatementError>(), "{:#}", error);
    }

    let transaction = connection.begin(IsolationLevel::Default).unwrap();
    let by_name = transaction
        .execute("insert_row", &[&1, &"first"])
        .expect("Could not insert through the prepared statement");
    let by_text = transaction
        .execute(INSERT, &[&2, &"second"])
        .expect("Could not insert through the statement text");
    assert_eq!(by_name.rows_affected(), 1);
    assert_eq!(by_name.rows_affected(), by_text.rows_affected());
    transaction.commit().unwrap();

    for (id, name) in [(1, "first"), (2, "second")] {
        let by_name = connection.execute("select_row", &[&id]).unwrap();
        let by_text = connection.execute(SELECT, &[&id]).unwrap();
        assert_eq!(by_name.labels(), by_text.labels());
        assert_eq!(by_name.scalar::<String>().unwrap(), name);
        assert_eq!(by_text.scalar::<String>().unwrap(), name);
    }

    connection.deallocate("insert_row").unwrap();
    connection.deallocate("insert_row").unwrap();
    assert!(!connection.is_prepared("insert_row"));
    connection
        .prepare("insert_row", "INSERT INTO quay_prepared (id, name) VALUES ($1, 'third')")
        .expect("Could not prepare a different statement after deallocating");
    connection.execute("insert_row", &[&3]).unwrap();
    let total = connection
        .execute("SELECT COUNT(*) FROM quay_prepared", &[])
        .unwrap()
        .scalar::<i64>()
        .unwrap();
    assert_eq!(total, 3);
}
