use crate::silent_logs;
use quay::{Driver, IsolationLevel, OrderError, TableWriter, TransactionState};
use std::sync::Mutex;

static MUTEX: Mutex<()> = Mutex::new(());

pub fn table_writer<D: Driver>(driver: &D, url: &str) {
    let _lock = MUTEX.lock().unwrap();
    let connection = driver.open(url).expect("Could not open the connection");
    connection
        .execute("DROP TABLE IF EXISTS quay_people", &[])
        .unwrap();
    connection
        .execute(
            "CREATE TABLE quay_people (name TEXT NOT NULL, age INTEGER, note TEXT)",
            &[],
        )
        .unwrap();

    let transaction = connection.begin(IsolationLevel::Default).unwrap();
    let mut writer = TableWriter::new(&transaction, "COPY quay_people (name, age) FROM STDIN")
        .expect("Could not start the copy");
    writer.insert("alice\t31\n").unwrap();
    writer.insert("bob\t\\N\ncarol\t").unwrap();
    writer.insert("27\n").unwrap();
    writer.insert_values(&[&"dan\tthe man", &45]).unwrap();
    silent_logs! {
        let error = transaction.execute("SELECT 1", &[]).unwrap_err();
        assert!(error.is::<OrderError>(), "{:#}", error);
    }
    assert_eq!(writer.finish().expect("Could not finish the copy"), 4);
    let people = transaction
        .execute("SELECT name, age FROM quay_people ORDER BY name", &[])
        .unwrap()
        .collect::<(String, Option<i32>)>()
        .unwrap();
    assert_eq!(
        people,
        [
            ("alice".to_string(), Some(31)),
            ("bob".into(), None),
            ("carol".into(), Some(27)),
            ("dan\tthe man".into(), Some(45)),
        ]
    );

    // Abandoned copy
    {
        let mut writer = TableWriter::new(&transaction, "COPY quay_people FROM STDIN").unwrap();
        writer.insert("erin\t22\t\\N\n").unwrap();
    }
    // Malformed row
    {
        let mut writer = TableWriter::new(&transaction, "COPY quay_people FROM STDIN").unwrap();
        silent_logs! {
            assert!(writer.insert("frank\t40\n").is_err());
        }
    }
    let count = transaction
        .execute("SELECT COUNT(*) FROM quay_people", &[])
        .unwrap()
        .scalar::<i64>()
        .unwrap();
    assert_eq!(count, 4);
    transaction.commit().unwrap();

    let transaction = connection.begin(IsolationLevel::Default).unwrap();
    let mut writer = TableWriter::new(&transaction, "COPY quay_people FROM STDIN").unwrap();
    writer.insert("gina\t50\tlast\n").unwrap();
    assert_eq!(writer.finish().unwrap(), 1);
    transaction.rollback().unwrap();
    let count = connection
        .execute("SELECT COUNT(*) FROM quay_people", &[])
        .unwrap()
        .scalar::<i64>()
        .unwrap();
    assert_eq!(count, 4);

    // Ending the transaction waits for the copy
    let transaction = connection.begin(IsolationLevel::Default).unwrap();
    let mut writer = TableWriter::new(&transaction, "COPY quay_people FROM STDIN").unwrap();
    writer.insert("hank\t61\t\\N\n").unwrap();
    silent_logs! {
        let error = transaction.commit().unwrap_err();
        assert!(error.is::<OrderError>(), "{:#}", error);
        let error = transaction.rollback().unwrap_err();
        assert!(error.is::<OrderError>(), "{:#}", error);
    }
    assert_eq!(transaction.state(), TransactionState::Active);
    assert!(transaction.is_current());
    drop(writer);
    transaction.rollback().unwrap();
    assert!(!connection.has_active_transaction());
    connection
        .execute("INSERT INTO quay_people (name, age) VALUES ($1, $2)", &[&"ivy", &33])
        .unwrap();
    let other = driver.open(url).expect("Could not open a second connection");
    let count = other
        .execute("SELECT COUNT(*) FROM quay_people", &[])
        .unwrap()
        .scalar::<i64>()
        .unwrap();
    assert_eq!(count, 5);
}
