#[cfg(test)]
mod tests {
    use quay::{Connection, Error, IsolationLevel, OrderError, Result, TransactionState};
    use quay_sqlite::SqliteDriver;
    use quay_tests::{init_logs, silent_logs};
    use std::{
        fs,
        panic::{self, AssertUnwindSafe},
        path::Path,
        sync::{Arc, Mutex},
    };

    static MUTEX: Mutex<()> = Mutex::new(());

    fn open(name: &str) -> Arc<Connection> {
        let path = format!("{}/{}", env!("CARGO_TARGET_TMPDIR"), name);
        if Path::new(&path).exists() {
            fs::remove_file(&path).expect("Could not remove the previous database");
        }
        let connection = Connection::open(&SqliteDriver::new(), &format!("sqlite://{}", path))
            .expect("Could not open the database");
        connection
            .execute("CREATE TABLE ledger (entry INTEGER)", &[])
            .unwrap();
        connection
    }

    fn entries(connection: &Arc<Connection>) -> Vec<i64> {
        connection
            .execute("SELECT entry FROM ledger ORDER BY entry", &[])
            .unwrap()
            .collect::<i64>()
            .unwrap()
    }

    fn transfer(connection: &Arc<Connection>, fail_at: Option<i64>) -> Result<()> {
        let transaction = connection.begin(IsolationLevel::Default)?;
        for entry in 1..=3 {
            let step = transaction.subtransaction()?;
            step.execute("INSERT INTO ledger VALUES ($1)", &[&entry])?;
            if fail_at == Some(entry) {
                return Err(Error::msg(format!("Entry {} was refused", entry)));
            }
            step.commit()?;
        }
        transaction.commit()
    }

    #[test]
    fn early_return_rolls_back_everything() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let connection = open("early_return.sqlite");
        assert!(transfer(&connection, Some(2)).is_err());
        assert!(!connection.has_active_transaction());
        assert!(entries(&connection).is_empty());
        transfer(&connection, None).unwrap();
        assert_eq!(entries(&connection), [1, 2, 3]);
    }

    #[test]
    fn panic_rolls_back_everything() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let connection = open("panic.sqlite");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let transaction = connection.begin(IsolationLevel::Default).unwrap();
            transaction
                .execute("INSERT INTO ledger VALUES ($1)", &[&10])
                .unwrap();
            let savepoint = transaction.subtransaction().unwrap();
            savepoint
                .execute("INSERT INTO ledger VALUES ($1)", &[&20])
                .unwrap();
            panic!("Interrupted while writing the ledger");
        }));
        assert!(outcome.is_err());
        assert!(!connection.has_active_transaction());
        assert!(entries(&connection).is_empty());
    }

    #[test]
    fn released_savepoint_survives_the_parent_commit() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let connection = open("release.sqlite");
        let direct = connection.direct().unwrap();
        let top = direct.subtransaction().unwrap();
        top.execute("INSERT INTO ledger VALUES (1)", &[]).unwrap();
        let kept = top.subtransaction().unwrap();
        kept.execute("INSERT INTO ledger VALUES (2)", &[]).unwrap();
        kept.commit().unwrap();
        assert_eq!(kept.state(), TransactionState::Committed);
        let dropped = top.subtransaction().unwrap();
        dropped.execute("INSERT INTO ledger VALUES (3)", &[]).unwrap();
        silent_logs! {
            let error = top.execute("SELECT 1", &[]).unwrap_err();
            assert!(error.is::<OrderError>(), "{:#}", error);
        }
        drop(dropped);
        top.commit().unwrap();
        assert!(direct.is_current());
        direct.commit().unwrap();
        assert!(!connection.has_active_transaction());
        assert_eq!(entries(&connection), [1, 2]);
    }
}
