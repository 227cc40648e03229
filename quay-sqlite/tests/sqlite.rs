#[cfg(test)]
mod tests {
    use quay_core::{ConnectionError, Driver, ExecutionError, IsolationLevel, StatementError};
    use quay_sqlite::SqliteDriver;
    use quay_tests::{execute_tests, init_logs, silent_logs};
    use std::{env, fs, path::Path, sync::Mutex};

    static MUTEX: Mutex<()> = Mutex::new(());

    fn database(name: &str) -> String {
        format!("{}/{}", env!("CARGO_TARGET_TMPDIR"), name)
    }

    #[test]
    fn sqlite() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let url = match env::var("QUAY_SQLITE_TEST") {
            Ok(url) => url,
            Err(..) => {
                let path = database("tests.sqlite");
                if Path::new(&path).exists() {
                    fs::remove_file(&path).expect(
                        format!("Failed to remove existing test database file {}", path).as_str(),
                    );
                }
                format!("sqlite://{}?mode=rwc", path)
            }
        };
        execute_tests(&SqliteDriver::new(), &url);
    }

    #[test]
    fn create_database() {
        init_logs();
        let path = database("creation.sqlite");
        let _guard = MUTEX.lock().unwrap();
        if Path::new(&path).exists() {
            fs::remove_file(&path)
                .expect(format!("Failed to remove test database file {}", path).as_str());
        }
        let driver = SqliteDriver::new();
        driver
            .open(&format!("sqlite://{}?mode=rwc", path))
            .expect("Could not open the database");
        assert!(
            Path::new(&path).exists(),
            "Database file should be created after connection"
        );
        let connection = driver
            .open(&format!("sqlite://{}?mode=ro", path))
            .expect("Could not open the database");
        silent_logs! {
            let error = connection
                .execute("CREATE TABLE nothing (a INTEGER)", &[])
                .unwrap_err();
            assert!(error.is::<ExecutionError>(), "{:#}", error);
        }
        drop(connection);
        fs::remove_file(&path)
            .expect(format!("Failed to remove existing test database file {}", path).as_str());
        silent_logs! {
            let error = driver
                .open(&format!("sqlite://{}?mode=ro", path))
                .unwrap_err();
            assert!(error.is::<ConnectionError>(), "{:#}", error);
        }
    }

    #[test]
    fn wrong_url() {
        init_logs();
        silent_logs! {
            let error = SqliteDriver::new().open("postgres://some_value").unwrap_err();
            assert!(error.is::<ConnectionError>(), "{:#}", error);
        };
    }

    #[test]
    fn in_memory() {
        init_logs();
        let connection = SqliteDriver::new()
            .open("sqlite://:memory:")
            .expect("Could not open an in memory database");
        connection
            .execute(
                "CREATE TABLE numbers (n INTEGER); INSERT INTO numbers VALUES (1), (2), (3)",
                &[],
            )
            .expect("Could not run a script");
        let result = connection
            .execute("SELECT SUM(n) AS total FROM numbers WHERE n > $1", &[&1])
            .unwrap();
        assert_eq!(result.labels(), ["total"]);
        assert_eq!(result.scalar::<i64>().unwrap(), 5);
        let updated = connection
            .execute("UPDATE numbers SET n = n * 10 WHERE n >= $1", &[&2])
            .unwrap();
        assert_eq!(updated.rows_affected(), 2);
        let inserted = connection
            .execute("INSERT INTO numbers VALUES ($1)", &[&7])
            .unwrap();
        assert_eq!(inserted.rows_affected(), 1);
        assert_eq!(inserted.affected.last_affected_id, Some(4));
        silent_logs! {
            let error = connection.execute("SELECT $1, $2", &[&1]).unwrap_err();
            assert!(error.is::<ExecutionError>(), "{:#}", error);
            let error = connection
                .execute("SELECT $1; SELECT $1", &[&1, &1])
                .unwrap_err();
            assert!(error.is::<ExecutionError>(), "{:#}", error);
            let error = connection.execute("SELEC 1", &[]).unwrap_err();
            assert!(error.is::<ExecutionError>(), "{:#}", error);
            let error = connection.prepare("two", "SELECT 1; SELECT 2").unwrap_err();
            assert!(error.is::<StatementError>(), "{:#}", error);
        }
    }

    #[test]
    fn parameters_out_of_order() {
        let connection = SqliteDriver::new().open("sqlite://:memory:").unwrap();
        let result = connection
            .execute("SELECT $2 || '-' || $1", &[&"first", &"second"])
            .unwrap();
        assert_eq!(result.scalar::<String>().unwrap(), "second-first");
        let result = connection.execute("SELECT ?2 - ?1", &[&1, &10]).unwrap();
        assert_eq!(result.scalar::<i64>().unwrap(), 9);
    }

    #[test]
    fn isolation_is_accepted() {
        let connection = SqliteDriver::new().open("sqlite://:memory:").unwrap();
        for isolation in [
            IsolationLevel::Serializable,
            IsolationLevel::RepeatableRead,
            IsolationLevel::ReadCommitted,
            IsolationLevel::ReadUncommitted,
        ] {
            let transaction = connection.begin(isolation).unwrap();
            transaction.execute("SELECT 1", &[]).unwrap();
            transaction.commit().unwrap();
        }
    }
}
