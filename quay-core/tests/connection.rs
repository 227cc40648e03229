#[macro_use]
mod common;

#[cfg(test)]
mod tests {
    use crate::common::{MockDriver, init_logs};
    use quay_core::{Connection, ConnectionError, Driver, IsolationLevel, StatementError};

    #[test]
    fn open_and_close() {
        init_logs();
        let driver = MockDriver::default();
        let connection = Connection::open(&driver, "mock://db").unwrap();
        assert!(connection.is_open());
        assert!(!connection.has_active_transaction());
        connection.close();
        assert!(!connection.is_open());
        connection.close();
        silent_logs! {
            let error = connection.begin(IsolationLevel::Default).unwrap_err();
            assert!(error.is::<ConnectionError>());
            assert!(connection.prepare("a", "SELECT 1").unwrap_err().is::<ConnectionError>());
        }
        assert!(!connection.has_active_transaction());
    }

    #[test]
    fn refused() {
        init_logs();
        let driver = MockDriver::default();
        silent_logs! {
            let error = driver.open("postgres://somewhere").unwrap_err();
            assert!(error.is::<ConnectionError>());
            assert!(format!("{:#}", error).contains("While opening a mock connection"));
        }
        assert_eq!(driver.script.connections(), 0);
    }

    #[test]
    fn prepared_statements() {
        init_logs();
        let driver = MockDriver::default();
        let connection = driver.open("mock://db").unwrap();
        connection
            .prepare("count_params", "SELECT $1, $2")
            .unwrap();
        connection
            .prepare("count_params", "SELECT $1, $2")
            .unwrap();
        assert!(connection.is_prepared("count_params"));
        silent_logs! {
            let error = connection.prepare("count_params", "SELECT $1").unwrap_err();
            assert!(error.is::<StatementError>());
            let error = connection.prepare("not valid", "SELECT 1").unwrap_err();
            assert!(error.is::<StatementError>());
            let error = connection.prepare("1st", "SELECT 1").unwrap_err();
            assert!(error.is::<StatementError>());
        }
        let result = connection
            .execute("count_params", &[&1, &2])
            .unwrap();
        assert_eq!(result.scalar::<i32>().unwrap(), 2);
        connection.deallocate("count_params").unwrap();
        connection.deallocate("count_params").unwrap();
        connection.deallocate("never_prepared").unwrap();
        assert!(!connection.is_prepared("count_params"));
        assert_eq!(
            driver.script.take(),
            [
                "PREPARE count_params AS SELECT $1, $2",
                "EXECUTE count_params",
                "DEALLOCATE count_params",
            ]
        );
    }

    #[test]
    fn failed_prepare_is_not_registered() {
        let driver = MockDriver::default();
        let connection = driver.open("mock://db").unwrap();
        driver.script.fail_on("PREPARE broken");
        silent_logs! {
            let error = connection.prepare("broken", "SELEC 1").unwrap_err();
            assert!(error.is::<StatementError>());
        }
        assert!(!connection.is_prepared("broken"));
        driver.script.succeed_on("PREPARE broken");
        connection.prepare("broken", "SELECT 1").unwrap();
        assert!(connection.is_prepared("broken"));
    }

    #[test]
    fn closing_forgets_prepared_statements() {
        let driver = MockDriver::default();
        let connection = driver.open("mock://db").unwrap();
        connection.prepare("one", "SELECT 1").unwrap();
        connection.close();
        assert!(!connection.is_prepared("one"));
    }
}
