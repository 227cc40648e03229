#[macro_use]
mod common;

#[cfg(test)]
mod tests {
    use crate::common::{MockDriver, init_logs};
    use quay_core::{ConnectionError, Driver, IsolationLevel, PoolError};
    use std::{sync::Arc, thread};

    #[test]
    fn connections_are_reused() {
        init_logs();
        let driver = MockDriver::default();
        let script = driver.script.clone();
        let pool = driver.pool("mock://db");
        assert_eq!(pool.idle(), 0);
        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert!(!Arc::ptr_eq(&*first, &*second));
        assert_eq!(script.connections(), 2);
        drop(first);
        drop(second);
        assert_eq!(pool.idle(), 2);
        let third = pool.acquire().unwrap();
        assert_eq!(pool.idle(), 1);
        assert_eq!(script.connections(), 2);
        drop(third);
        pool.execute("DELETE FROM t", &[]).unwrap();
        assert_eq!(script.connections(), 2);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn closed_connections_are_discarded() {
        let driver = MockDriver::default();
        let script = driver.script.clone();
        let pool = driver.pool("mock://db");
        let connection = pool.acquire().unwrap();
        connection.close();
        drop(connection);
        assert_eq!(pool.idle(), 0);

        let connection = pool.acquire().unwrap();
        let kept = Arc::clone(&*connection);
        drop(connection);
        assert_eq!(pool.idle(), 0);
        drop(kept);

        drop(pool.acquire().unwrap());
        assert_eq!(pool.idle(), 1);
        script.lose_connections();
        let connection = pool.acquire().unwrap();
        assert!(connection.is_open());
        assert_eq!(pool.idle(), 0);
        assert_eq!(script.connections(), 4);
    }

    #[test]
    fn busy_connections_are_not_recycled() {
        let driver = MockDriver::default();
        let pool = driver.pool("mock://db");
        let connection = pool.acquire().unwrap();
        let transaction = connection.begin(IsolationLevel::Default).unwrap();
        drop(connection);
        assert_eq!(pool.idle(), 0);
        transaction.commit().unwrap();
    }

    #[test]
    fn acquire_failure() {
        init_logs();
        let driver = MockDriver::default();
        driver.script.refuse_connections(true);
        let pool = driver.pool("mock://db");
        silent_logs! {
            let error = pool.acquire().unwrap_err();
            assert!(error.is::<PoolError>());
            assert!(error.is::<ConnectionError>());
        }
    }

    #[test]
    fn shared_between_threads() {
        init_logs();
        let driver = MockDriver::default();
        let script = driver.script.clone();
        let pool = driver.pool("mock://db");
        let handles = (0..4)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        let connection = pool.acquire().unwrap();
                        let transaction = connection.begin(IsolationLevel::Default).unwrap();
                        transaction.execute("INSERT INTO t VALUES (1)", &[]).unwrap();
                        transaction.commit().unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(script.connections() <= 4);
        assert_eq!(pool.idle(), script.connections());
        assert_eq!(script.statements().len(), 120);
    }
}
