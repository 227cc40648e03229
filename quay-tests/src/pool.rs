use quay::{ConnectionPool, Driver, IsolationLevel};
use std::sync::{Arc, Mutex};

static MUTEX: Mutex<()> = Mutex::new(());

pub fn pool<D: Driver>(driver: D, url: &str) {
    let _lock = MUTEX.lock().unwrap();
    let pool = ConnectionPool::new(driver, url);
    assert_eq!(pool.idle(), 0);

    let first = pool.acquire().expect("Could not acquire a connection");
    assert!(first.is_open());
    let first_ptr = Arc::as_ptr(&*first);
    drop(first);
    assert_eq!(pool.idle(), 1);

    let second = pool.acquire().expect("Could not acquire a connection");
    assert!(second.is_open());
    assert_eq!(Arc::as_ptr(&*second), first_ptr);
    assert_eq!(pool.idle(), 0);

    // A connection closed while leased is not reused
    second.close();
    drop(second);
    assert_eq!(pool.idle(), 0);
    let third = pool.acquire().expect("Could not acquire a connection");
    assert!(third.is_open());
    drop(third);

    pool.execute("DROP TABLE IF EXISTS quay_pool", &[]).unwrap();
    pool.execute("CREATE TABLE quay_pool (a INTEGER)", &[])
        .unwrap();
    {
        let connection = pool.acquire().unwrap();
        let transaction = connection.begin(IsolationLevel::Default).unwrap();
        transaction
            .execute("INSERT INTO quay_pool VALUES ($1)", &[&1])
            .unwrap();
        transaction.commit().unwrap();
    }
    assert_eq!(pool.idle(), 1);
    let count = pool
        .execute("SELECT COUNT(*) FROM quay_pool", &[])
        .unwrap()
        .scalar::<i64>()
        .unwrap();
    assert_eq!(count, 1);

    // Still inside a transaction when released
    let connection = pool.acquire().unwrap();
    let transaction = connection.begin(IsolationLevel::Default).unwrap();
    drop(connection);
    assert_eq!(pool.idle(), 0);
    transaction.rollback().unwrap();
}
