use crate::silent_logs;
use quay::{ConnectionError, Driver, IsolationLevel, OrderError};

pub fn connection_lifecycle<D: Driver>(driver: &D, url: &str) {
    let connection = driver.open(url).expect("Could not open the connection");
    assert!(connection.is_open());
    assert!(!connection.has_active_transaction());
    let result = connection
        .execute("SELECT 1", &[])
        .expect("Could not run a trivial query");
    assert_eq!(result.scalar::<i32>().unwrap(), 1);

    connection.close();
    assert!(!connection.is_open());
    silent_logs! {
        let error = connection.execute("SELECT 1", &[]).unwrap_err();
        assert!(error.is::<ConnectionError>(), "{:#}", error);
        let error = connection.begin(IsolationLevel::Default).unwrap_err();
        assert!(error.is::<ConnectionError>(), "{:#}", error);
    }
    assert!(!connection.has_active_transaction());
}

pub fn single_top_level<D: Driver>(driver: &D, url: &str) {
    let connection = driver.open(url).expect("Could not open the connection");
    let transaction = connection
        .begin(IsolationLevel::Default)
        .expect("Could not begin a transaction");
    silent_logs! {
        for isolation in [IsolationLevel::Default, IsolationLevel::Serializable] {
            let error = connection.begin(isolation).unwrap_err();
            assert!(error.is::<OrderError>(), "{:#}", error);
        }
        let error = connection.direct().unwrap_err();
        assert!(error.is::<OrderError>(), "{:#}", error);
    }
    assert!(transaction.is_current());
    transaction
        .commit()
        .expect("Could not commit the transaction");

    let direct = connection.direct().expect("Could not start a direct transaction");
    silent_logs! {
        let error = connection.begin(IsolationLevel::Default).unwrap_err();
        assert!(error.is::<OrderError>(), "{:#}", error);
    }
    drop(direct);
    connection
        .begin(IsolationLevel::Serializable)
        .expect("Could not begin a transaction after the direct one ended")
        .rollback()
        .expect("Could not roll back");
}
