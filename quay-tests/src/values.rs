use indoc::indoc;
use quay::Driver;
use rust_decimal::Decimal;
use std::{str::FromStr, sync::Mutex};
use time::macros::{date, datetime};
use uuid::Uuid;

static MUTEX: Mutex<()> = Mutex::new(());

pub fn values<D: Driver>(driver: &D, url: &str) {
    let _lock = MUTEX.lock().unwrap();
    let connection = driver.open(url).expect("Could not open the connection");
    connection
        .execute("DROP TABLE IF EXISTS quay_values", &[])
        .unwrap();
    connection
        .execute(
            indoc! {"
                CREATE TABLE quay_values (
                    id INTEGER PRIMARY KEY,
                    flag BOOLEAN,
                    small SMALLINT,
                    big BIGINT,
                    ratio DOUBLE PRECISION,
                    price NUMERIC(10, 2),
                    label TEXT,
                    payload BYTEA,
                    day DATE,
                    moment TIMESTAMP,
                    token UUID
                )
            "},
            &[],
        )
        .expect("Could not create quay_values");

    let price = Decimal::from_str("1234.50").unwrap();
    let token = Uuid::new_v4();
    let moment = datetime!(2024-02-29 13:45:10);
    let inserted = connection
        .execute(
            indoc! {"
                INSERT INTO quay_values
                    (id, flag, small, big, ratio, price, label, payload, day, moment, token)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "},
            &[
                &1,
                &true,
                &-12i16,
                &9_007_199_254_740_993i64,
                &0.25f64,
                &price,
                &"tab\tand 'quote'",
                &vec![0u8, 1, 254, 255],
                &date!(1999 - 12 - 31),
                &moment,
                &token,
            ],
        )
        .expect("Could not insert the values");
    assert_eq!(inserted.rows_affected(), 1);
    connection
        .execute(
            "INSERT INTO quay_values (id, label) VALUES ($1, $2)",
            &[&2, &None::<String>],
        )
        .expect("Could not insert the nulls");

    let result = connection
        .execute("SELECT * FROM quay_values ORDER BY id", &[])
        .unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result.columns(), 11);
    let row = &result[0];
    assert_eq!(row.get_named::<i32>("id").unwrap(), 1);
    assert!(row.get_named::<bool>("flag").unwrap());
    assert_eq!(row.get_named::<i16>("small").unwrap(), -12);
    assert_eq!(row.get_named::<i64>("big").unwrap(), 9_007_199_254_740_993);
    assert_eq!(row.get_named::<f64>("ratio").unwrap(), 0.25);
    assert_eq!(row.get_named::<Decimal>("price").unwrap(), price);
    assert_eq!(row.get_named::<String>("label").unwrap(), "tab\tand 'quote'");
    assert_eq!(
        row.get_named::<Vec<u8>>("payload").unwrap(),
        vec![0u8, 1, 254, 255]
    );
    assert_eq!(
        row.get_named::<time::Date>("day").unwrap(),
        date!(1999 - 12 - 31)
    );
    assert_eq!(
        row.get_named::<time::PrimitiveDateTime>("moment").unwrap(),
        moment
    );
    assert_eq!(row.get_named::<Uuid>("token").unwrap(), token);

    let row = &result[1];
    assert_eq!(row.get_named::<Option<String>>("label").unwrap(), None);
    assert_eq!(row.get_named::<Option<bool>>("flag").unwrap(), None);
    assert!(row.get_named::<String>("label").is_err());

    let pairs = connection
        .execute(
            "SELECT id, label FROM quay_values WHERE id >= $1 ORDER BY id",
            &[&1],
        )
        .unwrap()
        .collect::<(i64, Option<String>)>()
        .unwrap();
    assert_eq!(
        pairs,
        [(1, Some("tab\tand 'quote'".to_string())), (2, None)]
    );
}
