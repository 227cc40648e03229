mod connection;
mod nesting;
mod pool;
mod prepared;
mod rollback;
#[cfg(not(feature = "disable-copy"))]
mod table_writer;
mod values;

use crate::{
    connection::{connection_lifecycle, single_top_level},
    nesting::{deep_nesting, order_errors},
    pool::pool,
    prepared::prepared,
    rollback::{end_to_end, implicit_rollback},
    values::values,
};
use log::LevelFilter;
use quay::Driver;
use std::env;
#[cfg(not(feature = "disable-copy"))]
use table_writer::table_writer;

#[doc(hidden)]
pub use log;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run every behavioural test against the database at `url`.
pub fn execute_tests<D: Driver + Clone>(driver: &D, url: &str) {
    connection_lifecycle(driver, url);
    single_top_level(driver, url);
    order_errors(driver, url);
    deep_nesting(driver, url);
    prepared(driver, url);
    implicit_rollback(driver, url);
    end_to_end(driver, url);
    values(driver, url);
    pool(driver.clone(), url);
    #[cfg(not(feature = "disable-copy"))]
    table_writer(driver, url);
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = $crate::log::max_level();
        $crate::log::set_max_level($crate::log::LevelFilter::Off);
        $($code)+
        $crate::log::set_max_level(level);
    }};
}
