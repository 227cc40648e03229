use crate::SqliteSession;
use quay_core::{Driver, Result};

/// Opens SQLite databases from `sqlite://<path>[?<uri parameters>]` URLs.
///
/// The part after the scheme is handed to SQLite as a URI filename, so `sqlite://:memory:`,
/// `sqlite://data.db?mode=ro` or `sqlite:///tmp/data.db?mode=rwc` all work.
#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteDriver {}

impl SqliteDriver {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for SqliteDriver {
    type Session = SqliteSession;

    const NAME: &'static str = "sqlite";

    fn connect(&self, url: &str) -> Result<SqliteSession> {
        SqliteSession::open(url)
    }
}
