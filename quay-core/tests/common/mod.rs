#![allow(dead_code)]

use log::LevelFilter;
use parking_lot::Mutex;
use quay_core::{
    ConnectionError, Driver, Error, ExecutionError, QueryResult, Result, RowLabeled, RowNames,
    RowsAffected, Session, StatementError, Value, oid,
};
use std::{collections::BTreeMap, env, sync::Arc};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger.is_test(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

#[derive(Default)]
struct Recording {
    statements: Vec<String>,
    failing: Vec<String>,
    connections: usize,
    lost_up_to: usize,
    refuse: bool,
}

/// Shared record of everything the mock sessions received.
///
/// Statements starting with one of the `failing` prefixes are rejected.
#[derive(Default, Clone)]
pub struct Script {
    inner: Arc<Mutex<Recording>>,
}

impl Script {
    pub fn statements(&self) -> Vec<String> {
        self.inner.lock().statements.clone()
    }
    /// Returns the statements received so far and forgets them.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.lock().statements)
    }
    pub fn fail_on(&self, statement: &str) {
        self.inner.lock().failing.push(statement.into());
    }
    pub fn succeed_on(&self, statement: &str) {
        self.inner.lock().failing.retain(|v| v != statement);
    }
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.lock().refuse = refuse;
    }
    /// Every session opened so far behaves as if the server went away.
    pub fn lose_connections(&self) {
        let mut recording = self.inner.lock();
        recording.lost_up_to = recording.connections;
    }
    pub fn connections(&self) -> usize {
        self.inner.lock().connections
    }
    fn record(&self, statement: String) -> Result<()> {
        let mut recording = self.inner.lock();
        let failing = recording
            .failing
            .iter()
            .any(|v| statement.starts_with(v.as_str()));
        recording.statements.push(statement.clone());
        if failing {
            return Err(Error::new(ExecutionError(format!(
                "rejected `{}`",
                statement
            ))));
        }
        Ok(())
    }
}

pub struct MockSession {
    script: Script,
    number: usize,
    open: bool,
    prepared: BTreeMap<String, String>,
    copied: Option<Vec<String>>,
}

impl MockSession {
    fn answer(statement: &str, parameters: &[Value]) -> QueryResult {
        if statement.starts_with("SELECT") {
            let labels: RowNames = vec!["parameters".to_string()].into();
            let count = Value::text(oid::INT8, parameters.len().to_string());
            return QueryResult::new(
                labels.clone(),
                vec![RowLabeled::new(labels, vec![count].into())],
                RowsAffected::default(),
            );
        }
        RowsAffected {
            rows_affected: parameters.len() as u64,
            last_affected_id: None,
        }
        .into()
    }
}

impl Session for MockSession {
    fn is_open(&self) -> bool {
        self.open && self.number > self.script.inner.lock().lost_up_to
    }

    fn send_query(&mut self, statement: &str, parameters: &[Value]) -> Result<QueryResult> {
        self.script.record(statement.into())?;
        Ok(Self::answer(statement, parameters))
    }

    fn send_prepared(&mut self, name: &str, parameters: &[Value]) -> Result<QueryResult> {
        self.script.record(format!("EXECUTE {}", name))?;
        let statement = self.prepared.get(name).ok_or_else(|| {
            Error::new(ExecutionError(format!("unknown prepared statement {}", name)))
        })?;
        Ok(Self::answer(statement, parameters))
    }

    fn prepare(&mut self, name: &str, statement: &str) -> Result<()> {
        self.script
            .record(format!("PREPARE {} AS {}", name, statement))
            .map_err(|e| Error::new(StatementError(format!("{:#}", e))))?;
        self.prepared.insert(name.into(), statement.into());
        Ok(())
    }

    fn deallocate(&mut self, name: &str) -> Result<()> {
        self.script.record(format!("DEALLOCATE {}", name))?;
        self.prepared.remove(name);
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn copy_in(&mut self, statement: &str) -> Result<()> {
        self.script.record(statement.into())?;
        self.copied = Some(Vec::new());
        Ok(())
    }

    fn put_copy_data(&mut self, data: &[u8]) -> Result<()> {
        let data = String::from_utf8_lossy(data).into_owned();
        self.script.record(format!("DATA {}", data.trim_end()))?;
        if let Some(copied) = &mut self.copied {
            copied.extend(data.lines().map(String::from));
        }
        Ok(())
    }

    fn put_copy_end(&mut self) -> Result<u64> {
        let rows = self.copied.take().map_or(0, |v| v.len() as u64);
        self.script.record(format!("END {}", rows))?;
        Ok(rows)
    }

    fn put_copy_fail(&mut self, _reason: &str) -> Result<()> {
        self.copied = None;
        self.script.record("FAIL".into())
    }
}

#[derive(Default, Clone)]
pub struct MockDriver {
    pub script: Script,
}

impl Driver for MockDriver {
    type Session = MockSession;

    const NAME: &'static str = "mock";

    fn connect(&self, url: &str) -> Result<MockSession> {
        let mut recording = self.script.inner.lock();
        if recording.refuse || !url.starts_with("mock://") {
            return Err(Error::new(ConnectionError(format!(
                "cannot connect to `{}`",
                url
            ))));
        }
        recording.connections += 1;
        Ok(MockSession {
            script: self.script.clone(),
            number: recording.connections,
            open: true,
            prepared: Default::default(),
            copied: None,
        })
    }
}

#[allow(unused_macros)]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
