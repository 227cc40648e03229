use crate::{AsValue, Connection, Format, Result, Transaction};
use std::sync::Arc;

/// Streams rows into a table through the bulk copy protocol.
///
/// ```rust,ignore
/// let mut writer = TableWriter::new(&transaction, "COPY person (name, age) FROM STDIN")?;
/// writer.insert("Alice\t30\n")?;
/// writer.insert_values(&[&"Bob", &None::<i32>])?;
/// assert_eq!(writer.finish()?, 2);
/// ```
///
/// While the copy runs, the transaction cannot execute anything else. Dropping an unfinished
/// writer aborts the copy and leaves the transaction usable.
#[derive(Debug)]
pub struct TableWriter<'t> {
    transaction: &'t Transaction,
    connection: Arc<Connection>,
    done: bool,
}

impl<'t> TableWriter<'t> {
    /// Start the copy, `transaction` must be the current one of its connection.
    pub fn new(transaction: &'t Transaction, statement: &str) -> Result<Self> {
        let connection = transaction.current_connection()?;
        connection.copy_in(statement)?;
        log::debug!("Started a bulk copy in transaction {}", transaction.id());
        Ok(Self {
            transaction,
            connection,
            done: false,
        })
    }

    pub fn transaction(&self) -> &Transaction {
        self.transaction
    }

    /// Send a chunk of rows in text format: newline terminated, tab separated, `\N` for null.
    ///
    /// On failure the copy is aborted.
    pub fn insert(&mut self, data: &str) -> Result<()> {
        if let Err(e) = self.connection.put_copy_data(data.as_bytes()) {
            self.done = true;
            return Err(e);
        }
        Ok(())
    }

    /// Encode one row and send it.
    pub fn insert_values(&mut self, values: &[&dyn AsValue]) -> Result<()> {
        let mut row = String::new();
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                row.push('\t');
            }
            write_field(&mut row, value.as_value());
        }
        row.push('\n');
        self.insert(&row)
    }

    /// Complete the copy and return the number of rows written.
    pub fn finish(mut self) -> Result<u64> {
        self.done = true;
        let rows = self.connection.put_copy_end()?;
        log::debug!(
            "Bulk copy in transaction {} wrote {} rows",
            self.transaction.id(),
            rows
        );
        Ok(rows)
    }
}

fn write_field(out: &mut String, value: crate::Value) {
    let Some(data) = value.data else {
        out.push_str("\\N");
        return;
    };
    if value.format == Format::Binary {
        out.push_str("\\\\x");
        out.push_str(&hex::encode(data));
        return;
    }
    for c in String::from_utf8_lossy(&data).chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}

impl Drop for TableWriter<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = self.connection.put_copy_fail("The table writer was dropped") {
            log::warn!("Could not abort the bulk copy, ignoring it: {:#}", e);
        }
    }
}
