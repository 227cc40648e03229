use crate::{SqlitePrepared, prepare_statement};
use libsqlite3_sys::{sqlite3, sqlite3_column_count};
use quay_core::{Error, ExecutionError, Result, Value, consume_while, oid, truncate_long};
use std::str;

/// Savepoint wrapping a copy, so that an aborted copy leaves nothing behind.
pub(crate) const COPY_SAVEPOINT: &str = "\"quay_copy\"";

/// Target of `COPY <table> [(<columns>)] FROM STDIN`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct CopyTarget<'s> {
    pub(crate) table: &'s str,
    pub(crate) columns: Option<Vec<&'s str>>,
}

fn keyword(input: &mut &str, expected: &str) -> bool {
    *input = input.trim_start();
    let word = input.get(..expected.len());
    let boundary = input[word.map_or(0, str::len)..]
        .chars()
        .next()
        .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_');
    if word.is_some_and(|v| v.eq_ignore_ascii_case(expected)) && boundary {
        *input = &input[expected.len()..];
        return true;
    }
    false
}

fn copy_error(statement: &str, message: &str) -> Error {
    let error = Error::new(ExecutionError(format!(
        "{}:\n{}",
        message,
        truncate_long!(statement)
    )));
    log::error!("{:#}", error);
    error
}

pub(crate) fn parse_copy(statement: &str) -> Result<CopyTarget<'_>> {
    let mut input = statement;
    if !keyword(&mut input, "COPY") {
        return Err(copy_error(statement, "Expected a COPY statement"));
    }
    input = input.trim_start();
    let mut quoted = false;
    let table = consume_while(&mut input, |c| {
        if c == '"' {
            quoted = !quoted;
        }
        quoted || (!c.is_whitespace() && c != '(')
    });
    if table.is_empty() {
        return Err(copy_error(statement, "Missing the table name"));
    }
    input = input.trim_start();
    let columns = match input.strip_prefix('(') {
        Some(rest) => {
            let Some(end) = rest.find(')') else {
                return Err(copy_error(statement, "Unterminated column list"));
            };
            let columns = rest[..end]
                .split(',')
                .map(str::trim)
                .collect::<Vec<_>>();
            if columns.iter().any(|v| v.is_empty()) {
                return Err(copy_error(statement, "Empty column name"));
            }
            input = &rest[end + 1..];
            Some(columns)
        }
        None => None,
    };
    if !keyword(&mut input, "FROM") || !keyword(&mut input, "STDIN") {
        return Err(copy_error(statement, "Only COPY ... FROM STDIN is supported"));
    }
    if !input.trim_start().trim_start_matches(';').trim().is_empty() {
        return Err(copy_error(statement, "COPY options are not supported"));
    }
    Ok(CopyTarget { table, columns })
}

/// Decode one field of a text format row, `None` for `\N`.
pub(crate) fn unescape(field: &str) -> Option<String> {
    if field == "\\N" {
        return None;
    }
    let mut result = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => result.push('\t'),
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('b') => result.push('\u{8}'),
            Some('f') => result.push('\u{c}'),
            Some('v') => result.push('\u{b}'),
            Some(c) => result.push(c),
            None => result.push('\\'),
        }
    }
    Some(result)
}

/// A bulk copy in progress: rows are inserted as soon as they are complete.
pub(crate) struct CopyIn {
    insert: SqlitePrepared,
    columns: usize,
    pending: String,
    rows: u64,
}

impl CopyIn {
    pub(crate) fn new(db: *mut sqlite3, target: &CopyTarget) -> Result<Self> {
        let columns = match &target.columns {
            Some(columns) => columns.len(),
            None => {
                let select = format!("SELECT * FROM {}", target.table);
                let (statement, _) = prepare_statement(db, &select, ExecutionError)?;
                let statement = statement.ok_or_else(|| {
                    Error::new(ExecutionError(format!(
                        "Cannot read the columns of {}",
                        target.table
                    )))
                })?;
                unsafe { sqlite3_column_count(*statement.statement) as usize }
            }
        };
        let placeholders = (1..=columns)
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = match &target.columns {
            Some(names) => format!(
                "INSERT INTO {} ({}) VALUES ({})",
                target.table,
                names.join(", "),
                placeholders
            ),
            None => format!("INSERT INTO {} VALUES ({})", target.table, placeholders),
        };
        log::debug!("Copying with `{}`", insert);
        let (insert, _) = prepare_statement(db, &insert, ExecutionError)?;
        let insert = insert.ok_or_else(|| Error::new(ExecutionError("Empty insert".into())))?;
        Ok(Self {
            insert,
            columns,
            pending: String::new(),
            rows: 0,
        })
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> Result<()> {
        let data = str::from_utf8(data).map_err(|e| {
            Error::new(ExecutionError(format!("Copy data is not valid UTF-8: {}", e)))
        })?;
        self.pending.push_str(data);
        while let Some(end) = self.pending.find('\n') {
            let line = self.pending[..end].to_string();
            self.pending.drain(..=end);
            self.insert_line(&line)?;
        }
        Ok(())
    }

    /// Insert the last row if it misses the newline, returns the number of rows written.
    pub(crate) fn finish(mut self) -> Result<u64> {
        let line = std::mem::take(&mut self.pending);
        if !line.is_empty() {
            self.insert_line(&line)?;
        }
        Ok(self.rows)
    }

    fn insert_line(&mut self, line: &str) -> Result<()> {
        if line == "\\." {
            return Ok(());
        }
        let values = line
            .split('\t')
            .map(|field| match unescape(field) {
                Some(text) => Value::text(oid::UNKNOWN, text),
                None => Value::null(oid::UNKNOWN),
            })
            .collect::<Vec<_>>();
        if values.len() != self.columns {
            let error = Error::new(ExecutionError(format!(
                "Copy row {} has {} fields, expected {}",
                self.rows + 1,
                values.len(),
                self.columns
            )));
            log::error!("{:#}", error);
            return Err(error);
        }
        self.insert.bind(&values)?;
        self.insert.run()?;
        self.rows += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_statements() {
        assert_eq!(
            parse_copy("COPY person (name, age) FROM STDIN").unwrap(),
            CopyTarget {
                table: "person",
                columns: Some(vec!["name", "age"]),
            }
        );
        assert_eq!(
            parse_copy("copy \"my table\"(a) from stdin;").unwrap(),
            CopyTarget {
                table: "\"my table\"",
                columns: Some(vec!["a"]),
            }
        );
        assert_eq!(
            parse_copy("  COPY main.items FROM STDIN").unwrap(),
            CopyTarget {
                table: "main.items",
                columns: None,
            }
        );
        assert!(parse_copy("COPY t TO STDOUT").is_err());
        assert!(parse_copy("COPY t FROM STDIN WITH (FORMAT csv)").is_err());
        assert!(parse_copy("COPYt FROM STDIN").is_err());
        assert!(parse_copy("INSERT INTO t VALUES (1)").is_err());
    }

    #[test]
    fn text_fields() {
        assert_eq!(unescape("plain"), Some("plain".into()));
        assert_eq!(unescape("\\N"), None);
        assert_eq!(unescape("a\\tb\\\\c\\n"), Some("a\tb\\c\n".into()));
        assert_eq!(unescape(""), Some("".into()));
    }
}
