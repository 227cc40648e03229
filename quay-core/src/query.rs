use crate::{Error, FromValue, Result, Value};
use std::{any, ops::Index, slice, sync::Arc, vec};

/// Metadata about modify operations (INSERT/UPDATE/DELETE).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowsAffected {
    /// Total number of rows impacted.
    pub rows_affected: u64,
    /// Backend-specific last inserted / affected identifier when available.
    pub last_affected_id: Option<i64>,
}

/// Shared reference-counted column name list.
pub type RowNames = Arc<[String]>;
/// Owned row value slice matching `RowNames` length.
pub type Row = Box<[Value]>;

/// A result row with its corresponding column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLabeled {
    /// Column names.
    pub labels: RowNames,
    /// Data values (aligned by index with `labels`).
    pub values: Row,
}

impl RowLabeled {
    pub fn new(names: RowNames, values: Row) -> Self {
        Self {
            labels: names,
            values,
        }
    }
    pub fn names(&self) -> &[String] {
        &self.labels
    }
    pub fn values(&self) -> &[Value] {
        &self.values
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|v| v == name)
            .map(|i| &self.values()[i])
    }
    /// Decode the field at `index`.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.values.get(index).ok_or_else(|| {
            Error::msg(format!(
                "Column index {} is out of range, the row has {} columns",
                index,
                self.values.len()
            ))
        })?;
        T::from_value(value).map_err(|e| {
            e.context(format!(
                "While decoding column {} `{}`",
                index,
                self.labels.get(index).map_or("", String::as_str)
            ))
        })
    }
    /// Decode the field of the column labeled `name`, the first one if several share it.
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let index = self
            .labels
            .iter()
            .position(|v| v == name)
            .ok_or_else(|| Error::msg(format!("The row has no column named `{}`", name)))?;
        self.get(index)
    }
}

impl Index<usize> for RowLabeled {
    type Output = Value;
    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

/// Conversion of a whole row, implemented for tuples of [`FromValue`] types.
pub trait FromRow: Sized {
    fn from_row(row: &RowLabeled) -> Result<Self>;
}

macro_rules! impl_from_row {
    ($($t:ident $i:tt),+) => {
        impl<$($t: FromValue),+> FromRow for ($($t,)+) {
            fn from_row(row: &RowLabeled) -> Result<Self> {
                let columns = [$($i),+].len();
                if row.len() != columns {
                    return Err(Error::msg(format!(
                        "Cannot decode a row of {} columns into {}",
                        row.len(),
                        any::type_name::<Self>()
                    )));
                }
                Ok(($(row.get::<$t>($i)?,)+))
            }
        }
    };
}
impl_from_row!(A 0);
impl_from_row!(A 0, B 1);
impl_from_row!(A 0, B 1, C 2);
impl_from_row!(A 0, B 1, C 2, D 3);
impl_from_row!(A 0, B 1, C 2, D 3, E 4);
impl_from_row!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_from_row!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_from_row!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

fn single_column<T: FromValue>(row: &RowLabeled) -> Result<T> {
    if row.len() != 1 {
        return Err(Error::msg(format!(
            "Cannot decode a row of {} columns into {}",
            row.len(),
            any::type_name::<T>()
        )));
    }
    row.get::<T>(0)
}

macro_rules! impl_from_row_single {
    ($($target:ty),+ $(,)?) => {
        $(
            impl FromRow for $target {
                fn from_row(row: &RowLabeled) -> Result<Self> {
                    single_column(row)
                }
            }
        )+
    };
}
impl_from_row_single!(
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    bool,
    String,
    Vec<u8>,
    rust_decimal::Decimal,
    uuid::Uuid,
    time::Date,
    time::Time,
    time::PrimitiveDateTime,
);

impl<T: FromValue> FromRow for Option<T> {
    fn from_row(row: &RowLabeled) -> Result<Self> {
        single_column(row)
    }
}

/// Everything a statement produced: the rows it returned and the rows it modified.
#[derive(Default, Debug, Clone)]
pub struct QueryResult {
    pub labels: RowNames,
    pub rows: Vec<RowLabeled>,
    pub affected: RowsAffected,
}

impl QueryResult {
    pub fn new(labels: RowNames, rows: Vec<RowLabeled>, affected: RowsAffected) -> Self {
        Self {
            labels,
            rows,
            affected,
        }
    }
    /// Column labels, present even when no row was returned.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
    /// Number of rows returned.
    pub fn len(&self) -> usize {
        self.rows.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
    pub fn columns(&self) -> usize {
        self.labels.len()
    }
    pub fn rows_affected(&self) -> u64 {
        self.affected.rows_affected
    }
    pub fn iter(&self) -> slice::Iter<'_, RowLabeled> {
        self.rows.iter()
    }
    /// Decode the single field of a result that has exactly one row and one column.
    pub fn scalar<T: FromValue>(&self) -> Result<T> {
        if self.rows.len() != 1 || self.columns() != 1 {
            return Err(Error::msg(format!(
                "Expected exactly one row with one column, found {} rows with {} columns",
                self.rows.len(),
                self.columns()
            )));
        }
        self.rows[0].get(0)
    }
    /// Decode every row.
    pub fn collect<T: FromRow>(&self) -> Result<Vec<T>> {
        self.rows.iter().map(T::from_row).collect()
    }
}

impl Index<usize> for QueryResult {
    type Output = RowLabeled;
    fn index(&self, index: usize) -> &RowLabeled {
        &self.rows[index]
    }
}

impl IntoIterator for QueryResult {
    type Item = RowLabeled;
    type IntoIter = vec::IntoIter<RowLabeled>;
    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a RowLabeled;
    type IntoIter = slice::Iter<'a, RowLabeled>;
    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl From<RowsAffected> for QueryResult {
    fn from(value: RowsAffected) -> Self {
        QueryResult {
            affected: value,
            ..Default::default()
        }
    }
}
