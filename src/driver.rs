//! The relational database boundary the statements run against.
//!
//! Every call is synchronous and blocks until the driver answers. Bind slots and
//! cursor columns are 1-based. A [`Connector`] hands out [`Connection`]s, a
//! connection prepares [`PreparedStatement`]s and a statement produces
//! [`Cursor`]s. Each of the three is closed explicitly by its owner, the
//! [`crate::connection::ConnectionHandle`].

use crate::error::BoxError;
use crate::value::{FromValue, Value};

/// Whether a prepared statement should capture database-generated keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRetrieval {
    None,
    Generated,
}

/// A named source of live connections.
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    fn connect(&self) -> Result<Box<dyn Connection>, BoxError>;
}

/// One live database connection.
pub trait Connection: Send {
    fn prepare(
        &mut self,
        sql: &str,
        keys: KeyRetrieval,
    ) -> Result<Box<dyn PreparedStatement>, BoxError>;

    fn close(&mut self) -> Result<(), BoxError>;
}

/// The driver-side compiled form of a statement, accepting positional binds.
pub trait PreparedStatement: Send {
    /// Binds `value` at the 1-based `index`.
    fn bind(&mut self, index: usize, value: &Value) -> Result<(), BoxError>;

    /// Queues the currently bound values as one batch entry.
    fn add_batch(&mut self) -> Result<(), BoxError>;

    /// Caps the rows the next query materializes; `None` lifts the cap.
    ///
    /// Drivers that stream rows may ignore it.
    fn set_max_rows(&mut self, max_rows: Option<usize>) -> Result<(), BoxError> {
        let _ = max_rows;
        Ok(())
    }

    fn execute_query(&mut self) -> Result<Box<dyn Cursor>, BoxError>;

    /// Returns the number of affected rows.
    fn execute_update(&mut self) -> Result<i64, BoxError>;

    /// Runs every queued entry and returns their affected-row counts in order.
    fn execute_batch(&mut self) -> Result<Vec<i64>, BoxError>;

    /// Keys generated by the last execution, one per row in column 1.
    fn generated_keys(&mut self) -> Result<Box<dyn Cursor>, BoxError>;

    fn close(&mut self) -> Result<(), BoxError>;
}

/// Forward-only iterator over the rows of a result.
pub trait Cursor: Send {
    /// Advances to the next row, returning `false` once the rows are exhausted.
    fn next(&mut self) -> Result<bool, BoxError>;

    fn column_count(&self) -> usize;

    fn column_label(&self, column: usize) -> Option<&str>;

    /// Reads the 1-based `column` of the current row.
    fn get(&self, column: usize) -> Result<Value, BoxError>;

    fn close(&mut self) -> Result<(), BoxError>;
}

impl dyn Cursor + '_ {
    /// Reads and converts the 1-based `column` of the current row; `NULL` is `None`.
    pub fn get_as<T: FromValue>(&self, column: usize) -> Result<Option<T>, BoxError> {
        T::from_value(self.get(column)?)
    }

    /// Looks up a column by its label, ignoring ASCII case.
    pub fn column_index(&self, label: &str) -> Option<usize> {
        (1..=self.column_count()).find(|&column| {
            self.column_label(column)
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(label))
        })
    }
}

/// A cursor over rows already held in memory.
#[derive(Debug, Default)]
pub struct RowsCursor {
    labels: Vec<String>,
    rows: Vec<Vec<Value>>,
    position: Option<usize>,
    closed: bool,
}

impl RowsCursor {
    pub fn new(labels: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            labels,
            rows,
            position: None,
            closed: false,
        }
    }

    /// A single-column cursor, the shape drivers use for generated keys.
    pub fn keys(keys: impl IntoIterator<Item = i64>) -> Self {
        Self::new(
            vec!["GENERATED_KEY".to_owned()],
            keys.into_iter().map(|key| vec![Value::BigInt(key)]).collect(),
        )
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn current(&self) -> Result<&[Value], BoxError> {
        if self.closed {
            return Err("cursor is closed".into());
        }
        self.position
            .and_then(|position| self.rows.get(position))
            .map(Vec::as_slice)
            .ok_or_else(|| "cursor is not positioned on a row".into())
    }
}

impl Cursor for RowsCursor {
    fn next(&mut self) -> Result<bool, BoxError> {
        if self.closed {
            return Err("cursor is closed".into());
        }
        let next = self.position.map_or(0, |position| position + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn column_count(&self) -> usize {
        self.labels.len()
    }

    fn column_label(&self, column: usize) -> Option<&str> {
        column
            .checked_sub(1)
            .and_then(|index| self.labels.get(index))
            .map(String::as_str)
    }

    fn get(&self, column: usize) -> Result<Value, BoxError> {
        let row = self.current()?;
        column
            .checked_sub(1)
            .and_then(|index| row.get(index))
            .cloned()
            .ok_or_else(|| format!("column {column} is out of range").into())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.closed = true;
        Ok(())
    }
}
