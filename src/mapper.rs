//! Turning cursor rows into values.

use std::marker::PhantomData;

use crate::driver::Cursor;
use crate::error::BoxError;
use crate::value::FromValue;

/// Maps the cursor's current row to a `T`. Called once per row.
///
/// Any `Fn(&dyn Cursor) -> Result<T, BoxError>` is a mapper; wrap closures in
/// [`from_fn`] to let the compiler infer their signature.
pub trait RowMapper<T>: Send {
    fn map_row(&self, row: &dyn Cursor) -> Result<T, BoxError>;
}

impl<T, F> RowMapper<T> for F
where
    F: Fn(&dyn Cursor) -> Result<T, BoxError> + Send,
{
    fn map_row(&self, row: &dyn Cursor) -> Result<T, BoxError> {
        self(row)
    }
}

/// Identity helper that pins a closure's signature to the [`RowMapper`] shape.
///
/// ```
/// use sqlx_named_statement::mapper::{from_fn, RowMapper};
///
/// let user = from_fn(|row| {
///     let id: i64 = row.get_as(1)?.unwrap_or_default();
///     let name: String = row.get_as(2)?.unwrap_or_default();
///     Ok((id, name))
/// });
/// # fn assert_mapper<T>(_: &impl RowMapper<T>) {}
/// # assert_mapper(&user);
/// ```
pub fn from_fn<T, F>(f: F) -> F
where
    F: Fn(&dyn Cursor) -> Result<T, BoxError> + Send,
{
    f
}

/// Reads one column of every row; SQL `NULL` maps to `None`.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMapper<T> {
    column: usize,
    _pd: PhantomData<fn() -> T>,
}

impl<T> ColumnMapper<T> {
    /// Mapper for the 1-based `column`.
    pub fn new(column: usize) -> Self {
        Self {
            column,
            _pd: PhantomData,
        }
    }
}

impl<T: FromValue> RowMapper<Option<T>> for ColumnMapper<T> {
    fn map_row(&self, row: &dyn Cursor) -> Result<Option<T>, BoxError> {
        row.get_as(self.column)
    }
}

pub fn column<T: FromValue>(column: usize) -> ColumnMapper<T> {
    ColumnMapper::new(column)
}

pub fn string() -> ColumnMapper<String> {
    ColumnMapper::new(1)
}

pub fn integer() -> ColumnMapper<i32> {
    ColumnMapper::new(1)
}

pub fn long() -> ColumnMapper<i64> {
    ColumnMapper::new(1)
}

pub fn double() -> ColumnMapper<f64> {
    ColumnMapper::new(1)
}
