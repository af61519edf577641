use std::fmt;

use crate::driver::{Connection, KeyRetrieval};
use crate::error::Result;
use crate::mapper::RowMapper;
use crate::registry::ConnectorRegistry;
use crate::statement::{NamedParameters, StatementCore};
use crate::value::Value;

/// A query with named placeholders whose rows are mapped to `T`.
///
/// Construction parses the text, opens a connection and prepares the rewritten
/// statement. `execute` and `execute_for_all` consume the `Select` and release
/// its cursor, prepared statement and connection before returning, whether the
/// query succeeds or fails.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_named_statement::{mapper, ConnectorRegistry, NamedParameters, Select};
///
/// # fn example(registry: &ConnectorRegistry) -> sqlx_named_statement::Result<()> {
/// let users = mapper::from_fn(|row| Ok((row.get_as::<i64>(1)?, row.get_as::<String>(2)?)));
///
/// let adults = Select::new(registry, "SELECT id, name FROM users WHERE age >= :min_age", users)?
///     .set("min_age", 18)?
///     .execute_for_all()?;
/// println!("Found {} users", adults.len());
/// # Ok(())
/// # }
/// ```
pub struct Select<T> {
    core: StatementCore,
    mapper: Box<dyn RowMapper<T>>,
    default: Option<T>,
}

impl<T> Select<T> {
    /// Prepares `select` on a connection from the registry's default connector.
    pub fn new<S, M>(registry: &ConnectorRegistry, select: S, mapper: M) -> Result<Self>
    where
        S: Into<String>,
        M: RowMapper<T> + 'static,
    {
        Self::named(registry, None, select, mapper)
    }

    /// Prepares `select` on a connection from the connector named `connection_name`.
    pub fn named<S, M>(
        registry: &ConnectorRegistry,
        connection_name: Option<&str>,
        select: S,
        mapper: M,
    ) -> Result<Self>
    where
        S: Into<String>,
        M: RowMapper<T> + 'static,
    {
        let core = StatementCore::open(registry, connection_name, select.into(), KeyRetrieval::None)?;
        Ok(Self::from_core(core, mapper))
    }

    /// Prepares `select` on a connection the caller already holds. The connection
    /// is closed once the statement completes.
    pub fn with_connection<S, M>(connection: Box<dyn Connection>, select: S, mapper: M) -> Result<Self>
    where
        S: Into<String>,
        M: RowMapper<T> + 'static,
    {
        let core = StatementCore::on_connection(connection, select.into(), KeyRetrieval::None)?;
        Ok(Self::from_core(core, mapper))
    }

    fn from_core<M>(core: StatementCore, mapper: M) -> Self
    where
        M: RowMapper<T> + 'static,
    {
        Self {
            core,
            mapper: Box::new(mapper),
            default: None,
        }
    }

    /// Value returned by [`Select::execute`] when the query yields no row.
    pub fn default_when_null(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }

    /// Maps the first row, or returns the configured default when there is none.
    ///
    /// # Errors
    ///
    /// Returns `Error::Execute` when the query or the row mapper fails.
    pub fn execute(mut self) -> Result<Option<T>> {
        let mapper = &*self.mapper;
        let row = self.core.finish(|handle| {
            handle.statement()?.set_max_rows(Some(1))?;
            let cursor = handle.open_query()?;
            if cursor.next()? {
                mapper.map_row(&*cursor).map(Some)
            } else {
                Ok(None)
            }
        })?;
        Ok(row.or(self.default))
    }

    /// Maps every row, in cursor order. No rows yields an empty vector.
    pub fn execute_for_all(mut self) -> Result<Vec<T>> {
        let mapper = &*self.mapper;
        self.core.finish(|handle| {
            let cursor = handle.open_query()?;
            let mut rows = Vec::new();
            while cursor.next()? {
                rows.push(mapper.map_row(&*cursor)?);
            }
            Ok(rows)
        })
    }

    pub(crate) fn core(&self) -> &StatementCore {
        &self.core
    }
}

impl<U> Select<Option<U>> {
    /// Like [`Select::execute`] for nullable scalars: the default also applies when
    /// the first row holds `NULL`.
    pub fn execute_scalar(mut self) -> Result<Option<U>> {
        let default = self.default.take().flatten();
        Ok(self.execute()?.flatten().or(default))
    }
}

impl<T> NamedParameters for Select<T> {
    fn bind_value(&mut self, name: &str, value: Value) -> Result<()> {
        self.core.bind(name, value)
    }

    fn bind_index(&mut self, index: usize, value: Value) -> Result<()> {
        self.core.bind_index(index, value)
    }
}

impl<T> fmt::Display for Select<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Select [{}, default configured={}]",
            self.core,
            self.default.is_some()
        )
    }
}
