use std::fmt;

use crate::driver::{Connection, KeyRetrieval};
use crate::error::{Error, Result};
use crate::registry::ConnectorRegistry;
use crate::statement::{NamedParameters, StatementCore};
use crate::value::Value;

/// An insert, update or delete with named placeholders.
///
/// The statement is prepared with generated-key capture. Like [`crate::Select`],
/// every `execute*` method consumes the `Update` and releases its resources
/// before returning.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_named_statement::{ConnectorRegistry, NamedParameters, Update};
///
/// # fn example(registry: &ConnectorRegistry) -> sqlx_named_statement::Result<()> {
/// let mut insert = Update::new(registry, "INSERT INTO users (name, email) VALUES (:name, :email)")?;
/// for (name, email) in [("Alice", "alice@example.com"), ("Bob", "bob@example.com")] {
///     insert = insert.set("name", name)?.set("email", email)?.add_batch()?;
/// }
/// let ids = insert.execute_batch()?;
/// println!("Inserted ids {ids:?}");
/// # Ok(())
/// # }
/// ```
pub struct Update {
    core: StatementCore,
}

impl Update {
    /// Prepares `statement` on a connection from the registry's default connector.
    pub fn new<S>(registry: &ConnectorRegistry, statement: S) -> Result<Self>
    where
        S: Into<String>,
    {
        Self::named(registry, None, statement)
    }

    /// Prepares `statement` on a connection from the connector named `connection_name`.
    pub fn named<S>(
        registry: &ConnectorRegistry,
        connection_name: Option<&str>,
        statement: S,
    ) -> Result<Self>
    where
        S: Into<String>,
    {
        let core = StatementCore::open(
            registry,
            connection_name,
            statement.into(),
            KeyRetrieval::Generated,
        )?;
        Ok(Self { core })
    }

    /// Prepares `statement` on a connection the caller already holds. The
    /// connection is closed once the statement completes.
    pub fn with_connection<S>(connection: Box<dyn Connection>, statement: S) -> Result<Self>
    where
        S: Into<String>,
    {
        let core = StatementCore::on_connection(connection, statement.into(), KeyRetrieval::Generated)?;
        Ok(Self { core })
    }

    /// Runs the statement. Returns the first generated key when the driver reports
    /// one, otherwise the number of affected rows.
    pub fn execute(mut self) -> Result<i64> {
        self.core.finish(|handle| {
            let count = handle.statement()?.execute_update()?;
            let keys = handle.open_generated_keys()?;
            if keys.next()? {
                if let Some(key) = keys.get_as::<i64>(1)? {
                    return Ok(key);
                }
            }
            Ok(count)
        })
    }

    /// Runs the statement and returns the first generated key.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoGeneratedKey` when the driver produced no key.
    pub fn execute_returning_key(mut self) -> Result<i64> {
        let key = self.core.finish(|handle| {
            handle.statement()?.execute_update()?;
            let keys = handle.open_generated_keys()?;
            if keys.next()? {
                keys.get_as::<i64>(1)
            } else {
                Ok(None)
            }
        })?;
        key.ok_or_else(|| Error::NoGeneratedKey {
            statement: self.core.text().to_owned(),
        })
    }

    /// Queues the currently bound values as one batch entry without executing.
    pub fn add_batch(mut self) -> Result<Self> {
        self.core.add_batch()?;
        Ok(self)
    }

    /// Runs every queued entry. Returns the generated keys in cursor order when
    /// the driver reports any, otherwise the affected-row count of each entry.
    pub fn execute_batch(mut self) -> Result<Vec<i64>> {
        self.core.finish(|handle| {
            let counts = handle.statement()?.execute_batch()?;
            let cursor = handle.open_generated_keys()?;
            let mut keys = Vec::new();
            while cursor.next()? {
                if let Some(key) = cursor.get_as::<i64>(1)? {
                    keys.push(key);
                }
            }
            Ok(if keys.is_empty() { counts } else { keys })
        })
    }

    pub(crate) fn core(&self) -> &StatementCore {
        &self.core
    }
}

impl NamedParameters for Update {
    fn bind_value(&mut self, name: &str, value: Value) -> Result<()> {
        self.core.bind(name, value)
    }

    fn bind_index(&mut self, index: usize, value: Value) -> Result<()> {
        self.core.bind_index(index, value)
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Update [{}]", self.core)
    }
}
