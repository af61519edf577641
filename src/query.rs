use std::sync::Arc;

use crate::error::Result;
use crate::mapper::{self, RowMapper};
use crate::registry::ConnectorRegistry;
use crate::select::Select;
use crate::update::Update;

/// Entry point for building statements against a shared [`ConnectorRegistry`].
///
/// A `Query` targets the registry's default connector unless narrowed with
/// [`Query::on`]. Cloning is cheap.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sqlx_named_statement::{ConnectorRegistry, MySqlConnector, NamedParameters, Query};
///
/// # fn example() -> sqlx_named_statement::Result<()> {
/// let registry = ConnectorRegistry::new().with(MySqlConnector::from_env("primary")?);
/// let query = Query::new(Arc::new(registry));
///
/// let name = query
///     .for_string("SELECT name FROM users WHERE id = :id")?
///     .set("id", 42)?
///     .default_when_null(Some("unknown".to_string()))
///     .execute_scalar()?;
/// println!("{name:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    registry: Arc<ConnectorRegistry>,
    connection_name: Option<String>,
}

impl Query {
    pub fn new(registry: Arc<ConnectorRegistry>) -> Self {
        Self {
            registry,
            connection_name: None,
        }
    }

    /// A `Query` whose statements use the connector named `connection_name`.
    pub fn on(&self, connection_name: impl Into<String>) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            connection_name: Some(connection_name.into()),
        }
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    pub fn update(&self, statement: impl Into<String>) -> Result<Update> {
        Update::named(&self.registry, self.connection_name.as_deref(), statement)
    }

    pub fn for_object<T, M>(&self, statement: impl Into<String>, mapper: M) -> Result<Select<T>>
    where
        M: RowMapper<T> + 'static,
    {
        Select::named(
            &self.registry,
            self.connection_name.as_deref(),
            statement,
            mapper,
        )
    }

    pub fn for_string(&self, statement: impl Into<String>) -> Result<Select<Option<String>>> {
        self.for_object(statement, mapper::string())
    }

    pub fn for_integer(&self, statement: impl Into<String>) -> Result<Select<Option<i32>>> {
        self.for_object(statement, mapper::integer())
    }

    pub fn for_long(&self, statement: impl Into<String>) -> Result<Select<Option<i64>>> {
        self.for_object(statement, mapper::long())
    }

    pub fn for_double(&self, statement: impl Into<String>) -> Result<Select<Option<f64>>> {
        self.for_object(statement, mapper::double())
    }
}
