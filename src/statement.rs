use std::fmt;

use crate::connection::{settle, ConnectionHandle};
use crate::driver::{Connection, KeyRetrieval};
use crate::error::{BoxError, Error, Result};
use crate::parser::{parse, ParsedStatement};
use crate::registry::ConnectorRegistry;
use crate::select::Select;
use crate::update::Update;
use crate::value::{SqlType, Value};

/// State shared by every statement shape: the text as written, its parsed
/// form and the handle owning the prepared statement.
pub(crate) struct StatementCore {
    text: String,
    parsed: ParsedStatement,
    handle: ConnectionHandle,
}

impl StatementCore {
    pub(crate) fn open(
        registry: &ConnectorRegistry,
        connection_name: Option<&str>,
        text: String,
        keys: KeyRetrieval,
    ) -> Result<Self> {
        let handle = ConnectionHandle::connect(registry, connection_name)?;
        Self::prepare(handle, text, keys)
    }

    pub(crate) fn on_connection(
        connection: Box<dyn Connection>,
        text: String,
        keys: KeyRetrieval,
    ) -> Result<Self> {
        Self::prepare(ConnectionHandle::new(connection), text, keys)
    }

    fn prepare(mut handle: ConnectionHandle, text: String, keys: KeyRetrieval) -> Result<Self> {
        let parsed = parse(&text);
        if let Err(err) = handle.prepare(parsed.text(), keys) {
            let err = match err {
                Error::Prepare { source, .. } => Error::Prepare {
                    statement: text,
                    source,
                },
                other => other,
            };
            let released = handle.cleanup();
            return settle(Err(err), released);
        }
        Ok(Self {
            text,
            parsed,
            handle,
        })
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn parameter_names(&self) -> &[String] {
        self.parsed.parameter_names()
    }

    /// Binds `value` at every slot whose parameter is `name`. Unknown names are ignored.
    pub(crate) fn bind(&mut self, name: &str, value: Value) -> Result<()> {
        let positions: Vec<usize> = self.parsed.positions(name).collect();
        for index in positions {
            tracing::trace!(name, index, %value, "binding parameter");
            let bound = self.handle.statement()?.bind(index, &value);
            if let Err(source) = bound {
                return self.fail_bind(name.to_owned(), &value, source);
            }
        }
        Ok(())
    }

    pub(crate) fn bind_index(&mut self, index: usize, value: Value) -> Result<()> {
        let count = self.parsed.parameter_names().len();
        let bound = if (1..=count).contains(&index) {
            self.handle.statement()?.bind(index, &value)
        } else {
            Err(format!("index {index} is outside 1..={count}").into())
        };
        match bound {
            Ok(()) => Ok(()),
            Err(source) => self.fail_bind(format!("#{index}"), &value, source),
        }
    }

    fn fail_bind(&mut self, name: String, value: &Value, source: BoxError) -> Result<()> {
        let err = Error::Bind {
            name,
            value: value.to_string(),
            source,
        };
        let released = self.handle.cleanup();
        settle(Err(err), released)
    }

    pub(crate) fn add_batch(&mut self) -> Result<()> {
        tracing::debug!(statement = %self.text, "queuing batch entry");
        let queued = self.handle.statement()?.add_batch();
        if let Err(source) = queued {
            let err = Error::Execute {
                statement: self.text.clone(),
                source,
            };
            let released = self.handle.cleanup();
            return settle(Err(err), released);
        }
        Ok(())
    }

    /// Runs `operation` against the handle, then releases every resource it owns.
    pub(crate) fn finish<R>(
        &mut self,
        operation: impl FnOnce(&mut ConnectionHandle) -> std::result::Result<R, BoxError>,
    ) -> Result<R> {
        tracing::debug!(statement = %self.text, "executing statement");
        let outcome = operation(&mut self.handle).map_err(|source| Error::Execute {
            statement: self.text.clone(),
            source,
        });
        let released = self.handle.cleanup();
        settle(outcome, released)
    }
}

impl fmt::Display for StatementCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "statement={}, parameters={:?}, handle={:?}",
            self.text,
            self.parsed.parameter_names(),
            self.handle
        )
    }
}

/// Bind-by-name and bind-by-index, shared by [`Select`] and [`Update`].
///
/// Every `set*` method consumes the statement and hands it back, so binds chain
/// with `?`. A failed bind releases the statement's connection before the
/// error is returned.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sqlx_named_statement::{ConnectorRegistry, NamedParameters, Update};
///
/// # fn example(registry: Arc<ConnectorRegistry>) -> sqlx_named_statement::Result<()> {
/// let updated = Update::new(&registry, "UPDATE users SET name = :name WHERE id = :id")?
///     .set("name", "Jane Doe")?
///     .set("id", 42)?
///     .execute()?;
/// # Ok(())
/// # }
/// ```
pub trait NamedParameters: Sized {
    /// Binds `value` at every position named `name`; a name that does not occur
    /// in the statement is ignored.
    fn bind_value(&mut self, name: &str, value: Value) -> Result<()>;

    /// Binds `value` at the 1-based position `index`.
    fn bind_index(&mut self, index: usize, value: Value) -> Result<()>;

    fn set<V: Into<Value>>(mut self, name: &str, value: V) -> Result<Self> {
        self.bind_value(name, value.into())?;
        Ok(self)
    }

    fn set_null(self, name: &str, sql_type: SqlType) -> Result<Self> {
        self.set(name, Value::Null(sql_type))
    }

    fn set_at<V: Into<Value>>(mut self, index: usize, value: V) -> Result<Self> {
        self.bind_index(index, value.into())?;
        Ok(self)
    }
}

/// Either statement shape, for code that binds parameters without caring which.
pub enum Statement<T> {
    Select(Select<T>),
    Update(Update),
}

impl<T> Statement<T> {
    pub fn text(&self) -> &str {
        match self {
            Statement::Select(select) => select.core().text(),
            Statement::Update(update) => update.core().text(),
        }
    }

    pub fn parameter_names(&self) -> &[String] {
        match self {
            Statement::Select(select) => select.core().parameter_names(),
            Statement::Update(update) => update.core().parameter_names(),
        }
    }
}

impl<T> NamedParameters for Statement<T> {
    fn bind_value(&mut self, name: &str, value: Value) -> Result<()> {
        match self {
            Statement::Select(select) => select.bind_value(name, value),
            Statement::Update(update) => update.bind_value(name, value),
        }
    }

    fn bind_index(&mut self, index: usize, value: Value) -> Result<()> {
        match self {
            Statement::Select(select) => select.bind_index(index, value),
            Statement::Update(update) => update.bind_index(index, value),
        }
    }
}

impl<T> From<Select<T>> for Statement<T> {
    fn from(select: Select<T>) -> Self {
        Statement::Select(select)
    }
}

impl<T> From<Update> for Statement<T> {
    fn from(update: Update) -> Self {
        Statement::Update(update)
    }
}

impl<T> fmt::Display for Statement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(select) => fmt::Display::fmt(select, f),
            Statement::Update(update) => fmt::Display::fmt(update, f),
        }
    }
}
