//! Ownership of one connection, its prepared statement and its open cursor.

use std::fmt;

use crate::driver::{Connection, Cursor, KeyRetrieval, PreparedStatement};
use crate::error::{BoxError, Error, Resource, Result};
use crate::registry::ConnectorRegistry;

/// Exclusively owns a live connection, at most one prepared statement and at
/// most one open cursor.
///
/// [`ConnectionHandle::cleanup`] closes cursor, statement and connection in that
/// order, attempting every close even when an earlier one fails. Each resource is
/// closed at most once; a handle dropped without cleanup releases itself.
pub struct ConnectionHandle {
    connection: Option<Box<dyn Connection>>,
    statement: Option<Box<dyn PreparedStatement>>,
    cursor: Option<Box<dyn Cursor>>,
}

impl ConnectionHandle {
    /// Wraps a connection obtained elsewhere.
    pub fn new(connection: Box<dyn Connection>) -> Self {
        Self {
            connection: Some(connection),
            statement: None,
            cursor: None,
        }
    }

    /// Opens a connection from the connector registered under `name`.
    pub fn connect(registry: &ConnectorRegistry, name: Option<&str>) -> Result<Self> {
        registry.connect(name).map(Self::new)
    }

    /// Prepares `sql` as this handle's statement, closing any previous one.
    pub fn prepare(&mut self, sql: &str, keys: KeyRetrieval) -> Result<()> {
        self.release_statement()?;
        let connection = self.connection.as_mut().ok_or(Error::StatementClosed)?;
        tracing::debug!(sql, ?keys, "preparing statement");
        let statement = connection.prepare(sql, keys).map_err(|source| Error::Prepare {
            statement: sql.to_owned(),
            source,
        })?;
        self.statement = Some(statement);
        Ok(())
    }

    pub fn statement(&mut self) -> Result<&mut (dyn PreparedStatement + 'static)> {
        self.statement.as_deref_mut().ok_or(Error::StatementClosed)
    }

    /// Runs the prepared query and keeps its cursor open on this handle.
    pub fn open_query(&mut self) -> std::result::Result<&mut (dyn Cursor + 'static), BoxError> {
        close(self.cursor.take(), Resource::Cursor, |c| c.close())?;
        let cursor = self.statement()?.execute_query()?;
        Ok(&mut **self.cursor.insert(cursor))
    }

    /// Opens the cursor over the keys generated by the last execution.
    pub fn open_generated_keys(
        &mut self,
    ) -> std::result::Result<&mut (dyn Cursor + 'static), BoxError> {
        close(self.cursor.take(), Resource::Cursor, |c| c.close())?;
        let cursor = self.statement()?.generated_keys()?;
        Ok(&mut **self.cursor.insert(cursor))
    }

    pub fn is_released(&self) -> bool {
        self.connection.is_none() && self.statement.is_none() && self.cursor.is_none()
    }

    /// Releases cursor, statement and connection.
    ///
    /// Returns the first close failure; later failures are logged.
    pub fn cleanup(&mut self) -> Result<()> {
        let mut first = None;
        for outcome in [
            close(self.cursor.take(), Resource::Cursor, |c| c.close()),
            close(self.statement.take(), Resource::Statement, |s| s.close()),
            close(self.connection.take(), Resource::Connection, |c| c.close()),
        ] {
            if let Err(err) = outcome {
                if first.is_none() {
                    first = Some(err);
                } else {
                    tracing::warn!(error = %err, "suppressed release failure");
                }
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn release_statement(&mut self) -> Result<()> {
        close(self.cursor.take(), Resource::Cursor, |c| c.close())?;
        close(self.statement.take(), Resource::Statement, |s| s.close())
    }
}

fn close<R: ?Sized>(
    resource: Option<Box<R>>,
    kind: Resource,
    release: impl FnOnce(&mut R) -> std::result::Result<(), BoxError>,
) -> Result<()> {
    match resource {
        Some(mut resource) => release(resource.as_mut()).map_err(|source| Error::Release {
            resource: kind,
            source,
        }),
        None => Ok(()),
    }
}

/// Combines the outcome of an operation with the outcome of releasing its
/// resources. The operation's own error wins; a release failure is reported
/// only when the operation succeeded.
pub(crate) fn settle<T>(outcome: Result<T>, released: Result<()>) -> Result<T> {
    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release)) => Err(release),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(release)) => {
            tracing::warn!(error = %release, "release failure masked by earlier error");
            Err(err)
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if self.is_released() {
            return;
        }
        if let Err(err) = self.cleanup() {
            tracing::warn!(error = %err, "failed to release dropped connection handle");
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("connection_open", &self.connection.is_some())
            .field("statement_open", &self.statement.is_some())
            .field("cursor_open", &self.cursor.is_some())
            .finish()
    }
}
