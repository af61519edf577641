use std::fmt;

/// Boxed failure reported by a driver across the [`crate::driver`] boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Driver-side resource released by a [`crate::connection::ConnectionHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Cursor,
    Statement,
    Connection,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Cursor => "result cursor",
            Resource::Statement => "prepared statement",
            Resource::Connection => "connection",
        })
    }
}

/// Error types for sqlx-named-statement
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No connector is registered under the requested name (or none at all)
    #[error("No connector registered{}", describe_name(.name))]
    NoConnector { name: Option<String> },

    /// The connector failed to hand out a connection
    #[error("Error occurred while creating connection to datasource: {0}")]
    Connect(#[source] BoxError),

    /// The driver rejected the rewritten statement text
    #[error("Error preparing statement: {statement}")]
    Prepare {
        statement: String,
        #[source]
        source: BoxError,
    },

    /// A typed bind failed against the prepared statement
    #[error("Error setting {name} to {value}")]
    Bind {
        name: String,
        value: String,
        #[source]
        source: BoxError,
    },

    /// The query, update, batch or row mapping failed
    #[error("Error executing: {statement}")]
    Execute {
        statement: String,
        #[source]
        source: BoxError,
    },

    /// The driver produced no generated key where one was required
    #[error("No key was generated for: {statement}")]
    NoGeneratedKey { statement: String },

    /// Closing a cursor, prepared statement or connection failed
    #[error("Error closing {resource}")]
    Release {
        resource: Resource,
        #[source]
        source: BoxError,
    },

    /// The statement's resources were already released
    #[error("Statement has already been closed")]
    StatementClosed,

    /// Error from SQLx database operations
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn describe_name(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" under '{name}'"),
        None => String::new(),
    }
}

/// Result type alias for sqlx-named-statement operations
pub type Result<T> = std::result::Result<T, Error>;
