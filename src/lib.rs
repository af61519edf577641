//! # sqlx-named-statement
//!
//! Named-parameter SQL statements over a small synchronous driver layer, with a
//! MySQL driver built on SQLx.
//!
//! ## Features
//!
//! - **Named Placeholders**: Write `:param_name` instead of `?`; one name may appear many times
//! - **Lexically Aware**: Colons inside quoted literals are left alone and `/* ... */` comments are dropped
//! - **Scoped Resources**: Each statement owns its connection, prepared statement and cursor and releases
//!   them when it completes, fails or is dropped
//! - **Row Mappers**: Closures or the built-in column mappers turn rows into values
//! - **Generated Keys**: Updates return the generated key when there is one, otherwise the affected-row count
//! - **Named Connectors**: A [`ConnectorRegistry`] resolves connection names to drivers
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sqlx-named-statement = "0.1"
//! ```
//!
//! ## Examples
//!
//! ### Single Row Query
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sqlx_named_statement::prelude::*;
//!
//! # fn example() -> Result<()> {
//! let registry = ConnectorRegistry::new().with(MySqlConnector::connect("main", "mysql://localhost/test")?);
//! let query = Query::new(Arc::new(registry));
//!
//! let email = query
//!     .for_string("SELECT email FROM users WHERE id = :id AND name <> ':id'")?
//!     .set("id", 42)?
//!     .execute_scalar()?;
//! println!("{email:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ### Mapping Rows
//!
//! ```rust,no_run
//! use sqlx_named_statement::prelude::*;
//! use sqlx_named_statement::mapper;
//!
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! # fn example(registry: &ConnectorRegistry) -> Result<()> {
//! let users = Select::new(
//!     registry,
//!     "SELECT id, name FROM users WHERE age >= :min_age AND age < :max_age",
//!     mapper::from_fn(|row| {
//!         Ok(User {
//!             id: row.get_as(1)?.unwrap_or_default(),
//!             name: row.get_as(2)?.unwrap_or_default(),
//!         })
//!     }),
//! )?
//! .set("min_age", 18)?
//! .set("max_age", 65)?
//! .execute_for_all()?;
//!
//! for user in users {
//!     println!("{}: {}", user.id, user.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Inserting
//!
//! ```rust,no_run
//! use sqlx_named_statement::prelude::*;
//!
//! # fn example(registry: &ConnectorRegistry) -> Result<()> {
//! let id = Update::new(registry, "INSERT INTO users (name, email) VALUES (:name, :email)")?
//!     .set("name", "John Doe")?
//!     .set_null("email", SqlType::Varchar)?
//!     .execute_returning_key()?;
//! println!("Inserted user {id}");
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Works
//!
//! 1. **Parse**: [`parse`] rewrites every `:name` to `?` and records which positions each name fills
//! 2. **Prepare**: The statement opens a connection and prepares the rewritten SQL
//! 3. **Bind**: `set("name", value)` binds the value at every position of that name
//! 4. **Execute**: `execute*` consumes the statement, runs it and releases cursor, statement and
//!    connection in that order
//!
//! The MySQL driver keeps the rewritten SQL and bound values apart and constructs a fresh SQLx
//! `Query` on each execution, blocking on its own tokio runtime.
//!
//! ## Limitations
//!
//! - Only a MySQL driver is provided; other databases plug in through [`driver::Connector`]
//! - A placeholder name ends at a space, `,` or `)`
//! - The MySQL driver must not be used from inside an async runtime
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at your option.

pub mod connection;
pub mod driver;
pub mod error;
pub mod mapper;
pub mod mysql;
pub mod parser;
pub mod query;
pub mod registry;
pub mod select;
pub mod statement;
pub mod update;
pub mod value;

#[cfg(test)]
mod mock;

pub use connection::ConnectionHandle;
pub use error::{BoxError, Error, Resource, Result};
pub use mapper::RowMapper;
pub use mysql::MySqlConnector;
pub use parser::{parse, ParsedStatement};
pub use query::Query;
pub use registry::ConnectorRegistry;
pub use select::Select;
pub use statement::{NamedParameters, Statement};
pub use update::Update;
pub use value::{FromValue, SqlType, Value};

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::ConnectorRegistry;
    pub use crate::MySqlConnector;
    pub use crate::NamedParameters;
    pub use crate::Query;
    pub use crate::Select;
    pub use crate::SqlType;
    pub use crate::Update;
}
