//! MySQL driver backed by SQLx.
//!
//! SQLx is asynchronous; this driver owns a tokio runtime and blocks on it, so
//! its methods must not be called from inside another async runtime.
//! Statements are rebuilt on each execution: the rewritten SQL and the bound
//! values are kept separately, and a fresh SQLx `Query` is constructed and bound
//! in placeholder order whenever the statement runs.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlQueryResult, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Column, Executor, MySql, Row, Statement as _, TypeInfo, ValueRef};
use tokio::runtime::Runtime;

use crate::driver::{Connection, Connector, Cursor, KeyRetrieval, PreparedStatement, RowsCursor};
use crate::error::{BoxError, Error};
use crate::value::{SqlType, Value};

/// Type alias for SQLx Query with MySQL arguments
pub type Q<'q> = Query<'q, MySql, MySqlArguments>;

type SharedConnection = Arc<Mutex<Option<PoolConnection<MySql>>>>;

/// A [`Connector`] handing out connections from a SQLx MySQL pool.
pub struct MySqlConnector {
    name: String,
    pool: MySqlPool,
    runtime: Arc<Runtime>,
}

impl MySqlConnector {
    /// Connects a pool with default options.
    pub fn connect(name: impl Into<String>, url: &str) -> crate::Result<Self> {
        Self::with_options(name, url, MySqlPoolOptions::new())
    }

    /// Connects a pool to the URL in the `DATABASE_URL` environment variable.
    pub fn from_env(name: impl Into<String>) -> crate::Result<Self> {
        let url = std::env::var("DATABASE_URL").map_err(|err| Error::Connect(Box::new(err)))?;
        Self::connect(name, &url)
    }

    pub fn with_options(
        name: impl Into<String>,
        url: &str,
        options: MySqlPoolOptions,
    ) -> crate::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|err| Error::Connect(Box::new(err)))?;
        let pool = runtime.block_on(options.connect(url))?;
        let name = name.into();
        tracing::debug!(connector = %name, "connected MySQL pool");
        Ok(Self {
            name,
            pool,
            runtime: Arc::new(runtime),
        })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

impl Connector for MySqlConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> Result<Box<dyn Connection>, BoxError> {
        let connection = self.runtime.block_on(self.pool.acquire())?;
        Ok(Box::new(MySqlSession {
            runtime: Arc::clone(&self.runtime),
            connection: Arc::new(Mutex::new(Some(connection))),
        }))
    }
}

fn lock(connection: &SharedConnection) -> Result<MutexGuard<'_, Option<PoolConnection<MySql>>>, BoxError> {
    connection
        .lock()
        .map_err(|_| BoxError::from("MySQL connection lock poisoned"))
}

struct MySqlSession {
    runtime: Arc<Runtime>,
    connection: SharedConnection,
}

impl MySqlSession {
    // A pooled connection hands itself back to the pool on a spawned task when
    // dropped, so the drop must happen inside the runtime.
    fn release(&self) -> Result<(), BoxError> {
        let _guard = self.runtime.enter();
        let connection = lock(&self.connection)?.take();
        drop(connection);
        Ok(())
    }
}

impl Connection for MySqlSession {
    fn prepare(
        &mut self,
        sql: &str,
        keys: KeyRetrieval,
    ) -> Result<Box<dyn PreparedStatement>, BoxError> {
        let parameters = {
            let mut guard = lock(&self.connection)?;
            let connection = guard.as_mut().ok_or("connection is closed")?;
            // Let the server reject bad SQL now rather than at execution.
            let statement = self.runtime.block_on((&mut **connection).prepare(sql))?;
            statement
                .parameters()
                .map_or(0, |parameters| parameters.either(|types| types.len(), |count| count))
        };
        Ok(Box::new(MySqlPrepared::new(
            Arc::clone(&self.runtime),
            Arc::clone(&self.connection),
            sql,
            keys,
            parameters,
        )))
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.release()
    }
}

impl Drop for MySqlSession {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(error = %err, "failed to return MySQL connection to the pool");
        }
    }
}

struct MySqlPrepared {
    runtime: Arc<Runtime>,
    connection: SharedConnection,
    sql: String,
    keys: KeyRetrieval,
    params: Vec<Option<Value>>,
    max_rows: Option<usize>,
    batch: Vec<Vec<Value>>,
    generated: Vec<i64>,
}

impl MySqlPrepared {
    fn new(
        runtime: Arc<Runtime>,
        connection: SharedConnection,
        sql: &str,
        keys: KeyRetrieval,
        parameters: usize,
    ) -> Self {
        Self {
            runtime,
            connection,
            sql: sql.to_owned(),
            keys,
            params: vec![None; parameters],
            max_rows: None,
            batch: Vec::new(),
            generated: Vec::new(),
        }
    }

    fn arguments(&self) -> Result<Vec<Value>, BoxError> {
        self.params
            .iter()
            .enumerate()
            .map(|(index, value)| {
                value
                    .clone()
                    .ok_or_else(|| BoxError::from(format!("parameter {} is not bound", index + 1)))
            })
            .collect()
    }

    fn run(&self, arguments: &[Value]) -> Result<MySqlQueryResult, BoxError> {
        let mut guard = lock(&self.connection)?;
        let connection = guard.as_mut().ok_or("connection is closed")?;
        let query = arguments.iter().fold(sqlx::query::<MySql>(&self.sql), bind);
        Ok(self.runtime.block_on(query.execute(&mut **connection))?)
    }
}

/// The key MySQL reports for an insert, when key capture was requested.
fn inserted_key(keys: KeyRetrieval, last_insert_id: u64) -> Option<i64> {
    if keys == KeyRetrieval::None || last_insert_id == 0 {
        return None;
    }
    i64::try_from(last_insert_id).ok()
}

fn affected(result: &MySqlQueryResult) -> i64 {
    i64::try_from(result.rows_affected()).unwrap_or(i64::MAX)
}

impl PreparedStatement for MySqlPrepared {
    fn bind(&mut self, index: usize, value: &Value) -> Result<(), BoxError> {
        let count = self.params.len();
        let slot = index
            .checked_sub(1)
            .and_then(|slot| self.params.get_mut(slot))
            .ok_or_else(|| format!("parameter {index} is outside 1..={count}"))?;
        *slot = Some(value.clone());
        Ok(())
    }

    fn add_batch(&mut self) -> Result<(), BoxError> {
        let arguments = self.arguments()?;
        self.batch.push(arguments);
        Ok(())
    }

    fn execute_query(&mut self) -> Result<Box<dyn Cursor>, BoxError> {
        let arguments = self.arguments()?;
        let mut guard = lock(&self.connection)?;
        let connection = guard.as_mut().ok_or("connection is closed")?;
        let query = arguments.iter().fold(sqlx::query::<MySql>(&self.sql), bind);
        let rows = match self.max_rows {
            Some(0) => Vec::new(),
            Some(1) => self
                .runtime
                .block_on(query.fetch_optional(&mut **connection))?
                .into_iter()
                .collect(),
            Some(limit) => {
                let mut rows = self.runtime.block_on(query.fetch_all(&mut **connection))?;
                rows.truncate(limit);
                rows
            }
            None => self.runtime.block_on(query.fetch_all(&mut **connection))?,
        };
        Ok(Box::new(MySqlRows::new(rows)))
    }

    fn set_max_rows(&mut self, max_rows: Option<usize>) -> Result<(), BoxError> {
        self.max_rows = max_rows;
        Ok(())
    }

    fn execute_update(&mut self) -> Result<i64, BoxError> {
        let arguments = self.arguments()?;
        let result = self.run(&arguments)?;
        self.generated = inserted_key(self.keys, result.last_insert_id())
            .into_iter()
            .collect();
        Ok(affected(&result))
    }

    fn execute_batch(&mut self) -> Result<Vec<i64>, BoxError> {
        let entries = std::mem::take(&mut self.batch);
        let mut counts = Vec::with_capacity(entries.len());
        let mut generated = Vec::new();
        for arguments in &entries {
            let result = self.run(arguments)?;
            generated.extend(inserted_key(self.keys, result.last_insert_id()));
            counts.push(affected(&result));
        }
        self.generated = generated;
        Ok(counts)
    }

    fn generated_keys(&mut self) -> Result<Box<dyn Cursor>, BoxError> {
        Ok(Box::new(RowsCursor::keys(std::mem::take(&mut self.generated))))
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.params.iter_mut().for_each(|slot| *slot = None);
        self.batch.clear();
        self.generated.clear();
        Ok(())
    }
}

fn bind<'q>(query: Q<'q>, value: &Value) -> Q<'q> {
    match value {
        Value::Null(sql_type) => match sql_type {
            SqlType::Varchar => query.bind(None::<String>),
            SqlType::SmallInt => query.bind(None::<i16>),
            SqlType::Integer => query.bind(None::<i32>),
            SqlType::BigInt => query.bind(None::<i64>),
            SqlType::Float => query.bind(None::<f32>),
            SqlType::Double => query.bind(None::<f64>),
            SqlType::Boolean => query.bind(None::<bool>),
            SqlType::Date => query.bind(None::<NaiveDate>),
            SqlType::Time => query.bind(None::<NaiveTime>),
            SqlType::Timestamp => query.bind(None::<NaiveDateTime>),
        },
        Value::Text(v) => query.bind(v.clone()),
        Value::SmallInt(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::BigInt(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Double(v) => query.bind(*v),
        Value::Bool(v) => query.bind(*v),
        Value::Date(v) => query.bind(*v),
        Value::Time(v) => query.bind(*v),
        Value::Timestamp(v) => query.bind(*v),
    }
}

struct MySqlRows {
    rows: Vec<MySqlRow>,
    position: Option<usize>,
    closed: bool,
}

impl MySqlRows {
    fn new(rows: Vec<MySqlRow>) -> Self {
        Self {
            rows,
            position: None,
            closed: false,
        }
    }

    fn current(&self) -> Result<&MySqlRow, BoxError> {
        if self.closed {
            return Err("cursor is closed".into());
        }
        self.position
            .and_then(|position| self.rows.get(position))
            .ok_or_else(|| "cursor is not positioned on a row".into())
    }
}

impl Cursor for MySqlRows {
    fn next(&mut self) -> Result<bool, BoxError> {
        if self.closed {
            return Err("cursor is closed".into());
        }
        let next = self.position.map_or(0, |position| position + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Row::len)
    }

    fn column_label(&self, column: usize) -> Option<&str> {
        let row = self.rows.first()?;
        row.columns().get(column.checked_sub(1)?).map(|c| c.name())
    }

    fn get(&self, column: usize) -> Result<Value, BoxError> {
        let row = self.current()?;
        let index = column
            .checked_sub(1)
            .filter(|index| *index < row.len())
            .ok_or_else(|| format!("column {column} is out of range"))?;
        decode(row, index)
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.rows.clear();
        self.closed = true;
        Ok(())
    }
}

fn decode(row: &MySqlRow, index: usize) -> Result<Value, BoxError> {
    let type_name = row.column(index).type_info().name().to_owned();
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null(sql_type_of(&type_name)));
    }

    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get(index)?),
        "TINYINT" | "SMALLINT" => Value::SmallInt(i16::try_from(row.try_get::<i64, _>(index)?)?),
        "MEDIUMINT" | "INT" => Value::Int(i32::try_from(row.try_get::<i64, _>(index)?)?),
        "BIGINT" => Value::BigInt(row.try_get(index)?),
        name if name.ends_with("UNSIGNED") => {
            Value::BigInt(i64::try_from(row.try_get::<u64, _>(index)?)?)
        }
        "FLOAT" => Value::Float(row.try_get(index)?),
        "DOUBLE" => Value::Double(row.try_get(index)?),
        "DATE" => Value::Date(row.try_get(index)?),
        "TIME" => Value::Time(row.try_get(index)?),
        "DATETIME" | "TIMESTAMP" => Value::Timestamp(row.try_get(index)?),
        // Sent as a two-byte little-endian integer.
        "YEAR" => Value::SmallInt(i16::try_from(row.try_get_unchecked::<u16, _>(index)?)?),
        "BIT" => Value::BigInt(i64::try_from(row.try_get::<u64, _>(index)?)?),
        // Sent as its decimal text.
        "DECIMAL" => Value::Text(row.try_get_unchecked::<String, _>(index)?),
        _ => Value::Text(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}

fn sql_type_of(type_name: &str) -> SqlType {
    match type_name {
        "BOOLEAN" => SqlType::Boolean,
        "TINYINT" | "SMALLINT" => SqlType::SmallInt,
        "MEDIUMINT" | "INT" => SqlType::Integer,
        "BIGINT" => SqlType::BigInt,
        name if name.ends_with("UNSIGNED") => SqlType::BigInt,
        "FLOAT" => SqlType::Float,
        "DOUBLE" => SqlType::Double,
        "DATE" => SqlType::Date,
        "TIME" => SqlType::Time,
        "DATETIME" | "TIMESTAMP" => SqlType::Timestamp,
        "YEAR" => SqlType::SmallInt,
        "BIT" => SqlType::BigInt,
        _ => SqlType::Varchar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline(sql: &str, keys: KeyRetrieval, parameters: usize) -> MySqlPrepared {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        MySqlPrepared::new(Arc::new(runtime), Arc::new(Mutex::new(None)), sql, keys, parameters)
    }

    #[test]
    fn test_sql_type_of_mysql_names() {
        assert_eq!(sql_type_of("INT"), SqlType::Integer);
        assert_eq!(sql_type_of("INT UNSIGNED"), SqlType::BigInt);
        assert_eq!(sql_type_of("DATETIME"), SqlType::Timestamp);
        assert_eq!(sql_type_of("TIME"), SqlType::Time);
        assert_eq!(sql_type_of("YEAR"), SqlType::SmallInt);
        assert_eq!(sql_type_of("BIT"), SqlType::BigInt);
        assert_eq!(sql_type_of("VARCHAR"), SqlType::Varchar);
        assert_eq!(sql_type_of("DECIMAL"), SqlType::Varchar);
    }

    #[test]
    fn test_empty_rows_cursor() {
        let mut rows = MySqlRows::new(Vec::new());
        assert_eq!(rows.column_count(), 0);
        assert!(!rows.next().unwrap());
        assert!(rows.get(1).is_err());
        rows.close().unwrap();
        assert!(rows.next().is_err());
    }

    #[test]
    fn test_bind_slots_follow_placeholder_count() {
        let mut statement = offline("insert into t (a, b) values (?, ?)", KeyRetrieval::None, 2);
        statement.bind(2, &Value::Int(7)).unwrap();
        assert_eq!(statement.params, vec![None, Some(Value::Int(7))]);

        assert!(statement.bind(0, &Value::Int(1)).is_err());
        assert!(statement.bind(3, &Value::Int(1)).is_err());
        assert_eq!(statement.params.len(), 2);
    }

    #[test]
    fn test_unbound_parameters_are_reported() {
        let mut statement = offline("insert into t (a, b) values (?, ?)", KeyRetrieval::None, 2);
        statement.bind(1, &Value::Int(1)).unwrap();
        let err = statement.arguments().unwrap_err();
        assert_eq!(err.to_string(), "parameter 2 is not bound");

        let mut statement = offline("insert into t (a, b) values (?, ?)", KeyRetrieval::None, 2);
        statement.bind(2, &Value::Int(2)).unwrap();
        assert_eq!(
            statement.arguments().unwrap_err().to_string(),
            "parameter 1 is not bound"
        );
        assert!(statement.add_batch().is_err());
        assert!(statement.batch.is_empty());
    }

    #[test]
    fn test_add_batch_snapshots_current_binds() {
        let mut statement = offline("insert into t (a) values (?)", KeyRetrieval::Generated, 1);
        statement.bind(1, &Value::from("x")).unwrap();
        statement.add_batch().unwrap();
        statement.bind(1, &Value::from("y")).unwrap();
        statement.add_batch().unwrap();

        assert_eq!(
            statement.batch,
            vec![vec![Value::Text("x".into())], vec![Value::Text("y".into())]]
        );
    }

    #[test]
    fn test_inserted_key_rules() {
        assert_eq!(inserted_key(KeyRetrieval::Generated, 42), Some(42));
        assert_eq!(inserted_key(KeyRetrieval::Generated, 0), None);
        assert_eq!(inserted_key(KeyRetrieval::None, 42), None);
        assert_eq!(inserted_key(KeyRetrieval::Generated, u64::MAX), None);
    }

    #[test]
    fn test_execution_needs_an_open_connection() {
        let mut statement = offline("delete from t", KeyRetrieval::None, 0);
        assert_eq!(statement.execute_update().unwrap_err().to_string(), "connection is closed");
        assert!(statement.execute_query().is_err());

        statement.add_batch().unwrap();
        assert!(statement.execute_batch().is_err());
    }

    #[test]
    fn test_empty_batch_and_key_cursor() {
        let mut statement = offline("insert into t (a) values (1)", KeyRetrieval::Generated, 0);
        statement.generated = vec![5];
        assert!(statement.execute_batch().unwrap().is_empty());

        let mut keys = statement.generated_keys().unwrap();
        assert!(!keys.next().unwrap());
    }

    #[test]
    fn test_close_clears_state() {
        let mut statement = offline("insert into t (a) values (?)", KeyRetrieval::Generated, 1);
        statement.bind(1, &Value::Int(1)).unwrap();
        statement.add_batch().unwrap();
        statement.set_max_rows(Some(1)).unwrap();
        statement.generated = vec![3];

        statement.close().unwrap();
        assert_eq!(statement.params, vec![None]);
        assert!(statement.batch.is_empty());
        assert!(statement.generated.is_empty());
    }

    // Needs a MySQL server: DATABASE_URL=mysql://... cargo test -- --ignored
    #[test]
    #[ignore]
    fn test_round_trip_against_server() {
        use crate::mapper;
        use crate::registry::ConnectorRegistry;
        use crate::select::Select;
        use crate::statement::NamedParameters;
        use crate::update::Update;

        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let connector = MySqlConnector::with_options(
            "main",
            &url,
            MySqlPoolOptions::new().max_connections(1),
        )
        .unwrap();
        let registry = ConnectorRegistry::new().with(connector);

        for ddl in [
            "CREATE TABLE IF NOT EXISTS named_round_trip (id INT PRIMARY KEY AUTO_INCREMENT, at TIME, y YEAR)",
            "DELETE FROM named_round_trip",
        ] {
            Update::new(&registry, ddl).unwrap().execute().unwrap();
        }

        // With a single pooled connection, every statement below only gets a
        // connection if the previous one was handed back.
        let id = Update::new(&registry, "INSERT INTO named_round_trip (at, y) VALUES (:at, :y)")
            .unwrap()
            .set("at", NaiveTime::from_hms_opt(8, 15, 0).unwrap())
            .unwrap()
            .set("y", 2024)
            .unwrap()
            .execute_returning_key()
            .unwrap();
        assert!(id > 0);

        let row = Select::new(
            &registry,
            "SELECT at, y FROM named_round_trip WHERE id = :id",
            mapper::from_fn(|row| Ok((row.get(1)?, row.get(2)?))),
        )
        .unwrap()
        .set("id", id)
        .unwrap()
        .execute()
        .unwrap();
        assert_eq!(
            row,
            Some((
                Value::Time(NaiveTime::from_hms_opt(8, 15, 0).unwrap()),
                Value::SmallInt(2024)
            ))
        );

        let result = Select::new(
            &registry,
            "SELECT id FROM named_round_trip",
            mapper::from_fn(|_row| -> std::result::Result<i64, BoxError> { Err("rejected".into()) }),
        )
        .unwrap()
        .execute_for_all();
        assert!(matches!(result, Err(crate::Error::Execute { .. })));
        assert!(matches!(
            Select::new(&registry, "SELECT COUNT(*) FROM named_round_trip", mapper::long())
                .unwrap()
                .execute_scalar(),
            Ok(Some(1))
        ));
        Update::new(&registry, "DROP TABLE named_round_trip")
            .unwrap()
            .execute()
            .unwrap();
    }
}
