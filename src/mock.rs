//! Scripted in-memory driver used by the unit tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::driver::{Connection, Connector, Cursor, KeyRetrieval, PreparedStatement, RowsCursor};
use crate::error::{BoxError, Resource};
use crate::registry::ConnectorRegistry;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Connect,
    Prepare,
    Bind,
    AddBatch,
    Execute,
    CloseCursor,
    CloseStatement,
    CloseConnection,
}

/// What the driver answers.
#[derive(Debug, Default, Clone)]
pub struct Script {
    labels: Vec<String>,
    rows: Vec<Vec<Value>>,
    update_count: i64,
    batch_counts: Option<Vec<i64>>,
    generated_keys: Vec<i64>,
    failures: Vec<Failure>,
}

impl Script {
    pub fn rows(labels: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            labels: labels.iter().map(|label| label.to_string()).collect(),
            rows,
            ..Self::default()
        }
    }

    pub fn update_count(mut self, count: i64) -> Self {
        self.update_count = count;
        self
    }

    pub fn batch_counts(mut self, counts: Vec<i64>) -> Self {
        self.batch_counts = Some(counts);
        self
    }

    pub fn generated_keys(mut self, keys: Vec<i64>) -> Self {
        self.generated_keys = keys;
        self
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failures.push(failure);
        self
    }

    fn check(&self, failure: Failure) -> Result<(), BoxError> {
        if self.failures.contains(&failure) {
            return Err(format!("mock failure: {failure:?}").into());
        }
        Ok(())
    }
}

/// What the driver saw.
#[derive(Debug, Default)]
pub struct Journal {
    pub prepared: Vec<(String, KeyRetrieval)>,
    pub binds: BTreeMap<usize, Value>,
    pub batches: Vec<BTreeMap<usize, Value>>,
    pub executions: usize,
    pub max_rows: Vec<Option<usize>>,
    pub closed: Vec<Resource>,
}

#[derive(Clone)]
pub struct MockDriver {
    script: Arc<Script>,
    journal: Arc<Mutex<Journal>>,
}

impl MockDriver {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            journal: Arc::default(),
        }
    }

    pub fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }

    pub fn closed(&self) -> Vec<Resource> {
        self.journal().closed.clone()
    }

    pub fn connector(&self, name: &str) -> MockConnector {
        MockConnector {
            name: name.to_owned(),
            driver: self.clone(),
        }
    }

    pub fn registry(&self) -> Arc<ConnectorRegistry> {
        Arc::new(ConnectorRegistry::new().with(self.connector("mock")))
    }

    pub fn connection(&self) -> Box<dyn Connection> {
        Box::new(MockConnection {
            driver: self.clone(),
        })
    }

    fn close(&self, resource: Resource, failure: Failure) -> Result<(), BoxError> {
        self.journal().closed.push(resource);
        self.script.check(failure)
    }
}

pub struct MockConnector {
    name: String,
    driver: MockDriver,
}

impl Connector for MockConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> Result<Box<dyn Connection>, BoxError> {
        self.driver.script.check(Failure::Connect)?;
        Ok(self.driver.connection())
    }
}

struct MockConnection {
    driver: MockDriver,
}

impl Connection for MockConnection {
    fn prepare(
        &mut self,
        sql: &str,
        keys: KeyRetrieval,
    ) -> Result<Box<dyn PreparedStatement>, BoxError> {
        self.driver.journal().prepared.push((sql.to_owned(), keys));
        self.driver.script.check(Failure::Prepare)?;
        Ok(Box::new(MockStatement {
            driver: self.driver.clone(),
            keys,
            max_rows: None,
            executed_keys: Vec::new(),
        }))
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.driver.close(Resource::Connection, Failure::CloseConnection)
    }
}

struct MockStatement {
    driver: MockDriver,
    keys: KeyRetrieval,
    max_rows: Option<usize>,
    executed_keys: Vec<i64>,
}

impl MockStatement {
    fn cursor(&self, inner: RowsCursor) -> Box<dyn Cursor> {
        Box::new(MockCursor {
            driver: self.driver.clone(),
            inner,
        })
    }

    fn capture_keys(&mut self) {
        if self.keys == KeyRetrieval::Generated {
            self.executed_keys = self.driver.script.generated_keys.clone();
        }
    }
}

impl PreparedStatement for MockStatement {
    fn bind(&mut self, index: usize, value: &Value) -> Result<(), BoxError> {
        self.driver.script.check(Failure::Bind)?;
        self.driver.journal().binds.insert(index, value.clone());
        Ok(())
    }

    fn add_batch(&mut self) -> Result<(), BoxError> {
        self.driver.script.check(Failure::AddBatch)?;
        let mut journal = self.driver.journal();
        let entry = journal.binds.clone();
        journal.batches.push(entry);
        Ok(())
    }

    fn set_max_rows(&mut self, max_rows: Option<usize>) -> Result<(), BoxError> {
        self.max_rows = max_rows;
        Ok(())
    }

    fn execute_query(&mut self) -> Result<Box<dyn Cursor>, BoxError> {
        {
            let mut journal = self.driver.journal();
            journal.executions += 1;
            journal.max_rows.push(self.max_rows);
        }
        self.driver.script.check(Failure::Execute)?;
        let script = &self.driver.script;
        let limit = self.max_rows.unwrap_or(script.rows.len());
        let rows = script.rows.iter().take(limit).cloned().collect();
        Ok(self.cursor(RowsCursor::new(script.labels.clone(), rows)))
    }

    fn execute_update(&mut self) -> Result<i64, BoxError> {
        self.driver.journal().executions += 1;
        self.driver.script.check(Failure::Execute)?;
        self.capture_keys();
        Ok(self.driver.script.update_count)
    }

    fn execute_batch(&mut self) -> Result<Vec<i64>, BoxError> {
        let entries = {
            let mut journal = self.driver.journal();
            journal.executions += 1;
            journal.batches.len()
        };
        self.driver.script.check(Failure::Execute)?;
        self.capture_keys();
        let script = &self.driver.script;
        Ok(script
            .batch_counts
            .clone()
            .unwrap_or_else(|| vec![script.update_count; entries]))
    }

    fn generated_keys(&mut self) -> Result<Box<dyn Cursor>, BoxError> {
        let keys = std::mem::take(&mut self.executed_keys);
        Ok(self.cursor(RowsCursor::keys(keys)))
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.driver.close(Resource::Statement, Failure::CloseStatement)
    }
}

struct MockCursor {
    driver: MockDriver,
    inner: RowsCursor,
}

impl Cursor for MockCursor {
    fn next(&mut self) -> Result<bool, BoxError> {
        self.inner.next()
    }

    fn column_count(&self) -> usize {
        self.inner.column_count()
    }

    fn column_label(&self, column: usize) -> Option<&str> {
        self.inner.column_label(column)
    }

    fn get(&self, column: usize) -> Result<Value, BoxError> {
        self.inner.get(column)
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.inner.close()?;
        self.driver.close(Resource::Cursor, Failure::CloseCursor)
    }
}
