use std::fmt;
use std::sync::Arc;

use crate::driver::{Connection, Connector};
use crate::error::{Error, Result};

/// Connectors available to statements, keyed by name.
///
/// Build one at process start and share it (usually as `Arc<ConnectorRegistry>`)
/// with every [`crate::Query`]. Looking up `None` returns the first connector
/// registered.
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connector. A later connector with the same name is never reached.
    pub fn register<C>(&mut self, connector: C) -> &mut Self
    where
        C: Connector + 'static,
    {
        self.connectors.push(Arc::new(connector));
        self
    }

    pub fn with<C>(mut self, connector: C) -> Self
    where
        C: Connector + 'static,
    {
        self.register(connector);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    pub fn lookup(&self, name: Option<&str>) -> Result<Arc<dyn Connector>> {
        self.connectors
            .iter()
            .find(|connector| name.map_or(true, |name| connector.name() == name))
            .cloned()
            .ok_or_else(|| Error::NoConnector {
                name: name.map(str::to_owned),
            })
    }

    /// Looks up a connector and opens one connection from it.
    pub fn connect(&self, name: Option<&str>) -> Result<Box<dyn Connection>> {
        let connector = self.lookup(name)?;
        tracing::debug!(connector = connector.name(), "acquiring connection");
        connector.connect().map_err(Error::Connect)
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.connectors.iter().map(|connector| connector.name()))
            .finish()
    }
}
