//! Pool factory for PostgreSQL connections

use std::sync::Arc;

use async_trait::async_trait;
use preflight_connection::ConnectionFactory;
use preflight_core::{Connection, Result};

use crate::config::PostgresConfig;
use crate::connection::PostgresConnection;

/// Opens a fresh [`PostgresConnection`] for every pool slot
#[derive(Debug, Clone)]
pub struct PostgresConnectionFactory {
    config: PostgresConfig,
}

impl PostgresConnectionFactory {
    pub fn new(config: PostgresConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }
}

#[async_trait]
impl ConnectionFactory for PostgresConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        let connection = PostgresConnection::connect(&self.config).await?;
        Ok(Arc::new(connection))
    }
}
