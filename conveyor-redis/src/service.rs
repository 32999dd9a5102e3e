//! Redis service shared by queue components.

use redis::aio::MultiplexedConnection;

use crate::pool::{RedisConnection, RedisPool, RedisPoolBuilder};
use crate::{RedisConfig, RedisError, Result};

/// Redis service providing a connection pool for ordinary commands and
/// dedicated connections for blocking ones.
///
/// This is the main entry point for Redis access and is constructed once at
/// startup, then shared (behind `Arc`) with every component that needs the
/// store.
pub struct RedisService {
    config: RedisConfig,
    pool: RedisPool,
}

impl RedisService {
    /// Create a new Redis service.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = RedisPoolBuilder::new(config.clone()).build().await?;
        Ok(Self { config, pool })
    }

    /// Create from an existing pool.
    pub fn from_pool(config: RedisConfig, pool: RedisPool) -> Self {
        Self { config, pool }
    }

    /// Get the configuration.
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    /// Get a connection from the pool.
    pub async fn get(&self) -> Result<RedisConnection<'_>> {
        let conn = self.pool.get().await?;
        Ok(RedisConnection::new(conn))
    }

    /// Get a dedicated connection (not from the pool).
    ///
    /// Blocking commands hold their connection for the whole call, so they
    /// must never run on a pooled connection.
    pub async fn get_dedicated(&self) -> Result<MultiplexedConnection> {
        let client = redis::Client::open(self.config.connection_url())
            .map_err(|e| RedisError::Config(e.to_string()))?;
        client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))
    }

    /// Check if the connection is healthy.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))?;
        Ok(())
    }
}
