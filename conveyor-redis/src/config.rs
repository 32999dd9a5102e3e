//! Redis configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Redis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis URL (redis://host:port).
    pub url: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// Minimum idle connections.
    pub min_idle: Option<u32>,
    /// Connection timeout.
    #[serde(with = "duration_secs", default = "default_connection_timeout")]
    pub connection_timeout: Duration,
    /// Command timeout.
    #[serde(with = "duration_secs", default = "default_command_timeout")]
    pub command_timeout: Duration,
    /// Database number (0-15).
    pub database: Option<u8>,
    /// Password.
    pub password: Option<String>,
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 10,
            min_idle: Some(1),
            connection_timeout: default_connection_timeout(),
            command_timeout: default_command_timeout(),
            database: None,
            password: None,
        }
    }
}

impl RedisConfig {
    /// Create a new configuration from a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Create a configuration from host and port.
    pub fn from_host_port(host: impl AsRef<str>, port: u16) -> Self {
        Self::new(format!("redis://{}:{}", host.as_ref(), port))
    }

    /// Create a builder.
    pub fn builder() -> RedisConfigBuilder {
        RedisConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> RedisConfigBuilder {
        let mut builder = RedisConfigBuilder::new();

        if let Ok(url) = std::env::var("CONVEYOR_REDIS_URL") {
            builder = builder.url(url);
        } else if let Ok(host) = std::env::var("CONVEYOR_REDIS_HOST") {
            let port = std::env::var("CONVEYOR_REDIS_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(6379);
            builder = builder.url(format!("redis://{}:{}", host, port));
        }

        if let Ok(pool_size) = std::env::var("CONVEYOR_REDIS_POOL_SIZE")
            && let Ok(size) = pool_size.parse()
        {
            builder = builder.pool_size(size);
        }

        if let Ok(db) = std::env::var("CONVEYOR_REDIS_DATABASE")
            && let Ok(db_num) = db.parse()
        {
            builder = builder.database(db_num);
        }

        if let Ok(password) = std::env::var("CONVEYOR_REDIS_PASSWORD") {
            builder = builder.password(password);
        }

        builder
    }

    /// Get the full Redis URL with auth and database.
    pub fn connection_url(&self) -> String {
        let mut url = self.url.clone();

        // Add auth if provided: redis://:password@host
        if let Some(password) = &self.password {
            url = url.replacen("redis://", &format!("redis://:{}@", password), 1);
        }

        // Add database if provided
        if let Some(db) = self.database
            && !url.trim_start_matches("redis://").contains('/')
        {
            url = format!("{}/{}", url.trim_end_matches('/'), db);
        }

        url
    }
}

/// Builder for Redis configuration.
#[derive(Default)]
pub struct RedisConfigBuilder {
    config: RedisConfig,
}

impl RedisConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RedisConfig::default(),
        }
    }

    /// Set the Redis URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Set the pool size.
    pub fn pool_size(mut self, size: u32) -> Self {
        self.config.pool_size = size;
        self
    }

    /// Set the minimum idle connections.
    pub fn min_idle(mut self, min_idle: u32) -> Self {
        self.config.min_idle = Some(min_idle);
        self
    }

    /// Set the connection timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Set the command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Set the database number.
    pub fn database(mut self, db: u8) -> Self {
        self.config.database = Some(db);
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> RedisConfig {
        self.config
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
