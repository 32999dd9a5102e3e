//! # Conveyor Redis
//!
//! Redis client integration for the Conveyor job queue.
//!
//! ## Features
//!
//! - **Connection Pooling**: pooled connections for ordinary commands (bb8)
//! - **Dedicated Connections**: un-pooled connections reserved for blocking
//!   commands, which monopolize a connection for their whole duration
//! - **Environment Configuration**: `CONVEYOR_REDIS_*` variables
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conveyor_redis::{RedisConfig, RedisService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::builder()
//!         .url("redis://127.0.0.1:6379")
//!         .pool_size(10)
//!         .build();
//!
//!     let redis = RedisService::new(config).await?;
//!
//!     // Pooled connection for ordinary commands
//!     let mut conn = redis.get().await?;
//!     redis::cmd("SET")
//!         .arg("key")
//!         .arg("value")
//!         .query_async::<()>(&mut *conn)
//!         .await?;
//!
//!     // Dedicated connection for a blocking pop
//!     let mut blocking = redis.get_dedicated().await?;
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod pool;
mod service;

pub use config::{RedisConfig, RedisConfigBuilder};
pub use error::{RedisError, Result};
pub use pool::{RedisConnection, RedisPool};
pub use service::RedisService;

// Re-export redis crate for convenience
pub use redis;
pub use redis::{AsyncCommands, RedisResult, Value};

/// Prelude for common imports.
///
/// ```
/// use conveyor_redis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{RedisConfig, RedisConfigBuilder};
    pub use crate::error::{RedisError, Result};
    pub use crate::pool::{RedisConnection, RedisPool};
    pub use crate::service::RedisService;
    pub use redis::AsyncCommands;
}
