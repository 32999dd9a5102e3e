// Conveyor - a Redis-backed distributed job queue for Rust
//
// This library provides named work lanes with publish, concurrency-limited
// consumption, durable status tracking, and manual failure recovery.

// Re-export the queue engine
pub use conveyor_queue::*;

// Re-export the Redis integration and logging macros under their own names
pub use conveyor_log;
pub use conveyor_redis;

// Prelude for common imports
pub mod prelude {
    pub use conveyor_queue::prelude::*;
    pub use conveyor_redis::{RedisConfig, RedisService};
}
