//! Job queue engine for Conveyor.
//!
//! A Redis-backed, at-least-once work queue with:
//! - 📦 Durable job records and status tracking
//! - 🎯 Multiple named queues behind one manager
//! - 🚦 Concurrency-limited dispatch per queue
//! - 🔁 Manual failure recovery (failed list + requeue)
//! - 👂 Typed handler subscriptions, last registration wins
//!
//! ## Quick Start - Jobs
//!
//! ```
//! use conveyor_queue::{Job, JobStatus};
//! use serde_json::json;
//!
//! let job = Job::new("send_welcome", json!({"to": "user@example.com"}));
//!
//! assert_eq!(job.job_type, "send_welcome");
//! assert_eq!(job.status, JobStatus::Pending);
//! assert!(!job.is_published());
//! ```
//!
//! ## Settings
//!
//! ```
//! use conveyor_queue::QueueSettings;
//!
//! let settings = QueueSettings::new()
//!     .with_queue("emails")
//!     .with_queue("images")
//!     .with_concurrency(5);
//!
//! assert_eq!(settings.queues.len(), 2);
//! assert!(settings.validate().is_ok());
//! ```
//!
//! ## Complete Example
//!
//! ```no_run
//! use conveyor_queue::prelude::*;
//! use conveyor_redis::{RedisConfig, RedisService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> QueueResult<()> {
//!     let redis = Arc::new(RedisService::new(RedisConfig::default()).await?);
//!
//!     let settings = QueueSettings::new().with_queue("emails");
//!     let manager = QueueManager::initialize(&settings, redis).await?;
//!     let queue = manager.queue("emails").expect("configured above").clone();
//!
//!     // Publish work
//!     let mut job = Job::new("send_welcome", serde_json::json!({"to": "user@example.com"}));
//!     queue.publish(&mut job).await?;
//!
//!     // Consume work; resolution stays explicit
//!     let worker = queue.clone();
//!     queue
//!         .subscribe("send_welcome", move |mut job| {
//!             let queue = worker.clone();
//!             async move {
//!                 // ... send the email ...
//!                 let _ = queue.complete_job(&mut job).await;
//!             }
//!         })
//!         .await;
//!
//!     let listener = queue.listen().await?;
//!     listener.join().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod job;
pub mod keys;
pub mod manager;
pub mod queue;
pub mod settings;

pub use error::{QueueError, QueueResult};
pub use job::{Job, JobData, JobId, JobStatus};
pub use manager::QueueManager;
pub use queue::{JobHandler, ListenerHandle, Queue};
pub use settings::{DEFAULT_CONCURRENCY, QueueSettings};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{QueueError, QueueResult};
    pub use crate::job::{Job, JobData, JobId, JobStatus};
    pub use crate::manager::QueueManager;
    pub use crate::queue::{JobHandler, ListenerHandle, Queue};
    pub use crate::settings::{DEFAULT_CONCURRENCY, QueueSettings};
}
