//! Queue manager: bootstraps and owns the named queues.

use crate::error::QueueResult;
use crate::queue::Queue;
use crate::settings::QueueSettings;
use conveyor_log::info;
use conveyor_redis::RedisService;
use std::collections::HashMap;
use std::sync::Arc;

/// Owns one [`Queue`] per configured name for the lifetime of the process.
///
/// Queues are created once during [`initialize`](Self::initialize) and torn
/// down with the manager. Lookup by an unconfigured name returns `None`,
/// which callers should treat as a configuration error rather than retry.
pub struct QueueManager {
    queues: HashMap<String, Queue>,
}

impl QueueManager {
    /// Construct a queue for every configured name against the shared Redis
    /// service. Returns once every queue's connections are verified.
    pub async fn initialize(
        settings: &QueueSettings,
        redis: Arc<RedisService>,
    ) -> QueueResult<Self> {
        settings.validate()?;

        let mut queues = HashMap::new();
        for name in &settings.queues {
            info!(target: "conveyor::queue::manager", "creating queue: {}", name);
            let queue =
                Queue::with_concurrency(name.clone(), Arc::clone(&redis), settings.concurrency)
                    .await?;
            queues.insert(name.clone(), queue);
        }

        info!(
            target: "conveyor::queue::manager",
            "queue manager ready with {} queue(s)", queues.len()
        );

        Ok(Self { queues })
    }

    /// Look up a queue by name.
    pub fn queue(&self, name: &str) -> Option<&Queue> {
        self.queues.get(name)
    }

    /// Number of queues owned by this manager.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// Whether the manager owns no queues.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Names of the owned queues.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("queues", &self.queues.keys().collect::<Vec<_>>())
            .finish()
    }
}
