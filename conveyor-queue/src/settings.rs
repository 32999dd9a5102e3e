//! Queue configuration surface.

use crate::error::{QueueError, QueueResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default number of jobs dispatched concurrently per queue.
pub const DEFAULT_CONCURRENCY: usize = 5;

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Settings consumed by [`QueueManager::initialize`](crate::QueueManager::initialize).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Names of the queues to create
    #[serde(default)]
    pub queues: Vec<String>,

    /// Concurrency ceiling applied to every queue
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            queues: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl QueueSettings {
    /// Create empty settings with the default concurrency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a queue name.
    pub fn with_queue(mut self, name: impl Into<String>) -> Self {
        self.queues.push(name.into());
        self
    }

    /// Add several queue names.
    pub fn with_queues<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queues.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set the concurrency ceiling.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Load settings from environment variables.
    ///
    /// `CONVEYOR_QUEUES` is a comma-separated list of queue names;
    /// `CONVEYOR_QUEUE_CONCURRENCY` overrides the default ceiling.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(queues) = std::env::var("CONVEYOR_QUEUES") {
            settings.queues = queues
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(concurrency) = std::env::var("CONVEYOR_QUEUE_CONCURRENCY")
            && let Ok(n) = concurrency.parse()
        {
            settings.concurrency = n;
        }

        settings
    }

    /// Fail fast on configuration that cannot produce a working manager.
    pub fn validate(&self) -> QueueResult<()> {
        if self.concurrency == 0 {
            return Err(QueueError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in &self.queues {
            if name.is_empty() {
                return Err(QueueError::Config("queue name must not be empty".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(QueueError::Config(format!("duplicate queue name '{}'", name)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = QueueSettings::default();
        assert!(settings.queues.is_empty());
        assert_eq!(settings.concurrency, 5);
    }

    #[test]
    fn test_builder() {
        let settings = QueueSettings::new()
            .with_queue("emails")
            .with_queues(["images", "reports"])
            .with_concurrency(2);

        assert_eq!(settings.queues, vec!["emails", "images", "reports"]);
        assert_eq!(settings.concurrency, 2);
    }

    #[test]
    fn test_validate_ok() {
        let settings = QueueSettings::new().with_queue("emails");
        assert!(settings.validate().is_ok());

        // No queues configured is legal; the manager just owns nothing.
        assert!(QueueSettings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let settings = QueueSettings::new().with_queue("emails").with_concurrency(0);
        assert!(matches!(
            settings.validate(),
            Err(QueueError::Config(_))
        ));
    }

    #[test]
    fn test_validate_empty_name() {
        let settings = QueueSettings::new().with_queue("");
        assert!(matches!(settings.validate(), Err(QueueError::Config(_))));
    }

    #[test]
    fn test_validate_duplicate_name() {
        let settings = QueueSettings::new().with_queue("emails").with_queue("emails");
        assert!(matches!(settings.validate(), Err(QueueError::Config(_))));
    }

    #[test]
    fn test_serde_defaults() {
        let settings: QueueSettings = serde_json::from_str(r#"{"queues": ["emails"]}"#).unwrap();
        assert_eq!(settings.queues, vec!["emails"]);
        assert_eq!(settings.concurrency, 5);
    }
}
