//! Storage key namespace.
//!
//! Per-job keys are global; list keys are namespaced per queue name:
//!
//! - `job:<id>:data` - serialized job record
//! - `job:<id>:status` - status string, redundant with the record so status
//!   can be read without deserializing
//! - `jobs` - sorted set of every published id, scored by publish time
//! - `queue:<name>` - pending FIFO
//! - `queue:<name>:processing` - ids checked out to handlers
//! - `queue:<name>:failed` - ids awaiting manual requeue
//! - `queues:id` - atomic counter supplying job ids

use crate::job::JobId;

/// Key holding the serialized job record.
pub fn job_data(id: JobId) -> String {
    format!("job:{}:data", id)
}

/// Key holding the job status string.
pub fn job_status(id: JobId) -> String {
    format!("job:{}:status", id)
}

/// Global sorted set of all published job ids.
pub fn jobs_index() -> &'static str {
    "jobs"
}

/// Global counter supplying job ids.
pub fn id_counter() -> &'static str {
    "queues:id"
}

/// Pending FIFO for a queue.
pub fn pending(queue: &str) -> String {
    format!("queue:{}", queue)
}

/// Processing list for a queue.
pub fn processing(queue: &str) -> String {
    format!("queue:{}:processing", queue)
}

/// Failed list for a queue.
pub fn failed(queue: &str) -> String {
    format!("queue:{}:failed", queue)
}
