//! Job definition and wire format.

use crate::error::{QueueError, QueueResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job unique identifier, assigned by the store at publish time.
pub type JobId = u64;

/// Job data payload.
pub type JobData = serde_json::Value;

/// Job lifecycle status.
///
/// Transitions run `Pending -> Processing -> {Completed, Failed}`;
/// `Failed -> Pending` only through an explicit requeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting on the pending FIFO
    Pending,
    /// Checked out to a handler
    Processing,
    /// Resolved successfully
    Completed,
    /// Resolved as failed, awaiting manual requeue
    Failed,
}

impl JobStatus {
    /// The wire string stored under `job:<id>:status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether the job has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(QueueError::Decode(format!("unknown status '{}'", other))),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of work.
///
/// A job is immutable after creation apart from the fields the queue manages:
/// `id` and `queue` are assigned at publish time, `status` and `updated` on
/// every recorded transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Store-assigned ordinal, `None` until first successful publish
    pub id: Option<JobId>,

    /// Routes the job to the handler registered for this type
    #[serde(rename = "type")]
    pub job_type: String,

    /// Opaque caller payload
    pub data: JobData,

    /// When the job was constructed
    pub created: DateTime<Utc>,

    /// Last recorded status transition
    pub updated: Option<DateTime<Utc>>,

    /// Current lifecycle status
    pub status: JobStatus,

    /// Owning queue, set at publish time
    pub queue: Option<String>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(job_type: impl Into<String>, data: JobData) -> Self {
        Self {
            id: None,
            job_type: job_type.into(),
            data,
            created: Utc::now(),
            updated: None,
            status: JobStatus::Pending,
            queue: None,
        }
    }

    /// Whether the job has been published (carries a store-assigned id).
    pub fn is_published(&self) -> bool {
        self.id.is_some()
    }

    /// Encode the job to its durable wire form.
    pub fn serialize(&self) -> QueueResult<String> {
        serde_json::to_string(self).map_err(|e| QueueError::Encode(e.to_string()))
    }

    /// Reconstruct a job from its wire form.
    pub fn deserialize(raw: &str) -> QueueResult<Self> {
        serde_json::from_str(raw).map_err(|e| QueueError::Decode(e.to_string()))
    }
}
