//! Queue implementation with Redis backend.
//!
//! Each queue owns one named lane: a pending FIFO, a processing list holding
//! ids checked out to handlers, and a failed list awaiting manual requeue.
//! Ordinary commands go through the shared connection pool; the blocking move
//! that feeds the listener runs on a dedicated connection, since a blocking
//! call monopolizes its connection for the whole wait.

use crate::error::{QueueError, QueueResult};
use crate::job::{Job, JobId, JobStatus};
use crate::keys;
use crate::settings::DEFAULT_CONCURRENCY;
use chrono::Utc;
use conveyor_log::{debug, error, info, warn};
use conveyor_redis::{AsyncCommands, RedisService};
use redis::Direction;
use redis::aio::MultiplexedConnection;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;

/// Job handler function type.
pub type JobHandler =
    Arc<dyn Fn(Job) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Handler registry keyed by job type. Re-registering a type replaces the
/// previous handler, so each type dispatches to at most one handler.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: RwLock<HashMap<String, JobHandler>>,
}

impl HandlerRegistry {
    /// Register a handler; returns true when a previous one was replaced.
    pub(crate) async fn insert(&self, job_type: String, handler: JobHandler) -> bool {
        self.handlers
            .write()
            .await
            .insert(job_type, handler)
            .is_some()
    }

    pub(crate) async fn get(&self, job_type: &str) -> Option<JobHandler> {
        self.handlers.read().await.get(job_type).cloned()
    }

    pub(crate) async fn is_empty(&self) -> bool {
        self.handlers.read().await.is_empty()
    }
}

struct QueueInner {
    name: String,
    redis: Arc<RedisService>,
    subscriber: Mutex<MultiplexedConnection>,
    handlers: HandlerRegistry,
    slots: Semaphore,
    in_flight: AtomicUsize,
    concurrency: usize,
    listening: AtomicBool,
}

/// A named job lane backed by Redis.
///
/// Cloning is cheap and clones share the same lane state, including the
/// in-flight slots and the dedicated blocking connection.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

impl Queue {
    /// Create a queue with the default concurrency ceiling.
    pub async fn new(name: impl Into<String>, redis: Arc<RedisService>) -> QueueResult<Self> {
        Self::with_concurrency(name, redis, DEFAULT_CONCURRENCY).await
    }

    /// Create a queue with an explicit concurrency ceiling.
    ///
    /// Opens the dedicated blocking connection and verifies the command path,
    /// so a returned queue is ready to publish and listen.
    pub async fn with_concurrency(
        name: impl Into<String>,
        redis: Arc<RedisService>,
        concurrency: usize,
    ) -> QueueResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(QueueError::Config("queue name must not be empty".to_string()));
        }
        if concurrency == 0 {
            return Err(QueueError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let subscriber = redis.get_dedicated().await?;
        redis.health_check().await?;

        info!(target: "conveyor::queue", "queue '{}' ready (concurrency {})", name, concurrency);

        Ok(Self {
            inner: Arc::new(QueueInner {
                name,
                redis,
                subscriber: Mutex::new(subscriber),
                handlers: HandlerRegistry::default(),
                slots: Semaphore::new(concurrency),
                in_flight: AtomicUsize::new(0),
                concurrency,
                listening: AtomicBool::new(false),
            }),
        })
    }

    /// The queue name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The concurrency ceiling.
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Jobs currently dispatched and not yet resolved.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Register a handler for a job type.
    ///
    /// The most recent registration for a type wins; a job of that type is
    /// delivered to exactly one handler. Resolution stays explicit: the
    /// handler (or whoever it hands the job to) must call
    /// [`complete_job`](Self::complete_job) or [`fail_job`](Self::fail_job).
    pub async fn subscribe<F, Fut>(&self, job_type: impl Into<String>, handler: F)
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job_type = job_type.into();
        let wrapped: JobHandler =
            Arc::new(move |job: Job| -> Pin<Box<dyn Future<Output = ()> + Send>> {
                Box::pin(handler(job))
            });

        if self.inner.handlers.insert(job_type.clone(), wrapped).await {
            debug!(
                target: "conveyor::queue",
                "handler for '{}' replaced on queue '{}'", job_type, self.inner.name
            );
        }
    }

    /// Publish a job onto this queue.
    ///
    /// Assigns the owning queue and a fresh id from the global counter,
    /// persists the record with `pending` status, indexes the id in the
    /// global publish-time set, then pushes it onto the pending FIFO.
    /// A job that already carries an id is rejected; ids are assigned exactly
    /// once and never reused.
    pub async fn publish(&self, job: &mut Job) -> QueueResult<JobId> {
        if let Some(id) = job.id {
            return Err(QueueError::AlreadyPublished(id));
        }

        job.queue = Some(self.inner.name.clone());
        let published_at = Utc::now().timestamp_millis();

        let mut conn = self.inner.redis.get().await?;

        let id: JobId = conn.incr(keys::id_counter(), 1).await?;
        job.id = Some(id);

        let payload = job.serialize()?;
        let _: () = conn
            .mset(&[
                (keys::job_data(id), payload),
                (keys::job_status(id), job.status.as_str().to_string()),
            ])
            .await?;
        let _: () = conn.zadd(keys::jobs_index(), id, published_at).await?;
        let _: () = conn.lpush(self.pending_key(), id).await?;

        debug!(
            target: "conveyor::queue",
            "published job {} ({}) on queue '{}'", id, job.job_type, self.inner.name
        );

        Ok(id)
    }

    /// Load a job by id.
    pub async fn get_job(&self, id: JobId) -> QueueResult<Job> {
        let mut conn = self.inner.redis.get().await?;
        let (data, _status): (Option<String>, Option<String>) = conn
            .mget(&[keys::job_data(id), keys::job_status(id)])
            .await?;

        let raw = data.ok_or(QueueError::JobNotFound(id))?;
        Job::deserialize(&raw)
    }

    /// Number of jobs waiting on the pending FIFO.
    pub async fn get_length(&self) -> QueueResult<usize> {
        let mut conn = self.inner.redis.get().await?;
        let len: usize = conn.llen(self.pending_key()).await?;
        Ok(len)
    }

    /// Number of jobs checked out to handlers.
    pub async fn get_processing_length(&self) -> QueueResult<usize> {
        let mut conn = self.inner.redis.get().await?;
        let len: usize = conn.llen(self.processing_key()).await?;
        Ok(len)
    }

    /// Delete the pending FIFO.
    ///
    /// Processing and failed lists, and per-job records, are untouched.
    pub async fn flush(&self) -> QueueResult<()> {
        let mut conn = self.inner.redis.get().await?;
        let _: () = conn.del(self.pending_key()).await?;
        debug!(target: "conveyor::queue", "flushed queue '{}'", self.inner.name);
        Ok(())
    }

    /// Record a job as completed and release its in-flight slot.
    pub async fn complete_job(&self, job: &mut Job) -> QueueResult<()> {
        let id = job.id.ok_or(QueueError::NotPublished)?;

        self.remove_from_processing(id).await?;
        self.update_status(job, JobStatus::Completed).await?;
        self.release_slot();

        debug!(target: "conveyor::queue", "job {} completed on queue '{}'", id, self.inner.name);
        Ok(())
    }

    /// Record a job as failed, park it on the failed list, and release its
    /// in-flight slot.
    pub async fn fail_job(&self, job: &mut Job) -> QueueResult<()> {
        let id = job.id.ok_or(QueueError::NotPublished)?;

        self.remove_from_processing(id).await?;
        self.add_to_failed(id).await?;
        self.update_status(job, JobStatus::Failed).await?;
        self.release_slot();

        warn!(target: "conveyor::queue", "job {} failed on queue '{}'", id, self.inner.name);
        Ok(())
    }

    /// Record a job as processing.
    ///
    /// Status visibility only; the move onto the processing list already
    /// happened when the listener checked the job out.
    pub async fn process_job(&self, job: &mut Job) -> QueueResult<()> {
        self.update_status(job, JobStatus::Processing).await
    }

    /// Pop one id off the failed list and requeue it.
    ///
    /// Single-pop by design; callers wanting a full drain loop until `None`.
    pub async fn repush_failed_jobs(&self) -> QueueResult<Option<JobId>> {
        let id: Option<JobId> = {
            let mut conn = self.inner.redis.get().await?;
            conn.lpop(self.failed_key(), None).await?
        };

        match id {
            Some(id) => {
                self.repush_job(id).await?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Reset a job to pending and push it back onto the pending FIFO.
    pub async fn repush_job(&self, id: JobId) -> QueueResult<()> {
        let mut job = self.get_job(id).await?;
        self.update_status(&mut job, JobStatus::Pending).await?;

        let mut conn = self.inner.redis.get().await?;
        let _: () = conn.lpush(self.pending_key(), id).await?;

        debug!(target: "conveyor::queue", "job {} requeued on queue '{}'", id, self.inner.name);
        Ok(())
    }

    /// Start the consumption loop.
    ///
    /// No-op when nothing is subscribed. Otherwise spawns the listener task:
    /// acquire an in-flight slot (stalling at the ceiling until a resolution
    /// frees one), block on the store moving the next pending id onto the
    /// processing list, load the job, and hand it to the handler for its
    /// type. The blocking move is the only cross-consumer synchronization
    /// point; each pending id is delivered to exactly one listener in the
    /// fleet.
    pub async fn listen(&self) -> QueueResult<ListenerHandle> {
        if self.inner.handlers.is_empty().await {
            debug!(
                target: "conveyor::queue",
                "listen() on queue '{}' without subscriptions", self.inner.name
            );
            return Ok(ListenerHandle::idle());
        }

        if self.inner.listening.swap(true, Ordering::SeqCst) {
            return Err(QueueError::AlreadyListening);
        }

        info!(target: "conveyor::queue", "queue '{}' listening", self.inner.name);

        let queue = self.clone();
        let handle = tokio::spawn(async move {
            let result = queue.run_loop().await;
            queue.inner.listening.store(false, Ordering::SeqCst);
            if let Err(ref e) = result {
                error!(
                    target: "conveyor::queue",
                    "listener on queue '{}' terminated: {}", queue.inner.name, e
                );
            }
            result
        });

        Ok(ListenerHandle::running(handle, self.clone()))
    }

    async fn run_loop(&self) -> QueueResult<()> {
        loop {
            let permit = self
                .inner
                .slots
                .acquire()
                .await
                .map_err(|e| QueueError::Listener(e.to_string()))?;
            permit.forget();

            let id = self.next_pending_id().await?;
            let job = self.get_job(id).await?;

            self.inner.in_flight.fetch_add(1, Ordering::AcqRel);

            match self.inner.handlers.get(&job.job_type).await {
                Some(handler) => {
                    debug!(
                        target: "conveyor::queue",
                        "dispatching job {} ({}) on queue '{}'", id, job.job_type, self.inner.name
                    );
                    tokio::spawn(handler(job));
                }
                None => {
                    // The id is already on the processing list; without a
                    // handler it stays there until an operator reconciles it.
                    warn!(
                        target: "conveyor::queue",
                        "no handler for job type '{}' on queue '{}', job {} left in processing",
                        job.job_type, self.inner.name, id
                    );
                }
            }
        }
    }

    /// Block on the store until a pending id can be moved to processing.
    async fn next_pending_id(&self) -> QueueResult<JobId> {
        let mut conn = self.inner.subscriber.lock().await;
        let id: JobId = conn
            .blmove(
                self.pending_key(),
                self.processing_key(),
                Direction::Right,
                Direction::Left,
                0.0,
            )
            .await?;
        Ok(id)
    }

    async fn update_status(&self, job: &mut Job, status: JobStatus) -> QueueResult<()> {
        let id = job.id.ok_or(QueueError::NotPublished)?;

        job.status = status;
        job.updated = Some(Utc::now());

        let payload = job.serialize()?;
        let mut conn = self.inner.redis.get().await?;
        let _: () = conn
            .mset(&[
                (keys::job_data(id), payload),
                (keys::job_status(id), status.as_str().to_string()),
            ])
            .await?;
        Ok(())
    }

    async fn remove_from_processing(&self, id: JobId) -> QueueResult<()> {
        let mut conn = self.inner.redis.get().await?;
        // Removing an id that is no longer on the list is a no-op, which
        // makes racing resolutions for the same job harmless.
        let _: usize = conn.lrem(self.processing_key(), 0, id).await?;
        Ok(())
    }

    async fn add_to_failed(&self, id: JobId) -> QueueResult<()> {
        let mut conn = self.inner.redis.get().await?;
        let _: () = conn.lpush(self.failed_key(), id).await?;
        Ok(())
    }

    /// Return one in-flight slot, waking a listener stalled at the ceiling.
    fn release_slot(&self) {
        if self
            .inner
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
        {
            self.inner.slots.add_permits(1);
        }
    }

    fn pending_key(&self) -> String {
        keys::pending(&self.inner.name)
    }

    fn processing_key(&self) -> String {
        keys::processing(&self.inner.name)
    }

    fn failed_key(&self) -> String {
        keys::failed(&self.inner.name)
    }
}

/// Handle on a queue's listener task.
pub struct ListenerHandle {
    handle: Option<JoinHandle<QueueResult<()>>>,
    queue: Option<Queue>,
}

impl ListenerHandle {
    fn idle() -> Self {
        Self {
            handle: None,
            queue: None,
        }
    }

    fn running(handle: JoinHandle<QueueResult<()>>, queue: Queue) -> Self {
        Self {
            handle: Some(handle),
            queue: Some(queue),
        }
    }

    /// Whether the listener task is still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Abort the listener task.
    pub fn stop(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
        if let Some(queue) = &self.queue {
            queue.inner.listening.store(false, Ordering::SeqCst);
            info!(target: "conveyor::queue", "queue '{}' stopped listening", queue.inner.name);
        }
    }

    /// Wait for the listener task to end.
    ///
    /// A stopped listener joins cleanly; a listener that died on a store
    /// error yields that error.
    pub async fn join(self) -> QueueResult<()> {
        match self.handle {
            None => Ok(()),
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Ok(()),
                Err(e) => Err(QueueError::Listener(e.to_string())),
            },
        }
    }
}
