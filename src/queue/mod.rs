//! Durable repeatable-job queue on Redis streams.
//!
//! Schedules live in a Redis hash keyed by job id, so re-registering a job
//! replaces its period idempotently. Every ingest-enabled instance runs a
//! producer loop that claims due fires with a `SET NX PX` lock (one winner
//! per fire window across instances) and appends a job message to the
//! `ingest` stream. Workers consume through a consumer group, so each job
//! message reaches exactly one worker.
//!
//! Failed jobs are retried with exponential backoff starting at 5s, up to
//! 3 attempts; exhausted jobs are appended to the `ingest:failed` stream
//! and kept for inspection. Completed jobs are acknowledged and trimmed
//! away by the stream cap.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::redis::streams::{StreamReadOptions, StreamReadReply};
use deadpool_redis::redis::{cmd, AsyncCommands, Value as RedisValue};
use deadpool_redis::Pool;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::domain::SourceId;
use crate::error::VigilError;
use crate::shutdown::ShutdownSignal;

/// Stream carrying pending jobs.
pub const STREAM: &str = "ingest";

/// Stream retaining jobs that exhausted their retries.
pub const FAILED_STREAM: &str = "ingest:failed";

/// Consumer group name for ingest workers.
pub const GROUP: &str = "ingest-workers";

/// Hash of registered repeatable jobs, field = job id.
pub const SCHEDULES_KEY: &str = "ingest:schedules";

/// Job name recorded on each stream entry.
pub const JOB_NAME: &str = "poll-source";

/// Maximum delivery attempts per fire (1 initial + 2 retries).
pub const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential retry backoff.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(5);

/// Cap on retained pending-stream entries.
const STREAM_MAXLEN: usize = 10_000;

/// How often the producer loop scans the schedule hash.
const PRODUCER_TICK: Duration = Duration::from_secs(1);

/// A repeatable-job schedule, stored as JSON in [`SCHEDULES_KEY`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    /// Source the job polls.
    pub source_id: i16,
    /// Fire period in milliseconds.
    pub interval_ms: u64,
}

/// Callback executing one job. Errors trigger the queue's retry policy.
pub type JobProcessor =
    Arc<dyn Fn(SourceId) -> BoxFuture<'static, Result<(), VigilError>> + Send + Sync>;

/// Observer invoked when a job exhausts its retries.
pub type JobFailureObserver = Arc<dyn Fn(&str, u32, &VigilError) + Send + Sync>;

/// Redis-stream-backed job queue shared by all instances.
#[derive(Clone)]
pub struct JobQueue {
    pool: Pool,
    observer: JobFailureObserver,
}

impl JobQueue {
    /// Creates a queue with the default failure observer (error log).
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            observer: Arc::new(|job_id, attempts, error| {
                tracing::error!(job_id, attempts, error = %error, "job failed permanently");
            }),
        }
    }

    /// Replaces the job-failed observer.
    #[must_use]
    pub fn with_observer(mut self, observer: JobFailureObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Registers (or replaces) a repeatable job.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Queue`] on Redis failure.
    pub async fn register_repeatable(
        &self,
        job_id: &str,
        source_id: SourceId,
        interval_ms: u64,
    ) -> Result<(), VigilError> {
        let schedule = Schedule {
            source_id: source_id.as_i16(),
            interval_ms,
        };
        let json = serde_json::to_string(&schedule)
            .map_err(|e| VigilError::Queue(format!("encode schedule: {e}")))?;

        let mut conn = self.connection().await?;
        let _: () = conn
            .hset(SCHEDULES_KEY, job_id, json)
            .await
            .map_err(|e| VigilError::Queue(format!("register {job_id}: {e}")))?;
        tracing::info!(job_id, interval_ms, "repeatable job registered");
        Ok(())
    }

    /// Appends one job message to the pending stream.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Queue`] on Redis failure.
    pub async fn enqueue(
        &self,
        job_id: &str,
        source_id: SourceId,
        attempt: u32,
    ) -> Result<(), VigilError> {
        let mut conn = self.connection().await?;
        let _: String = cmd("XADD")
            .arg(STREAM)
            .arg("MAXLEN")
            .arg("~")
            .arg(STREAM_MAXLEN)
            .arg("*")
            .arg("job")
            .arg(job_id)
            .arg("name")
            .arg(JOB_NAME)
            .arg("source")
            .arg(source_id.as_i16())
            .arg("attempt")
            .arg(attempt)
            .query_async(&mut conn)
            .await
            .map_err(|e| VigilError::Queue(format!("enqueue {job_id}: {e}")))?;
        Ok(())
    }

    /// Spawns the producer loop: scans the schedule hash once per second
    /// and enqueues each due fire exactly once across all instances.
    pub fn spawn_producer(&self, shutdown: &ShutdownSignal) -> tokio::task::JoinHandle<()> {
        let queue = self.clone();
        let mut shutdown_rx = shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PRODUCER_TICK);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("queue producer shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = queue.produce_due_fires().await {
                            tracing::warn!(error = %e, "producer tick failed");
                        }
                    }
                }
            }
        })
    }

    /// One producer tick: claim and enqueue every due fire.
    async fn produce_due_fires(&self) -> Result<(), VigilError> {
        let mut conn = self.connection().await?;
        let schedules: HashMap<String, String> = conn
            .hgetall(SCHEDULES_KEY)
            .await
            .map_err(|e| VigilError::Queue(format!("read schedules: {e}")))?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        for (job_id, raw) in schedules {
            let schedule: Schedule = match serde_json::from_str::<Schedule>(&raw) {
                Ok(schedule) if schedule.interval_ms > 0 => schedule,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(job_id, error = %e, "malformed schedule entry skipped");
                    continue;
                }
            };

            // One lock per (job, fire window); the NX winner enqueues.
            let window = now_ms / i64::try_from(schedule.interval_ms).unwrap_or(i64::MAX);
            let fire_key = format!("ingest:fire:{job_id}:{window}");
            let claimed: Option<String> = cmd("SET")
                .arg(&fire_key)
                .arg(1)
                .arg("NX")
                .arg("PX")
                .arg(schedule.interval_ms)
                .query_async(&mut conn)
                .await
                .map_err(|e| VigilError::Queue(format!("claim {fire_key}: {e}")))?;

            if claimed.is_some() {
                let Ok(source_id) = SourceId::try_from(schedule.source_id) else {
                    tracing::warn!(job_id, tag = schedule.source_id, "schedule for unknown source");
                    continue;
                };
                if let Err(e) = self.enqueue(&job_id, source_id, 0).await {
                    tracing::warn!(job_id, error = %e, "failed to enqueue due fire");
                }
            }
        }
        Ok(())
    }

    /// Spawns the worker loop: joins the consumer group and runs
    /// `processor` for each job, applying the retry policy.
    pub fn spawn_worker(
        &self,
        processor: JobProcessor,
        shutdown: &ShutdownSignal,
    ) -> tokio::task::JoinHandle<()> {
        let queue = self.clone();
        let mut shutdown_rx = shutdown.subscribe();
        let consumer = consumer_name();

        tokio::spawn(async move {
            if let Err(e) = queue.ensure_group().await {
                tracing::error!(error = %e, "worker could not join consumer group");
                return;
            }
            tracing::info!(consumer, stream = STREAM, "ingest worker listening");

            loop {
                let mut conn = match queue.connection().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!(error = %e, "worker lost redis connection");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let opts = StreamReadOptions::default()
                    .group(GROUP, &consumer)
                    .block(2000)
                    .count(10);

                let reply: Result<StreamReadReply, _> = tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("ingest worker draining and shutting down");
                        break;
                    }
                    reply = conn.xread_options(&[STREAM], &[">"], &opts) => reply,
                };

                let reply = match reply {
                    Ok(reply) => reply,
                    Err(e) => {
                        let text = e.to_string();
                        // Timeouts and empty reads are normal while idle.
                        if !text.contains("timed out") && !text.contains("nil") {
                            tracing::warn!(error = %e, "stream read error");
                        }
                        continue;
                    }
                };

                for key in reply.keys {
                    for entry in key.ids {
                        queue.process_entry(&mut conn, &entry.id, &entry.map, &processor).await;
                    }
                }
            }
        })
    }

    /// Handles one stream entry: dispatch, retry bookkeeping, ack.
    async fn process_entry(
        &self,
        conn: &mut deadpool_redis::Connection,
        entry_id: &str,
        fields: &HashMap<String, RedisValue>,
        processor: &JobProcessor,
    ) {
        let Some(job) = JobPayload::from_fields(fields) else {
            tracing::warn!(entry_id, "unparseable job entry acked and skipped");
            let _: Result<(), _> = conn.xack(STREAM, GROUP, &[entry_id]).await;
            return;
        };

        let result = match SourceId::try_from(job.source) {
            Ok(source_id) => processor(source_id).await,
            Err(tag) => Err(VigilError::Queue(format!("job for unknown source tag {tag}"))),
        };

        if let Err(error) = result {
            let attempts_used = job.attempt + 1;
            if attempts_used >= MAX_ATTEMPTS {
                (self.observer)(&job.job_id, attempts_used, &error);
                if let Err(e) = self.record_failed(&job, &error).await {
                    tracing::error!(job_id = %job.job_id, error = %e, "failed to retain failed job");
                }
            } else {
                let delay = retry_backoff(job.attempt);
                tracing::warn!(
                    job_id = %job.job_id,
                    attempt = attempts_used,
                    delay_secs = delay.as_secs(),
                    error = %error,
                    "job failed, scheduling retry"
                );
                let queue = self.clone();
                let job_id = job.job_id.clone();
                let source = job.source;
                let attempt = job.attempt + 1;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Ok(source_id) = SourceId::try_from(source) {
                        if let Err(e) = queue.enqueue(&job_id, source_id, attempt).await {
                            tracing::error!(job_id, error = %e, "failed to enqueue retry");
                        }
                    }
                });
            }
        }

        // Acked regardless: retries travel as fresh entries.
        if let Err(e) = conn.xack::<_, _, _, ()>(STREAM, GROUP, &[entry_id]).await {
            tracing::error!(entry_id, error = %e, "failed to ack job entry");
        }
    }

    /// Retains an exhausted job on the failed stream.
    async fn record_failed(&self, job: &JobPayload, error: &VigilError) -> Result<(), VigilError> {
        let mut conn = self.connection().await?;
        let _: String = cmd("XADD")
            .arg(FAILED_STREAM)
            .arg("*")
            .arg("job")
            .arg(&job.job_id)
            .arg("source")
            .arg(job.source)
            .arg("attempts")
            .arg(job.attempt + 1)
            .arg("error")
            .arg(error.to_string())
            .arg("failed_at")
            .arg(chrono::Utc::now().to_rfc3339())
            .query_async(&mut conn)
            .await
            .map_err(|e| VigilError::Queue(format!("record failed job: {e}")))?;
        Ok(())
    }

    /// Creates the consumer group if it does not exist yet.
    async fn ensure_group(&self) -> Result<(), VigilError> {
        let mut conn = self.connection().await?;
        let created: Result<(), _> = cmd("XGROUP")
            .arg("CREATE")
            .arg(STREAM)
            .arg(GROUP)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(()) => {
                tracing::info!(group = GROUP, "created consumer group");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(VigilError::Queue(format!("create group: {e}"))),
        }
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, VigilError> {
        self.pool
            .get()
            .await
            .map_err(|e| VigilError::Queue(format!("redis connection: {e}")))
    }
}

/// Parsed fields of one job stream entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPayload {
    /// Stable job id, `"ingest:<source>"`.
    pub job_id: String,
    /// Source enum tag.
    pub source: i16,
    /// Zero-based delivery attempt.
    pub attempt: u32,
}

impl JobPayload {
    /// Extracts the payload from raw stream fields; `None` when required
    /// fields are missing or unreadable.
    #[must_use]
    pub fn from_fields(fields: &HashMap<String, RedisValue>) -> Option<Self> {
        let job_id = string_field(fields, "job")?;
        let source = string_field(fields, "source")?.parse().ok()?;
        let attempt = string_field(fields, "attempt")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0);
        Some(Self {
            job_id,
            source,
            attempt,
        })
    }
}

/// Exponential backoff for the given zero-based failed attempt.
#[must_use]
pub fn retry_backoff(attempt: u32) -> Duration {
    RETRY_BASE_DELAY * 2u32.saturating_pow(attempt.min(8))
}

/// Reads a text field out of a stream entry map.
fn string_field(fields: &HashMap<String, RedisValue>, key: &str) -> Option<String> {
    match fields.get(key)? {
        RedisValue::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        RedisValue::SimpleString(text) => Some(text.clone()),
        RedisValue::Int(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Worker consumer name: hostname when available, random otherwise.
fn consumer_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.to_str().map(|s| format!("worker-{s}")))
        .unwrap_or_else(|| format!("worker-{}", uuid::Uuid::new_v4()))
}
