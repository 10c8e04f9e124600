//! Durable task queue and periodic schedules.
//!
//! Tasks are JSON payloads on a Redis list. Workers reserve a task by moving
//! it atomically onto a processing list and remove it once handled, so a
//! crashed worker leaves its task behind for the startup recovery sweep:
//! at-least-once delivery, with idempotent handlers making that safe.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Name of the queue every task goes through.
pub const TASKS_QUEUE: &str = "default";

/// A unit of background work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    /// Ensure metadata for `(address, chain_id)` is known or its retry
    /// budget decremented.
    ProcessContractMetadata {
        /// `0x`-prefixed hex address.
        address: String,
        chain_id: u64,
        #[serde(default)]
        skip_attempt_check: bool,
    },
    /// Refresh names and delegate-call trust of the well-known Safe
    /// deployments.
    UpdateSafeContractsInfo,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::ProcessContractMetadata { .. } => "process_contract_metadata",
            Task::UpdateSafeContractsInfo => "update_safe_contracts_info",
        }
    }
}

/// A task with its delivery envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: String,
    #[serde(flatten)]
    pub task: Task,
}

/// Producer/consumer handle to the Redis task queue.
#[derive(Clone)]
pub struct TaskQueue {
    redis: ConnectionManager,
    queue: String,
    processing: String,
}

impl TaskQueue {
    pub fn new(redis: ConnectionManager) -> Self {
        Self::named(redis, TASKS_QUEUE)
    }

    pub fn named(redis: ConnectionManager, queue: &str) -> Self {
        Self {
            redis,
            queue: queue.to_owned(),
            processing: format!("{queue}.processing"),
        }
    }

    /// Enqueue a one-shot task.
    pub async fn enqueue(&self, task: Task) -> Result<(), redis::RedisError> {
        let message = TaskMessage { id: Uuid::new_v4().simple().to_string(), task };
        let payload = serde_json::to_string(&message).expect("task messages serialize");
        let mut redis = self.redis.clone();
        redis.lpush::<_, _, ()>(&self.queue, &payload).await?;
        debug!(
            target: "queue",
            task = message.task.name(),
            id = %message.id,
            "task enqueued"
        );
        Ok(())
    }

    /// Atomically reserve the oldest task, keeping it on the processing list
    /// until [`complete`](Self::complete) is called with the same payload.
    pub async fn reserve(&self) -> Result<Option<String>, redis::RedisError> {
        let mut redis = self.redis.clone();
        redis.rpoplpush(&self.queue, &self.processing).await
    }

    /// Acknowledge a reserved task.
    pub async fn complete(&self, payload: &str) -> Result<(), redis::RedisError> {
        let mut redis = self.redis.clone();
        redis.lrem::<_, _, ()>(&self.processing, 1, payload).await
    }

    /// Move deliveries stranded on the processing list by a dead worker back
    /// onto the queue. Called once on startup, before workers spawn.
    pub async fn recover_stranded(&self) -> Result<u64, redis::RedisError> {
        let mut redis = self.redis.clone();
        let mut recovered = 0;
        while let Some(payload) =
            redis.rpoplpush::<_, _, Option<String>>(&self.processing, &self.queue).await?
        {
            warn!(target: "queue", %payload, "requeued stranded task");
            recovered += 1;
        }
        Ok(recovered)
    }
}

/// One periodic enqueue rule.
pub struct ScheduleEntry {
    pub schedule: Schedule,
    pub job: ScheduledJob,
}

/// The periodic jobs the service runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledJob {
    /// Midnight: re-enqueue every contract still missing an ABI.
    RescanContractsWithoutAbi,
    /// 05:00: refresh the metadata of every known proxy.
    RefreshProxyContracts,
    /// Hourly: update the well-known Safe contract rows.
    UpdateSafeContracts,
}

/// The service's fixed crontab.
pub fn default_schedules() -> Vec<ScheduleEntry> {
    [
        ("0 0 0 * * * *", ScheduledJob::RescanContractsWithoutAbi),
        ("0 0 5 * * * *", ScheduledJob::RefreshProxyContracts),
        ("0 0 * * * * *", ScheduledJob::UpdateSafeContracts),
    ]
    .into_iter()
    .map(|(expression, job)| ScheduleEntry {
        schedule: Schedule::from_str(expression).expect("static cron expression parses"),
        job,
    })
    .collect()
}

/// Jobs whose next firing time fell inside `(last_tick, now]`.
pub fn due_jobs(
    entries: &[ScheduleEntry],
    last_tick: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<ScheduledJob> {
    entries
        .iter()
        .filter(|entry| {
            entry
                .schedule
                .after(&last_tick)
                .next()
                .is_some_and(|fire_at| fire_at <= now)
        })
        .map(|entry| entry.job)
        .collect()
}

/// Handler outcome logging shared by workers: failed tasks are logged and
/// dropped, never re-raised into the queue; durability comes from the
/// periodic rescans.
pub fn log_task_result(message: &TaskMessage, result: anyhow::Result<()>) {
    match result {
        Ok(()) => info!(
            target: "queue",
            task = message.task.name(),
            id = %message.id,
            "task finished"
        ),
        Err(err) => error!(
            target: "queue",
            task = message.task.name(),
            id = %message.id,
            %err,
            "task failed"
        ),
    }
}
