//! Task execution and the periodic scheduler.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use sqlx::PgPool;
use tracing::{error, info_span, warn, Instrument};

use decoder_core::utils::parse_address;
use decoder_db::Contract;

use crate::queue::{
    default_schedules, due_jobs, log_task_result, ScheduleEntry, ScheduledJob, Task,
    TaskMessage, TaskQueue,
};
use crate::services::contract_metadata::ContractMetadataService;
use crate::services::safe_contracts::update_safe_contracts_info;

const IDLE_POLL: Duration = Duration::from_secs(1);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Cooperative worker draining the task queue.
pub struct TaskWorker {
    queue: TaskQueue,
    pool: PgPool,
    contract_metadata: Arc<ContractMetadataService>,
    trusted_for_delegate_call: HashSet<String>,
}

impl TaskWorker {
    pub fn new(
        queue: TaskQueue,
        pool: PgPool,
        contract_metadata: Arc<ContractMetadataService>,
        trusted_for_delegate_call: HashSet<String>,
    ) -> Self {
        Self { queue, pool, contract_metadata, trusted_for_delegate_call }
    }

    /// Poll-execute-ack loop. Runs until the task is aborted; a reservation
    /// lost to an abort is requeued by the next startup sweep.
    pub async fn run(self) {
        loop {
            match self.queue.reserve().await {
                Ok(Some(payload)) => {
                    self.handle(&payload).await;
                    if let Err(err) = self.queue.complete(&payload).await {
                        warn!(target: "worker", %err, "cannot ack task");
                    }
                }
                Ok(None) => tokio::time::sleep(IDLE_POLL).await,
                Err(err) => {
                    error!(target: "worker", %err, "cannot reserve task");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    async fn handle(&self, payload: &str) {
        let message: TaskMessage = match serde_json::from_str(payload) {
            Ok(message) => message,
            Err(err) => {
                error!(target: "worker", %err, payload, "dropping undecodable task");
                return;
            }
        };
        let span = info_span!(
            "task",
            task = message.task.name(),
            id = %message.id,
            args = %payload
        );
        let result = self.execute(&message.task).instrument(span).await;
        log_task_result(&message, result);
    }

    async fn execute(&self, task: &Task) -> anyhow::Result<()> {
        match task {
            Task::ProcessContractMetadata { address, chain_id, skip_attempt_check } => {
                let address = parse_address(address)
                    .with_context(|| format!("invalid task address {address}"))?;
                self.contract_metadata
                    .process(address, *chain_id, *skip_attempt_check)
                    .await?;
            }
            Task::UpdateSafeContractsInfo => {
                update_safe_contracts_info(&self.pool, &self.trusted_for_delegate_call).await?;
            }
        }
        Ok(())
    }
}

/// Translates the fixed crontab into queue traffic, one check per minute.
pub struct Scheduler {
    entries: Vec<ScheduleEntry>,
    queue: TaskQueue,
    pool: PgPool,
    max_retries: i32,
}

impl Scheduler {
    pub fn new(queue: TaskQueue, pool: PgPool, max_retries: i32) -> Self {
        Self { entries: default_schedules(), queue, pool, max_retries }
    }

    pub async fn run(self) {
        let mut last_tick = Utc::now();
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        interval.tick().await;
        loop {
            interval.tick().await;
            let now = Utc::now();
            for job in due_jobs(&self.entries, last_tick, now) {
                if let Err(err) = self.fire(job).await {
                    error!(target: "scheduler", ?job, %err, "periodic job failed");
                }
            }
            last_tick = now;
        }
    }

    async fn fire(&self, job: ScheduledJob) -> anyhow::Result<()> {
        match job {
            ScheduledJob::RescanContractsWithoutAbi => {
                let mut enqueued = 0usize;
                let mut contracts = Contract::stream_without_abi(&self.pool, self.max_retries);
                while let Some(contract) = contracts.try_next().await? {
                    self.enqueue_refresh(&contract).await?;
                    enqueued += 1;
                }
                tracing::info!(target: "scheduler", enqueued, "rescanned contracts without ABI");
            }
            ScheduledJob::RefreshProxyContracts => {
                let mut enqueued = 0usize;
                let mut proxies = Contract::stream_proxies(&self.pool);
                while let Some(contract) = proxies.try_next().await? {
                    self.enqueue_refresh(&contract).await?;
                    enqueued += 1;
                }
                tracing::info!(target: "scheduler", enqueued, "refreshed proxy contracts");
            }
            ScheduledJob::UpdateSafeContracts => {
                self.queue.enqueue(Task::UpdateSafeContractsInfo).await?;
            }
        }
        Ok(())
    }

    async fn enqueue_refresh(&self, contract: &Contract) -> anyhow::Result<()> {
        self.queue
            .enqueue(Task::ProcessContractMetadata {
                address: format!("0x{}", hex::encode(&contract.address)),
                chain_id: contract.chain_id as u64,
                skip_attempt_check: true,
            })
            .await?;
        Ok(())
    }
}
