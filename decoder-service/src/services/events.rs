//! Handling of wallet execution events coming off the message bus.

use serde::Deserialize;
use tracing::{debug, error};

use decoder_core::{
    multisend,
    utils::{is_checksum_address, parse_address, parse_hex_data},
    Address,
};

use crate::queue::{Task, TaskQueue};

const EXECUTED_MULTISIG_TRANSACTION: &str = "EXECUTED_MULTISIG_TRANSACTION";

/// Raw event envelope. Every field arrives as a string; validation happens
/// in [`EventsService::parse_event`].
#[derive(Debug, Deserialize)]
struct TransactionServiceEvent {
    #[serde(rename = "type")]
    event_type: Option<String>,
    #[serde(rename = "chainId")]
    chain_id: Option<String>,
    to: Option<String>,
    data: Option<String>,
}

/// A validated execution event.
#[derive(Debug, PartialEq, Eq)]
pub struct ExecutedTransaction {
    pub chain_id: u64,
    pub to: Address,
    pub data: Option<Vec<u8>>,
}

impl ExecutedTransaction {
    /// Every contract the transaction touched: the outer `to` plus the inner
    /// targets when the payload is a MultiSend batch.
    pub fn contract_addresses(&self) -> Vec<Address> {
        let mut addresses = vec![self.to];
        if let Some(data) = &self.data {
            for inner in multisend::target_addresses(data) {
                if !addresses.contains(&inner) {
                    addresses.push(inner);
                }
            }
        }
        addresses
    }
}

pub struct EventsService {
    queue: TaskQueue,
}

impl EventsService {
    pub fn new(queue: TaskQueue) -> Self {
        Self { queue }
    }

    /// Handle one message off the bus: validate, extract the touched
    /// addresses and enqueue one metadata download per address. Messages
    /// failing validation are logged and dropped.
    pub async fn process_event(&self, message: &str) {
        let Some(event) = Self::parse_event(message) else {
            return;
        };
        for address in event.contract_addresses() {
            let task = Task::ProcessContractMetadata {
                address: format!("{address:?}"),
                chain_id: event.chain_id,
                skip_attempt_check: false,
            };
            if let Err(err) = self.queue.enqueue(task).await {
                error!(target: "events", %err, "cannot enqueue metadata task");
            }
        }
    }

    /// Validate an incoming message. Unsupported event types and malformed
    /// envelopes yield `None`.
    pub fn parse_event(message: &str) -> Option<ExecutedTransaction> {
        let event: TransactionServiceEvent = match serde_json::from_str(message) {
            Ok(event) => event,
            Err(err) => {
                error!(target: "events", %err, "unsupported message, cannot parse as JSON");
                return None;
            }
        };

        if event.event_type.as_deref() != Some(EXECUTED_MULTISIG_TRANSACTION) {
            debug!(target: "events", event_type = ?event.event_type, "ignoring event");
            return None;
        }

        let chain_id = event
            .chain_id
            .as_deref()
            .filter(|raw| !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|raw| raw.parse::<u64>().ok());
        let to = event
            .to
            .as_deref()
            .filter(|raw| is_checksum_address(raw))
            .and_then(parse_address);
        let data = match event.data.as_deref() {
            None => Some(None),
            Some(raw) => parse_hex_data(raw).map(Some),
        };

        match (chain_id, to, data) {
            (Some(chain_id), Some(to), Some(data)) => {
                Some(ExecutedTransaction { chain_id, to, data })
            }
            _ => {
                error!(target: "events", message, "invalid execution event");
                None
            }
        }
    }
}
