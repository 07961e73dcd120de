use std::time::Duration;

use invoice_protocol::MAX_MESSAGE_SIZE;
use serde::{Deserialize, Serialize};

/// Tunables for one node's issuance flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// How long to wait for each counterparty message.
    pub counterparty_timeout_ms: u64,
    /// How long to wait for the notary to answer a submission.
    pub notary_timeout_ms: u64,
    /// Largest frame a session will send or accept.
    pub max_message_size: usize,
    /// Buffered frames per session direction.
    pub channel_capacity: usize,
}

impl FlowConfig {
    pub fn counterparty_timeout(&self) -> Duration {
        Duration::from_millis(self.counterparty_timeout_ms)
    }

    pub fn notary_timeout(&self) -> Duration {
        Duration::from_millis(self.notary_timeout_ms)
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            counterparty_timeout_ms: 30_000,
            notary_timeout_ms: 30_000,
            max_message_size: MAX_MESSAGE_SIZE,
            channel_capacity: 16,
        }
    }
}
