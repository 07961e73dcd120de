use async_trait::async_trait;
use bytes::Bytes;
use invoice_protocol::{FlowCodec, FlowMessage, ProtocolError};
use invoice_types::{FlowId, Party};
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::FlowConfig;
use crate::error::{FlowError, FlowResult};
use crate::traits::FlowSession;

/// In-process session end: framed messages over a pair of tokio channels.
pub struct ChannelSession {
    flow_id: FlowId,
    counterparty: Party,
    max_message_size: usize,
    outbound: mpsc::Sender<Bytes>,
    inbound: mpsc::Receiver<Bytes>,
}

impl ChannelSession {
    /// Two connected ends: the first belongs to `a` and talks to `b`.
    pub fn pair(flow_id: FlowId, a: Party, b: Party, config: &FlowConfig) -> (Self, Self) {
        let capacity = config.channel_capacity.max(1);
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);
        let a_end = Self {
            flow_id,
            counterparty: b,
            max_message_size: config.max_message_size,
            outbound: a_tx,
            inbound: a_rx,
        };
        let b_end = Self {
            flow_id,
            counterparty: a,
            max_message_size: config.max_message_size,
            outbound: b_tx,
            inbound: b_rx,
        };
        (a_end, b_end)
    }
}

#[async_trait]
impl FlowSession for ChannelSession {
    fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    fn counterparty(&self) -> &Party {
        &self.counterparty
    }

    async fn send(&mut self, msg: FlowMessage) -> FlowResult<()> {
        let frame = FlowCodec::encode(&msg)?;
        if frame.len() > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge {
                size: frame.len(),
                max: self.max_message_size,
            }
            .into());
        }
        debug!(
            flow_id = %self.flow_id.short_id(),
            to = %self.counterparty,
            msg = msg.type_name(),
            "send"
        );
        self.outbound.send(frame).await.map_err(|_| {
            FlowError::CommunicationFailure(format!("session to {} closed", self.counterparty))
        })
    }

    async fn receive(&mut self) -> FlowResult<FlowMessage> {
        let frame = self.inbound.recv().await.ok_or_else(|| {
            FlowError::CommunicationFailure(format!("session from {} closed", self.counterparty))
        })?;
        if frame.len() > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge {
                size: frame.len(),
                max: self.max_message_size,
            }
            .into());
        }
        let (msg, consumed) = FlowCodec::decode(&frame)?;
        if consumed != frame.len() {
            return Err(ProtocolError::FramingError(format!(
                "{} trailing bytes after frame",
                frame.len() - consumed
            ))
            .into());
        }
        if msg.flow_id() != self.flow_id {
            return Err(FlowError::CommunicationFailure(format!(
                "message for flow {} on session {}",
                msg.flow_id().short_id(),
                self.flow_id.short_id()
            )));
        }
        debug!(
            flow_id = %self.flow_id.short_id(),
            from = %self.counterparty,
            msg = msg.type_name(),
            "receive"
        );
        Ok(msg)
    }
}
