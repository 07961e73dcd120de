use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use invoice_types::FlowId;
use tracing::debug;

use crate::error::{FlowError, FlowResult};
use crate::state::{FlowCheckpoint, FlowStage, ResponderState};
use crate::traits::CheckpointStore;

/// Checkpoint journal held in memory, one append-only list per flow.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    inner: RwLock<HashMap<FlowId, Vec<FlowCheckpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flows whose last checkpoint is not terminal.
    pub fn in_flight(&self) -> FlowResult<Vec<FlowId>> {
        let journal = self
            .inner
            .read()
            .map_err(|_| FlowError::Storage("checkpoint lock poisoned".into()))?;
        let mut flows: Vec<FlowId> = journal
            .iter()
            .filter(|(_, history)| {
                history.last().is_some_and(|last| match &last.state {
                    FlowStage::Initiator(state) => !state.is_terminal(),
                    FlowStage::Responder(state) => !matches!(
                        state,
                        ResponderState::Declined { .. }
                            | ResponderState::Recorded
                            | ResponderState::Aborted { .. }
                    ),
                })
            })
            .map(|(flow_id, _)| *flow_id)
            .collect();
        flows.sort();
        Ok(flows)
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn record(&self, checkpoint: FlowCheckpoint) -> FlowResult<()> {
        debug!(
            flow_id = %checkpoint.flow_id.short_id(),
            state = %checkpoint.state,
            "checkpoint"
        );
        let mut journal = self
            .inner
            .write()
            .map_err(|_| FlowError::Storage("checkpoint lock poisoned".into()))?;
        journal.entry(checkpoint.flow_id).or_default().push(checkpoint);
        Ok(())
    }

    async fn latest(&self, flow_id: &FlowId) -> FlowResult<Option<FlowCheckpoint>> {
        let journal = self
            .inner
            .read()
            .map_err(|_| FlowError::Storage("checkpoint lock poisoned".into()))?;
        Ok(journal.get(flow_id).and_then(|history| history.last().cloned()))
    }

    async fn history(&self, flow_id: &FlowId) -> FlowResult<Vec<FlowCheckpoint>> {
        let journal = self
            .inner
            .read()
            .map_err(|_| FlowError::Storage("checkpoint lock poisoned".into()))?;
        Ok(journal.get(flow_id).cloned().unwrap_or_default())
    }
}
