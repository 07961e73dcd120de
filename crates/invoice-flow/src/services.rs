use std::sync::Arc;

use invoice_types::{FlowId, Party, TxId};

use crate::config::FlowConfig;
use crate::error::FlowResult;
use crate::state::{FlowCheckpoint, FlowStage};
use crate::traits::{
    CheckpointStore, IdentityService, NotaryService, SigningService, TransactionRecorder,
};

/// Everything one node needs to take part in a flow, on either side.
#[derive(Clone)]
pub struct FlowServices {
    pub me: Party,
    pub identity: Arc<dyn IdentityService>,
    pub signing: Arc<dyn SigningService>,
    pub notary: Arc<dyn NotaryService>,
    pub vault: Arc<dyn TransactionRecorder>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub config: FlowConfig,
}

impl FlowServices {
    pub(crate) async fn checkpoint(
        &self,
        flow_id: FlowId,
        state: FlowStage,
        tx_id: Option<TxId>,
    ) -> FlowResult<()> {
        self.checkpoints
            .record(FlowCheckpoint::new(flow_id, state, tx_id))
            .await
    }
}
