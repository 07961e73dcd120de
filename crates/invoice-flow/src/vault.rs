use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use invoice_contract::{FinalizedTransaction, InvoiceState};
use invoice_types::TxId;
use tracing::debug;

use crate::error::{FlowError, FlowResult};
use crate::traits::TransactionRecorder;

/// Per-node store of finalized transactions.
#[derive(Default)]
pub struct InMemoryVault {
    inner: RwLock<BTreeMap<TxId, FinalizedTransaction>>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|txs| txs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TransactionRecorder for InMemoryVault {
    /// Re-checks every signature before storing. Recording the same
    /// transaction twice is a no-op.
    async fn record(&self, tx: FinalizedTransaction) -> FlowResult<()> {
        tx.verify()?;
        let tx_id = tx.id()?;
        let mut txs = self
            .inner
            .write()
            .map_err(|_| FlowError::Storage("vault lock poisoned".into()))?;
        txs.entry(tx_id).or_insert(tx);
        debug!(tx_id = %tx_id.short_hex(), "transaction recorded");
        Ok(())
    }

    async fn get(&self, tx_id: &TxId) -> FlowResult<Option<FinalizedTransaction>> {
        let txs = self
            .inner
            .read()
            .map_err(|_| FlowError::Storage("vault lock poisoned".into()))?;
        Ok(txs.get(tx_id).cloned())
    }

    async fn invoices(&self) -> FlowResult<Vec<InvoiceState>> {
        let txs = self
            .inner
            .read()
            .map_err(|_| FlowError::Storage("vault lock poisoned".into()))?;
        Ok(txs
            .values()
            .flat_map(|tx| tx.tx().invoice_outputs().cloned())
            .collect())
    }
}
