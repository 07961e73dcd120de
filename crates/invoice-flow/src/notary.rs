use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use invoice_contract::{FinalizedTransaction, SignedTransaction};
use invoice_crypto::SigningKey;
use invoice_types::{Party, StateRef, TxId};
use tracing::{debug, info, warn};

use crate::error::NotaryError;
use crate::traits::{FinalityStatus, NotaryService};

/// Single-node notary keeping its consumption record in memory.
pub struct InMemoryNotary {
    party: Party,
    key: SigningKey,
    inner: RwLock<NotaryState>,
}

#[derive(Default)]
struct NotaryState {
    consumed: HashMap<StateRef, TxId>,
    finalized: HashMap<TxId, FinalizedTransaction>,
}

impl InMemoryNotary {
    /// `key` must be the owning key of `party`.
    pub fn new(party: Party, key: SigningKey) -> Result<Self, NotaryError> {
        if key.party_key() != party.owning_key() {
            return Err(NotaryError::Unavailable(format!(
                "signing key does not belong to {party}"
            )));
        }
        Ok(Self {
            party,
            key,
            inner: RwLock::new(NotaryState::default()),
        })
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    /// Number of transactions finalized so far.
    pub fn finalized_count(&self) -> usize {
        self.inner
            .read()
            .map(|state| state.finalized.len())
            .unwrap_or(0)
    }

    /// Which transaction consumed `state_ref`, if any.
    pub fn consumed_by(&self, state_ref: &StateRef) -> Option<TxId> {
        self.inner.read().ok()?.consumed.get(state_ref).copied()
    }
}

#[async_trait]
impl NotaryService for InMemoryNotary {
    async fn submit(&self, tx: SignedTransaction) -> Result<FinalizedTransaction, NotaryError> {
        let tx_id = tx.id()?;
        if tx.tx().notary != self.party {
            warn!(tx_id = %tx_id.short_hex(), named = %tx.tx().notary, "wrong notary");
            return Err(NotaryError::WrongNotary {
                expected: self.party.name().to_owned(),
                actual: tx.tx().notary.name().to_owned(),
            });
        }
        tx.verify_required_signatures()?;

        let mut state = self
            .inner
            .write()
            .map_err(|_| NotaryError::Unavailable("notary state lock poisoned".into()))?;

        if let Some(existing) = state.finalized.get(&tx_id) {
            debug!(tx_id = %tx_id.short_hex(), "resubmission of finalized transaction");
            return Ok(existing.clone());
        }

        let inputs = tx.tx().input_refs();
        let conflicts: Vec<StateRef> = inputs
            .iter()
            .filter(|input| state.consumed.contains_key(input))
            .copied()
            .collect();
        if !conflicts.is_empty() {
            warn!(tx_id = %tx_id.short_hex(), conflicts = conflicts.len(), "double spend refused");
            return Err(NotaryError::ConflictingConsumption { conflicts });
        }

        let signature = self.key.sign_tx(&tx_id);
        let finalized = FinalizedTransaction::new(tx, signature)?;
        for input in inputs {
            state.consumed.insert(input, tx_id);
        }
        state.finalized.insert(tx_id, finalized.clone());
        info!(tx_id = %tx_id.short_hex(), notary = %self.party, "transaction notarized");
        Ok(finalized)
    }

    async fn finality_status(&self, tx_id: &TxId) -> Result<FinalityStatus, NotaryError> {
        let state = self
            .inner
            .read()
            .map_err(|_| NotaryError::Unavailable("notary state lock poisoned".into()))?;
        Ok(match state.finalized.get(tx_id) {
            Some(tx) => FinalityStatus::Finalized(Box::new(tx.clone())),
            None => FinalityStatus::NotFound,
        })
    }
}
