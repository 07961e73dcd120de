use async_trait::async_trait;
use invoice_contract::{FinalizedTransaction, InvoiceState, SignedTransaction};
use invoice_crypto::{Signature, VerifyingKey};
use invoice_protocol::FlowMessage;
use invoice_types::{FlowId, Party, PartyKey, TxId};

use crate::error::{FlowResult, NotaryError, SigningError};
use crate::state::FlowCheckpoint;

/// Resolves participant references to identities.
pub trait IdentityService: Send + Sync {
    /// Look up a party by legal name.
    fn well_known_party(&self, name: &str) -> Option<Party>;

    /// Look up the party owning `key`.
    fn party_from_key(&self, key: &PartyKey) -> Option<Party>;
}

/// Holds private keys and signs on behalf of the local node.
#[async_trait]
pub trait SigningService: Send + Sync {
    async fn sign(&self, bytes: &[u8], signer: PartyKey) -> Result<Signature, SigningError>;

    fn verify_signature(&self, bytes: &[u8], signature: &Signature, signer: &PartyKey) -> bool {
        VerifyingKey::from_party_key(signer)
            .and_then(|key| key.verify(bytes, signature))
            .is_ok()
    }
}

/// Answer to a finality query.
#[derive(Clone, Debug)]
pub enum FinalityStatus {
    Finalized(Box<FinalizedTransaction>),
    NotFound,
}

/// Serializes transactions against each other and countersigns.
///
/// At most one finalized transaction may consume any given input, across
/// every submitter.
#[async_trait]
pub trait NotaryService: Send + Sync {
    async fn submit(&self, tx: SignedTransaction) -> Result<FinalizedTransaction, NotaryError>;

    async fn finality_status(&self, tx_id: &TxId) -> Result<FinalityStatus, NotaryError>;
}

/// Local store of finalized transactions.
#[async_trait]
pub trait TransactionRecorder: Send + Sync {
    async fn record(&self, tx: FinalizedTransaction) -> FlowResult<()>;

    async fn get(&self, tx_id: &TxId) -> FlowResult<Option<FinalizedTransaction>>;

    /// Every invoice produced by a recorded transaction.
    async fn invoices(&self) -> FlowResult<Vec<InvoiceState>>;
}

/// Journal of flow state transitions.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn record(&self, checkpoint: FlowCheckpoint) -> FlowResult<()>;

    async fn latest(&self, flow_id: &FlowId) -> FlowResult<Option<FlowCheckpoint>>;

    async fn history(&self, flow_id: &FlowId) -> FlowResult<Vec<FlowCheckpoint>>;
}

/// One side of an ordered, reliable, point-to-point session.
#[async_trait]
pub trait FlowSession: Send {
    fn flow_id(&self) -> FlowId;

    /// The party at the other end.
    fn counterparty(&self) -> &Party;

    async fn send(&mut self, msg: FlowMessage) -> FlowResult<()>;

    async fn receive(&mut self) -> FlowResult<FlowMessage>;
}

/// Opens sessions to other parties.
#[async_trait]
pub trait Messaging: Send + Sync {
    async fn open_session(
        &self,
        flow_id: FlowId,
        initiator: &Party,
        counterparty: &Party,
    ) -> FlowResult<Box<dyn FlowSession>>;
}
