use invoice_contract::{RejectionReason, TransactionError};
use invoice_protocol::{DeclineReason, ProtocolError};
use invoice_types::{PartyKey, StateRef, TxId};
use thiserror::Error;

/// Terminal failures of an issuance flow.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    #[error("transaction rejected: {0}")]
    Rejected(#[from] RejectionReason),

    #[error("signature from {signer} does not match the transaction")]
    SignatureMismatch { signer: PartyKey },

    #[error("{party} declined to sign: {reason}")]
    CounterpartyDeclined { party: String, reason: DeclineReason },

    #[error("notary reports conflicting consumption of {} input(s)", conflicts.len())]
    ConflictingConsumption { conflicts: Vec<StateRef> },

    #[error("notary rejected the transaction: {0}")]
    NotaryRejected(String),

    #[error("communication failure: {0}")]
    CommunicationFailure(String),

    #[error("flow cancelled before notarization")]
    Cancelled,

    /// The transaction reached the notary but no answer came back; it may or
    /// may not be final. Re-query with the notary's finality status.
    #[error("outcome of transaction {tx_id} is unknown")]
    OutcomeUnknown { tx_id: TxId },

    #[error("finality received for {received}, expected {expected}")]
    FinalityMismatch { expected: TxId, received: TxId },

    #[error("unknown party: {0}")]
    UnknownParty(String),

    #[error("signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl FlowError {
    /// Stable label for logs and checkpoints.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected(reason) => reason.rule(),
            Self::SignatureMismatch { .. } => "SignatureMismatch",
            Self::CounterpartyDeclined { .. } => "CounterpartyDeclined",
            Self::ConflictingConsumption { .. } => "ConflictingConsumption",
            Self::NotaryRejected(_) => "NotaryRejected",
            Self::CommunicationFailure(_) => "CommunicationFailure",
            Self::Cancelled => "Cancelled",
            Self::OutcomeUnknown { .. } => "OutcomeUnknown",
            Self::FinalityMismatch { .. } => "FinalityMismatch",
            Self::UnknownParty(_) => "UnknownParty",
            Self::Signing(_) => "Signing",
            Self::Protocol(_) => "Protocol",
            Self::Transaction(_) => "Transaction",
            Self::Storage(_) => "Storage",
        }
    }
}

/// Failures reported by a signing service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    #[error("no signing key held for {0}")]
    UnknownKey(PartyKey),

    #[error("signing refused: {0}")]
    Refused(String),

    #[error("key store unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by a notary service.
#[derive(Debug, Clone, Error)]
pub enum NotaryError {
    #[error("inputs already consumed by another transaction: {conflicts:?}")]
    ConflictingConsumption { conflicts: Vec<StateRef> },

    #[error("transaction names notary {actual}, this is {expected}")]
    WrongNotary { expected: String, actual: String },

    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionError),

    #[error("notary unavailable: {0}")]
    Unavailable(String),
}

pub type FlowResult<T> = Result<T, FlowError>;
