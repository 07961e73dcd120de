use std::fmt;

use chrono::{DateTime, Utc};
use invoice_types::{FlowId, TxId};
use serde::{Deserialize, Serialize};

/// Initiator's view of one issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssuanceState {
    Built,
    LocallyVerified,
    /// Own signature attached, proposal sent.
    AwaitingCounterpartySignature,
    FullySigned,
    /// Submitted to the notary. Cancellation from here on cannot undo it.
    Notarizing,
    Finalized,
    Aborted { reason: String },
    /// Lost contact after notary submission.
    OutcomeUnknown,
}

impl IssuanceState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finalized | Self::Aborted { .. } | Self::OutcomeUnknown
        )
    }
}

impl fmt::Display for IssuanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Built => f.write_str("built"),
            Self::LocallyVerified => f.write_str("locally-verified"),
            Self::AwaitingCounterpartySignature => f.write_str("awaiting-counterparty-signature"),
            Self::FullySigned => f.write_str("fully-signed"),
            Self::Notarizing => f.write_str("notarizing"),
            Self::Finalized => f.write_str("finalized"),
            Self::Aborted { reason } => write!(f, "aborted({reason})"),
            Self::OutcomeUnknown => f.write_str("outcome-unknown"),
        }
    }
}

/// Counterparty's view of one issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponderState {
    SessionOpened,
    AskedToSign,
    Signed,
    Declined { reason: String },
    /// Finalized transaction checked and stored in the vault.
    Recorded,
    /// The initiator gave up after we signed, or the session broke.
    Aborted { reason: String },
}

impl fmt::Display for ResponderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionOpened => f.write_str("session-opened"),
            Self::AskedToSign => f.write_str("asked-to-sign"),
            Self::Signed => f.write_str("signed"),
            Self::Declined { reason } => write!(f, "declined({reason})"),
            Self::Recorded => f.write_str("recorded"),
            Self::Aborted { reason } => write!(f, "aborted({reason})"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowRole {
    Initiator,
    Responder,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStage {
    Initiator(IssuanceState),
    Responder(ResponderState),
}

impl FlowStage {
    pub fn role(&self) -> FlowRole {
        match self {
            Self::Initiator(_) => FlowRole::Initiator,
            Self::Responder(_) => FlowRole::Responder,
        }
    }
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiator(state) => write!(f, "initiator:{state}"),
            Self::Responder(state) => write!(f, "responder:{state}"),
        }
    }
}

/// One persisted step of a flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCheckpoint {
    pub flow_id: FlowId,
    pub role: FlowRole,
    pub state: FlowStage,
    pub tx_id: Option<TxId>,
    pub recorded_at: DateTime<Utc>,
}

impl FlowCheckpoint {
    pub fn new(flow_id: FlowId, state: FlowStage, tx_id: Option<TxId>) -> Self {
        Self {
            flow_id,
            role: state.role(),
            state,
            tx_id,
            recorded_at: Utc::now(),
        }
    }
}
