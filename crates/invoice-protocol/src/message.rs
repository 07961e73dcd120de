use std::fmt;

use invoice_contract::{FinalizedTransaction, RejectionReason, SignedTransaction};
use invoice_crypto::Signature;
use invoice_types::{FlowId, PartyKey, TxId};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Why a counterparty refused to sign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclineReason {
    /// The counterparty's own run of the verifier failed.
    Rejected(RejectionReason),
    /// The initiator's signature did not check out.
    BadInitiatorSignature(String),
    /// The counterparty is not a required signer on this transaction.
    NotASigner,
    /// The counterparty's signing service refused.
    Refused(String),
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "verification failed: {reason}"),
            Self::BadInitiatorSignature(detail) => write!(f, "initiator signature invalid: {detail}"),
            Self::NotASigner => f.write_str("not a required signer"),
            Self::Refused(detail) => write!(f, "signing refused: {detail}"),
        }
    }
}

/// All messages exchanged on an issuance session.
///
/// A session carries, in order: `Propose`, then `SignatureResponse` or
/// `Decline`, then either `Finality` and `FinalityAck`, or `Abort`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FlowMessage {
    /// Initiator asks the counterparty to sign; `tx` already carries the
    /// initiator's signature.
    Propose {
        version: u32,
        flow_id: FlowId,
        tx: SignedTransaction,
    },
    SignatureResponse {
        flow_id: FlowId,
        signer: PartyKey,
        signature: Signature,
    },
    Decline {
        flow_id: FlowId,
        reason: DeclineReason,
    },
    /// The notarized transaction, for the counterparty to record.
    Finality {
        flow_id: FlowId,
        tx: FinalizedTransaction,
    },
    FinalityAck {
        flow_id: FlowId,
        tx_id: TxId,
    },
    /// The initiator gave up after the counterparty signed.
    Abort {
        flow_id: FlowId,
        reason: String,
    },
    Error {
        flow_id: FlowId,
        code: u32,
        message: String,
    },
}

impl FlowMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Propose { .. } => 1,
            Self::SignatureResponse { .. } => 2,
            Self::Decline { .. } => 3,
            Self::Finality { .. } => 4,
            Self::FinalityAck { .. } => 5,
            Self::Abort { .. } => 6,
            Self::Error { .. } => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Propose { .. } => "Propose",
            Self::SignatureResponse { .. } => "SignatureResponse",
            Self::Decline { .. } => "Decline",
            Self::Finality { .. } => "Finality",
            Self::FinalityAck { .. } => "FinalityAck",
            Self::Abort { .. } => "Abort",
            Self::Error { .. } => "Error",
        }
    }

    pub fn flow_id(&self) -> FlowId {
        match self {
            Self::Propose { flow_id, .. }
            | Self::SignatureResponse { flow_id, .. }
            | Self::Decline { flow_id, .. }
            | Self::Finality { flow_id, .. }
            | Self::FinalityAck { flow_id, .. }
            | Self::Abort { flow_id, .. }
            | Self::Error { flow_id, .. } => *flow_id,
        }
    }
}

pub mod error_codes {
    pub const VERSION_MISMATCH: u32 = 1;
    pub const UNEXPECTED_MESSAGE: u32 = 2;
    pub const INTERNAL: u32 = 500;
}
