use std::fmt;

use invoice_crypto::HasherError;
use invoice_types::PartyKey;
use serde::{Deserialize, Serialize};

use crate::command::InvoiceCommand;

/// Which participant role a missing signer was expected to fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignerRole {
    Issuer,
    Owner,
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issuer => f.write_str("issuer"),
            Self::Owner => f.write_str("owner"),
        }
    }
}

/// Why the verifier refused a transaction.
///
/// Variants are listed in the order the rules run; the first failing rule is
/// the one reported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RejectionReason {
    #[error("transaction must carry exactly one command, found {count}")]
    MalformedTransaction { count: usize },

    #[error("unrecognised command {name:?} from contract {contract:?}")]
    UnrecognizedCommand { contract: String, name: String },

    #[error("{command} transactions have no verification rules yet")]
    CommandNotImplemented { command: InvoiceCommand },

    #[error("issuance must have zero inputs, found {count}")]
    UnexpectedInputs { count: usize },

    #[error("issuance must have exactly one output, found {count}")]
    WrongOutputCount { count: usize },

    #[error("output must be an invoice state, found {type_name}")]
    WrongOutputType { type_name: String },

    #[error("amount must be greater than zero, got {amount}")]
    NonPositiveAmount { amount: i64 },

    #[error("invoice must have two distinct participants, found {distinct}")]
    WrongParticipantCount { distinct: usize },

    #[error("{role} {key} must be a required signer")]
    MissingRequiredSigner { role: SignerRole, key: PartyKey },
}

impl RejectionReason {
    /// Stable rule name for logs and CLI output.
    pub fn rule(&self) -> &'static str {
        match self {
            Self::MalformedTransaction { .. } => "MalformedTransaction",
            Self::UnrecognizedCommand { .. } => "UnrecognizedCommand",
            Self::CommandNotImplemented { .. } => "CommandNotImplemented",
            Self::UnexpectedInputs { .. } => "UnexpectedInputs",
            Self::WrongOutputCount { .. } => "WrongOutputCount",
            Self::WrongOutputType { .. } => "WrongOutputType",
            Self::NonPositiveAmount { .. } => "NonPositiveAmount",
            Self::WrongParticipantCount { .. } => "WrongParticipantCount",
            Self::MissingRequiredSigner { .. } => "MissingRequiredSigner",
        }
    }
}

/// Errors from handling transaction values (hashing, signature sets).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("cannot compute transaction id: {0}")]
    Hash(#[from] HasherError),

    #[error("signature by {key} does not cover this transaction")]
    InvalidSignature { key: PartyKey },

    #[error("signature by {key} was not requested by any command")]
    UnexpectedSigner { key: PartyKey },

    #[error("missing signatures from {}", format_keys(.missing))]
    MissingSignatures { missing: Vec<PartyKey> },

    #[error("notary signature does not cover this transaction")]
    InvalidNotarySignature,
}

fn format_keys(keys: &[PartyKey]) -> String {
    keys.iter()
        .map(PartyKey::short_id)
        .collect::<Vec<_>>()
        .join(", ")
}
