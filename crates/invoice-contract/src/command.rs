use std::collections::BTreeSet;
use std::fmt;

use invoice_types::PartyKey;
use serde::{Deserialize, Serialize};

/// State transitions the invoice contract knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceCommand {
    /// Create a new invoice with no inputs.
    Issue,
    /// Move an invoice to a new owner.
    Transfer,
    /// Retire an invoice from the ledger.
    Exit,
}

impl fmt::Display for InvoiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issue => f.write_str("Issue"),
            Self::Transfer => f.write_str("Transfer"),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

/// The intent carried by a command.
///
/// Transactions on a shared ledger can carry commands owned by other
/// contracts; those arrive as `Foreign` and the invoice contract refuses them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandData {
    Invoice(InvoiceCommand),
    Foreign { contract: String, name: String },
}

impl From<InvoiceCommand> for CommandData {
    fn from(command: InvoiceCommand) -> Self {
        Self::Invoice(command)
    }
}

/// A command together with the keys that must sign for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub value: CommandData,
    pub signers: BTreeSet<PartyKey>,
}

impl Command {
    pub fn new(value: impl Into<CommandData>, signers: impl IntoIterator<Item = PartyKey>) -> Self {
        Self {
            value: value.into(),
            signers: signers.into_iter().collect(),
        }
    }
}
