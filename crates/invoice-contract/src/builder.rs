use invoice_types::{Party, PartyKey};

use crate::command::{Command, CommandData, InvoiceCommand};
use crate::contract::InvoiceContract;
use crate::state::{InvoiceFields, InvoiceState};
use crate::transaction::{ProposedTransaction, StateAndRef, StateData, TransactionState};

/// Assembles a [`ProposedTransaction`].
///
/// The builder performs no validation. An invalid transaction (zero amount,
/// issuer equal to owner, missing signer) builds fine and is rejected later
/// by the verifier, so it can be inspected first.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    notary: Party,
    inputs: Vec<StateAndRef>,
    outputs: Vec<TransactionState>,
    commands: Vec<Command>,
}

impl TransactionBuilder {
    pub fn new(notary: Party) -> Self {
        Self {
            notary,
            inputs: Vec::new(),
            outputs: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Issuance of one invoice: no inputs, one output, one `Issue` command
    /// signed by issuer and owner.
    pub fn issuance(
        issuer: Party,
        owner: Party,
        notary: Party,
        fields: InvoiceFields,
    ) -> ProposedTransaction {
        let signers = [issuer.owning_key(), owner.owning_key()];
        let state = InvoiceState::new(issuer, owner, fields);
        Self::new(notary)
            .add_invoice_output(state)
            .add_command(InvoiceCommand::Issue, signers)
            .to_proposed()
    }

    pub fn add_input(mut self, input: StateAndRef) -> Self {
        self.inputs.push(input);
        self
    }

    /// Add an output governed by `contract`, notarized by this builder's notary.
    pub fn add_output_state(mut self, data: StateData, contract: impl Into<String>) -> Self {
        self.outputs.push(TransactionState {
            data,
            contract: contract.into(),
            notary: self.notary.clone(),
        });
        self
    }

    pub fn add_invoice_output(self, state: InvoiceState) -> Self {
        self.add_output_state(StateData::Invoice(state), InvoiceContract::ID)
    }

    pub fn add_command(
        mut self,
        value: impl Into<CommandData>,
        signers: impl IntoIterator<Item = PartyKey>,
    ) -> Self {
        self.commands.push(Command::new(value, signers));
        self
    }

    pub fn to_proposed(&self) -> ProposedTransaction {
        ProposedTransaction {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            commands: self.commands.clone(),
            notary: self.notary.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fixtures::*;

    #[test]
    fn issuance_has_one_output_one_command_no_inputs() {
        let tx = TransactionBuilder::issuance(alice(), bob(), notary(), fields(99));
        assert!(tx.inputs.is_empty());
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.commands.len(), 1);
        assert_eq!(tx.commands[0].value, CommandData::Invoice(InvoiceCommand::Issue));
        assert_eq!(tx.notary, notary());
        assert_eq!(tx.outputs[0].contract, InvoiceContract::ID);
        assert_eq!(tx.outputs[0].notary, notary());
    }

    #[test]
    fn issuance_requires_issuer_and_owner() {
        let tx = TransactionBuilder::issuance(alice(), bob(), notary(), fields(99));
        let signers = tx.required_signers();
        assert!(signers.contains(&alice().owning_key()));
        assert!(signers.contains(&bob().owning_key()));
        assert_eq!(signers.len(), 2);
    }

    #[test]
    fn non_positive_amount_still_builds() {
        let tx = TransactionBuilder::issuance(alice(), bob(), notary(), fields(0));
        let invoice = tx.invoice_outputs().next().unwrap();
        assert_eq!(invoice.financial_transaction_amount(), 0);
    }

    #[test]
    fn issuer_equal_to_owner_still_builds() {
        let tx = TransactionBuilder::issuance(alice(), alice(), notary(), fields(10));
        assert_eq!(tx.required_signers().len(), 1);
    }

    #[test]
    fn to_proposed_can_be_called_repeatedly() {
        let builder = TransactionBuilder::new(notary())
            .add_invoice_output(InvoiceState::new(alice(), bob(), fields(5)))
            .add_command(InvoiceCommand::Issue, [alice().owning_key()]);
        assert_eq!(builder.to_proposed(), builder.to_proposed());
    }
}
