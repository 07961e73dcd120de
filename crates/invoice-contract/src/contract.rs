use std::collections::BTreeSet;

use invoice_types::Party;

use crate::command::{Command, CommandData, InvoiceCommand};
use crate::error::{RejectionReason, SignerRole};
use crate::transaction::{ProposedTransaction, StateData};

/// Stateless rules deciding whether a transaction is admissible.
///
/// Implementations must be pure: no I/O, no interior state, same answer for
/// the same input every time. Every party runs the check on its own copy of
/// a transaction before signing it.
pub trait Contract: Send + Sync {
    /// Identifier that outputs governed by this contract carry.
    fn id(&self) -> &str;

    fn verify(&self, tx: &ProposedTransaction) -> Result<(), RejectionReason>;
}

/// Rules for invoice issuance.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceContract;

impl InvoiceContract {
    pub const ID: &'static str = "invoice.InvoiceContract";

    fn verify_issue(tx: &ProposedTransaction, command: &Command) -> Result<(), RejectionReason> {
        if !tx.inputs.is_empty() {
            return Err(RejectionReason::UnexpectedInputs {
                count: tx.inputs.len(),
            });
        }

        let [output] = tx.outputs.as_slice() else {
            return Err(RejectionReason::WrongOutputCount {
                count: tx.outputs.len(),
            });
        };

        let invoice = match &output.data {
            StateData::Invoice(invoice) => invoice,
            other => {
                return Err(RejectionReason::WrongOutputType {
                    type_name: other.type_name().to_owned(),
                })
            }
        };

        let amount = invoice.financial_transaction_amount();
        if amount <= 0 {
            return Err(RejectionReason::NonPositiveAmount { amount });
        }

        // Parties are told apart by key; two names on one key are one participant.
        let distinct: BTreeSet<_> = invoice
            .participants()
            .into_iter()
            .map(Party::owning_key)
            .collect();
        if distinct.len() != 2 {
            return Err(RejectionReason::WrongParticipantCount {
                distinct: distinct.len(),
            });
        }

        // Issuer first, so a transaction missing both reports the issuer.
        let required = [
            (SignerRole::Issuer, invoice.issuer().owning_key()),
            (SignerRole::Owner, invoice.owner().owning_key()),
        ];
        for (role, key) in required {
            if !command.signers.contains(&key) {
                return Err(RejectionReason::MissingRequiredSigner { role, key });
            }
        }

        Ok(())
    }
}

impl Contract for InvoiceContract {
    fn id(&self) -> &str {
        Self::ID
    }

    fn verify(&self, tx: &ProposedTransaction) -> Result<(), RejectionReason> {
        let [command] = tx.commands.as_slice() else {
            return Err(RejectionReason::MalformedTransaction {
                count: tx.commands.len(),
            });
        };

        match &command.value {
            CommandData::Foreign { contract, name } => Err(RejectionReason::UnrecognizedCommand {
                contract: contract.clone(),
                name: name.clone(),
            }),
            CommandData::Invoice(InvoiceCommand::Issue) => Self::verify_issue(tx, command),
            CommandData::Invoice(command @ (InvoiceCommand::Transfer | InvoiceCommand::Exit)) => {
                Err(RejectionReason::CommandNotImplemented { command: *command })
            }
        }
    }
}

/// Run the invoice contract's rules against `tx`.
pub fn verify_transaction(tx: &ProposedTransaction) -> Result<(), RejectionReason> {
    InvoiceContract.verify(tx)
}

#[cfg(test)]
mod tests {
    use invoice_types::{Party, PartyKey, StateRef, TxId};
    use proptest::prelude::*;

    use super::*;
    use crate::builder::TransactionBuilder;
    use crate::state::fixtures::*;
    use crate::state::InvoiceState;
    use crate::transaction::{StateAndRef, TransactionState};

    fn valid() -> ProposedTransaction {
        TransactionBuilder::issuance(alice(), bob(), notary(), fields(200))
    }

    fn invoice_output(state: InvoiceState) -> TransactionState {
        TransactionState {
            data: StateData::Invoice(state),
            contract: InvoiceContract::ID.into(),
            notary: notary(),
        }
    }

    fn issue_with_signers(state: InvoiceState, signers: Vec<PartyKey>) -> ProposedTransaction {
        TransactionBuilder::new(notary())
            .add_invoice_output(state)
            .add_command(InvoiceCommand::Issue, signers)
            .to_proposed()
    }

    fn input(index: u32) -> StateAndRef {
        StateAndRef {
            state: invoice_output(InvoiceState::new(alice(), bob(), fields(200))),
            reference: StateRef::new(TxId::from_hash([3; 32]), index),
        }
    }

    #[test]
    fn invoice_contract_is_a_contract() {
        let contract: &dyn Contract = &InvoiceContract;
        assert_eq!(contract.id(), "invoice.InvoiceContract");
    }

    #[test]
    fn valid_issuance_verifies() {
        assert_eq!(verify_transaction(&valid()), Ok(()));
    }

    #[test]
    fn zero_inputs_required() {
        let mut tx = valid();
        tx.inputs.push(input(0));
        assert_eq!(
            verify_transaction(&tx),
            Err(RejectionReason::UnexpectedInputs { count: 1 })
        );
    }

    #[test]
    fn exactly_one_output_required() {
        let mut tx = valid();
        tx.outputs.push(tx.outputs[0].clone());
        assert_eq!(
            verify_transaction(&tx),
            Err(RejectionReason::WrongOutputCount { count: 2 })
        );

        tx.outputs.clear();
        assert_eq!(
            verify_transaction(&tx),
            Err(RejectionReason::WrongOutputCount { count: 0 })
        );
    }

    #[test]
    fn exactly_one_command_required() {
        let mut tx = valid();
        tx.commands.push(tx.commands[0].clone());
        assert_eq!(
            verify_transaction(&tx),
            Err(RejectionReason::MalformedTransaction { count: 2 })
        );

        tx.commands.clear();
        assert_eq!(
            verify_transaction(&tx),
            Err(RejectionReason::MalformedTransaction { count: 0 })
        );
    }

    #[test]
    fn output_must_be_an_invoice() {
        let mut tx = valid();
        tx.outputs[0].data = StateData::Foreign {
            type_name: "DummyState".into(),
            payload: Vec::new(),
        };
        assert_eq!(
            verify_transaction(&tx),
            Err(RejectionReason::WrongOutputType {
                type_name: "DummyState".into()
            })
        );
    }

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        for amount in [0, -1] {
            let tx = TransactionBuilder::issuance(alice(), bob(), notary(), fields(amount));
            assert_eq!(
                verify_transaction(&tx),
                Err(RejectionReason::NonPositiveAmount { amount })
            );
        }
        let tx = TransactionBuilder::issuance(alice(), bob(), notary(), fields(2));
        assert!(verify_transaction(&tx).is_ok());
    }

    #[test]
    fn foreign_command_is_unrecognized() {
        let tx = TransactionBuilder::new(notary())
            .add_invoice_output(InvoiceState::new(alice(), bob(), fields(200)))
            .add_command(
                CommandData::Foreign {
                    contract: "dummy".into(),
                    name: "DummyCommand".into(),
                },
                [alice().owning_key(), bob().owning_key()],
            )
            .to_proposed();
        assert_eq!(
            verify_transaction(&tx).unwrap_err().rule(),
            "UnrecognizedCommand"
        );
    }

    #[test]
    fn transfer_and_exit_are_not_accepted() {
        for command in [InvoiceCommand::Transfer, InvoiceCommand::Exit] {
            let mut tx = valid();
            tx.commands[0].value = command.into();
            assert_eq!(
                verify_transaction(&tx),
                Err(RejectionReason::CommandNotImplemented { command })
            );
        }
    }

    #[test]
    fn issuer_must_sign() {
        let tx = issue_with_signers(
            InvoiceState::new(alice(), bob(), fields(200)),
            vec![bob().owning_key()],
        );
        assert_eq!(
            verify_transaction(&tx),
            Err(RejectionReason::MissingRequiredSigner {
                role: SignerRole::Issuer,
                key: alice().owning_key(),
            })
        );
    }

    #[test]
    fn owner_must_sign() {
        let tx = issue_with_signers(
            InvoiceState::new(alice(), bob(), fields(200)),
            vec![alice().owning_key()],
        );
        assert_eq!(
            verify_transaction(&tx),
            Err(RejectionReason::MissingRequiredSigner {
                role: SignerRole::Owner,
                key: bob().owning_key(),
            })
        );
    }

    #[test]
    fn roles_follow_the_state_not_the_party_names() {
        // Bob issues to Alice; only Alice signs.
        let tx = issue_with_signers(
            InvoiceState::new(bob(), alice(), fields(200)),
            vec![alice().owning_key()],
        );
        assert_eq!(
            verify_transaction(&tx),
            Err(RejectionReason::MissingRequiredSigner {
                role: SignerRole::Issuer,
                key: bob().owning_key(),
            })
        );
    }

    #[test]
    fn extra_signers_are_allowed() {
        let tx = issue_with_signers(
            InvoiceState::new(alice(), bob(), fields(200)),
            vec![alice().owning_key(), bob().owning_key(), notary().owning_key()],
        );
        assert!(verify_transaction(&tx).is_ok());
    }

    #[test]
    fn issuer_equal_to_owner_is_rejected() {
        let tx = TransactionBuilder::issuance(alice(), alice(), notary(), fields(200));
        assert_eq!(
            verify_transaction(&tx),
            Err(RejectionReason::WrongParticipantCount { distinct: 1 })
        );
    }

    #[test]
    fn same_key_under_two_names_is_one_participant() {
        let alias = Party::new("AliceAlias", alice().owning_key()).unwrap();
        let tx = TransactionBuilder::issuance(alice(), alias, notary(), fields(10));
        assert_eq!(tx.required_signers().len(), 1);
        assert_eq!(
            verify_transaction(&tx),
            Err(RejectionReason::WrongParticipantCount { distinct: 1 })
        );
    }

    #[test]
    fn earlier_rules_win() {
        // Inputs, zero amount and missing signers at once: inputs are checked first.
        let mut tx = issue_with_signers(InvoiceState::new(alice(), bob(), fields(0)), vec![]);
        tx.inputs.push(input(0));
        assert_eq!(verify_transaction(&tx).unwrap_err().rule(), "UnexpectedInputs");
    }

    fn arb_party(tag: u8) -> impl Strategy<Value = Party> {
        ("[A-Z][a-z]{2,8}", any::<[u8; 31]>()).prop_map(move |(name, bytes)| {
            let mut key = [tag; 32];
            key[1..].copy_from_slice(&bytes);
            Party::new(name, PartyKey::from_bytes(key)).unwrap()
        })
    }

    proptest! {
        #[test]
        fn positive_amount_with_distinct_parties_verifies(
            issuer in arb_party(1),
            owner in arb_party(2),
            amount in 1i64..=i64::MAX,
        ) {
            let tx = TransactionBuilder::issuance(issuer, owner, notary(), fields(amount));
            prop_assert_eq!(verify_transaction(&tx), Ok(()));
        }

        #[test]
        fn non_positive_amount_is_always_rejected(
            issuer in arb_party(1),
            owner in arb_party(2),
            amount in i64::MIN..=0,
        ) {
            let tx = TransactionBuilder::issuance(issuer, owner, notary(), fields(amount));
            prop_assert_eq!(
                verify_transaction(&tx),
                Err(RejectionReason::NonPositiveAmount { amount })
            );
        }

        #[test]
        fn any_input_under_issue_is_rejected(count in 1usize..5) {
            let mut tx = valid();
            tx.inputs = (0..count as u32).map(input).collect();
            prop_assert_eq!(
                verify_transaction(&tx),
                Err(RejectionReason::UnexpectedInputs { count })
            );
        }

        #[test]
        fn output_count_other_than_one_is_rejected(count in prop_oneof![Just(0usize), 2usize..6]) {
            let mut tx = valid();
            let output = tx.outputs[0].clone();
            tx.outputs = vec![output; count];
            prop_assert_eq!(
                verify_transaction(&tx),
                Err(RejectionReason::WrongOutputCount { count })
            );
        }

        #[test]
        fn omitting_issuer_or_owner_is_rejected(keep_issuer: bool, keep_owner: bool) {
            prop_assume!(!(keep_issuer && keep_owner));
            let mut signers = Vec::new();
            if keep_issuer {
                signers.push(alice().owning_key());
            }
            if keep_owner {
                signers.push(bob().owning_key());
            }
            let tx = issue_with_signers(InvoiceState::new(alice(), bob(), fields(200)), signers);
            prop_assert_eq!(
                verify_transaction(&tx).unwrap_err().rule(),
                "MissingRequiredSigner"
            );
        }

        #[test]
        fn verification_is_idempotent(amount in any::<i64>(), with_input: bool) {
            let mut tx = TransactionBuilder::issuance(alice(), bob(), notary(), fields(amount));
            if with_input {
                tx.inputs.push(input(0));
            }
            prop_assert_eq!(verify_transaction(&tx), verify_transaction(&tx));
        }
    }
}
