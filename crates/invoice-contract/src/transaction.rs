use std::collections::{BTreeMap, BTreeSet};

use invoice_crypto::{verify_tx_signature, ContentHasher, Signature};
use invoice_types::{Party, PartyKey, StateRef, TxId};
use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::error::TransactionError;
use crate::state::InvoiceState;

/// Payload of a ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateData {
    Invoice(InvoiceState),
    /// A state shape this crate does not model, carried as opaque bytes.
    Foreign { type_name: String, payload: Vec<u8> },
}

impl StateData {
    pub fn as_invoice(&self) -> Option<&InvoiceState> {
        match self {
            Self::Invoice(state) => Some(state),
            Self::Foreign { .. } => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::Invoice(_) => "InvoiceState",
            Self::Foreign { type_name, .. } => type_name,
        }
    }
}

/// A state as it appears in a transaction: payload, governing contract and
/// the notary that serializes its consumption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    pub data: StateData,
    pub contract: String,
    pub notary: Party,
}

/// A previously recorded state together with where it was recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef {
    pub state: TransactionState,
    pub reference: StateRef,
}

/// A candidate transaction: consumed inputs, produced outputs, commands and
/// the notary.
///
/// Produced by the builder, checked by the verifier, then wrapped in a
/// [`SignedTransaction`]. Its canonical JSON encoding is what the
/// [`TxId`] hashes, so any field change yields a different id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedTransaction {
    pub inputs: Vec<StateAndRef>,
    pub outputs: Vec<TransactionState>,
    pub commands: Vec<Command>,
    pub notary: Party,
}

impl ProposedTransaction {
    /// Content hash of this transaction.
    pub fn id(&self) -> Result<TxId, TransactionError> {
        Ok(ContentHasher::transaction_id(self)?)
    }

    /// Union of every command's signer set.
    pub fn required_signers(&self) -> BTreeSet<PartyKey> {
        self.commands
            .iter()
            .flat_map(|command| command.signers.iter().copied())
            .collect()
    }

    /// References of all consumed inputs.
    pub fn input_refs(&self) -> Vec<StateRef> {
        self.inputs.iter().map(|input| input.reference).collect()
    }

    /// Outputs whose payload is an invoice.
    pub fn invoice_outputs(&self) -> impl Iterator<Item = &InvoiceState> {
        self.outputs.iter().filter_map(|output| output.data.as_invoice())
    }
}

/// A proposed transaction plus the signatures collected so far.
///
/// The signature map only grows. Every signature is checked against the
/// transaction id before it is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    tx: ProposedTransaction,
    signatures: BTreeMap<PartyKey, Signature>,
}

impl SignedTransaction {
    /// Wrap a transaction with no signatures yet.
    pub fn new(tx: ProposedTransaction) -> Self {
        Self {
            tx,
            signatures: BTreeMap::new(),
        }
    }

    pub fn tx(&self) -> &ProposedTransaction {
        &self.tx
    }

    pub fn id(&self) -> Result<TxId, TransactionError> {
        self.tx.id()
    }

    pub fn signatures(&self) -> &BTreeMap<PartyKey, Signature> {
        &self.signatures
    }

    /// Keys that have signed.
    pub fn signers(&self) -> BTreeSet<PartyKey> {
        self.signatures.keys().copied().collect()
    }

    /// Attach `key`'s signature after checking it covers this transaction and
    /// that `key` is a required signer. An existing signature for the same
    /// key is kept.
    pub fn add_signature(
        &mut self,
        key: PartyKey,
        signature: Signature,
    ) -> Result<(), TransactionError> {
        if !self.tx.required_signers().contains(&key) {
            return Err(TransactionError::UnexpectedSigner { key });
        }
        let id = self.id()?;
        verify_tx_signature(&key, &id, &signature)
            .map_err(|_| TransactionError::InvalidSignature { key })?;
        self.signatures.entry(key).or_insert(signature);
        Ok(())
    }

    /// Required signers that have not signed yet.
    pub fn missing_signers(&self) -> BTreeSet<PartyKey> {
        self.tx
            .required_signers()
            .into_iter()
            .filter(|key| !self.signatures.contains_key(key))
            .collect()
    }

    /// Re-check every attached signature against the transaction id, and
    /// require all required signers except those in `allowed_missing`.
    pub fn verify_signatures_except(
        &self,
        allowed_missing: &BTreeSet<PartyKey>,
    ) -> Result<(), TransactionError> {
        let id = self.id()?;
        for (key, signature) in &self.signatures {
            verify_tx_signature(key, &id, signature)
                .map_err(|_| TransactionError::InvalidSignature { key: *key })?;
        }
        let missing: Vec<PartyKey> = self
            .missing_signers()
            .into_iter()
            .filter(|key| !allowed_missing.contains(key))
            .collect();
        if !missing.is_empty() {
            return Err(TransactionError::MissingSignatures { missing });
        }
        Ok(())
    }

    /// Every required signer has signed and every signature is valid.
    pub fn verify_required_signatures(&self) -> Result<(), TransactionError> {
        self.verify_signatures_except(&BTreeSet::new())
    }
}

/// A fully signed transaction countersigned by its notary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedTransaction {
    signed: SignedTransaction,
    notary_signature: Signature,
}

impl FinalizedTransaction {
    /// Pair a signed transaction with the notary's signature over its id.
    /// The signature is checked against the transaction's named notary.
    pub fn new(
        signed: SignedTransaction,
        notary_signature: Signature,
    ) -> Result<Self, TransactionError> {
        let finalized = Self {
            signed,
            notary_signature,
        };
        finalized.verify_notary_signature()?;
        Ok(finalized)
    }

    pub fn signed(&self) -> &SignedTransaction {
        &self.signed
    }

    pub fn tx(&self) -> &ProposedTransaction {
        self.signed.tx()
    }

    pub fn id(&self) -> Result<TxId, TransactionError> {
        self.signed.id()
    }

    pub fn notary_signature(&self) -> &Signature {
        &self.notary_signature
    }

    /// The single invoice produced, for issuance transactions.
    pub fn issued_invoice(&self) -> Option<&InvoiceState> {
        self.tx().invoice_outputs().next()
    }

    fn verify_notary_signature(&self) -> Result<(), TransactionError> {
        let id = self.id()?;
        verify_tx_signature(&self.tx().notary.owning_key(), &id, &self.notary_signature)
            .map_err(|_| TransactionError::InvalidNotarySignature)
    }

    /// Check participant signatures and the notary countersignature.
    pub fn verify(&self) -> Result<(), TransactionError> {
        self.signed.verify_required_signatures()?;
        self.verify_notary_signature()
    }
}

#[cfg(test)]
mod tests {
    use invoice_crypto::SigningKey;
    use invoice_types::Party;

    use super::*;
    use crate::builder::TransactionBuilder;
    use crate::state::fixtures::fields;

    struct Keys {
        issuer: SigningKey,
        owner: SigningKey,
        notary: SigningKey,
    }

    fn keys() -> Keys {
        Keys {
            issuer: SigningKey::generate(),
            owner: SigningKey::generate(),
            notary: SigningKey::generate(),
        }
    }

    fn party(name: &str, key: &SigningKey) -> Party {
        Party::new(name, key.party_key()).unwrap()
    }

    fn issuance(keys: &Keys) -> ProposedTransaction {
        TransactionBuilder::issuance(
            party("Alice", &keys.issuer),
            party("Bob", &keys.owner),
            party("Notary", &keys.notary),
            fields(99),
        )
    }

    #[test]
    fn id_changes_with_content() {
        let keys = keys();
        let tx = issuance(&keys);
        let mut other = tx.clone();
        other.commands.clear();
        assert_eq!(tx.id().unwrap(), tx.clone().id().unwrap());
        assert_ne!(tx.id().unwrap(), other.id().unwrap());
    }

    #[test]
    fn required_signers_are_the_union_of_command_signers() {
        let keys = keys();
        let tx = issuance(&keys);
        let signers = tx.required_signers();
        assert_eq!(signers.len(), 2);
        assert!(signers.contains(&keys.issuer.party_key()));
        assert!(signers.contains(&keys.owner.party_key()));
    }

    #[test]
    fn add_signature_accepts_a_required_signer() {
        let keys = keys();
        let mut signed = SignedTransaction::new(issuance(&keys));
        let id = signed.id().unwrap();
        signed
            .add_signature(keys.issuer.party_key(), keys.issuer.sign_tx(&id))
            .unwrap();
        assert_eq!(
            signed.missing_signers(),
            BTreeSet::from([keys.owner.party_key()])
        );
    }

    #[test]
    fn add_signature_rejects_a_signature_over_other_bytes() {
        let keys = keys();
        let mut signed = SignedTransaction::new(issuance(&keys));
        let forged = keys.owner.sign_tx(&TxId::from_hash([0; 32]));
        let err = signed
            .add_signature(keys.owner.party_key(), forged)
            .unwrap_err();
        assert_eq!(
            err,
            TransactionError::InvalidSignature {
                key: keys.owner.party_key()
            }
        );
        assert!(signed.signatures().is_empty());
    }

    #[test]
    fn add_signature_rejects_an_unrequested_signer() {
        let keys = keys();
        let mut signed = SignedTransaction::new(issuance(&keys));
        let id = signed.id().unwrap();
        let err = signed
            .add_signature(keys.notary.party_key(), keys.notary.sign_tx(&id))
            .unwrap_err();
        assert!(matches!(err, TransactionError::UnexpectedSigner { .. }));
    }

    #[test]
    fn verify_signatures_except_tolerates_listed_keys_only() {
        let keys = keys();
        let mut signed = SignedTransaction::new(issuance(&keys));
        let id = signed.id().unwrap();
        signed
            .add_signature(keys.issuer.party_key(), keys.issuer.sign_tx(&id))
            .unwrap();

        let owner = BTreeSet::from([keys.owner.party_key()]);
        assert!(signed.verify_signatures_except(&owner).is_ok());
        assert!(matches!(
            signed.verify_required_signatures(),
            Err(TransactionError::MissingSignatures { .. })
        ));
    }

    #[test]
    fn finalized_transaction_checks_the_notary_signature() {
        let keys = keys();
        let mut signed = SignedTransaction::new(issuance(&keys));
        let id = signed.id().unwrap();
        signed
            .add_signature(keys.issuer.party_key(), keys.issuer.sign_tx(&id))
            .unwrap();
        signed
            .add_signature(keys.owner.party_key(), keys.owner.sign_tx(&id))
            .unwrap();

        let bogus = FinalizedTransaction::new(signed.clone(), keys.issuer.sign_tx(&id));
        assert_eq!(bogus.unwrap_err(), TransactionError::InvalidNotarySignature);

        let finalized = FinalizedTransaction::new(signed, keys.notary.sign_tx(&id)).unwrap();
        assert!(finalized.verify().is_ok());
        assert_eq!(
            finalized.issued_invoice().unwrap().financial_transaction_amount(),
            99
        );
    }
}
