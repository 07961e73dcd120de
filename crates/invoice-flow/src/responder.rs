use std::collections::BTreeSet;

use invoice_contract::{verify_transaction, FinalizedTransaction, SignedTransaction};
use invoice_protocol::{error_codes, DeclineReason, FlowMessage, ProtocolError, PROTOCOL_VERSION};
use invoice_types::{FlowId, Party, TxId};
use tracing::{info, warn};

use crate::error::{FlowError, FlowResult, SigningError};
use crate::services::FlowServices;
use crate::state::{FlowStage, ResponderState};
use crate::traits::FlowSession;

/// How a counterparty's part in an issuance ended.
#[derive(Clone, Debug)]
pub enum ResponderOutcome {
    /// Signed, then received and stored the finalized transaction.
    Recorded(Box<FinalizedTransaction>),
    /// Refused to sign.
    Declined(DeclineReason),
    /// Signed, but the initiator gave up before finality.
    Aborted(String),
}

/// Counterparty side of invoice issuance.
///
/// Never signs on the initiator's word: the proposal is re-verified, the
/// initiator's signature re-checked, and only then is it signed.
#[derive(Clone)]
pub struct IssuanceResponder {
    services: FlowServices,
}

impl IssuanceResponder {
    pub fn new(services: FlowServices) -> Self {
        Self { services }
    }

    pub async fn respond(&self, session: &mut dyn FlowSession) -> FlowResult<ResponderOutcome> {
        let flow_id = session.flow_id();
        let mut tx_id = None;
        match self.drive(session, &mut tx_id).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(flow_id = %flow_id.short_id(), reason = %err, "responder failed");
                let aborted = ResponderState::Aborted {
                    reason: err.kind().to_owned(),
                };
                if let Err(checkpoint_err) = self.enter(flow_id, tx_id, aborted).await {
                    warn!(flow_id = %flow_id.short_id(), error = %checkpoint_err, "checkpoint failed");
                }
                Err(err)
            }
        }
    }

    async fn enter(
        &self,
        flow_id: FlowId,
        tx_id: Option<TxId>,
        state: ResponderState,
    ) -> FlowResult<()> {
        info!(
            flow_id = %flow_id.short_id(),
            tx_id = %tx_id.map(|id| id.short_hex()).unwrap_or_default(),
            state = %state,
            "responder state"
        );
        self.services
            .checkpoint(flow_id, FlowStage::Responder(state), tx_id)
            .await
    }

    async fn drive(
        &self,
        session: &mut dyn FlowSession,
        tx_id_slot: &mut Option<TxId>,
    ) -> FlowResult<ResponderOutcome> {
        let flow_id = session.flow_id();
        let initiator = session.counterparty().clone();
        self.enter(flow_id, None, ResponderState::SessionOpened).await?;

        if self.services.identity.party_from_key(&initiator.owning_key()).as_ref() != Some(&initiator) {
            return Err(FlowError::UnknownParty(initiator.name().to_owned()));
        }

        let proposal = self.receive(session).await?;
        let signed = match proposal {
            FlowMessage::Propose { version, tx, .. } if version == PROTOCOL_VERSION => tx,
            FlowMessage::Propose { version, .. } => {
                send_error(session, error_codes::VERSION_MISMATCH, "unsupported version").await;
                return Err(ProtocolError::VersionMismatch {
                    local: PROTOCOL_VERSION,
                    remote: version,
                }
                .into());
            }
            other => {
                send_error(session, error_codes::UNEXPECTED_MESSAGE, other.type_name()).await;
                return Err(ProtocolError::UnexpectedMessage {
                    expected: "Propose",
                    received: other.type_name(),
                }
                .into());
            }
        };
        let tx_id = signed.id()?;
        *tx_id_slot = Some(tx_id);
        self.enter(flow_id, Some(tx_id), ResponderState::AskedToSign)
            .await?;

        if let Err(reason) = self.check_proposal(&signed, &tx_id, &initiator) {
            return self.decline(session, tx_id, reason).await;
        }

        let me = self.services.me.owning_key();
        let timeout = self.services.config.counterparty_timeout();
        let signing = self.services.signing.sign(tx_id.as_bytes(), me);
        let signed_by_me = match tokio::time::timeout(timeout, signing).await {
            Ok(result) => result,
            Err(_) => Err(SigningError::Unavailable(format!(
                "no signature within {timeout:?}"
            ))),
        };
        let signature = match signed_by_me {
            Ok(signature) => signature,
            Err(err) => {
                return self
                    .decline(session, tx_id, DeclineReason::Refused(err.to_string()))
                    .await
            }
        };
        session
            .send(FlowMessage::SignatureResponse {
                flow_id,
                signer: me,
                signature,
            })
            .await?;
        self.enter(flow_id, Some(tx_id), ResponderState::Signed).await?;

        let wait = self.services.config.counterparty_timeout() + self.services.config.notary_timeout();
        let msg = match tokio::time::timeout(wait, session.receive()).await {
            Ok(msg) => msg?,
            Err(_) => {
                return Err(FlowError::CommunicationFailure(format!(
                    "no finality from {initiator} within {wait:?}"
                )))
            }
        };
        match msg {
            FlowMessage::Finality { tx, .. } => self.record(session, tx_id, tx).await,
            FlowMessage::Abort { reason, .. } => {
                self.enter(
                    flow_id,
                    Some(tx_id),
                    ResponderState::Aborted {
                        reason: reason.clone(),
                    },
                )
                .await?;
                Ok(ResponderOutcome::Aborted(reason))
            }
            FlowMessage::Error { code, message, .. } => {
                Err(ProtocolError::RemoteError { code, message }.into())
            }
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "Finality",
                received: other.type_name(),
            }
            .into()),
        }
    }

    async fn receive(&self, session: &mut dyn FlowSession) -> FlowResult<FlowMessage> {
        let timeout = self.services.config.counterparty_timeout();
        match tokio::time::timeout(timeout, session.receive()).await {
            Ok(msg) => msg,
            Err(_) => Err(FlowError::CommunicationFailure(format!(
                "no proposal from {} within {timeout:?}",
                session.counterparty()
            ))),
        }
    }

    /// Everything that must hold before this node signs.
    fn check_proposal(
        &self,
        signed: &SignedTransaction,
        tx_id: &TxId,
        initiator: &Party,
    ) -> Result<(), DeclineReason> {
        verify_transaction(signed.tx()).map_err(DeclineReason::Rejected)?;

        let me = self.services.me.owning_key();
        if !signed.tx().required_signers().contains(&me) {
            return Err(DeclineReason::NotASigner);
        }
        let initiator_key = initiator.owning_key();
        match signed.signatures().get(&initiator_key) {
            Some(signature)
                if self
                    .services
                    .signing
                    .verify_signature(tx_id.as_bytes(), signature, &initiator_key) => {}
            Some(_) => {
                return Err(DeclineReason::BadInitiatorSignature(format!(
                    "signature from {initiator} does not verify"
                )))
            }
            None => {
                return Err(DeclineReason::BadInitiatorSignature(format!(
                    "{initiator} has not signed"
                )))
            }
        }
        signed
            .verify_signatures_except(&BTreeSet::from([me]))
            .map_err(|err| DeclineReason::BadInitiatorSignature(err.to_string()))
    }

    async fn decline(
        &self,
        session: &mut dyn FlowSession,
        tx_id: TxId,
        reason: DeclineReason,
    ) -> FlowResult<ResponderOutcome> {
        let flow_id = session.flow_id();
        warn!(flow_id = %flow_id.short_id(), reason = %reason, "declining to sign");
        session
            .send(FlowMessage::Decline {
                flow_id,
                reason: reason.clone(),
            })
            .await?;
        self.enter(
            flow_id,
            Some(tx_id),
            ResponderState::Declined {
                reason: reason.to_string(),
            },
        )
        .await?;
        Ok(ResponderOutcome::Declined(reason))
    }

    async fn record(
        &self,
        session: &mut dyn FlowSession,
        signed_id: TxId,
        finalized: FinalizedTransaction,
    ) -> FlowResult<ResponderOutcome> {
        let flow_id = session.flow_id();
        let received = finalized.id()?;
        if received != signed_id {
            return Err(FlowError::FinalityMismatch {
                expected: signed_id,
                received,
            });
        }
        finalized.verify()?;
        if let Err(err) = self.services.vault.record(finalized.clone()).await {
            send_error(session, error_codes::INTERNAL, "finalized transaction not recorded").await;
            return Err(err);
        }
        session
            .send(FlowMessage::FinalityAck {
                flow_id,
                tx_id: received,
            })
            .await?;
        self.enter(flow_id, Some(received), ResponderState::Recorded)
            .await?;
        Ok(ResponderOutcome::Recorded(Box::new(finalized)))
    }
}

async fn send_error(session: &mut dyn FlowSession, code: u32, message: &str) {
    let flow_id = session.flow_id();
    let sent = session
        .send(FlowMessage::Error {
            flow_id,
            code,
            message: message.to_owned(),
        })
        .await;
    if let Err(err) = sent {
        warn!(flow_id = %flow_id.short_id(), error = %err, "error reply not delivered");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use invoice_contract::{InvoiceFields, ProposedTransaction, RejectionReason, TransactionBuilder};
    use invoice_crypto::SigningKey;

    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::config::FlowConfig;
    use crate::identity::InMemoryIdentityService;
    use crate::keys::KeyStore;
    use crate::notary::InMemoryNotary;
    use crate::session::ChannelSession;
    use crate::traits::CheckpointStore;
    use crate::vault::InMemoryVault;

    fn fields(amount: i64) -> InvoiceFields {
        InvoiceFields {
            pay_term_description: "AA".into(),
            currency_code: "INR".into(),
            transaction_type: "CASH".into(),
            policy_number: 12345,
            coverage_code: 1,
            coverage_name: "CN".into(),
            policy_event_type: "BASE".into(),
            installment_due_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            invoice_number: 123,
            invoice_line_number: 1,
            financial_transaction_code: "ABC".into(),
            financial_transaction_amount: amount,
            ap_status: "Pass".into(),
            payee_id: "abc".into(),
            payee_name: "ABC".into(),
            invoice_transaction_id: "ABC123".into(),
        }
    }

    /// Bob answers proposals; Alice's key is held by the test.
    struct Fixture {
        alice: Party,
        alice_key: SigningKey,
        bob: Party,
        carol: Party,
        notary: Party,
        checkpoints: Arc<InMemoryCheckpointStore>,
        vault: Arc<InMemoryVault>,
        responder: IssuanceResponder,
    }

    fn fixture() -> Fixture {
        let alice_key = SigningKey::generate();
        let alice = Party::new("Alice", alice_key.party_key()).unwrap();
        let keys = KeyStore::new();
        let bob = Party::new("Bob", keys.generate().unwrap()).unwrap();
        let carol = Party::new("Carol", SigningKey::generate().party_key()).unwrap();
        let notary_key = SigningKey::generate();
        let notary = Party::new("Notary", notary_key.party_key()).unwrap();

        let identity = InMemoryIdentityService::new();
        for party in [&alice, &bob, &carol, &notary] {
            identity.register(party.clone()).unwrap();
        }
        let checkpoints = Arc::new(InMemoryCheckpointStore::new());
        let vault = Arc::new(InMemoryVault::new());
        let services = FlowServices {
            me: bob.clone(),
            identity: Arc::new(identity),
            signing: Arc::new(keys),
            notary: Arc::new(InMemoryNotary::new(notary.clone(), notary_key).unwrap()),
            vault: vault.clone(),
            checkpoints: checkpoints.clone(),
            config: FlowConfig::default(),
        };
        Fixture {
            alice,
            alice_key,
            bob,
            carol,
            notary,
            checkpoints,
            vault,
            responder: IssuanceResponder::new(services),
        }
    }

    impl Fixture {
        fn issuance(&self, owner: &Party, amount: i64) -> ProposedTransaction {
            TransactionBuilder::issuance(
                self.alice.clone(),
                owner.clone(),
                self.notary.clone(),
                fields(amount),
            )
        }

        fn signed_by_alice(&self, tx: ProposedTransaction) -> SignedTransaction {
            let mut signed = SignedTransaction::new(tx);
            let id = signed.id().unwrap();
            signed
                .add_signature(self.alice.owning_key(), self.alice_key.sign_tx(&id))
                .unwrap();
            signed
        }

        /// Send `tx` to Bob as Alice's proposal. Returns Bob's outcome and
        /// the only message he sent back.
        async fn propose(&self, tx: SignedTransaction) -> (FlowId, ResponderOutcome, FlowMessage) {
            let flow_id = FlowId::new();
            let (mut alice_end, mut bob_end) = ChannelSession::pair(
                flow_id,
                self.alice.clone(),
                self.bob.clone(),
                &FlowConfig::default(),
            );
            alice_end
                .send(FlowMessage::Propose {
                    version: PROTOCOL_VERSION,
                    flow_id,
                    tx,
                })
                .await
                .unwrap();

            let outcome = self.responder.respond(&mut bob_end).await.unwrap();
            drop(bob_end);
            let reply = alice_end.receive().await.unwrap();
            assert!(alice_end.receive().await.is_err(), "one reply only");
            (flow_id, outcome, reply)
        }

        async fn assert_declined(&self, flow_id: FlowId) {
            let last = self.checkpoints.latest(&flow_id).await.unwrap().unwrap();
            assert!(matches!(
                last.state,
                FlowStage::Responder(ResponderState::Declined { .. })
            ));
            assert!(self.vault.is_empty());
        }
    }

    #[tokio::test]
    async fn invalid_invoice_is_declined_even_when_signed() {
        let f = fixture();
        let tx = f.signed_by_alice(f.issuance(&f.bob, 0));

        let (flow_id, outcome, reply) = f.propose(tx).await;

        assert!(matches!(
            outcome,
            ResponderOutcome::Declined(DeclineReason::Rejected(RejectionReason::NonPositiveAmount {
                amount: 0
            }))
        ));
        assert!(matches!(
            reply,
            FlowMessage::Decline {
                reason: DeclineReason::Rejected(RejectionReason::NonPositiveAmount { amount: 0 }),
                ..
            }
        ));
        f.assert_declined(flow_id).await;
    }

    #[tokio::test]
    async fn unsigned_proposal_is_declined() {
        let f = fixture();
        let tx = SignedTransaction::new(f.issuance(&f.bob, 99));

        let (flow_id, outcome, reply) = f.propose(tx).await;

        assert!(matches!(
            outcome,
            ResponderOutcome::Declined(DeclineReason::BadInitiatorSignature(_))
        ));
        assert!(matches!(
            reply,
            FlowMessage::Decline {
                reason: DeclineReason::BadInitiatorSignature(_),
                ..
            }
        ));
        f.assert_declined(flow_id).await;
    }

    #[tokio::test]
    async fn forged_initiator_signature_is_declined() {
        let f = fixture();
        let signed = f.signed_by_alice(f.issuance(&f.bob, 99));
        let id = signed.id().unwrap();

        // Swap in a signature over the right id from the wrong key.
        let impostor = SigningKey::generate().sign_tx(&id);
        let mut value = serde_json::to_value(&signed).unwrap();
        value["signatures"][f.alice.owning_key().to_hex()] = serde_json::to_value(&impostor).unwrap();
        let forged: SignedTransaction = serde_json::from_value(value).unwrap();
        assert_ne!(forged, signed);

        let (flow_id, outcome, reply) = f.propose(forged).await;

        assert!(matches!(
            outcome,
            ResponderOutcome::Declined(DeclineReason::BadInitiatorSignature(_))
        ));
        assert!(matches!(reply, FlowMessage::Decline { .. }));
        f.assert_declined(flow_id).await;
    }

    #[tokio::test]
    async fn proposal_not_naming_this_node_is_declined() {
        let f = fixture();
        let tx = f.signed_by_alice(f.issuance(&f.carol, 99));

        let (flow_id, outcome, reply) = f.propose(tx).await;

        assert!(matches!(
            outcome,
            ResponderOutcome::Declined(DeclineReason::NotASigner)
        ));
        assert!(matches!(
            reply,
            FlowMessage::Decline {
                reason: DeclineReason::NotASigner,
                ..
            }
        ));
        f.assert_declined(flow_id).await;
    }

    #[tokio::test]
    async fn valid_proposal_is_signed_by_this_node() {
        let f = fixture();
        let flow_id = FlowId::new();
        let (mut alice_end, mut bob_end) = ChannelSession::pair(
            flow_id,
            f.alice.clone(),
            f.bob.clone(),
            &FlowConfig::default(),
        );
        let signed = f.signed_by_alice(f.issuance(&f.bob, 99));
        let id = signed.id().unwrap();
        alice_end
            .send(FlowMessage::Propose {
                version: PROTOCOL_VERSION,
                flow_id,
                tx: signed,
            })
            .await
            .unwrap();
        alice_end
            .send(FlowMessage::Abort {
                flow_id,
                reason: "test over".into(),
            })
            .await
            .unwrap();

        let outcome = f.responder.respond(&mut bob_end).await.unwrap();

        assert!(matches!(outcome, ResponderOutcome::Aborted(reason) if reason == "test over"));
        match alice_end.receive().await.unwrap() {
            FlowMessage::SignatureResponse {
                signer, signature, ..
            } => {
                assert_eq!(signer, f.bob.owning_key());
                assert!(invoice_crypto::verify_tx_signature(&signer, &id, &signature).is_ok());
            }
            other => panic!("unexpected {}", other.type_name()),
        }
    }
}
