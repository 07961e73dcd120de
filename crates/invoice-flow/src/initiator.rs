use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use invoice_contract::{
    verify_transaction, FinalizedTransaction, InvoiceFields, SignedTransaction, TransactionBuilder,
    TransactionError,
};
use invoice_protocol::{FlowMessage, ProtocolError, PROTOCOL_VERSION};
use invoice_types::{FlowId, Party, TxId};
use tracing::{debug, info, warn};

use crate::error::{FlowError, FlowResult, NotaryError};
use crate::handle::{race, CancelSignal, FlowHandle, Raced};
use crate::services::FlowServices;
use crate::state::{FlowStage, IssuanceState};
use crate::traits::{FlowSession, Messaging};

/// What the caller wants issued. The local node is always the issuer.
#[derive(Clone, Debug)]
pub struct IssueRequest {
    pub owner: Party,
    pub notary: Party,
    pub fields: InvoiceFields,
}

/// Initiating side of invoice issuance.
///
/// Builds the transaction, verifies it locally before any message leaves the
/// node, collects the owner's signature, has the notary finalize it and
/// hands the result back to the owner.
#[derive(Clone)]
pub struct IssuanceFlow {
    services: FlowServices,
    messaging: Arc<dyn Messaging>,
}

impl IssuanceFlow {
    pub fn new(services: FlowServices, messaging: Arc<dyn Messaging>) -> Self {
        Self {
            services,
            messaging,
        }
    }

    pub fn services(&self) -> &FlowServices {
        &self.services
    }

    /// Run one issuance to completion.
    pub async fn issue_invoice(&self, request: IssueRequest) -> FlowResult<FinalizedTransaction> {
        self.run(FlowId::new(), request, CancelSignal::never()).await
    }

    /// Run one issuance as a background task that can be cancelled.
    pub fn start(&self, request: IssueRequest) -> FlowHandle {
        let flow_id = FlowId::new();
        let (cancel, signal) = FlowHandle::channel();
        let flow = self.clone();
        let task = tokio::spawn(async move { flow.run(flow_id, request, signal).await });
        FlowHandle::new(flow_id, cancel, task)
    }

    pub(crate) async fn run(
        &self,
        flow_id: FlowId,
        request: IssueRequest,
        mut cancel: CancelSignal,
    ) -> FlowResult<FinalizedTransaction> {
        let mut run = Run {
            flow: self,
            flow_id,
            tx_id: None,
            state: IssuanceState::Built,
        };
        match run.drive(&request, &mut cancel).await {
            Ok(tx) => Ok(tx),
            Err(err) => {
                let terminal = match err {
                    FlowError::OutcomeUnknown { .. } => IssuanceState::OutcomeUnknown,
                    _ => IssuanceState::Aborted {
                        reason: err.kind().to_owned(),
                    },
                };
                warn!(
                    flow_id = %flow_id.short_id(),
                    state = %run.state,
                    reason = %err,
                    "issuance did not complete"
                );
                if let Err(checkpoint_err) = run.enter(terminal).await {
                    warn!(flow_id = %flow_id.short_id(), error = %checkpoint_err, "checkpoint failed");
                }
                Err(err)
            }
        }
    }
}

/// Mutable bookkeeping for one run.
struct Run<'a> {
    flow: &'a IssuanceFlow,
    flow_id: FlowId,
    tx_id: Option<TxId>,
    state: IssuanceState,
}

impl Run<'_> {
    async fn enter(&mut self, state: IssuanceState) -> FlowResult<()> {
        info!(
            flow_id = %self.flow_id.short_id(),
            tx_id = %self.tx_id.map(|id| id.short_hex()).unwrap_or_default(),
            state = %state,
            "issuance state"
        );
        self.state = state.clone();
        self.flow
            .services
            .checkpoint(self.flow_id, FlowStage::Initiator(state), self.tx_id)
            .await
    }

    async fn drive(
        &mut self,
        request: &IssueRequest,
        cancel: &mut CancelSignal,
    ) -> FlowResult<FinalizedTransaction> {
        let flow = self.flow;
        let services = &flow.services;
        let me = services.me.clone();

        let tx = TransactionBuilder::issuance(
            me.clone(),
            request.owner.clone(),
            request.notary.clone(),
            request.fields.clone(),
        );
        let tx_id = tx.id()?;
        self.tx_id = Some(tx_id);
        self.enter(IssuanceState::Built).await?;

        verify_transaction(&tx)?;
        self.enter(IssuanceState::LocallyVerified).await?;

        let known_owner = services.identity.party_from_key(&request.owner.owning_key());
        if known_owner.as_ref() != Some(&request.owner) {
            return Err(FlowError::UnknownParty(request.owner.name().to_owned()));
        }
        if cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }

        let mut signed = SignedTransaction::new(tx);
        let own = services.signing.sign(tx_id.as_bytes(), me.owning_key()).await?;
        signed.add_signature(me.owning_key(), own)?;

        let timeout = services.config.counterparty_timeout();
        let opening = flow.messaging.open_session(self.flow_id, &me, &request.owner);
        let mut session = match race(cancel, timeout, opening).await {
            Raced::Done(session) => session?,
            Raced::TimedOut => {
                return Err(FlowError::CommunicationFailure(format!(
                    "timed out opening a session to {}",
                    request.owner
                )))
            }
            Raced::Cancelled => return Err(FlowError::Cancelled),
        };

        if let Err(err) = self
            .collect_signature(session.as_mut(), &mut signed, cancel)
            .await
        {
            abort_session(session.as_mut(), &err).await;
            return Err(err);
        }

        let finalized = match self.notarize(signed, cancel).await {
            Ok(finalized) => finalized,
            Err(err) => {
                if !matches!(err, FlowError::OutcomeUnknown { .. }) {
                    abort_session(session.as_mut(), &err).await;
                }
                return Err(err);
            }
        };

        // Final at the notary: local failures from here on are logged, never
        // reported as an abort.
        self.distribute(session.as_mut(), &finalized).await;
        if let Err(err) = services.vault.record(finalized.clone()).await {
            warn!(flow_id = %self.flow_id.short_id(), tx_id = %tx_id.short_hex(), error = %err, "finalized transaction not recorded");
        }
        if let Err(err) = self.enter(IssuanceState::Finalized).await {
            warn!(flow_id = %self.flow_id.short_id(), error = %err, "checkpoint failed");
        }
        Ok(finalized)
    }

    async fn collect_signature(
        &mut self,
        session: &mut dyn FlowSession,
        signed: &mut SignedTransaction,
        cancel: &mut CancelSignal,
    ) -> FlowResult<()> {
        let owner = session.counterparty().clone();
        session
            .send(FlowMessage::Propose {
                version: PROTOCOL_VERSION,
                flow_id: self.flow_id,
                tx: signed.clone(),
            })
            .await?;
        self.enter(IssuanceState::AwaitingCounterpartySignature).await?;

        let timeout = self.flow.services.config.counterparty_timeout();
        let reply = match race(cancel, timeout, session.receive()).await {
            Raced::Done(reply) => reply?,
            Raced::TimedOut => {
                return Err(FlowError::CommunicationFailure(format!(
                    "{owner} did not answer within {timeout:?}"
                )))
            }
            Raced::Cancelled => return Err(FlowError::Cancelled),
        };

        match reply {
            FlowMessage::SignatureResponse {
                signer, signature, ..
            } => {
                if signer != owner.owning_key() {
                    return Err(FlowError::SignatureMismatch { signer });
                }
                signed
                    .add_signature(signer, signature)
                    .map_err(|err| match err {
                        TransactionError::InvalidSignature { key }
                        | TransactionError::UnexpectedSigner { key } => {
                            FlowError::SignatureMismatch { signer: key }
                        }
                        other => other.into(),
                    })?;
                signed.verify_required_signatures()?;
            }
            FlowMessage::Decline { reason, .. } => {
                return Err(FlowError::CounterpartyDeclined {
                    party: owner.name().to_owned(),
                    reason,
                })
            }
            FlowMessage::Error { code, message, .. } => {
                return Err(ProtocolError::RemoteError { code, message }.into())
            }
            other => {
                return Err(ProtocolError::UnexpectedMessage {
                    expected: "SignatureResponse",
                    received: other.type_name(),
                }
                .into())
            }
        }

        self.enter(IssuanceState::FullySigned).await
    }

    async fn notarize(
        &mut self,
        signed: SignedTransaction,
        cancel: &mut CancelSignal,
    ) -> FlowResult<FinalizedTransaction> {
        let tx_id = signed.id()?;
        if cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        self.enter(IssuanceState::Notarizing).await?;

        let services = &self.flow.services;
        let submitted = AtomicBool::new(false);
        let submission = async {
            submitted.store(true, Ordering::SeqCst);
            services.notary.submit(signed).await
        };
        let finalized = match race(cancel, services.config.notary_timeout(), submission).await {
            Raced::Done(Ok(finalized)) => finalized,
            Raced::Done(Err(NotaryError::ConflictingConsumption { conflicts })) => {
                return Err(FlowError::ConflictingConsumption { conflicts })
            }
            Raced::Done(Err(NotaryError::Unavailable(detail))) => {
                debug!(tx_id = %tx_id.short_hex(), detail = %detail, "notary unavailable");
                return Err(FlowError::OutcomeUnknown { tx_id });
            }
            Raced::Done(Err(other)) => return Err(FlowError::NotaryRejected(other.to_string())),
            Raced::Cancelled if !submitted.load(Ordering::SeqCst) => return Err(FlowError::Cancelled),
            Raced::TimedOut | Raced::Cancelled => return Err(FlowError::OutcomeUnknown { tx_id }),
        };

        finalized.verify()?;
        let received = finalized.id()?;
        if received != tx_id {
            return Err(FlowError::FinalityMismatch {
                expected: tx_id,
                received,
            });
        }
        Ok(finalized)
    }

    /// Send the finalized transaction to the owner and wait for the ack. The
    /// transaction is final either way; a missing ack is only logged.
    async fn distribute(&self, session: &mut dyn FlowSession, finalized: &FinalizedTransaction) {
        let send = session
            .send(FlowMessage::Finality {
                flow_id: self.flow_id,
                tx: finalized.clone(),
            })
            .await;
        if let Err(err) = send {
            warn!(flow_id = %self.flow_id.short_id(), error = %err, "finality not delivered");
            return;
        }
        let timeout = self.flow.services.config.counterparty_timeout();
        match tokio::time::timeout(timeout, session.receive()).await {
            Ok(Ok(FlowMessage::FinalityAck { tx_id, .. })) if Some(tx_id) == self.tx_id => {
                debug!(flow_id = %self.flow_id.short_id(), "finality acknowledged");
            }
            Ok(Ok(other)) => warn!(
                flow_id = %self.flow_id.short_id(),
                msg = other.type_name(),
                "unexpected reply to finality"
            ),
            Ok(Err(err)) => warn!(flow_id = %self.flow_id.short_id(), error = %err, "finality not acknowledged"),
            Err(_) => warn!(flow_id = %self.flow_id.short_id(), "finality acknowledgement timed out"),
        }
    }
}

/// Tell the counterparty to discard its signature. Best effort.
async fn abort_session(session: &mut dyn FlowSession, err: &FlowError) {
    let flow_id = session.flow_id();
    let sent = session
        .send(FlowMessage::Abort {
            flow_id,
            reason: err.kind().to_owned(),
        })
        .await;
    if let Err(send_err) = sent {
        debug!(flow_id = %flow_id.short_id(), error = %send_err, "abort not delivered");
    }
}
