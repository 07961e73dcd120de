use std::future::Future;
use std::time::Duration;

use invoice_contract::FinalizedTransaction;
use invoice_types::FlowId;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{FlowError, FlowResult};

/// Receiving side of a flow's cancellation switch.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal nobody can trip.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Pends forever if the handle
    /// was dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Result of racing a suspension point against its timeout and cancellation.
pub(crate) enum Raced<T> {
    Done(T),
    TimedOut,
    Cancelled,
}

pub(crate) async fn race<T>(
    cancel: &mut CancelSignal,
    limit: Duration,
    fut: impl Future<Output = T>,
) -> Raced<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Raced::Cancelled,
        result = tokio::time::timeout(limit, fut) => match result {
            Ok(value) => Raced::Done(value),
            Err(_) => Raced::TimedOut,
        },
    }
}

/// Handle to an issuance running in the background.
pub struct FlowHandle {
    flow_id: FlowId,
    cancel: watch::Sender<bool>,
    task: JoinHandle<FlowResult<FinalizedTransaction>>,
}

impl FlowHandle {
    /// Create the cancellation pair for a flow about to be spawned.
    pub(crate) fn channel() -> (watch::Sender<bool>, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (tx, CancelSignal { rx })
    }

    pub(crate) fn new(
        flow_id: FlowId,
        cancel: watch::Sender<bool>,
        task: JoinHandle<FlowResult<FinalizedTransaction>>,
    ) -> Self {
        Self {
            flow_id,
            cancel,
            task,
        }
    }

    pub fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    /// Request cancellation. Before notarization the flow ends with
    /// [`FlowError::Cancelled`]; after submission it ends with
    /// [`FlowError::OutcomeUnknown`].
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Wait for the flow to finish.
    pub async fn result(self) -> FlowResult<FinalizedTransaction> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(FlowError::CommunicationFailure(format!(
                "flow task failed: {err}"
            ))),
        }
    }
}
