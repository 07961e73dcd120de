use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use invoice_crypto::SigningKey;
use invoice_types::{FlowId, Party, PartyKey};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::checkpoint::InMemoryCheckpointStore;
use crate::config::FlowConfig;
use crate::error::{FlowError, FlowResult};
use crate::identity::InMemoryIdentityService;
use crate::initiator::IssuanceFlow;
use crate::keys::KeyStore;
use crate::notary::InMemoryNotary;
use crate::responder::{IssuanceResponder, ResponderOutcome};
use crate::services::FlowServices;
use crate::session::ChannelSession;
use crate::traits::{FlowSession, Messaging, NotaryService, SigningService};
use crate::vault::InMemoryVault;

/// One participant on a [`MockNetwork`].
#[derive(Clone)]
pub struct MockNode {
    pub services: FlowServices,
    pub vault: Arc<InMemoryVault>,
    pub checkpoints: Arc<InMemoryCheckpointStore>,
}

impl MockNode {
    pub fn party(&self) -> &Party {
        &self.services.me
    }
}

/// Several nodes and a notary in one process, wired together with
/// [`ChannelSession`]s. Every node answers incoming sessions with an
/// [`IssuanceResponder`].
pub struct MockNetwork {
    config: FlowConfig,
    identity: Arc<InMemoryIdentityService>,
    notary: Arc<dyn NotaryService>,
    notary_party: Party,
    messaging: Arc<MockMessaging>,
}

impl MockNetwork {
    /// A network whose notary is an [`InMemoryNotary`] named "Notary".
    pub fn new(config: FlowConfig) -> FlowResult<Self> {
        let key = SigningKey::generate();
        let party = party("Notary", key.party_key())?;
        let notary = InMemoryNotary::new(party.clone(), key)
            .map_err(|err| FlowError::NotaryRejected(err.to_string()))?;
        Self::with_notary(config, party, Arc::new(notary))
    }

    /// A network using the given notary service, which signs as `party`.
    pub fn with_notary(
        config: FlowConfig,
        party: Party,
        notary: Arc<dyn NotaryService>,
    ) -> FlowResult<Self> {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.register(party.clone())?;
        let messaging = Arc::new(MockMessaging {
            nodes: RwLock::new(HashMap::new()),
            responders: Mutex::new(ResponderTable::default()),
            sessions: AtomicUsize::new(0),
            config: config.clone(),
        });
        Ok(Self {
            config,
            identity,
            notary,
            notary_party: party,
            messaging,
        })
    }

    /// Add a node with a freshly generated key.
    pub fn add_node(&self, name: &str) -> FlowResult<MockNode> {
        let keys = KeyStore::new();
        let key = keys.generate()?;
        self.add_node_with_signer(name, key, Arc::new(keys))
    }

    /// Add a node whose signatures come from `signer`.
    pub fn add_node_with_signer(
        &self,
        name: &str,
        key: PartyKey,
        signer: Arc<dyn SigningService>,
    ) -> FlowResult<MockNode> {
        let me = party(name, key)?;
        self.identity.register(me.clone())?;

        let vault = Arc::new(InMemoryVault::new());
        let checkpoints = Arc::new(InMemoryCheckpointStore::new());
        let services = FlowServices {
            me: me.clone(),
            identity: self.identity.clone(),
            signing: signer,
            notary: self.notary.clone(),
            vault: vault.clone(),
            checkpoints: checkpoints.clone(),
            config: self.config.clone(),
        };
        self.messaging
            .nodes
            .write()
            .map_err(|_| FlowError::Storage("node table lock poisoned".into()))?
            .insert(key, services.clone());
        debug!(party = %me, "node joined");
        Ok(MockNode {
            services,
            vault,
            checkpoints,
        })
    }

    /// The issuance flow as run by `node`.
    pub fn flow(&self, node: &MockNode) -> IssuanceFlow {
        IssuanceFlow::new(node.services.clone(), self.messaging.clone())
    }

    pub fn notary_party(&self) -> &Party {
        &self.notary_party
    }

    pub fn notary(&self) -> &Arc<dyn NotaryService> {
        &self.notary
    }

    pub fn identity(&self) -> &InMemoryIdentityService {
        &self.identity
    }

    /// Every registered party, notary included, sorted by name.
    pub fn parties(&self) -> Vec<Party> {
        self.identity.parties()
    }

    /// Sessions opened since the network was created.
    pub fn sessions_opened(&self) -> usize {
        self.messaging.sessions.load(Ordering::SeqCst)
    }

    /// Wait for the responder that served `flow_id`. `None` if no session was
    /// ever opened for it, or its outcome was already taken.
    pub async fn responder_outcome(&self, flow_id: FlowId) -> Option<FlowResult<ResponderOutcome>> {
        let task = self.messaging.responders.lock().ok()?.take(&flow_id)?;
        Some(match task.await {
            Ok(outcome) => outcome,
            Err(err) => Err(FlowError::CommunicationFailure(format!(
                "responder task failed: {err}"
            ))),
        })
    }
}

fn party(name: &str, key: PartyKey) -> FlowResult<Party> {
    Party::new(name, key).map_err(|err| FlowError::UnknownParty(format!("{name}: {err}")))
}

type ResponderTask = JoinHandle<FlowResult<ResponderOutcome>>;

/// Responder tasks whose outcome can still be collected. Only the most
/// recent [`ResponderTable::RETAINED`] are kept; older ones keep running
/// detached.
#[derive(Default)]
struct ResponderTable {
    tasks: HashMap<FlowId, ResponderTask>,
    order: VecDeque<FlowId>,
}

impl ResponderTable {
    const RETAINED: usize = 64;

    fn insert(&mut self, flow_id: FlowId, task: ResponderTask) {
        self.tasks.insert(flow_id, task);
        self.order.push_back(flow_id);
        while self.order.len() > Self::RETAINED {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.tasks.remove(&oldest).is_some() {
                debug!(flow_id = %oldest.short_id(), "responder outcome discarded");
            }
        }
    }

    fn take(&mut self, flow_id: &FlowId) -> Option<ResponderTask> {
        let task = self.tasks.remove(flow_id)?;
        self.order.retain(|id| id != flow_id);
        Some(task)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.tasks.len()
    }
}

struct MockMessaging {
    nodes: RwLock<HashMap<PartyKey, FlowServices>>,
    responders: Mutex<ResponderTable>,
    sessions: AtomicUsize,
    config: FlowConfig,
}

#[async_trait]
impl Messaging for MockMessaging {
    async fn open_session(
        &self,
        flow_id: FlowId,
        initiator: &Party,
        counterparty: &Party,
    ) -> FlowResult<Box<dyn FlowSession>> {
        let services = self
            .nodes
            .read()
            .map_err(|_| FlowError::Storage("node table lock poisoned".into()))?
            .get(&counterparty.owning_key())
            .cloned()
            .ok_or_else(|| FlowError::UnknownParty(counterparty.name().to_owned()))?;

        let (local, mut remote) =
            ChannelSession::pair(flow_id, initiator.clone(), counterparty.clone(), &self.config);
        let responder = IssuanceResponder::new(services);
        let task = tokio::spawn(async move { responder.respond(&mut remote).await });
        self.responders
            .lock()
            .map_err(|_| FlowError::Storage("responder table lock poisoned".into()))?
            .insert(flow_id, task);
        self.sessions.fetch_add(1, Ordering::SeqCst);
        debug!(flow_id = %flow_id.short_id(), from = %initiator, to = %counterparty, "session opened");
        Ok(Box::new(local))
    }
}
