//! Invoice issuance between an issuer, an owner and a notary.
//!
//! The initiator ([`IssuanceFlow`]) builds and verifies the issuance
//! transaction, signs it, collects the owner's signature over a
//! [`FlowSession`], has the notary finalize it, and distributes the result.
//! The owner runs an [`IssuanceResponder`], which re-verifies everything it
//! is asked to sign.
//!
//! Every collaborator sits behind a trait (identity, signing, notary, vault,
//! checkpoints, messaging). In-memory implementations are provided, and
//! [`MockNetwork`] wires them into a single process.
//!
//! ```no_run
//! use invoice_flow::{FlowConfig, IssueRequest, MockNetwork};
//! # async fn run(fields: invoice_contract::InvoiceFields) -> invoice_flow::FlowResult<()> {
//! let network = MockNetwork::new(FlowConfig::default())?;
//! let issuer = network.add_node("PartyA")?;
//! let owner = network.add_node("PartyB")?;
//!
//! let tx = network
//!     .flow(&issuer)
//!     .issue_invoice(IssueRequest {
//!         owner: owner.party().clone(),
//!         notary: network.notary_party().clone(),
//!         fields,
//!     })
//!     .await?;
//! assert!(tx.issued_invoice().is_some());
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod handle;
pub mod identity;
pub mod initiator;
pub mod keys;
pub mod network;
pub mod notary;
pub mod responder;
pub mod services;
pub mod session;
pub mod state;
pub mod traits;
pub mod vault;

pub use checkpoint::InMemoryCheckpointStore;
pub use config::FlowConfig;
pub use error::{FlowError, FlowResult, NotaryError, SigningError};
pub use handle::{CancelSignal, FlowHandle};
pub use identity::InMemoryIdentityService;
pub use initiator::{IssuanceFlow, IssueRequest};
pub use keys::KeyStore;
pub use network::{MockNetwork, MockNode};
pub use notary::InMemoryNotary;
pub use responder::{IssuanceResponder, ResponderOutcome};
pub use services::FlowServices;
pub use session::ChannelSession;
pub use state::{FlowCheckpoint, FlowRole, FlowStage, IssuanceState, ResponderState};
pub use traits::{
    CheckpointStore, FinalityStatus, FlowSession, IdentityService, Messaging, NotaryService,
    SigningService, TransactionRecorder,
};
pub use vault::InMemoryVault;
