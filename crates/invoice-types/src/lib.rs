//! Foundation types for the invoice ledger.
//!
//! This crate provides the identity and reference types shared by every
//! other crate in the workspace.
//!
//! # Key Types
//!
//! - [`Party`]: A named participant with an Ed25519 owning key
//! - [`PartyKey`]: Opaque, comparable public-key handle used for signer matching
//! - [`TxId`]: Content-addressed transaction identifier (BLAKE3 hash)
//! - [`StateRef`]: Pointer to one output of a recorded transaction
//! - [`FlowId`]: UUID v7 identifier for one protocol run

pub mod error;
pub mod flow;
pub mod identity;
pub mod object;

pub use error::TypeError;
pub use flow::FlowId;
pub use identity::{Party, PartyKey};
pub use object::{StateRef, TxId};
