//! Session messages for invoice issuance.
//!
//! Defines the framing, message types, and serialization format used between
//! the initiator and the counterparty of one issuance flow.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::FlowCodec;
pub use error::{ProtocolError, ProtocolResult};
pub use message::{error_codes, DeclineReason, FlowMessage, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};
