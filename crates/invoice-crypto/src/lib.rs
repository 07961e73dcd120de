//! Cryptographic primitives for the invoice ledger.
//!
//! Provides domain-separated BLAKE3 hashing for transaction identity and
//! Ed25519 signing/verification bound to party owning keys.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::{ContentHasher, HasherError};
pub use signer::{verify_tx_signature, Signature, SignatureError, SigningKey, VerifyingKey};
