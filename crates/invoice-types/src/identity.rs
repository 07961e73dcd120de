use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque owning-key handle for a party.
///
/// Holds the raw 32 bytes of an Ed25519 public key. The contract layer only
/// ever compares keys for equality and set membership; decoding the bytes
/// into a curve point is left to the crypto crate at signature-check time.
///
/// Human-readable formats see a hex string, so the key can sit in JSON map
/// keys; binary formats see the raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartyKey([u8; 32]);

impl PartyKey {
    /// Wrap raw public key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full hex-encoded string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("key:{}", hex::encode(&self.0[..4]))
    }

    /// Parse from a hex string (64 hex characters, optional `key:` prefix).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("key:").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyKey({})", self.short_id())
    }
}

impl fmt::Display for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_id())
    }
}

impl Serialize for PartyKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for PartyKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Self)
        }
    }
}

/// A participant identity: a legal name bound to an owning key.
///
/// Two parties are the same identity only if both name and key match.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Party {
    name: String,
    owning_key: PartyKey,
}

impl Party {
    /// Bind a legal name to an owning key. The name must be non-blank.
    pub fn new(name: impl Into<String>, owning_key: PartyKey) -> Result<Self, TypeError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TypeError::InvalidPartyName(name));
        }
        Ok(Self { name, owning_key })
    }

    /// The legal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning key used for signer matching.
    pub fn owning_key(&self) -> PartyKey {
        self.owning_key
    }
}

impl fmt::Debug for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Party({} {})", self.name, self.owning_key.short_id())
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
