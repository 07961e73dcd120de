use invoice_types::TxId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"ivl-transaction-v1"`) that is
/// prepended to every hash computation, so the same bytes hashed under two
/// domains never collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for proposed transactions; its output is the [`TxId`].
    pub const TRANSACTION: Self = Self {
        domain: "ivl-transaction-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<[u8; 32], HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Transaction id of a serializable transaction body.
    pub fn transaction_id<T: serde::Serialize>(value: &T) -> Result<TxId, HasherError> {
        Self::TRANSACTION.hash_json(value).map(TxId::from_hash)
    }
}

/// Errors from hashing operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"invoice 123";
        assert_eq!(
            ContentHasher::TRANSACTION.hash(data),
            ContentHasher::TRANSACTION.hash(data)
        );
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let other = ContentHasher {
            domain: "ivl-other-v1",
        };
        assert_ne!(
            ContentHasher::TRANSACTION.hash(data),
            other.hash(data)
        );
    }

    #[test]
    fn transaction_id_tracks_content() {
        let a = serde_json::json!({"amount": 99});
        let b = serde_json::json!({"amount": 100});
        let id_a = ContentHasher::transaction_id(&a).unwrap();
        assert_eq!(id_a, ContentHasher::transaction_id(&a).unwrap());
        assert_ne!(id_a, ContentHasher::transaction_id(&b).unwrap());
    }

    #[test]
    fn domain_separated_hash_differs_from_raw() {
        let raw = *blake3::hash(b"test").as_bytes();
        assert_ne!(raw, ContentHasher::TRANSACTION.hash(b"test"));
    }
}
