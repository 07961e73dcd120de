use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use invoice_crypto::{Signature, SigningKey};
use invoice_types::PartyKey;

use crate::error::SigningError;
use crate::traits::SigningService;

/// Signing service backed by keys held in process memory.
#[derive(Default)]
pub struct KeyStore {
    keys: RwLock<HashMap<PartyKey, SigningKey>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh key, keep it, and return its public handle.
    pub fn generate(&self) -> Result<PartyKey, SigningError> {
        let key = SigningKey::generate();
        let party_key = key.party_key();
        self.insert(key)?;
        Ok(party_key)
    }

    pub fn insert(&self, key: SigningKey) -> Result<(), SigningError> {
        let mut keys = self
            .keys
            .write()
            .map_err(|_| SigningError::Unavailable("key store lock poisoned".into()))?;
        keys.insert(key.party_key(), key);
        Ok(())
    }

    pub fn contains(&self, key: &PartyKey) -> bool {
        self.keys
            .read()
            .map(|keys| keys.contains_key(key))
            .unwrap_or(false)
    }
}

#[async_trait]
impl SigningService for KeyStore {
    async fn sign(&self, bytes: &[u8], signer: PartyKey) -> Result<Signature, SigningError> {
        let keys = self
            .keys
            .read()
            .map_err(|_| SigningError::Unavailable("key store lock poisoned".into()))?;
        let key = keys.get(&signer).ok_or(SigningError::UnknownKey(signer))?;
        Ok(key.sign(bytes))
    }
}
