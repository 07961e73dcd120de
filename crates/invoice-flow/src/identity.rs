use std::collections::HashMap;
use std::sync::RwLock;

use invoice_types::{Party, PartyKey};

use crate::error::{FlowError, FlowResult};
use crate::traits::IdentityService;

/// Network map held in memory: name and key lookups for every known party.
#[derive(Default)]
pub struct InMemoryIdentityService {
    inner: RwLock<Directory>,
}

#[derive(Default)]
struct Directory {
    by_name: HashMap<String, Party>,
    by_key: HashMap<PartyKey, Party>,
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a party. Names and keys must both be unused, or already bound
    /// to exactly this party.
    pub fn register(&self, party: Party) -> FlowResult<()> {
        let mut dir = self
            .inner
            .write()
            .map_err(|_| FlowError::Storage("identity directory lock poisoned".into()))?;
        let name_taken = dir
            .by_name
            .get(party.name())
            .is_some_and(|existing| existing != &party);
        let key_taken = dir
            .by_key
            .get(&party.owning_key())
            .is_some_and(|existing| existing != &party);
        if name_taken || key_taken {
            return Err(FlowError::Storage(format!(
                "identity {party:?} conflicts with a registered party"
            )));
        }
        dir.by_name.insert(party.name().to_owned(), party.clone());
        dir.by_key.insert(party.owning_key(), party);
        Ok(())
    }

    /// All registered parties, sorted by name.
    pub fn parties(&self) -> Vec<Party> {
        let Ok(dir) = self.inner.read() else {
            return Vec::new();
        };
        let mut parties: Vec<Party> = dir.by_name.values().cloned().collect();
        parties.sort_by(|a, b| a.name().cmp(b.name()));
        parties
    }
}

impl IdentityService for InMemoryIdentityService {
    fn well_known_party(&self, name: &str) -> Option<Party> {
        self.inner.read().ok()?.by_name.get(name).cloned()
    }

    fn party_from_key(&self, key: &PartyKey) -> Option<Party> {
        self.inner.read().ok()?.by_key.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(name: &str, seed: u8) -> Party {
        Party::new(name, PartyKey::from_bytes([seed; 32])).unwrap()
    }

    #[test]
    fn lookup_by_name_and_key() {
        let identity = InMemoryIdentityService::new();
        identity.register(party("Alice", 1)).unwrap();
        assert_eq!(identity.well_known_party("Alice"), Some(party("Alice", 1)));
        assert_eq!(
            identity.party_from_key(&PartyKey::from_bytes([1; 32])),
            Some(party("Alice", 1))
        );
        assert_eq!(identity.well_known_party("Bob"), None);
    }

    #[test]
    fn re_registering_the_same_party_is_allowed() {
        let identity = InMemoryIdentityService::new();
        identity.register(party("Alice", 1)).unwrap();
        identity.register(party("Alice", 1)).unwrap();
        assert_eq!(identity.parties().len(), 1);
    }

    #[test]
    fn conflicting_name_or_key_is_refused() {
        let identity = InMemoryIdentityService::new();
        identity.register(party("Alice", 1)).unwrap();
        assert!(identity.register(party("Alice", 2)).is_err());
        assert!(identity.register(party("Mallory", 1)).is_err());
    }

    #[test]
    fn parties_are_sorted_by_name() {
        let identity = InMemoryIdentityService::new();
        identity.register(party("Carol", 3)).unwrap();
        identity.register(party("Alice", 1)).unwrap();
        let names: Vec<_> = identity
            .parties()
            .iter()
            .map(|p| p.name().to_owned())
            .collect();
        assert_eq!(names, ["Alice", "Carol"]);
    }
}
