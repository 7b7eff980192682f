use std::collections::BTreeMap;

use super::{
    ConjugationKey, PartyId, PublicKey, RelinearizationKey, RotationKey, SecretKey,
    SwitchingKey,
};
use crate::errors::{MkError, MkResult};

/// Implemented by every key that belongs to exactly one party identifier.
pub trait KeyKind {
    /// Human-readable kind used in error messages.
    const KIND: &'static str;

    fn party_id(&self) -> &PartyId;
}

/// Keys of one kind, indexed by party identifier.
///
/// `insert` only adds; `replace` is the path for aggregate keys that grow
/// when a party joins their group.
#[derive(Debug, Clone)]
pub struct KeySet<K> {
    keys: BTreeMap<PartyId, K>,
}

pub type SecretKeySet<const DEGREE: usize> = KeySet<SecretKey<DEGREE>>;
pub type PublicKeySet<const DEGREE: usize> = KeySet<PublicKey<DEGREE>>;
pub type RelinearizationKeySet<const DEGREE: usize> = KeySet<RelinearizationKey<DEGREE>>;
pub type ConjugationKeySet<const DEGREE: usize> = KeySet<ConjugationKey<DEGREE>>;
pub type SwitchingKeySet<const DEGREE: usize> = KeySet<SwitchingKey<DEGREE>>;

impl<K> Default for KeySet<K> {
    fn default() -> Self {
        Self {
            keys: BTreeMap::new(),
        }
    }
}

impl<K: KeyKind> KeySet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set, failing on the first duplicate identifier.
    pub fn try_from_keys(keys: impl IntoIterator<Item = K>) -> MkResult<Self> {
        let mut set = Self::new();
        for key in keys {
            set.insert(key)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, key: K) -> MkResult<()> {
        let id = key.party_id().clone();
        if self.keys.contains_key(&id) {
            return Err(MkError::DuplicateKey { kind: K::KIND, id });
        }
        self.keys.insert(id, key);
        Ok(())
    }

    /// Inserts or overwrites, returning the previous key for the identifier.
    pub fn replace(&mut self, key: K) -> Option<K> {
        self.keys.insert(key.party_id().clone(), key)
    }

    pub fn get(&self, id: &PartyId) -> Option<&K> {
        self.keys.get(id)
    }

    /// Like [`KeySet::get`] but reports the missing identifier as an error.
    pub fn require(&self, id: &PartyId) -> MkResult<&K> {
        self.keys.get(id).ok_or_else(|| MkError::MissingEvaluationKey {
            kind: K::KIND,
            id: id.clone(),
        })
    }

    pub fn contains(&self, id: &PartyId) -> bool {
        self.keys.contains_key(id)
    }

    pub fn remove(&mut self, id: &PartyId) -> Option<K> {
        self.keys.remove(id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &PartyId> {
        self.keys.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.keys.values()
    }
}

/// Rotation keys indexed by party identifier and rotation amount.
#[derive(Debug, Clone)]
pub struct RotationKeySet<const DEGREE: usize> {
    keys: BTreeMap<(PartyId, usize), RotationKey<DEGREE>>,
}

impl<const DEGREE: usize> Default for RotationKeySet<DEGREE> {
    fn default() -> Self {
        Self {
            keys: BTreeMap::new(),
        }
    }
}

impl<const DEGREE: usize> RotationKeySet<DEGREE> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: RotationKey<DEGREE>) -> MkResult<()> {
        let index = (key.id().clone(), key.rotation());
        if self.keys.contains_key(&index) {
            return Err(MkError::DuplicateKey {
                kind: RotationKey::<DEGREE>::KIND,
                id: index.0,
            });
        }
        self.keys.insert(index, key);
        Ok(())
    }

    pub fn replace(&mut self, key: RotationKey<DEGREE>) -> Option<RotationKey<DEGREE>> {
        self.keys.insert((key.id().clone(), key.rotation()), key)
    }

    pub fn get(&self, id: &PartyId, rotation: usize) -> Option<&RotationKey<DEGREE>> {
        self.keys.get(&(id.clone(), rotation))
    }

    pub fn require(&self, id: &PartyId, rotation: usize) -> MkResult<&RotationKey<DEGREE>> {
        self.get(id, rotation)
            .ok_or_else(|| MkError::MissingEvaluationKey {
                kind: RotationKey::<DEGREE>::KIND,
                id: id.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RotationKey<DEGREE>> {
        self.keys.values()
    }
}
