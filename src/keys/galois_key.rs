//! Keys for Galois automorphisms. Both carry only the body
//! `P·σ(s)·g - a·s + e`; the head `a` is the CRS entry of the automorphism.
use super::{GadgetVector, KeyKind, PartyId, secret_key::check_party};
use crate::errors::{MkError, MkResult};

#[derive(Debug, Clone, PartialEq)]
pub struct RotationKey<const DEGREE: usize> {
    id: PartyId,
    rotation: usize,
    value: GadgetVector<DEGREE>,
}

impl<const DEGREE: usize> RotationKey<DEGREE> {
    pub(crate) fn new(id: PartyId, rotation: usize, value: GadgetVector<DEGREE>) -> Self {
        Self {
            id,
            rotation,
            value,
        }
    }

    pub fn id(&self) -> &PartyId {
        &self.id
    }

    pub fn rotation(&self) -> usize {
        self.rotation
    }

    pub fn value(&self) -> &GadgetVector<DEGREE> {
        &self.value
    }

    pub fn accumulate(&mut self, other: &Self) -> MkResult<()> {
        check_party(&self.id, &other.id)?;
        if self.rotation != other.rotation {
            return Err(MkError::RotationMismatch {
                expected: self.rotation,
                actual: other.rotation,
            });
        }
        self.value += &other.value;
        Ok(())
    }
}

impl<const DEGREE: usize> KeyKind for RotationKey<DEGREE> {
    const KIND: &'static str = "rotation";

    fn party_id(&self) -> &PartyId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConjugationKey<const DEGREE: usize> {
    id: PartyId,
    value: GadgetVector<DEGREE>,
}

impl<const DEGREE: usize> ConjugationKey<DEGREE> {
    pub(crate) fn new(id: PartyId, value: GadgetVector<DEGREE>) -> Self {
        Self { id, value }
    }

    pub fn id(&self) -> &PartyId {
        &self.id
    }

    pub fn value(&self) -> &GadgetVector<DEGREE> {
        &self.value
    }

    pub fn accumulate(&mut self, other: &Self) -> MkResult<()> {
        check_party(&self.id, &other.id)?;
        self.value += &other.value;
        Ok(())
    }
}

impl<const DEGREE: usize> KeyKind for ConjugationKey<DEGREE> {
    const KIND: &'static str = "conjugation";

    fn party_id(&self) -> &PartyId {
        &self.id
    }
}
