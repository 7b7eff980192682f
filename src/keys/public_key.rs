//! Public Key (pk): `(b, a)` with `a` the public-key CRS entry and
//! `b = -a·s + e`.
use super::{KeyKind, PartyId, secret_key::check_party};
use crate::{errors::MkResult, rings::RnsPoly};

#[derive(Debug, Clone, PartialEq)]
pub struct PublicKey<const DEGREE: usize> {
    id: PartyId,
    b: RnsPoly<DEGREE>,
    a: RnsPoly<DEGREE>,
}

impl<const DEGREE: usize> PublicKey<DEGREE> {
    pub(crate) fn new(id: PartyId, b: RnsPoly<DEGREE>, a: RnsPoly<DEGREE>) -> Self {
        Self { id, b, a }
    }

    pub fn id(&self) -> &PartyId {
        &self.id
    }

    pub fn b(&self) -> &RnsPoly<DEGREE> {
        &self.b
    }

    pub fn a(&self) -> &RnsPoly<DEGREE> {
        &self.a
    }

    /// Adds another member's `b`; `a` is the shared CRS entry and stays put.
    pub fn accumulate(&mut self, other: &Self) -> MkResult<()> {
        check_party(&self.id, &other.id)?;
        self.b += &other.b;
        Ok(())
    }
}

impl<const DEGREE: usize> KeyKind for PublicKey<DEGREE> {
    const KIND: &'static str = "public";

    fn party_id(&self) -> &PartyId {
        &self.id
    }
}
