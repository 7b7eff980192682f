//! Secret Key (sk): a "small" polynomial s(X) from R, one per party.
//! "Small" means its coefficients are chosen from {-1, 0, 1}.
use std::{fmt, sync::Arc};

use super::{KeyKind, PartyId};
use crate::{
    errors::{MkError, MkResult},
    rings::{RnsBasis, RnsNttResult, RnsPoly},
};

/// Secret key over the full `QP` basis, kept in NTT domain.
#[derive(Clone, PartialEq)]
pub struct SecretKey<const DEGREE: usize> {
    id: PartyId,
    value: RnsPoly<DEGREE>,
}

impl<const DEGREE: usize> SecretKey<DEGREE> {
    pub(crate) fn new(id: PartyId, value: RnsPoly<DEGREE>) -> Self {
        debug_assert!(value.is_ntt_domain());
        Self { id, value }
    }

    pub fn id(&self) -> &PartyId {
        &self.id
    }

    pub fn value(&self) -> &RnsPoly<DEGREE> {
        &self.value
    }

    /// The key restricted to `basis`, which must be a sub-basis of `QP`.
    pub fn at_basis(&self, basis: &Arc<RnsBasis<DEGREE>>) -> RnsNttResult<RnsPoly<DEGREE>> {
        self.value.restrict_to(basis)
    }

    /// Adds another member's key of the same group identifier.
    pub fn accumulate(&mut self, other: &Self) -> MkResult<()> {
        check_party(&self.id, &other.id)?;
        self.value += &other.value;
        Ok(())
    }
}

impl<const DEGREE: usize> KeyKind for SecretKey<DEGREE> {
    const KIND: &'static str = "secret";

    fn party_id(&self) -> &PartyId {
        &self.id
    }
}

impl<const DEGREE: usize> fmt::Debug for SecretKey<DEGREE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

pub(crate) fn check_party(expected: &PartyId, actual: &PartyId) -> MkResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(MkError::PartyMismatch {
            expected: expected.clone(),
            actual: actual.clone(),
        })
    }
}
