use std::ops::AddAssign;

use super::{KeyKind, PartyId, secret_key::check_party};
use crate::{errors::MkResult, rings::RnsPoly};

/// One ring element per gadget digit, over the full `QP` basis in NTT domain.
///
/// A switching key from `s_in` is the gadget vector `P·s_in·g_k + e_k (- a_k·s_out)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GadgetVector<const DEGREE: usize> {
    digits: Vec<RnsPoly<DEGREE>>,
}

impl<const DEGREE: usize> GadgetVector<DEGREE> {
    pub fn new(digits: Vec<RnsPoly<DEGREE>>) -> Self {
        Self { digits }
    }

    pub fn digits(&self) -> &[RnsPoly<DEGREE>] {
        &self.digits
    }

    pub(crate) fn digits_mut(&mut self) -> &mut [RnsPoly<DEGREE>] {
        &mut self.digits
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }
}

impl<const DEGREE: usize> AddAssign<&GadgetVector<DEGREE>> for GadgetVector<DEGREE> {
    fn add_assign(&mut self, rhs: &GadgetVector<DEGREE>) {
        debug_assert_eq!(self.digits.len(), rhs.digits.len());
        for (lhs, rhs) in self.digits.iter_mut().zip(&rhs.digits) {
            *lhs += rhs;
        }
    }
}

/// A switching key with an explicit head: `(body, head)` such that
/// `body + head·s_out ≈ P·s_in·g`.
///
/// Keys whose head is a CRS entry (rotation, conjugation) store only the body;
/// this type is used for the group-anchored keys of the join protocol, whose
/// heads are per-party randomness.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchingKey<const DEGREE: usize> {
    id: PartyId,
    body: GadgetVector<DEGREE>,
    head: GadgetVector<DEGREE>,
}

impl<const DEGREE: usize> SwitchingKey<DEGREE> {
    pub fn new(id: PartyId, body: GadgetVector<DEGREE>, head: GadgetVector<DEGREE>) -> Self {
        debug_assert_eq!(body.len(), head.len());
        Self { id, body, head }
    }

    pub fn id(&self) -> &PartyId {
        &self.id
    }

    pub fn body(&self) -> &GadgetVector<DEGREE> {
        &self.body
    }

    pub fn head(&self) -> &GadgetVector<DEGREE> {
        &self.head
    }

    /// Adds body and head of a key for the same identifier.
    pub fn accumulate(&mut self, other: &Self) -> MkResult<()> {
        check_party(&self.id, &other.id)?;
        self.body += &other.body;
        self.head += &other.head;
        Ok(())
    }
}

impl<const DEGREE: usize> KeyKind for SwitchingKey<DEGREE> {
    const KIND: &'static str = "switching";

    fn party_id(&self) -> &PartyId {
        &self.id
    }
}
