use super::{GadgetVector, KeyKind, PartyId, secret_key::check_party};
use crate::errors::MkResult;

/// Relinearization key of one party (or group), with `a` the public-key CRS
/// entry, `u` the relinearization CRS entry and `r` a fresh ternary secret:
///
/// - `b = -s·a + e_1`
/// - `d = -r·a + P·s·g + e_2`
/// - `v = -s·u - P·r·g + e_3`
///
/// `b` and `v` must not share a CRS vector: their difference would then
/// expose `r`, and `d` would expose `s` in turn.
///
/// `b` lets other parties fold their half of a cross term onto this party,
/// `d` and `v` remove the quadratic dependence on `s` and `r`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelinearizationKey<const DEGREE: usize> {
    id: PartyId,
    b: GadgetVector<DEGREE>,
    d: GadgetVector<DEGREE>,
    v: GadgetVector<DEGREE>,
}

impl<const DEGREE: usize> RelinearizationKey<DEGREE> {
    pub(crate) fn new(
        id: PartyId,
        b: GadgetVector<DEGREE>,
        d: GadgetVector<DEGREE>,
        v: GadgetVector<DEGREE>,
    ) -> Self {
        Self { id, b, d, v }
    }

    pub fn id(&self) -> &PartyId {
        &self.id
    }

    pub fn b(&self) -> &GadgetVector<DEGREE> {
        &self.b
    }

    pub fn d(&self) -> &GadgetVector<DEGREE> {
        &self.d
    }

    pub fn v(&self) -> &GadgetVector<DEGREE> {
        &self.v
    }

    pub fn accumulate(&mut self, other: &Self) -> MkResult<()> {
        check_party(&self.id, &other.id)?;
        self.b += &other.b;
        self.d += &other.d;
        self.v += &other.v;
        Ok(())
    }
}

impl<const DEGREE: usize> KeyKind for RelinearizationKey<DEGREE> {
    const KIND: &'static str = "relinearization";

    fn party_id(&self) -> &PartyId {
        &self.id
    }
}
