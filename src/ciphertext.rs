use std::{
    collections::{BTreeMap, btree_map},
    sync::Arc,
};

use crate::{
    errors::{MkError, MkResult},
    keys::PartyId,
    params::Parameters,
    rings::{RnsBasis, RnsPoly},
};

/// Values above this magnitude cannot be CRT-lifted back into `i64`.
const MAX_SCALED_MAGNITUDE: f64 = (1u64 << 62) as f64;

/// A ring element over `Q_level` together with the scale it was encoded at.
///
/// Only coefficient placement is provided; slot encodings belong to the
/// scheme layers built on top.
#[derive(Debug, Clone, PartialEq)]
pub struct Plaintext<const DEGREE: usize> {
    value: RnsPoly<DEGREE>,
    scale: f64,
}

impl<const DEGREE: usize> Plaintext<DEGREE> {
    pub fn new(value: RnsPoly<DEGREE>, scale: f64) -> Self {
        Self { value, scale }
    }

    /// Places integer coefficients as-is, at scale 1.
    pub fn from_coeffs(
        coeffs: &[i64],
        params: &Parameters<DEGREE>,
        level: usize,
    ) -> MkResult<Self> {
        let basis = plaintext_basis(params, level, coeffs.len())?;
        Ok(Self::new(RnsPoly::from_coeffs(coeffs, basis), 1.0))
    }

    /// Places `round(x·scale)` for every value.
    pub fn from_scaled(
        values: &[f64],
        scale: f64,
        params: &Parameters<DEGREE>,
        level: usize,
    ) -> MkResult<Self> {
        let basis = plaintext_basis(params, level, values.len())?;
        let coeffs = values
            .iter()
            .map(|&value| {
                let scaled = (value * scale).round();
                if scaled.is_finite() && scaled.abs() < MAX_SCALED_MAGNITUDE {
                    Ok(scaled as i64)
                } else {
                    Err(MkError::ValueOutOfRange { value })
                }
            })
            .collect::<MkResult<Vec<_>>>()?;
        Ok(Self::new(RnsPoly::from_coeffs(&coeffs, basis), scale))
    }

    pub fn value(&self) -> &RnsPoly<DEGREE> {
        &self.value
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn level(&self) -> usize {
        self.value.channel_count() - 1
    }

    /// Centered coefficients divided by the tracked scale.
    pub fn decode(&self) -> Vec<f64> {
        self.value
            .to_f64_coeffs()
            .into_iter()
            .map(|c| c / self.scale)
            .collect()
    }
}

fn plaintext_basis<const DEGREE: usize>(
    params: &Parameters<DEGREE>,
    level: usize,
    count: usize,
) -> MkResult<Arc<RnsBasis<DEGREE>>> {
    if level > params.max_level() {
        return Err(MkError::InvalidLevel {
            current: params.max_level(),
            requested: level,
        });
    }
    if count > DEGREE {
        return Err(MkError::TooManyCoefficients {
            count,
            degree: DEGREE,
        });
    }
    Ok(params.q_basis(level).clone())
}

/// A multi-key ciphertext: the common component plus one component per
/// contributing party, all over `Q_level`.
///
/// Decrypting requires a share from every party in [`Ciphertext::ids`].
/// Components of absent parties are implicitly zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Ciphertext<const DEGREE: usize> {
    common: RnsPoly<DEGREE>,
    parties: BTreeMap<PartyId, RnsPoly<DEGREE>>,
    scale: f64,
}

impl<const DEGREE: usize> Ciphertext<DEGREE> {
    /// Assembles a ciphertext, checking that no component claims the
    /// reserved identifier and that every component shares the common basis.
    pub fn from_parts(
        common: RnsPoly<DEGREE>,
        parties: impl IntoIterator<Item = (PartyId, RnsPoly<DEGREE>)>,
        scale: f64,
    ) -> MkResult<Self> {
        let mut map = BTreeMap::new();
        for (id, poly) in parties {
            if id.is_common() {
                return Err(MkError::ReservedPartyId(id));
            }
            if poly.basis().moduli() != common.basis().moduli() {
                return Err(MkError::BasisMismatch);
            }
            map.insert(id, poly);
        }
        Ok(Self::new_unchecked(common, map, scale))
    }

    pub(crate) fn new_unchecked(
        common: RnsPoly<DEGREE>,
        parties: BTreeMap<PartyId, RnsPoly<DEGREE>>,
        scale: f64,
    ) -> Self {
        Self {
            common,
            parties,
            scale,
        }
    }

    pub fn level(&self) -> usize {
        self.common.channel_count() - 1
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn basis(&self) -> &Arc<RnsBasis<DEGREE>> {
        self.common.basis()
    }

    /// The component under the reserved identifier `"0"`.
    pub fn common(&self) -> &RnsPoly<DEGREE> {
        &self.common
    }

    pub(crate) fn common_mut(&mut self) -> &mut RnsPoly<DEGREE> {
        &mut self.common
    }

    pub fn component(&self, id: &PartyId) -> Option<&RnsPoly<DEGREE>> {
        self.parties.get(id)
    }

    pub fn require_component(&self, id: &PartyId) -> MkResult<&RnsPoly<DEGREE>> {
        self.parties
            .get(id)
            .ok_or_else(|| MkError::MissingComponent(id.clone()))
    }

    pub fn contains(&self, id: &PartyId) -> bool {
        self.parties.contains_key(id)
    }

    /// Contributing parties, in identifier order. Never includes `"0"`.
    pub fn ids(&self) -> impl Iterator<Item = &PartyId> {
        self.parties.keys()
    }

    pub fn party_count(&self) -> usize {
        self.parties.len()
    }

    pub fn components(&self) -> btree_map::Iter<'_, PartyId, RnsPoly<DEGREE>> {
        self.parties.iter()
    }

    pub(crate) fn remove_component(&mut self, id: &PartyId) -> Option<RnsPoly<DEGREE>> {
        self.parties.remove(id)
    }

    pub(crate) fn into_parts(self) -> (RnsPoly<DEGREE>, BTreeMap<PartyId, RnsPoly<DEGREE>>, f64) {
        (self.common, self.parties, self.scale)
    }

    /// Drops the trailing primes until the ciphertext sits at `level`.
    /// Scale and plaintext are unchanged.
    pub fn drop_to_level(&mut self, level: usize) -> MkResult<()> {
        let current = self.level();
        if level > current {
            return Err(MkError::InvalidLevel {
                current,
                requested: level,
            });
        }
        if level == current {
            return Ok(());
        }
        let drop = current - level;
        self.common = self.common.mod_drop_last(drop)?;
        for poly in self.parties.values_mut() {
            *poly = poly.mod_drop_last(drop)?;
        }
        Ok(())
    }

    pub fn to_ntt_domain(&mut self) {
        self.common.to_ntt_domain();
        for poly in self.parties.values_mut() {
            poly.to_ntt_domain();
        }
    }

    pub fn to_coeff_domain(&mut self) {
        self.common.to_coeff_domain();
        for poly in self.parties.values_mut() {
            poly.to_coeff_domain();
        }
    }
}
