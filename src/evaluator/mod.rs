//! Homomorphic evaluation over ciphertexts with a variable party set.
//!
//! Binary operations work over the union of the operands' identifier sets,
//! treating absent components as zero, and bring both operands to the lower
//! of their levels first. Outputs are in NTT domain.

mod galois;
mod key_switch;
mod mul;

use std::{collections::BTreeMap, sync::Arc};

pub use key_switch::KeySwitcher;

use crate::{
    ciphertext::{Ciphertext, Plaintext},
    errors::{MkResult, check_scale},
    keys::PartyId,
    params::Parameters,
    rings::RnsPoly,
};

pub struct Evaluator<const DEGREE: usize> {
    params: Arc<Parameters<DEGREE>>,
    switcher: KeySwitcher<DEGREE>,
}

/// A ciphertext brought to a given level, in NTT domain.
struct Aligned<const DEGREE: usize> {
    common: RnsPoly<DEGREE>,
    parties: BTreeMap<PartyId, RnsPoly<DEGREE>>,
}

impl<const DEGREE: usize> Evaluator<DEGREE> {
    pub fn new(params: Arc<Parameters<DEGREE>>) -> Self {
        Self {
            switcher: KeySwitcher::new(params.clone()),
            params,
        }
    }

    pub fn params(&self) -> &Arc<Parameters<DEGREE>> {
        &self.params
    }

    fn align(&self, ct: &Ciphertext<DEGREE>, level: usize) -> MkResult<Aligned<DEGREE>> {
        let basis = self.params.q_basis(level);
        let lift = |poly: &RnsPoly<DEGREE>| -> MkResult<RnsPoly<DEGREE>> {
            Ok(poly.restrict_to(basis)?.into_ntt_domain())
        };
        let common = lift(ct.common())?;
        let parties = ct
            .components()
            .map(|(id, poly)| Ok((id.clone(), lift(poly)?)))
            .collect::<MkResult<_>>()?;
        Ok(Aligned { common, parties })
    }

    fn lift_plaintext(&self, pt: &Plaintext<DEGREE>, level: usize) -> MkResult<RnsPoly<DEGREE>> {
        Ok(pt
            .value()
            .restrict_to(self.params.q_basis(level))?
            .into_ntt_domain())
    }

    fn combine(
        &self,
        lhs: &Ciphertext<DEGREE>,
        rhs: &Ciphertext<DEGREE>,
        subtract: bool,
    ) -> MkResult<Ciphertext<DEGREE>> {
        check_scale(lhs.scale(), rhs.scale())?;
        let level = lhs.level().min(rhs.level());
        let Aligned {
            mut common,
            mut parties,
        } = self.align(lhs, level)?;
        let rhs = self.align(rhs, level)?;

        let apply = |target: &mut RnsPoly<DEGREE>, value: &RnsPoly<DEGREE>| {
            if subtract {
                *target -= value;
            } else {
                *target += value;
            }
        };
        apply(&mut common, &rhs.common);
        for (id, poly) in &rhs.parties {
            let target = parties
                .entry(id.clone())
                .or_insert_with(|| RnsPoly::zero_in(common.basis().clone(), true));
            apply(target, poly);
        }
        Ok(Ciphertext::new_unchecked(common, parties, lhs.scale()))
    }

    pub fn add_new(
        &self,
        lhs: &Ciphertext<DEGREE>,
        rhs: &Ciphertext<DEGREE>,
    ) -> MkResult<Ciphertext<DEGREE>> {
        self.combine(lhs, rhs, false)
    }

    pub fn sub_new(
        &self,
        lhs: &Ciphertext<DEGREE>,
        rhs: &Ciphertext<DEGREE>,
    ) -> MkResult<Ciphertext<DEGREE>> {
        self.combine(lhs, rhs, true)
    }

    pub fn neg_new(&self, ct: &Ciphertext<DEGREE>) -> MkResult<Ciphertext<DEGREE>> {
        let Aligned { common, parties } = self.align(ct, ct.level())?;
        let parties = parties.into_iter().map(|(id, poly)| (id, -poly)).collect();
        Ok(Ciphertext::new_unchecked(-common, parties, ct.scale()))
    }

    /// Adds `pt` to the common component; the identifier set is unchanged.
    pub fn add_plaintext_new(
        &self,
        ct: &Ciphertext<DEGREE>,
        pt: &Plaintext<DEGREE>,
    ) -> MkResult<Ciphertext<DEGREE>> {
        check_scale(ct.scale(), pt.scale())?;
        let level = ct.level().min(pt.level());
        let Aligned {
            mut common,
            parties,
        } = self.align(ct, level)?;
        common += &self.lift_plaintext(pt, level)?;
        Ok(Ciphertext::new_unchecked(common, parties, ct.scale()))
    }

    /// Multiplies every component by `pt`; scales multiply.
    pub fn mul_plaintext_new(
        &self,
        ct: &Ciphertext<DEGREE>,
        pt: &Plaintext<DEGREE>,
    ) -> MkResult<Ciphertext<DEGREE>> {
        let level = ct.level().min(pt.level());
        let Aligned {
            mut common,
            mut parties,
        } = self.align(ct, level)?;
        let m = self.lift_plaintext(pt, level)?;
        common *= &m;
        for poly in parties.values_mut() {
            *poly *= &m;
        }
        Ok(Ciphertext::new_unchecked(
            common,
            parties,
            ct.scale() * pt.scale(),
        ))
    }
}
