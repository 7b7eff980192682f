use std::collections::BTreeMap;

use tracing::{debug, instrument};

use super::{Aligned, Evaluator};
use crate::{
    ciphertext::Ciphertext,
    errors::{MkError, MkResult},
    keys::{ConjugationKeySet, GadgetVector, PartyId, RotationKeySet, SwitchingKey},
    params::CrsTarget,
    rings::RnsPoly,
};

impl<const DEGREE: usize> Evaluator<DEGREE> {
    /// Applies `X -> X^(5^rotation)` to the encrypted polynomial.
    ///
    /// Every component is permuted, then each party component is switched
    /// from the permuted secret back to the party's own secret.
    pub fn rotate_new(
        &self,
        ct: &Ciphertext<DEGREE>,
        rotation: usize,
        rotation_keys: &RotationKeySet<DEGREE>,
    ) -> MkResult<Ciphertext<DEGREE>> {
        let crs = self.params.crs(CrsTarget::Rotation(rotation))?;
        let galois = self.params.galois_element_for_rotation(rotation);
        self.apply_galois(ct, galois, crs, |id| {
            Ok(rotation_keys.require(id, rotation)?.value())
        })
    }

    /// Applies `X -> X^(2N-1)`.
    pub fn conjugate_new(
        &self,
        ct: &Ciphertext<DEGREE>,
        conjugation_keys: &ConjugationKeySet<DEGREE>,
    ) -> MkResult<Ciphertext<DEGREE>> {
        let crs = self.params.crs(CrsTarget::Conjugation)?;
        let galois = self.params.galois_element_for_conjugation();
        self.apply_galois(ct, galois, crs, |id| {
            Ok(conjugation_keys.require(id)?.value())
        })
    }

    #[instrument(skip_all, fields(galois = galois, parties = ct.party_count()))]
    fn apply_galois<'k>(
        &self,
        ct: &Ciphertext<DEGREE>,
        galois: usize,
        crs: &[RnsPoly<DEGREE>],
        key_for: impl Fn(&PartyId) -> MkResult<&'k GadgetVector<DEGREE>>,
    ) -> MkResult<Ciphertext<DEGREE>> {
        let Aligned { common, parties } = self.align(ct, ct.level())?;
        let mut common = common.automorphism(galois);
        let mut switched = BTreeMap::new();
        for (id, poly) in parties {
            let body = key_for(&id)?;
            let permuted = poly.automorphism(galois);
            let (to_common, to_party) = self.switcher.key_switch(&permuted, body.digits(), crs)?;
            common += &to_common;
            switched.insert(id, to_party);
        }
        Ok(Ciphertext::new_unchecked(common, switched, ct.scale()))
    }

    /// Re-keys the component of `swk.id()` with the explicit-head key `swk`,
    /// replacing it with the switched component. Other components are left
    /// untouched.
    pub fn key_switch_new(
        &self,
        ct: &Ciphertext<DEGREE>,
        swk: &SwitchingKey<DEGREE>,
    ) -> MkResult<Ciphertext<DEGREE>> {
        self.key_switch_to_new(ct, swk, swk.id())
    }

    /// Moves the component of `swk.id()` onto `target`, for a key with
    /// `body + head·s_target ≈ P·s_source·g`. The switched part is added to
    /// any component `target` already has.
    #[instrument(skip_all, fields(source = %swk.id(), target = %target))]
    pub fn key_switch_to_new(
        &self,
        ct: &Ciphertext<DEGREE>,
        swk: &SwitchingKey<DEGREE>,
        target: &PartyId,
    ) -> MkResult<Ciphertext<DEGREE>> {
        let Aligned {
            mut common,
            mut parties,
        } = self.align(ct, ct.level())?;
        let component = parties
            .remove(swk.id())
            .ok_or_else(|| MkError::MissingComponent(swk.id().clone()))?;
        let (to_common, to_target) = self.switcher.key_switch(
            &component,
            swk.body().digits(),
            swk.head().digits(),
        )?;
        common += &to_common;
        match parties.get_mut(target) {
            Some(existing) => *existing += &to_target,
            None => {
                parties.insert(target.clone(), to_target);
            }
        }
        debug!(level = ct.level(), "component re-keyed");
        Ok(Ciphertext::new_unchecked(common, parties, ct.scale()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ciphertext::Plaintext,
        encryptor::Encryptor,
        keygen::KeyGenerator,
        params::Parameters,
    };

    const D: usize = 16;

    #[test]
    fn missing_rotation_material_is_reported() {
        let params = Parameters::<D>::builder()
            .log_q(&[55, 40])
            .log_p(&[58])
            .rotations(&[1])
            .build()
            .unwrap();
        let mut kg = KeyGenerator::from_seed(params.clone(), [1u8; 32]);
        let mut enc = Encryptor::from_seed(params.clone(), [2u8; 32]);
        let eval = Evaluator::new(params.clone());
        let (_, pk) = kg.gen_key_pair("alice").unwrap();
        let pt = Plaintext::from_coeffs(&[1, 2, 3], &params, 1).unwrap();
        let ct = enc.encrypt_new(&pt, &pk).unwrap();

        assert_eq!(
            eval.rotate_new(&ct, 2, &RotationKeySet::new()).unwrap_err(),
            MkError::MissingCrs(CrsTarget::Rotation(2))
        );
        assert!(matches!(
            eval.rotate_new(&ct, 1, &RotationKeySet::new()),
            Err(MkError::MissingEvaluationKey { kind: "rotation", .. })
        ));
        assert!(matches!(
            eval.conjugate_new(&ct, &ConjugationKeySet::new()),
            Err(MkError::MissingEvaluationKey { kind: "conjugation", .. })
        ));
    }
}
