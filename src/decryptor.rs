//! Partial and full decryption.
//!
//! A party's share is `c_id·s_id + e_smudge`, where the smudging noise is
//! sampled with a deviation far above the encryption noise so that the
//! share does not reveal `c_id·s_id` to the other shareholders.

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, warn};

use crate::{
    ciphertext::{Ciphertext, Plaintext},
    errors::{MkError, MkResult},
    keys::{PartyId, SecretKey, SecretKeySet},
    params::Parameters,
    rings::RnsPoly,
};

/// One party's contribution to decrypting a specific ciphertext.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptionShare<const DEGREE: usize> {
    id: PartyId,
    value: RnsPoly<DEGREE>,
}

impl<const DEGREE: usize> DecryptionShare<DEGREE> {
    pub fn id(&self) -> &PartyId {
        &self.id
    }

    pub fn value(&self) -> &RnsPoly<DEGREE> {
        &self.value
    }
}

pub struct Decryptor<const DEGREE: usize> {
    params: Arc<Parameters<DEGREE>>,
    rng: ChaCha20Rng,
}

impl<const DEGREE: usize> Decryptor<DEGREE> {
    pub fn new(params: Arc<Parameters<DEGREE>>) -> MkResult<Self> {
        let rng =
            ChaCha20Rng::try_from_os_rng().map_err(|err| MkError::Entropy(err.to_string()))?;
        Ok(Self { params, rng })
    }

    pub fn from_seed(params: Arc<Parameters<DEGREE>>, seed: [u8; 32]) -> Self {
        Self {
            params,
            rng: ChaCha20Rng::from_seed(seed),
        }
    }

    /// `component·s + e_smudge`, returned in the component's domain.
    fn smudged_product(
        &mut self,
        component: &RnsPoly<DEGREE>,
        sk: &SecretKey<DEGREE>,
    ) -> MkResult<RnsPoly<DEGREE>> {
        let basis = component.basis().clone();
        let s = sk.at_basis(&basis)?;
        let mut share =
            RnsPoly::sample_gaussian(self.params.smudging_sigma(), &basis, &mut self.rng)
                .into_ntt_domain();
        share.mul_add_assign(&component.clone().into_ntt_domain(), &s);
        share.set_domain(component.is_ntt_domain());
        Ok(share)
    }

    /// Computes the share of `sk`'s party without touching the ciphertext.
    pub fn share(
        &mut self,
        ct: &Ciphertext<DEGREE>,
        sk: &SecretKey<DEGREE>,
    ) -> MkResult<DecryptionShare<DEGREE>> {
        let component = ct.require_component(sk.id())?;
        let value = self.smudged_product(component, sk)?;
        Ok(DecryptionShare {
            id: sk.id().clone(),
            value,
        })
    }

    /// Folds the share of `sk` into the common component and keeps the
    /// party component in place.
    pub fn partial_decrypt_in_place(
        &mut self,
        ct: &mut Ciphertext<DEGREE>,
        sk: &SecretKey<DEGREE>,
    ) -> MkResult<()> {
        let share = self.share(ct, sk)?;
        add_in_domain(ct.common_mut(), share.value);
        Ok(())
    }

    /// Folds the share of `sk` into the common component and removes the
    /// party component it consumed.
    pub fn partial_decrypt_consuming(
        &mut self,
        mut ct: Ciphertext<DEGREE>,
        sk: &SecretKey<DEGREE>,
    ) -> MkResult<Ciphertext<DEGREE>> {
        let component = ct
            .remove_component(sk.id())
            .ok_or_else(|| MkError::MissingComponent(sk.id().clone()))?;
        let share = self.smudged_product(&component, sk)?;
        add_in_domain(ct.common_mut(), share);
        Ok(ct)
    }

    /// Full decryption with one secret key per contributing party, at the
    /// ciphertext's level.
    pub fn decrypt(
        &mut self,
        ct: &Ciphertext<DEGREE>,
        sks: &SecretKeySet<DEGREE>,
    ) -> MkResult<Plaintext<DEGREE>> {
        self.decrypt_at(ct, sks, ct.level())
    }

    /// Decrypts into `out`, at `min(ct.level(), out.level())`.
    pub fn decrypt_into(
        &mut self,
        ct: &Ciphertext<DEGREE>,
        sks: &SecretKeySet<DEGREE>,
        out: &mut Plaintext<DEGREE>,
    ) -> MkResult<()> {
        *out = self.decrypt_at(ct, sks, ct.level().min(out.level()))?;
        Ok(())
    }

    fn decrypt_at(
        &mut self,
        ct: &Ciphertext<DEGREE>,
        sks: &SecretKeySet<DEGREE>,
        level: usize,
    ) -> MkResult<Plaintext<DEGREE>> {
        if ct.party_count() == 0 {
            warn!("decrypting a ciphertext without party components");
        }
        let keys = ct
            .ids()
            .map(|id| {
                sks.get(id)
                    .ok_or_else(|| MkError::MissingSecretKey(id.clone()))
            })
            .collect::<MkResult<Vec<_>>>()?;
        let mut ct = ct.clone();
        ct.drop_to_level(level)?;
        for sk in keys {
            ct = self.partial_decrypt_consuming(ct, sk)?;
        }
        let (common, _, scale) = ct.into_parts();
        Ok(Plaintext::new(common.into_coeff_domain(), scale))
    }

    /// `c0 + c_id·s` for a single key, without smudging. Components of
    /// other parties are ignored.
    pub fn decrypt_sk(
        &self,
        ct: &Ciphertext<DEGREE>,
        sk: &SecretKey<DEGREE>,
    ) -> MkResult<Plaintext<DEGREE>> {
        let component = ct.require_component(sk.id())?.clone().into_ntt_domain();
        let s = sk.at_basis(ct.basis())?;
        if ct.party_count() > 1 {
            debug!(
                ignored = ct.party_count() - 1,
                "single-key decryption skips foreign components"
            );
        }
        let mut phase = ct.common().clone().into_ntt_domain();
        phase.mul_add_assign(&component, &s);
        Ok(Plaintext::new(phase.into_coeff_domain(), ct.scale()))
    }

    /// Combines shares gathered from the parties of `ct`. Several shares may
    /// carry the same identifier when the members of a group decrypt their
    /// common component; they are summed.
    pub fn merge_shares(
        &self,
        ct: &Ciphertext<DEGREE>,
        shares: &[DecryptionShare<DEGREE>],
    ) -> MkResult<Plaintext<DEGREE>> {
        if let Some(missing) = ct
            .ids()
            .find(|id| !shares.iter().any(|share| share.id() == *id))
        {
            return Err(MkError::MissingSecretKey(missing.clone()));
        }
        let mut common = ct.common().clone();
        for share in shares {
            if ct.contains(share.id()) {
                add_in_domain(&mut common, share.value.clone());
            } else {
                warn!(party = %share.id(), "dropping share for a party the ciphertext does not contain");
            }
        }
        Ok(Plaintext::new(common.into_coeff_domain(), ct.scale()))
    }
}

fn add_in_domain<const DEGREE: usize>(target: &mut RnsPoly<DEGREE>, mut value: RnsPoly<DEGREE>) {
    value.set_domain(target.is_ntt_domain());
    *target += &value;
}
