use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use crate::{
    ciphertext::{Ciphertext, Plaintext},
    errors::{MkError, MkResult},
    keys::{PublicKey, SecretKey},
    params::Parameters,
    rings::RnsPoly,
};

/// Encrypts plaintexts under one party's public or secret key.
///
/// Every output carries exactly one party component, keyed by the
/// identifier of the key used.
pub struct Encryptor<const DEGREE: usize> {
    params: Arc<Parameters<DEGREE>>,
    rng: ChaCha20Rng,
}

impl<const DEGREE: usize> Encryptor<DEGREE> {
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

    /// `(u·b + e0 + m, u·a + e1)` with `u` ternary, at the plaintext's level.
    pub fn encrypt_new(
        &mut self,
        pt: &Plaintext<DEGREE>,
        pk: &PublicKey<DEGREE>,
    ) -> MkResult<Ciphertext<DEGREE>> {
        self.encrypt_at(pt, pk, pt.level())
    }

    /// Encrypts into `out`, at `min(pt.level(), out.level())` and in the
    /// domain `out` is currently in.
    pub fn encrypt_into(
        &mut self,
        pt: &Plaintext<DEGREE>,
        pk: &PublicKey<DEGREE>,
        out: &mut Ciphertext<DEGREE>,
    ) -> MkResult<()> {
        let in_ntt = out.common().is_ntt_domain();
        let mut ct = self.encrypt_at(pt, pk, pt.level().min(out.level()))?;
        if !in_ntt {
            ct.to_coeff_domain();
        }
        *out = ct;
        Ok(())
    }

    fn encrypt_at(
        &mut self,
        pt: &Plaintext<DEGREE>,
        pk: &PublicKey<DEGREE>,
        level: usize,
    ) -> MkResult<Ciphertext<DEGREE>> {
        let basis = self.params.q_basis(level).clone();
        let sigma = self.params.sigma();
        let density = self.params.ternary_density();

        let u = RnsPoly::sample_ternary(density, &basis, &mut self.rng).into_ntt_domain();
        let b = pk.b().restrict_to(&basis)?;
        let a = pk.a().restrict_to(&basis)?;

        let mut c0 = RnsPoly::sample_gaussian(sigma, &basis, &mut self.rng).into_ntt_domain();
        c0.mul_add_assign(&u, &b);
        c0 += &pt.value().restrict_to(&basis)?.into_ntt_domain();

        let mut c1 = RnsPoly::sample_gaussian(sigma, &basis, &mut self.rng).into_ntt_domain();
        c1.mul_add_assign(&u, &a);

        debug!(party = %pk.id(), level, "public-key encryption");
        Ok(Ciphertext::new_unchecked(
            c0,
            [(pk.id().clone(), c1)].into(),
            pt.scale(),
        ))
    }

    /// `(m - a·s + e, a)` with `a` uniform. Used for test vectors and
    /// trusted setup.
    pub fn encrypt_sk_new(
        &mut self,
        pt: &Plaintext<DEGREE>,
        sk: &SecretKey<DEGREE>,
    ) -> MkResult<Ciphertext<DEGREE>> {
        self.encrypt_sk_at(pt, sk, pt.level())
    }

    pub fn encrypt_sk_into(
        &mut self,
        pt: &Plaintext<DEGREE>,
        sk: &SecretKey<DEGREE>,
        out: &mut Ciphertext<DEGREE>,
    ) -> MkResult<()> {
        let in_ntt = out.common().is_ntt_domain();
        let mut ct = self.encrypt_sk_at(pt, sk, pt.level().min(out.level()))?;
        if !in_ntt {
            ct.to_coeff_domain();
        }
        *out = ct;
        Ok(())
    }

    fn encrypt_sk_at(
        &mut self,
        pt: &Plaintext<DEGREE>,
        sk: &SecretKey<DEGREE>,
        level: usize,
    ) -> MkResult<Ciphertext<DEGREE>> {
        let basis = self.params.q_basis(level).clone();
        let s = sk.at_basis(&basis)?;

        let a = RnsPoly::sample_uniform(&basis, &mut self.rng).into_ntt_domain();
        let mut c0 =
            RnsPoly::sample_gaussian(self.params.sigma(), &basis, &mut self.rng).into_ntt_domain();
        c0 += &pt.value().restrict_to(&basis)?.into_ntt_domain();
        c0 -= &(&a * &s);

        debug!(party = %sk.id(), level, "secret-key encryption");
        Ok(Ciphertext::new_unchecked(
            c0,
            [(sk.id().clone(), a)].into(),
            pt.scale(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::KeyGenerator;

    const D: usize = 16;

    fn setup() -> (Arc<Parameters<D>>, KeyGenerator<D>, Encryptor<D>) {
        let params = Parameters::<D>::builder()
            .log_q(&[50, 40])
            .log_p(&[55])
            .build()
            .unwrap();
        let kg = KeyGenerator::from_seed(params.clone(), [1u8; 32]);
        let enc = Encryptor::from_seed(params.clone(), [2u8; 32]);
        (params, kg, enc)
    }

    #[test]
    fn output_carries_exactly_the_key_identifier() {
        let (params, mut kg, mut enc) = setup();
        let (sk, pk) = kg.gen_key_pair("alice").unwrap();
        let pt = Plaintext::from_coeffs(&[3, 1, 4], &params, 1).unwrap();

        let ct = enc.encrypt_new(&pt, &pk).unwrap();
        assert_eq!(ct.ids().collect::<Vec<_>>(), vec![sk.id()]);
        assert_eq!(ct.level(), 1);

        let ct = enc.encrypt_sk_new(&pt, &sk).unwrap();
        assert_eq!(ct.ids().collect::<Vec<_>>(), vec![sk.id()]);
    }

    #[test]
    fn encrypt_into_honours_level_and_domain() {
        let (params, mut kg, mut enc) = setup();
        let (_, pk) = kg.gen_key_pair("alice").unwrap();
        let pt = Plaintext::from_coeffs(&[1, 2], &params, 1).unwrap();

        let mut out = enc.encrypt_new(&pt, &pk).unwrap();
        out.drop_to_level(0).unwrap();
        out.to_coeff_domain();

        enc.encrypt_into(&pt, &pk, &mut out).unwrap();
        assert_eq!(out.level(), 0);
        assert!(!out.common().is_ntt_domain());
    }

    #[test]
    fn secret_key_encryption_phase_is_small() {
        let (params, mut kg, mut enc) = setup();
        let sk = kg.gen_secret_key("alice").unwrap();
        let pt = Plaintext::from_coeffs(&[7, -7], &params, 1).unwrap();
        let ct = enc.encrypt_sk_new(&pt, &sk).unwrap();

        let mut phase = ct.common().clone();
        phase.mul_add_assign(
            ct.component(sk.id()).unwrap(),
            &sk.at_basis(ct.basis()).unwrap(),
        );
        let coeffs = phase.to_coeffs();
        assert!((coeffs[0] - 7).abs() <= 20);
        assert!((coeffs[1] + 7).abs() <= 20);
    }
}
