//! Key generation for individual parties, the group-anchored keys of the
//! join protocol, and coefficient-wise aggregation into group keys.

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, instrument};

use crate::{
    errors::{MkError, MkResult},
    keys::{
        ConjugationKey, GadgetVector, PartyId, PublicKey, RelinearizationKey, RotationKey,
        SecretKey, SwitchingKey,
    },
    math::modular::{add_mod, mul_mod},
    params::{CrsTarget, Parameters},
    rings::{RnsBasis, RnsPoly},
};

/// Samples secret keys and derives every other key from them.
///
/// All keys live at the top level over the full `QP` basis in NTT domain;
/// consumers restrict them to the level they operate on.
pub struct KeyGenerator<const DEGREE: usize> {
    params: Arc<Parameters<DEGREE>>,
    rng: ChaCha20Rng,
}

impl<const DEGREE: usize> KeyGenerator<DEGREE> {
    /// Seeds the generator from the operating system.
    pub fn new(params: Arc<Parameters<DEGREE>>) -> MkResult<Self> {
        let rng =
            ChaCha20Rng::try_from_os_rng().map_err(|err| MkError::Entropy(err.to_string()))?;
        Ok(Self { params, rng })
    }

    /// Deterministic generator for reproducible runs.
    pub fn from_seed(params: Arc<Parameters<DEGREE>>, seed: [u8; 32]) -> Self {
        Self {
            params,
            rng: ChaCha20Rng::from_seed(seed),
        }
    }

    pub fn params(&self) -> &Arc<Parameters<DEGREE>> {
        &self.params
    }

    fn top_basis(&self) -> Arc<RnsBasis<DEGREE>> {
        self.params.qp_basis(self.params.max_level()).clone()
    }

    fn gaussian(&mut self) -> RnsPoly<DEGREE> {
        let basis = self.top_basis();
        RnsPoly::sample_gaussian(self.params.sigma(), &basis, &mut self.rng).into_ntt_domain()
    }

    fn ternary(&mut self) -> RnsPoly<DEGREE> {
        let basis = self.top_basis();
        RnsPoly::sample_ternary(self.params.ternary_density(), &basis, &mut self.rng)
            .into_ntt_domain()
    }

    // ─── Secret and public keys ──────────────────────────────────────────────

    /// Samples a ternary secret key with the configured density.
    pub fn gen_secret_key(&mut self, id: impl Into<PartyId>) -> MkResult<SecretKey<DEGREE>> {
        let id = issuable(id.into())?;
        Ok(SecretKey::new(id, self.ternary()))
    }

    /// Samples a ternary secret key with exactly `hamming_weight` non-zero
    /// coefficients.
    pub fn gen_secret_key_sparse(
        &mut self,
        id: impl Into<PartyId>,
        hamming_weight: usize,
    ) -> MkResult<SecretKey<DEGREE>> {
        let id = issuable(id.into())?;
        if hamming_weight == 0 || hamming_weight > DEGREE {
            return Err(MkError::InvalidHammingWeight {
                weight: hamming_weight,
                degree: DEGREE,
            });
        }
        let basis = self.top_basis();
        let value = RnsPoly::sample_tribits(hamming_weight, &basis, &mut self.rng);
        Ok(SecretKey::new(id, value.into_ntt_domain()))
    }

    /// `(b, a)` with `a` the public-key CRS entry and `b = e - a·s`.
    pub fn gen_public_key(&mut self, sk: &SecretKey<DEGREE>) -> MkResult<PublicKey<DEGREE>> {
        let a = self.params.crs(CrsTarget::PublicKey)?[0].clone();
        let mut b = self.gaussian();
        b -= &(&a * sk.value());
        Ok(PublicKey::new(sk.id().clone(), b, a))
    }

    pub fn gen_key_pair(
        &mut self,
        id: impl Into<PartyId>,
    ) -> MkResult<(SecretKey<DEGREE>, PublicKey<DEGREE>)> {
        let sk = self.gen_secret_key(id)?;
        let pk = self.gen_public_key(&sk)?;
        Ok((sk, pk))
    }

    // ─── Gadget switching keys ───────────────────────────────────────────────

    /// The gadget encoding `P·s·g_k + e_k` of `sk`, one digit per block of
    /// `α` primes of `Q`.
    pub fn gen_switching_key(&mut self, sk: &SecretKey<DEGREE>) -> GadgetVector<DEGREE> {
        self.gadget_encoding(sk.value())
    }

    fn gadget_encoding(&mut self, source: &RnsPoly<DEGREE>) -> GadgetVector<DEGREE> {
        debug_assert!(source.is_ntt_domain());
        let basis = self.top_basis();
        let p_residues = self.params.p_residues(&basis);
        let alpha = self.params.alpha();
        let q_count = self.params.max_level() + 1;

        let digits = (0..self.params.beta(self.params.max_level()))
            .map(|k| {
                let mut digit = self.gaussian();
                let block = k * alpha..((k + 1) * alpha).min(q_count);
                for ch in block {
                    let q = basis.moduli()[ch];
                    let s = &source.channels()[ch];
                    for (x, &si) in digit.channels_mut()[ch].iter_mut().zip(s.iter()) {
                        *x = add_mod(*x, mul_mod(si, p_residues[ch], q), q);
                    }
                }
                digit
            })
            .collect();
        GadgetVector::new(digits)
    }

    /// Gadget key from `source` to `target` against the CRS entry `crs`:
    /// `P·source·g_k + e_k - crs_k·target`.
    fn switching_body(
        &mut self,
        source: &RnsPoly<DEGREE>,
        target: &RnsPoly<DEGREE>,
        crs: &[RnsPoly<DEGREE>],
    ) -> GadgetVector<DEGREE> {
        let mut body = self.gadget_encoding(source);
        for (digit, a) in body.digits_mut().iter_mut().zip(crs) {
            *digit -= &(a * target);
        }
        body
    }

    // ─── Evaluation keys ─────────────────────────────────────────────────────

    #[instrument(skip_all, fields(party = %sk.id()))]
    pub fn gen_relinearization_key(
        &mut self,
        sk: &SecretKey<DEGREE>,
    ) -> MkResult<RelinearizationKey<DEGREE>> {
        let params = self.params.clone();
        let a = params.crs(CrsTarget::PublicKey)?;
        let u = params.crs(CrsTarget::Relinearization)?;
        let s = sk.value();
        let r = self.ternary();

        let b = a
            .iter()
            .map(|a_k| {
                let mut b_k = self.gaussian();
                b_k -= &(a_k * s);
                b_k
            })
            .collect();
        let d = self.switching_body(s, &r, a);
        let v = self
            .gadget_encoding(&r)
            .digits()
            .iter()
            .zip(u)
            .map(|(r_k, u_k)| {
                let mut v_k = -r_k.clone();
                v_k -= &(u_k * s);
                v_k
            })
            .collect();
        debug!(digits = u.len(), "generated relinearization key");
        Ok(RelinearizationKey::new(
            sk.id().clone(),
            GadgetVector::new(b),
            d,
            GadgetVector::new(v),
        ))
    }

    /// Key switching from `σ_5^rotation(s)` back to `s`.
    pub fn gen_rotation_key(
        &mut self,
        rotation: usize,
        sk: &SecretKey<DEGREE>,
    ) -> MkResult<RotationKey<DEGREE>> {
        let params = self.params.clone();
        let crs = params.crs(CrsTarget::Rotation(rotation))?;
        let galois = params.galois_element_for_rotation(rotation);
        let rotated = sk.value().automorphism(galois);
        let value = self.switching_body(&rotated, sk.value(), crs);
        Ok(RotationKey::new(sk.id().clone(), rotation, value))
    }

    /// Key switching from `σ_{-1}(s)` back to `s`.
    pub fn gen_conjugation_key(
        &mut self,
        sk: &SecretKey<DEGREE>,
    ) -> MkResult<ConjugationKey<DEGREE>> {
        let params = self.params.clone();
        let crs = params.crs(CrsTarget::Conjugation)?;
        let conjugated = sk.value().automorphism(params.galois_element_for_conjugation());
        let value = self.switching_body(&conjugated, sk.value(), crs);
        Ok(ConjugationKey::new(sk.id().clone(), value))
    }

    // ─── Join-protocol keys ──────────────────────────────────────────────────

    /// Switching key anchored to the group public key `(b, a)`:
    /// `body_k = P·s·g_k + r2_k·b + r0_k`, `head_k = r2_k·a + r1_k`, with
    /// `r0, r1` Gaussian and `r2` ternary.
    ///
    /// Contributions of different members share `a`, so their sum satisfies
    /// `body + head·s_group ≈ P·s_sum·g`.
    #[instrument(skip_all, fields(party = %sk.id(), group = %group_pk.id()))]
    pub fn gen_swk(
        &mut self,
        sk: &SecretKey<DEGREE>,
        group_pk: &PublicKey<DEGREE>,
    ) -> SwitchingKey<DEGREE> {
        let mut body = self.gadget_encoding(sk.value());
        let mut head = Vec::with_capacity(body.len());
        for body_k in body.digits_mut() {
            let r2 = self.ternary();
            *body_k += &(&r2 * group_pk.b());
            *body_k += &self.gaussian();
            let mut head_k = &r2 * group_pk.a();
            head_k += &self.gaussian();
            head.push(head_k);
        }
        SwitchingKey::new(sk.id().clone(), body, GadgetVector::new(head))
    }

    /// Auxiliary update key for a newcomer with secret `sk`:
    /// `uaux_k = e_k - head_k·s` and a head equal to `head`.
    ///
    /// Added to an aggregate `(body, head)` with `body + head·s_old ≈ P·s_old·g`
    /// it yields a key valid under `s_old + s`.
    pub fn uaux_key_gen(
        &mut self,
        head: &GadgetVector<DEGREE>,
        sk: &SecretKey<DEGREE>,
    ) -> SwitchingKey<DEGREE> {
        let body = head
            .digits()
            .iter()
            .map(|head_k| {
                let mut uaux_k = self.gaussian();
                uaux_k -= &(head_k * sk.value());
                uaux_k
            })
            .collect();
        SwitchingKey::new(sk.id().clone(), GadgetVector::new(body), head.clone())
    }

    // ─── Aggregation ─────────────────────────────────────────────────────────

    pub fn gen_group_secret_key(&self, keys: &[SecretKey<DEGREE>]) -> MkResult<SecretKey<DEGREE>> {
        aggregate(keys, SecretKey::accumulate)
    }

    pub fn gen_group_public_key(&self, keys: &[PublicKey<DEGREE>]) -> MkResult<PublicKey<DEGREE>> {
        aggregate(keys, PublicKey::accumulate)
    }

    pub fn gen_group_relin_key(
        &self,
        keys: &[RelinearizationKey<DEGREE>],
    ) -> MkResult<RelinearizationKey<DEGREE>> {
        aggregate(keys, RelinearizationKey::accumulate)
    }

    pub fn gen_group_rot_key(
        &self,
        keys: &[RotationKey<DEGREE>],
    ) -> MkResult<RotationKey<DEGREE>> {
        aggregate(keys, RotationKey::accumulate)
    }

    pub fn gen_group_conj_key(
        &self,
        keys: &[ConjugationKey<DEGREE>],
    ) -> MkResult<ConjugationKey<DEGREE>> {
        aggregate(keys, ConjugationKey::accumulate)
    }

    pub fn gen_group_switching_key(
        &self,
        keys: &[SwitchingKey<DEGREE>],
    ) -> MkResult<SwitchingKey<DEGREE>> {
        aggregate(keys, SwitchingKey::accumulate)
    }
}

fn issuable(id: PartyId) -> MkResult<PartyId> {
    if id.is_common() {
        Err(MkError::ReservedPartyId(id))
    } else {
        Ok(id)
    }
}

/// Sums a non-empty list of keys that share an identifier.
pub(crate) fn aggregate<K: Clone>(
    keys: &[K],
    accumulate: impl Fn(&mut K, &K) -> MkResult<()>,
) -> MkResult<K> {
    let (first, rest) = keys.split_first().ok_or(MkError::EmptyKeyList)?;
    let mut sum = first.clone();
    for key in rest {
        accumulate(&mut sum, key)?;
    }
    Ok(sum)
}
