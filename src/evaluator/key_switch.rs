use std::sync::Arc;

use tracing::{debug, instrument};

use crate::{
    errors::MkResult,
    params::Parameters,
    rings::{RnsBasis, RnsPoly, divide_by_tail},
};

/// The generic key-switching primitive and the gadget arithmetic it is
/// built from.
///
/// # Key switching
/// For a component `c` at level `l` and a key `(body, head)` with
/// `body_k + head_k·s_out ≈ P·s_in·g_k`:
///
/// 1. Decompose `c` into `β(l)` digits `D_k` over `QP_l`
/// 2. Compute `acc0 = Σ D_k·body_k` and `acc1 = Σ D_k·head_k`
/// 3. Divide both by `P` (mod-down)
///
/// The pair then satisfies `acc0 + acc1·s_out ≈ c·s_in`.
#[derive(Debug, Clone)]
pub struct KeySwitcher<const DEGREE: usize> {
    params: Arc<Parameters<DEGREE>>,
}

impl<const DEGREE: usize> KeySwitcher<DEGREE> {
    pub fn new(params: Arc<Parameters<DEGREE>>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Arc<Parameters<DEGREE>> {
        &self.params
    }

    /// Gadget digits of `poly` (over `Q_l`), each extended to `QP_l` and in
    /// NTT domain.
    pub fn decompose(&self, poly: &RnsPoly<DEGREE>) -> MkResult<Vec<RnsPoly<DEGREE>>> {
        let level = poly.channel_count() - 1;
        Ok(self.params.decomposer(level).decompose(poly)?)
    }

    /// `Σ digits_k·key_k` over the digits' basis. `key` may live at a higher
    /// level; only the channels of the digits are read.
    pub fn inner_product(
        &self,
        digits: &[RnsPoly<DEGREE>],
        key: &[RnsPoly<DEGREE>],
    ) -> MkResult<RnsPoly<DEGREE>> {
        debug_assert!(key.len() >= digits.len());
        let basis = digits
            .first()
            .map(|d| d.basis().clone())
            .unwrap_or_else(|| self.params.qp_basis(0).clone());
        let mut acc = RnsPoly::zero_in(basis.clone(), true);
        for (digit, key_k) in digits.iter().zip(key) {
            acc.mul_add_assign(digit, &key_k.restrict_to(&basis)?);
        }
        Ok(acc)
    }

    /// Divides an accumulator over `QP_l` by `P`, landing on `Q_l`.
    pub fn mod_down(&self, acc: &RnsPoly<DEGREE>) -> MkResult<RnsPoly<DEGREE>> {
        let level = acc.channel_count() - self.params.p_moduli().len() - 1;
        Ok(divide_by_tail(acc, self.params.q_basis(level))?)
    }

    /// Runs the full primitive on one component. Both outputs are over the
    /// component's `Q_l` and in NTT domain.
    #[instrument(skip_all, fields(level = component.channel_count() - 1))]
    pub fn key_switch(
        &self,
        component: &RnsPoly<DEGREE>,
        body: &[RnsPoly<DEGREE>],
        head: &[RnsPoly<DEGREE>],
    ) -> MkResult<(RnsPoly<DEGREE>, RnsPoly<DEGREE>)> {
        let digits = self.decompose(component)?;
        debug!(digits = digits.len(), "key switch");
        let acc0 = self.inner_product(&digits, body)?;
        let acc1 = self.inner_product(&digits, head)?;
        Ok((self.mod_down(&acc0)?, self.mod_down(&acc1)?))
    }

    pub(crate) fn qp_basis(&self, level: usize) -> &Arc<RnsBasis<DEGREE>> {
        self.params.qp_basis(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{keygen::KeyGenerator, params::CrsTarget};

    const D: usize = 16;

    #[test]
    fn switching_from_rotated_secret_preserves_phase() {
        let params = Parameters::<D>::builder()
            .log_q(&[50, 40, 40])
            .log_p(&[58])
            .rotations(&[1])
            .build()
            .unwrap();
        let mut kg = KeyGenerator::from_seed(params.clone(), [9u8; 32]);
        let sk = kg.gen_secret_key("alice").unwrap();
        let rk = kg.gen_rotation_key(1, &sk).unwrap();
        let switcher = KeySwitcher::new(params.clone());

        for level in 0..=params.max_level() {
            let basis = params.q_basis(level).clone();
            let c = RnsPoly::<D>::from_coeffs(&[123_456, -98_765, 42], basis.clone())
                .into_ntt_domain();
            let crs = params.crs(CrsTarget::Rotation(1)).unwrap();
            let (a0, a1) = switcher.key_switch(&c, rk.value().digits(), crs).unwrap();

            let s = sk.at_basis(&basis).unwrap();
            let rotated = s.automorphism(params.galois_element_for_rotation(1));
            let mut expected = c.clone();
            expected *= &rotated;

            let mut phase = a0.clone();
            phase.mul_add_assign(&a1, &s);
            let diff = (&phase - &expected).to_coeffs();
            assert!(diff.iter().all(|e| e.abs() < 1 << 12), "level {level}: {diff:?}");
        }
    }

    #[test]
    fn mod_down_divides_exact_multiples_of_p() {
        let params = Parameters::<D>::builder()
            .log_q(&[50, 40])
            .log_p(&[58])
            .build()
            .unwrap();
        let switcher = KeySwitcher::new(params.clone());
        let x = RnsPoly::<D>::from_coeffs(&[5, -7, 11], params.qp_basis(1).clone());
        let mut scaled = x.clone();
        scaled.mul_scalar_assign(&params.p_residues(params.qp_basis(1)));
        let down = switcher.mod_down(&scaled).unwrap();
        assert_eq!(down.to_coeffs()[..3], [5, -7, 11]);
    }
}
