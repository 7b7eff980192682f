//! Immutable ring and protocol parameters: the `Q`/`P` modulus chains, per
//! level bases, noise widths and the common reference string.

mod builder;

pub use builder::ParametersBuilder;

use std::{collections::BTreeMap, fmt, sync::Arc};

use thiserror::Error;

use crate::{
    errors::{MkError, MkResult},
    math::modular::{mod_pow, mul_mod},
    rings::{Decomposer, RnsBasis, RnsNttError, RnsPoly},
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParameterError {
    #[error("modulus chain {chain} is empty")]
    EmptyChain { chain: &'static str },
    #[error("prime size of {bits} bits is outside 1..{max_bits}")]
    BitsOutOfRange { bits: u32, max_bits: u32 },
    #[error("modulus {modulus} exceeds {max_bits} bits")]
    ModulusTooLarge { modulus: u64, max_bits: u32 },
    #[error("standard deviation {0} must be finite and positive")]
    InvalidSigma(f64),
    #[error("ternary density {0} must be in (0, 1]")]
    InvalidDensity(f64),
    #[error("rotation index {rotation} must be in 1..{degree}")]
    InvalidRotation { rotation: usize, degree: usize },
    #[error(transparent)]
    Ring(#[from] RnsNttError),
}

/// Key-switch target a CRS entry is drawn for.
///
/// The integer index mirrors the usual convention: `0` public key, `-1`
/// relinearization, `-2` conjugation, positive values rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CrsTarget {
    PublicKey,
    Relinearization,
    Conjugation,
    Rotation(usize),
}

impl CrsTarget {
    pub fn index(&self) -> i64 {
        match self {
            Self::PublicKey => 0,
            Self::Relinearization => -1,
            Self::Conjugation => -2,
            Self::Rotation(r) => *r as i64,
        }
    }

    /// ChaCha stream the entry is expanded from.
    pub(crate) fn stream(&self) -> u64 {
        self.index() as u64
    }
}

impl fmt::Display for CrsTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PublicKey => write!(f, "public key (0)"),
            Self::Relinearization => write!(f, "relinearization (-1)"),
            Self::Conjugation => write!(f, "conjugation (-2)"),
            Self::Rotation(r) => write!(f, "rotation by {r}"),
        }
    }
}

/// Ring degree `DEGREE`, modulus chains `Q = q_0..q_L` and `P = p_0..p_{α-1}`,
/// noise parameters and the CRS.
///
/// Gadget digits span `α = |P|` primes of `Q`, so a level-`l` element splits
/// into `β(l) = ceil((l+1)/α)` digits.
#[derive(Debug)]
pub struct Parameters<const DEGREE: usize> {
    q_bases: Vec<Arc<RnsBasis<DEGREE>>>,
    qp_bases: Vec<Arc<RnsBasis<DEGREE>>>,
    decomposers: Vec<Decomposer<DEGREE>>,
    p_basis: Arc<RnsBasis<DEGREE>>,
    sigma: f64,
    smudging_sigma: f64,
    ternary_density: f64,
    crs: BTreeMap<CrsTarget, Vec<RnsPoly<DEGREE>>>,
}

impl<const DEGREE: usize> Parameters<DEGREE> {
    pub fn builder() -> ParametersBuilder<DEGREE> {
        ParametersBuilder::new()
    }

    pub fn degree(&self) -> usize {
        DEGREE
    }

    pub fn max_level(&self) -> usize {
        self.q_bases.len() - 1
    }

    pub fn q_moduli(&self) -> &[u64] {
        self.q_bases[self.max_level()].moduli()
    }

    pub fn p_moduli(&self) -> &[u64] {
        self.p_basis.moduli()
    }

    /// Number of `Q` primes per gadget digit.
    pub fn alpha(&self) -> usize {
        self.p_basis.channel_count()
    }

    /// Number of gadget digits at `level`.
    pub fn beta(&self, level: usize) -> usize {
        (level + 1).div_ceil(self.alpha())
    }

    /// Basis `q_0..q_level`.
    pub fn q_basis(&self, level: usize) -> &Arc<RnsBasis<DEGREE>> {
        &self.q_bases[level]
    }

    /// Basis `q_0..q_level, p_0..p_{α-1}`.
    pub fn qp_basis(&self, level: usize) -> &Arc<RnsBasis<DEGREE>> {
        &self.qp_bases[level]
    }

    /// Gadget decomposition from `Q_level` into `QP_level`.
    pub fn decomposer(&self, level: usize) -> &Decomposer<DEGREE> {
        &self.decomposers[level]
    }

    pub fn p_basis(&self) -> &Arc<RnsBasis<DEGREE>> {
        &self.p_basis
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn smudging_sigma(&self) -> f64 {
        self.smudging_sigma
    }

    pub fn ternary_density(&self) -> f64 {
        self.ternary_density
    }

    /// CRS polynomials (over the full `QP` basis, NTT domain) for `target`.
    pub fn crs(&self, target: CrsTarget) -> MkResult<&[RnsPoly<DEGREE>]> {
        self.crs
            .get(&target)
            .map(Vec::as_slice)
            .ok_or(MkError::MissingCrs(target))
    }

    pub fn crs_targets(&self) -> impl Iterator<Item = CrsTarget> + '_ {
        self.crs.keys().copied()
    }

    /// Rotation amounts a CRS entry was provisioned for.
    pub fn rotations(&self) -> impl Iterator<Item = usize> + '_ {
        self.crs.keys().filter_map(|target| match target {
            CrsTarget::Rotation(r) => Some(*r),
            _ => None,
        })
    }

    /// `5^rotation mod 2N`.
    pub fn galois_element_for_rotation(&self, rotation: usize) -> usize {
        mod_pow(5, rotation as u64, 2 * DEGREE as u64) as usize
    }

    /// `2N - 1`, i.e. `X -> X^{-1}`.
    pub fn galois_element_for_conjugation(&self) -> usize {
        2 * DEGREE - 1
    }

    /// `P mod m` for every modulus of `basis`.
    pub fn p_residues(&self, basis: &RnsBasis<DEGREE>) -> Vec<u64> {
        basis
            .moduli()
            .iter()
            .map(|&m| {
                self.p_moduli()
                    .iter()
                    .fold(1u64, |acc, &p| mul_mod(acc, p % m, m))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> Arc<Parameters<16>> {
        Parameters::<16>::builder()
            .log_q(&[40, 30, 30])
            .log_p(&[45])
            .rotations(&[1, 3])
            .build()
            .unwrap()
    }

    #[test]
    fn builds_per_level_bases() {
        let params = small_params();
        assert_eq!(params.max_level(), 2);
        assert_eq!(params.q_basis(0).channel_count(), 1);
        assert_eq!(params.qp_basis(1).channel_count(), 3);
        assert_eq!(params.qp_basis(2).moduli()[3], params.p_moduli()[0]);
        assert_eq!(params.alpha(), 1);
        assert_eq!(params.beta(2), 3);
    }

    #[test]
    fn decomposers_match_level_bases() {
        let params = small_params();
        for level in 0..=params.max_level() {
            let decomposer = params.decomposer(level);
            assert_eq!(decomposer.digit_count(), params.beta(level));
            assert_eq!(decomposer.target(), params.qp_basis(level));

            let poly = RnsPoly::from_coeffs(&[3, -1, 4, 1, -5, 9], params.q_basis(level).clone());
            assert_eq!(
                decomposer.decompose(&poly).unwrap(),
                crate::rings::decompose(&poly, params.alpha(), params.qp_basis(level)).unwrap()
            );
        }
    }

    #[test]
    fn crs_entries_cover_requested_targets() {
        let params = small_params();
        let targets: Vec<_> = params.crs_targets().collect();
        assert_eq!(
            targets,
            vec![
                CrsTarget::PublicKey,
                CrsTarget::Relinearization,
                CrsTarget::Conjugation,
                CrsTarget::Rotation(1),
                CrsTarget::Rotation(3),
            ]
        );
        assert_eq!(params.crs(CrsTarget::PublicKey).unwrap().len(), 3);
        assert_eq!(params.rotations().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn missing_crs_is_reported() {
        let params = small_params();
        assert_eq!(
            params.crs(CrsTarget::Rotation(2)).unwrap_err(),
            MkError::MissingCrs(CrsTarget::Rotation(2))
        );
    }

    #[test]
    fn crs_is_deterministic_in_seed() {
        let a = small_params();
        let b = small_params();
        assert_eq!(
            a.crs(CrsTarget::Relinearization).unwrap(),
            b.crs(CrsTarget::Relinearization).unwrap()
        );
        assert_ne!(
            a.crs(CrsTarget::Relinearization).unwrap()[0],
            a.crs(CrsTarget::PublicKey).unwrap()[0]
        );
    }

    #[test]
    fn galois_elements() {
        let params = small_params();
        assert_eq!(params.galois_element_for_rotation(0), 1);
        assert_eq!(params.galois_element_for_rotation(1), 5);
        assert_eq!(params.galois_element_for_rotation(2), 25);
        assert_eq!(params.galois_element_for_rotation(3), 125 % 32);
        assert_eq!(params.galois_element_for_conjugation(), 31);
    }

    #[test]
    fn target_indices() {
        assert_eq!(CrsTarget::PublicKey.index(), 0);
        assert_eq!(CrsTarget::Relinearization.index(), -1);
        assert_eq!(CrsTarget::Conjugation.index(), -2);
        assert_eq!(CrsTarget::Rotation(7).index(), 7);
    }
}
