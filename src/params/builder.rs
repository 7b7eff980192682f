use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, instrument};

use super::{CrsTarget, ParameterError, Parameters};
use crate::{
    math::primes::{MAX_MODULUS_BITS, ntt_prime_chain},
    rings::{Decomposer, RnsBasis, RnsPoly},
};

const DEFAULT_Q_BITS: [u32; 3] = [55, 40, 40];
const DEFAULT_P_BITS: [u32; 1] = [61];
const DEFAULT_SIGMA: f64 = 3.2;
const DEFAULT_SMUDGING_SIGMA: f64 = 3.2 * 1024.0;
const DEFAULT_TERNARY_DENSITY: f64 = 0.5;

enum ChainSpec {
    Bits(Vec<u32>),
    Moduli(Vec<u64>),
}

/// Builder for [`Parameters`]. Every setting has a default; `build` validates
/// the combination and expands the CRS.
pub struct ParametersBuilder<const DEGREE: usize> {
    q_chain: Option<ChainSpec>,
    p_chain: Option<ChainSpec>,
    sigma: Option<f64>,
    smudging_sigma: Option<f64>,
    ternary_density: Option<f64>,
    crs_seed: Option<[u8; 32]>,
    rotations: Vec<usize>,
}

impl<const DEGREE: usize> Default for ParametersBuilder<DEGREE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const DEGREE: usize> ParametersBuilder<DEGREE> {
    pub fn new() -> Self {
        Self {
            q_chain: None,
            p_chain: None,
            sigma: None,
            smudging_sigma: None,
            ternary_density: None,
            crs_seed: None,
            rotations: Vec::new(),
        }
    }

    /// Bit sizes of the `Q` primes, `q_0` first.
    pub fn log_q(mut self, bits: &[u32]) -> Self {
        self.q_chain = Some(ChainSpec::Bits(bits.to_vec()));
        self
    }

    pub fn q_moduli(mut self, moduli: Vec<u64>) -> Self {
        self.q_chain = Some(ChainSpec::Moduli(moduli));
        self
    }

    /// Bit sizes of the `P` primes; their count is the gadget digit size.
    pub fn log_p(mut self, bits: &[u32]) -> Self {
        self.p_chain = Some(ChainSpec::Bits(bits.to_vec()));
        self
    }

    pub fn p_moduli(mut self, moduli: Vec<u64>) -> Self {
        self.p_chain = Some(ChainSpec::Moduli(moduli));
        self
    }

    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = Some(sigma);
        self
    }

    /// Width of the noise added to partial decryption shares.
    pub fn smudging_sigma(mut self, sigma: f64) -> Self {
        self.smudging_sigma = Some(sigma);
        self
    }

    pub fn ternary_density(mut self, density: f64) -> Self {
        self.ternary_density = Some(density);
        self
    }

    pub fn crs_seed(mut self, seed: [u8; 32]) -> Self {
        self.crs_seed = Some(seed);
        self
    }

    /// Rotation amounts to provision CRS entries for.
    pub fn rotations(mut self, rotations: &[usize]) -> Self {
        self.rotations.extend_from_slice(rotations);
        self
    }

    #[instrument(skip_all, fields(degree = DEGREE))]
    pub fn build(self) -> Result<Arc<Parameters<DEGREE>>, ParameterError> {
        let sigma = self.sigma.unwrap_or(DEFAULT_SIGMA);
        let smudging_sigma = self.smudging_sigma.unwrap_or(DEFAULT_SMUDGING_SIGMA);
        for s in [sigma, smudging_sigma] {
            if !s.is_finite() || s <= 0.0 {
                return Err(ParameterError::InvalidSigma(s));
            }
        }
        let ternary_density = self.ternary_density.unwrap_or(DEFAULT_TERNARY_DENSITY);
        if !(ternary_density > 0.0 && ternary_density <= 1.0) {
            return Err(ParameterError::InvalidDensity(ternary_density));
        }
        if let Some(&rotation) = self
            .rotations
            .iter()
            .find(|&&r| r == 0 || r >= DEGREE)
        {
            return Err(ParameterError::InvalidRotation {
                rotation,
                degree: DEGREE,
            });
        }

        let q_chain = self
            .q_chain
            .unwrap_or_else(|| ChainSpec::Bits(DEFAULT_Q_BITS.to_vec()));
        let p_chain = self
            .p_chain
            .unwrap_or_else(|| ChainSpec::Bits(DEFAULT_P_BITS.to_vec()));

        // Explicit moduli are reserved first so generated primes avoid them.
        let mut taken = Vec::new();
        for chain in [&q_chain, &p_chain] {
            if let ChainSpec::Moduli(moduli) = chain {
                taken.extend_from_slice(moduli);
            }
        }
        let q = resolve_chain(q_chain, "Q", DEGREE as u64, &mut taken)?;
        let p = resolve_chain(p_chain, "P", DEGREE as u64, &mut taken)?;
        debug!(?q, ?p, "resolved modulus chains");

        let q_full = Arc::new(RnsBasis::<DEGREE>::new(q)?);
        let p_basis = Arc::new(RnsBasis::<DEGREE>::new(p)?);
        let max_level = q_full.channel_count() - 1;

        let mut q_bases = Vec::with_capacity(max_level + 1);
        for level in 0..max_level {
            q_bases.push(Arc::new(q_full.drop_last(max_level - level)?));
        }
        q_bases.push(q_full);

        let mut qp_bases = Vec::with_capacity(max_level + 1);
        for q_basis in &q_bases {
            qp_bases.push(Arc::new(q_basis.concat(&p_basis)?));
        }

        let alpha = p_basis.channel_count();
        let decomposers = q_bases
            .iter()
            .zip(&qp_bases)
            .map(|(q_basis, qp_basis)| Decomposer::new(q_basis.clone(), alpha, qp_basis.clone()))
            .collect();

        let mut targets = BTreeSet::from([
            CrsTarget::PublicKey,
            CrsTarget::Relinearization,
            CrsTarget::Conjugation,
        ]);
        targets.extend(self.rotations.iter().map(|&r| CrsTarget::Rotation(r)));

        let digit_count = (max_level + 1).div_ceil(alpha);
        let seed = self.crs_seed.unwrap_or([0u8; 32]);
        let crs: BTreeMap<_, _> = targets
            .into_iter()
            .map(|target| {
                let mut rng = ChaCha20Rng::from_seed(seed);
                rng.set_stream(target.stream());
                let polys: Vec<RnsPoly<DEGREE>> = (0..digit_count)
                    .map(|_| {
                        RnsPoly::sample_uniform(&qp_bases[max_level], &mut rng).into_ntt_domain()
                    })
                    .collect();
                (target, polys)
            })
            .collect();
        debug!(targets = crs.len(), digit_count, "expanded common reference string");

        Ok(Arc::new(Parameters {
            q_bases,
            qp_bases,
            decomposers,
            p_basis,
            sigma,
            smudging_sigma,
            ternary_density,
            crs,
        }))
    }
}

fn resolve_chain(
    spec: ChainSpec,
    chain: &'static str,
    degree: u64,
    taken: &mut Vec<u64>,
) -> Result<Vec<u64>, ParameterError> {
    let moduli = match spec {
        ChainSpec::Moduli(moduli) => {
            if let Some(&modulus) = moduli.iter().find(|&&m| m >> MAX_MODULUS_BITS != 0) {
                return Err(ParameterError::ModulusTooLarge {
                    modulus,
                    max_bits: MAX_MODULUS_BITS,
                });
            }
            moduli
        }
        ChainSpec::Bits(bits) => {
            if let Some(&b) = bits.iter().find(|&&b| b == 0 || b >= MAX_MODULUS_BITS) {
                return Err(ParameterError::BitsOutOfRange {
                    bits: b,
                    max_bits: MAX_MODULUS_BITS,
                });
            }
            ntt_prime_chain(&bits, degree, taken)
        }
    };
    if moduli.is_empty() {
        return Err(ParameterError::EmptyChain { chain });
    }
    Ok(moduli)
}
