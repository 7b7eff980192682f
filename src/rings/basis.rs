use std::sync::Arc;

use crate::math::{
    is_ntt_friendly_prime,
    modular::{center, mod_inverse, mod_pow, mul_mod, reduce_i64, sub_mod},
};

use super::errors::{RnsNttError, RnsNttResult};

/// Twiddle factors of the negacyclic NTT for one prime.
///
/// `forward_roots[k] = psi^brv(k)` and `inverse_roots[k] = psi^-brv(k)`, where
/// `psi` is a primitive `2N`-th root of unity and `brv` reverses `log2(N)` bits.
#[derive(Debug, Clone)]
pub struct NttTable<const DEGREE: usize> {
    pub forward_roots: [u64; DEGREE],
    pub inverse_roots: [u64; DEGREE],
    pub n_inv: u64,
    pub modulus: u64,
}

impl<const DEGREE: usize> NttTable<DEGREE> {
    pub fn new(modulus: u64) -> RnsNttResult<Self> {
        if !DEGREE.is_power_of_two() || DEGREE < 2 {
            return Err(RnsNttError::InvalidDegree { degree: DEGREE });
        }
        if !is_ntt_friendly_prime(modulus, DEGREE as u64) {
            return Err(RnsNttError::NonNttFriendlyModulus {
                modulus,
                degree: DEGREE,
            });
        }

        let order = 2 * DEGREE;
        let primitive_root = find_primitive_root(modulus, order);
        let bit_count = DEGREE.trailing_zeros() as usize;

        let mut forward_roots = [1u64; DEGREE];
        for (index, root) in forward_roots.iter_mut().enumerate().skip(1) {
            let bit_reversed = reverse_bits(index, bit_count);
            *root = mod_pow(primitive_root, bit_reversed as u64, modulus);
        }

        let primitive_root_inverse = mod_inverse(primitive_root, modulus);
        let mut inverse_roots = [1u64; DEGREE];
        for (index, root) in inverse_roots.iter_mut().enumerate().skip(1) {
            let bit_reversed = reverse_bits(index, bit_count);
            *root = mod_pow(primitive_root_inverse, bit_reversed as u64, modulus);
        }

        let n_inv = mod_inverse(DEGREE as u64, modulus);
        Ok(Self {
            forward_roots,
            inverse_roots,
            n_inv,
            modulus,
        })
    }
}

/// RNS basis: a set of distinct NTT-friendly prime moduli with precomputed
/// NTT tables and the Garner constants used to lift residues back to integers.
///
/// Invariant: `moduli.len() == ntt_tables.len()` and
/// `ntt_tables[i].modulus == moduli[i]` for all `i`. Sub-bases share their
/// tables with the basis they were cut from.
#[derive(Debug, Clone)]
pub struct RnsBasis<const DEGREE: usize> {
    moduli: Vec<u64>,
    ntt_tables: Vec<Arc<NttTable<DEGREE>>>,
    // garner_inverses[i][j] = q_j^{-1} mod q_i for j < i
    garner_inverses: Vec<Vec<u64>>,
}

impl<const DEGREE: usize> RnsBasis<DEGREE> {
    pub fn new(moduli: Vec<u64>) -> RnsNttResult<Self> {
        let mut ntt_tables = Vec::with_capacity(moduli.len());
        for &modulus in &moduli {
            ntt_tables.push(Arc::new(NttTable::new(modulus)?));
        }
        Self::from_tables(moduli, ntt_tables)
    }

    fn from_tables(
        moduli: Vec<u64>,
        ntt_tables: Vec<Arc<NttTable<DEGREE>>>,
    ) -> RnsNttResult<Self> {
        if moduli.is_empty() {
            return Err(RnsNttError::EmptyBasis);
        }
        for (i, &modulus) in moduli.iter().enumerate() {
            if moduli[..i].contains(&modulus) {
                return Err(RnsNttError::DuplicateModulus { modulus });
            }
        }
        let garner_inverses = moduli
            .iter()
            .enumerate()
            .map(|(i, &qi)| {
                moduli[..i]
                    .iter()
                    .map(|&qj| mod_inverse(qj % qi, qi))
                    .collect()
            })
            .collect();
        Ok(Self {
            moduli,
            ntt_tables,
            garner_inverses,
        })
    }

    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    pub fn ntt_table(&self, channel: usize) -> &NttTable<DEGREE> {
        &self.ntt_tables[channel]
    }

    pub fn channel_count(&self) -> usize {
        self.moduli.len()
    }

    /// Index of `modulus` inside this basis, if present.
    pub fn position(&self, modulus: u64) -> Option<usize> {
        self.moduli.iter().position(|&m| m == modulus)
    }

    /// Returns a new basis with the last `drop_count` channels removed.
    pub fn drop_last(&self, drop_count: usize) -> RnsNttResult<Self> {
        let channel_count = self.channel_count();
        if drop_count >= channel_count {
            return Err(RnsNttError::InvalidModDrop {
                drop_count,
                channel_count,
            });
        }
        let keep = channel_count - drop_count;
        Self::from_tables(
            self.moduli[..keep].to_vec(),
            self.ntt_tables[..keep].to_vec(),
        )
    }

    /// Returns the basis made of this basis' channels followed by `other`'s.
    pub fn concat(&self, other: &Self) -> RnsNttResult<Self> {
        let moduli = self.moduli.iter().chain(&other.moduli).copied().collect();
        let tables = self
            .ntt_tables
            .iter()
            .chain(&other.ntt_tables)
            .cloned()
            .collect();
        Self::from_tables(moduli, tables)
    }

    /// Balanced mixed-radix digits of the integer with the given residues:
    /// `a = d_0 + d_1 q_0 + d_2 q_0 q_1 + …` with `d_i` in `(-q_i/2, q_i/2]`.
    fn mixed_radix_digits(&self, residues: &[u64]) -> Vec<i64> {
        debug_assert_eq!(residues.len(), self.moduli.len());
        let mut digits: Vec<i64> = Vec::with_capacity(residues.len());
        for (i, (&residue, &qi)) in residues.iter().zip(&self.moduli).enumerate() {
            let mut x = residue;
            for (j, &digit) in digits.iter().enumerate() {
                x = sub_mod(x, reduce_i64(digit, qi), qi);
                x = mul_mod(x, self.garner_inverses[i][j], qi);
            }
            digits.push(center(x, qi));
        }
        digits
    }

    /// CRT-reconstructs a single coefficient centered in `(-Q/2, Q/2]`.
    ///
    /// Exact whenever the centered value fits in an `i64`; larger values wrap.
    pub fn reconstruct_centered_coeff(&self, residues: &[u64]) -> i64 {
        let digits = self.mixed_radix_digits(residues);
        let mut acc = 0i128;
        for (digit, &q) in digits.iter().zip(&self.moduli).rev() {
            acc = acc.wrapping_mul(q as i128).wrapping_add(*digit as i128);
        }
        acc as i64
    }

    /// CRT-reconstructs a single coefficient centered in `(-Q/2, Q/2]` as an
    /// `f64`, with relative precision of the floating-point format.
    pub fn reconstruct_centered_f64(&self, residues: &[u64]) -> f64 {
        let digits = self.mixed_radix_digits(residues);
        let mut acc = 0f64;
        for (digit, &q) in digits.iter().zip(&self.moduli).rev() {
            acc = acc * q as f64 + *digit as f64;
        }
        acc
    }
}

impl<const DEGREE: usize> PartialEq for RnsBasis<DEGREE> {
    fn eq(&self, other: &Self) -> bool {
        self.moduli == other.moduli
    }
}

impl<const DEGREE: usize> Eq for RnsBasis<DEGREE> {}

// ─── Private number-theory helpers ───────────────────────────────────────────

/// Finds a primitive `order`-th root of unity in Z_modulus.
///
/// # Panics
/// Cannot panic when `modulus` is an NTT-friendly prime for the corresponding
/// degree, since such primes are guaranteed to have the required root.
fn find_primitive_root(modulus: u64, order: usize) -> u64 {
    let exponent = (modulus - 1) / order as u64;

    // `order` is a power of two, so `root` is primitive iff `root^(order/2) != 1`.
    for candidate in 2..modulus {
        let root = mod_pow(candidate, exponent, modulus);
        if mod_pow(root, (order / 2) as u64, modulus) != 1 {
            return root;
        }
    }

    panic!("find_primitive_root: no root found for modulus {modulus}, order {order}");
}

pub(super) fn reverse_bits(value: usize, bit_count: usize) -> usize {
    if bit_count == 0 {
        return 0;
    }
    value.reverse_bits() >> (usize::BITS as usize - bit_count)
}
